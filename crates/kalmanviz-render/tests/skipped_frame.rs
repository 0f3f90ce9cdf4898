use kalmanviz_core::{
    Capabilities, CellKind, CellView, CycleOutcome, Dimensions, DriverConfig, DriverError, Engine,
    EngineError, NullSurface, TickScheduler,
};
use kalmanviz_render::{CanvasPainter, GridGeometry, Palette, PixelCanvas};

/// 3x3 walled lattice whose last cell turns into garbage on tick 2 only.
struct FlakyLattice {
    cells: Vec<u8>,
    step: u64,
}

impl FlakyLattice {
    fn new() -> Self {
        let w = CellKind::Wall as u8;
        let mut cells = vec![w; 9];
        cells[4] = CellKind::Agent as u8;
        Self { cells, step: 0 }
    }
}

impl Engine for FlakyLattice {
    fn capabilities(&self) -> Capabilities {
        Capabilities::cell_grid()
    }

    fn dimensions(&self) -> Dimensions {
        Dimensions::new(3.0, 3.0)
    }

    fn tick(&mut self) -> Result<(), EngineError> {
        self.step += 1;
        self.cells[8] = if self.step == 2 { 7 } else { CellKind::Wall as u8 };
        Ok(())
    }

    fn step(&self) -> u64 {
        self.step
    }

    fn cells(&self) -> Option<CellView<'_>> {
        CellView::new(&self.cells, 3, 3, 0).ok()
    }
}

#[test]
fn unknown_cell_leaves_previous_frame_on_the_canvas() {
    let config = DriverConfig::default();
    let engine = FlakyLattice::new();
    let geometry = GridGeometry::for_engine(engine.capabilities(), engine.dimensions(), &config)
        .expect("geometry");
    let canvas = PixelCanvas::new(geometry.extent.0, geometry.extent.1).expect("canvas");
    let painter =
        CanvasPainter::for_engine(canvas, engine.capabilities(), engine.dimensions(), &config)
            .expect("painter");
    let mut sched = TickScheduler::new(engine, painter, NullSurface, config).expect("scheduler");
    sched.start().expect("start");

    assert!(matches!(sched.run_cycle(), CycleOutcome::Rendered { step: 1, .. }));
    let wall = Palette::default().wall;
    let good_frame = sched.painter().surface().as_rgba().to_vec();
    assert_eq!(sched.painter().surface().count(wall), 800);

    match sched.run_cycle() {
        CycleOutcome::Failed { error, halted } => {
            assert_eq!(error, DriverError::UnknownCell { index: 8, value: 7 });
            assert!(!halted);
        }
        other => panic!("expected a skipped frame, got {other:?}"),
    }
    assert_eq!(sched.painter().surface().as_rgba(), good_frame.as_slice());

    assert!(matches!(sched.run_cycle(), CycleOutcome::Rendered { step: 3, .. }));
    assert_eq!(sched.consecutive_failures(), 0);
}
