use kalmanviz_core::{
    AgentState, Capabilities, CellView, Dimensions, DriverError, ErrorModelShape, Frame, GoalState,
    Snapshot,
};
use kalmanviz_render::{
    DrawSurface, GridGeometry, Palette, PixelCanvas, RenderError, SceneRenderer,
};

fn snapshot(goal: GoalState) -> Snapshot {
    Snapshot {
        step: 1,
        dimensions: Dimensions::new(30.0, 30.0),
        goal: Some(goal),
        agent_position: None,
        actual: Some(AgentState::new(20.0, 12.0, 1.0, 0.0)),
        belief: Some(AgentState::new(19.5, 12.0, 1.0, 0.0)),
        error_model: None,
    }
}

fn paint(snapshot: &Snapshot) -> PixelCanvas {
    let palette = Palette::default();
    let geometry = GridGeometry::continuous(snapshot.dimensions, 10, 1).expect("geometry");
    let mut canvas = PixelCanvas::new(geometry.extent.0, geometry.extent.1).unwrap();
    canvas.clear(palette.background).unwrap();
    let frame = Frame {
        snapshot,
        capabilities: Capabilities::continuous(ErrorModelShape::Channels),
        cells: None,
    };
    SceneRenderer::new(palette)
        .draw(&frame, &geometry, &mut canvas)
        .expect("scene draws");
    canvas
}

#[test]
fn goal_with_zero_coordinate_is_not_drawn() {
    let canvas = paint(&snapshot(GoalState::new(0.0, 5.0)));
    assert_eq!(canvas.count(Palette::default().goal), 0);
}

#[test]
fn goal_is_drawn_at_its_pixel_position() {
    let goal = Palette::default().goal;
    let canvas = paint(&snapshot(GoalState::new(3.0, 5.0)));
    assert_eq!(canvas.count(goal), 100);
    assert_eq!(canvas.pixel(3, 5), Some(goal));
    assert_eq!(canvas.pixel(12, 14), Some(goal));
    assert_ne!(canvas.pixel(2, 5), Some(goal));
    assert_ne!(canvas.pixel(13, 5), Some(goal));
}

#[test]
fn agent_prefers_raw_position_over_state_vector() {
    let agent = Palette::default().agent;
    let canvas = paint(&snapshot(GoalState::default()));
    assert_eq!(canvas.pixel(20, 12), Some(agent));

    let mut with_position = snapshot(GoalState::default());
    with_position.agent_position = Some((1.0, 1.0));
    let canvas = paint(&with_position);
    assert_eq!(canvas.pixel(1, 1), Some(agent));
    assert_ne!(canvas.pixel(20, 12), Some(agent));
}

#[test]
fn cells_fill_row_major_squares() {
    let palette = Palette::default();
    let geometry = GridGeometry::lattice(3, 2, 4, 1).expect("geometry");
    let mut canvas = PixelCanvas::new(geometry.extent.0, geometry.extent.1).unwrap();
    let bytes = [1, 0, 0, 0, 2, 1];
    let snapshot = Snapshot {
        step: 0,
        dimensions: Dimensions::new(3.0, 2.0),
        goal: None,
        agent_position: None,
        actual: None,
        belief: None,
        error_model: None,
    };
    let frame = Frame {
        snapshot: &snapshot,
        capabilities: Capabilities::cell_grid(),
        cells: Some(CellView::new(&bytes, 3, 2, 0).unwrap()),
    };
    SceneRenderer::new(palette)
        .draw(&frame, &geometry, &mut canvas)
        .expect("cells draw");

    assert_eq!(canvas.pixel(1, 1), Some(palette.wall));
    assert_eq!(canvas.pixel(6 + 3, 6 + 3), Some(palette.agent));
    assert_eq!(canvas.pixel(11, 6), Some(palette.wall));
    assert_eq!(canvas.count(palette.agent), 16);
}

#[test]
fn unknown_cell_fails_the_frame() {
    let geometry = GridGeometry::lattice(2, 1, 4, 1).expect("geometry");
    let mut canvas = PixelCanvas::new(geometry.extent.0, geometry.extent.1).unwrap();
    let bytes = [0, 9];
    let snapshot = Snapshot {
        step: 0,
        dimensions: Dimensions::new(2.0, 1.0),
        goal: None,
        agent_position: None,
        actual: None,
        belief: None,
        error_model: None,
    };
    let frame = Frame {
        snapshot: &snapshot,
        capabilities: Capabilities::cell_grid(),
        cells: Some(CellView::new(&bytes, 2, 1, 0).unwrap()),
    };
    let err = SceneRenderer::new(Palette::default())
        .draw(&frame, &geometry, &mut canvas)
        .unwrap_err();
    assert!(matches!(
        err,
        RenderError::Frame(DriverError::UnknownCell { index: 1, value: 9 })
    ));
}
