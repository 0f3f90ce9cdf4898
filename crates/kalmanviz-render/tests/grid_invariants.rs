use kalmanviz_core::Dimensions;
use kalmanviz_render::{DrawSurface, GridGeometry, GridRenderer, Line, Rect, RenderError, Rgba};

#[derive(Default)]
struct RecordingSurface {
    lines: Vec<Line>,
    fills: Vec<Rect>,
}

impl DrawSurface for RecordingSurface {
    fn size(&self) -> (u32, u32) {
        (0, 0)
    }

    fn clear(&mut self, _color: Rgba) -> Result<(), RenderError> {
        Ok(())
    }

    fn fill_rect(&mut self, rect: Rect, _color: Rgba) -> Result<(), RenderError> {
        self.fills.push(rect);
        Ok(())
    }

    fn stroke_line(&mut self, line: Line, _color: Rgba) -> Result<(), RenderError> {
        self.lines.push(line);
        Ok(())
    }
}

fn stroke(geometry: &GridGeometry) -> RecordingSurface {
    let mut surface = RecordingSurface::default();
    GridRenderer::new(Rgba::opaque(200, 200, 200))
        .draw(geometry, &mut surface)
        .expect("grid draws");
    surface
}

#[test]
fn lattice_draws_one_more_line_than_cells_per_axis() {
    let geometry = GridGeometry::lattice(7, 4, 10, 1).expect("geometry");
    let surface = stroke(&geometry);
    let vertical: Vec<_> = surface.lines.iter().filter(|l| l.is_vertical()).collect();
    let horizontal: Vec<_> = surface.lines.iter().filter(|l| l.is_horizontal()).collect();
    assert_eq!(vertical.len(), 8);
    assert_eq!(horizontal.len(), 5);
    assert!(surface.fills.is_empty());

    let (width, height) = geometry.extent;
    for (i, line) in vertical.iter().enumerate() {
        assert_eq!(line.from.0, (i as u32 * 11 + 1) as f64);
        assert_eq!((line.from.1, line.to.1), (0.0, f64::from(height)));
    }
    for (j, line) in horizontal.iter().enumerate() {
        assert_eq!(line.from.1, (j as u32 * 11 + 1) as f64);
        assert_eq!((line.from.0, line.to.0), (0.0, f64::from(width)));
    }
}

#[test]
fn continuous_lines_span_full_canvas() {
    let geometry = GridGeometry::continuous(Dimensions::new(30.0, 30.0), 10, 1).expect("geometry");
    let surface = stroke(&geometry);
    assert_eq!(surface.lines.len(), (geometry.columns + 1 + geometry.rows + 1) as usize);
    assert!(
        surface
            .lines
            .iter()
            .filter(|l| l.is_vertical())
            .all(|l| l.to.1 == 41.0)
    );
}

#[test]
fn grid_output_is_deterministic() {
    let geometry = GridGeometry::lattice(5, 5, 6, 2).expect("geometry");
    assert_eq!(stroke(&geometry).lines, stroke(&geometry).lines);
}
