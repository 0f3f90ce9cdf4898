//! Per-frame scene: cell fills, goal marker and agent marker.

use kalmanviz_core::{CellView, Frame};

use crate::RenderError;
use crate::canvas::{DrawSurface, Rect};
use crate::grid::GridGeometry;
use crate::palette::Palette;

#[derive(Debug, Clone, Copy)]
pub struct SceneRenderer {
    palette: Palette,
}

impl SceneRenderer {
    pub fn new(palette: Palette) -> Self {
        Self { palette }
    }

    pub fn palette(&self) -> &Palette {
        &self.palette
    }

    /// Paints one frame. Holds no state between calls.
    pub fn draw<S: DrawSurface + ?Sized>(
        &self,
        frame: &Frame<'_>,
        geometry: &GridGeometry,
        surface: &mut S,
    ) -> Result<(), RenderError> {
        if let Some(cells) = frame.cells {
            self.draw_cells(cells, geometry, surface)?;
        }

        let side = f64::from(geometry.cell_size);
        if frame.capabilities.has_goal
            && let Some(goal) = frame.snapshot.goal
            && goal.is_set()
        {
            surface.fill_rect(Rect::square(goal.x, goal.y, side), self.palette.goal)?;
        }
        if let Some((x, y)) = frame.snapshot.agent_pixel() {
            surface.fill_rect(Rect::square(x, y, side), self.palette.agent)?;
        }
        Ok(())
    }

    fn draw_cells<S: DrawSurface + ?Sized>(
        &self,
        cells: CellView<'_>,
        geometry: &GridGeometry,
        surface: &mut S,
    ) -> Result<(), RenderError> {
        let side = f64::from(geometry.cell_size);
        for cell in cells.iter_kinds() {
            let (row, col, kind) = cell?;
            let (x, y) = geometry.cell_origin(row, col);
            surface.fill_rect(Rect::square(x, y, side), self.palette.cell(kind))?;
        }
        Ok(())
    }
}
