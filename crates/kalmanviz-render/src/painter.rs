use kalmanviz_core::{Capabilities, Dimensions, DriverConfig, DriverError, Frame, FramePainter};
use tracing::debug;

use crate::RenderError;
use crate::canvas::DrawSurface;
use crate::grid::{GridGeometry, GridRenderer};
use crate::palette::{Palette, Rgba};
use crate::scene::SceneRenderer;

/// [`FramePainter`] that draws grid and scene onto any [`DrawSurface`].
#[derive(Debug, Clone)]
pub struct CanvasPainter<S> {
    surface: S,
    geometry: GridGeometry,
    background: Rgba,
    grid: GridRenderer,
    scene: SceneRenderer,
}

impl<S: DrawSurface> CanvasPainter<S> {
    pub fn new(surface: S, geometry: GridGeometry, palette: Palette) -> Self {
        Self {
            surface,
            geometry,
            background: palette.background,
            grid: GridRenderer::new(palette.grid),
            scene: SceneRenderer::new(palette),
        }
    }

    /// Builds geometry and palette from the driver configuration.
    pub fn for_engine(
        surface: S,
        capabilities: Capabilities,
        dimensions: Dimensions,
        config: &DriverConfig,
    ) -> Result<Self, RenderError> {
        let geometry = GridGeometry::for_engine(capabilities, dimensions, config)?;
        let palette = Palette::from_config(&config.palette)?;
        let (width, height) = surface.size();
        if (width, height) != geometry.extent {
            debug!(
                target: "kalmanviz::render",
                width, height,
                expected_width = geometry.extent.0,
                expected_height = geometry.extent.1,
                "surface size differs from grid extent"
            );
        }
        Ok(Self::new(surface, geometry, palette))
    }

    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn into_surface(self) -> S {
        self.surface
    }
}

impl<S: DrawSurface> FramePainter for CanvasPainter<S> {
    fn clear(&mut self) -> Result<(), DriverError> {
        Ok(self.surface.clear(self.background)?)
    }

    fn draw_grid(&mut self, _frame: &Frame<'_>) -> Result<(), DriverError> {
        Ok(self.grid.draw(&self.geometry, &mut self.surface)?)
    }

    fn draw_scene(&mut self, frame: &Frame<'_>) -> Result<(), DriverError> {
        Ok(self.scene.draw(frame, &self.geometry, &mut self.surface)?)
    }

    fn present(&mut self) -> Result<(), DriverError> {
        Ok(self.surface.present()?)
    }
}
