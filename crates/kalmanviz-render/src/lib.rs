//! Rendering layer for KalmanViz.
//!
//! Painting goes through the [`DrawSurface`] seam so the same grid and scene
//! code drives the in-memory [`PixelCanvas`] (headless runs, PNG export,
//! tests) and the browser's 2-D canvas context.

pub mod canvas;
pub mod grid;
pub mod painter;
pub mod palette;
pub mod png;
pub mod scene;

use kalmanviz_core::{ConfigError, DriverError};
use thiserror::Error;

pub use canvas::{DrawSurface, Line, PixelCanvas, Rect};
pub use grid::{GridGeometry, GridRenderer, MAX_CANVAS_SIDE};
pub use painter::CanvasPainter;
pub use palette::{Palette, Rgba};
pub use png::{encode_png, render_png_offscreen};
pub use scene::SceneRenderer;

/// Errors raised by render surfaces and exporters.
#[derive(Debug, Error)]
pub enum RenderError {
    #[error("canvas size {width}x{height} is invalid")]
    InvalidCanvas { width: u32, height: u32 },
    #[error("line from {from:?} to {to:?} is not axis aligned")]
    UnsupportedLine { from: (f64, f64), to: (f64, f64) },
    #[error("surface backend failure: {0}")]
    Backend(String),
    #[error(transparent)]
    Palette(#[from] ConfigError),
    #[error(transparent)]
    Frame(#[from] DriverError),
    #[error("failed to encode image: {0}")]
    Image(#[from] image::ImageError),
}

impl From<RenderError> for DriverError {
    fn from(err: RenderError) -> Self {
        match err {
            RenderError::Frame(inner) => inner,
            other => DriverError::Surface(other.to_string()),
        }
    }
}
