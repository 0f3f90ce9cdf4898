//! Offscreen PNG export.

use std::io::Cursor;

use image::{ImageBuffer, ImageFormat, Rgba as ImgRgba};
use kalmanviz_core::{DriverConfig, Engine, Frame, FramePainter, Snapshot};

use crate::RenderError;
use crate::canvas::PixelCanvas;
use crate::grid::GridGeometry;
use crate::painter::CanvasPainter;
use crate::palette::Palette;

pub fn encode_png(canvas: &PixelCanvas) -> Result<Vec<u8>, RenderError> {
    let image = ImageBuffer::<ImgRgba<u8>, &[u8]>::from_raw(
        canvas.width(),
        canvas.height(),
        canvas.as_rgba(),
    )
    .ok_or(RenderError::InvalidCanvas {
        width: canvas.width(),
        height: canvas.height(),
    })?;

    let mut bytes = Vec::new();
    image.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)?;
    Ok(bytes)
}

/// Paints the engine's current state once, without ticking, and encodes it.
pub fn render_png_offscreen<E: Engine + ?Sized>(
    engine: &E,
    config: &DriverConfig,
) -> Result<Vec<u8>, RenderError> {
    let capabilities = engine.capabilities();
    let dimensions = engine.dimensions().validate()?;
    let geometry = GridGeometry::for_engine(capabilities, dimensions, config)?;
    let canvas = PixelCanvas::new(geometry.extent.0, geometry.extent.1)?;
    let palette = Palette::from_config(&config.palette)?;
    let mut painter = CanvasPainter::new(canvas, geometry, palette);

    let snapshot = Snapshot::capture(engine, dimensions);
    let frame = Frame {
        snapshot: &snapshot,
        capabilities,
        cells: engine.cells(),
    };
    painter.clear()?;
    painter.draw_grid(&frame)?;
    painter.draw_scene(&frame)?;
    painter.present()?;
    encode_png(painter.surface())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::{DrawSurface, Rect};
    use crate::palette::Rgba;

    #[test]
    fn encodes_valid_png_header() {
        let mut canvas = PixelCanvas::new(16, 9).unwrap();
        canvas
            .fill_rect(Rect::square(2.0, 2.0, 4.0), Rgba::opaque(10, 20, 30))
            .unwrap();
        let png = encode_png(&canvas).unwrap();
        assert_eq!(&png[0..8], b"\x89PNG\r\n\x1a\n");
    }
}
