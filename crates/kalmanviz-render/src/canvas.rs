//! Drawing primitives and the in-memory RGBA canvas.

use crate::RenderError;
use crate::palette::Rgba;

/// Axis-aligned rectangle in canvas pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub const fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub const fn square(x: f64, y: f64, side: f64) -> Self {
        Self::new(x, y, side, side)
    }
}

/// Straight stroke. A line at coordinate `c` with width `w` covers `[c - w, c)`
/// across its length, i.e. the border pixels just before the cell starting at `c`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Line {
    pub from: (f64, f64),
    pub to: (f64, f64),
    pub width: f64,
}

impl Line {
    pub const fn vertical(x: f64, y0: f64, y1: f64, width: f64) -> Self {
        Self {
            from: (x, y0),
            to: (x, y1),
            width,
        }
    }

    pub const fn horizontal(y: f64, x0: f64, x1: f64, width: f64) -> Self {
        Self {
            from: (x0, y),
            to: (x1, y),
            width,
        }
    }

    pub fn is_vertical(&self) -> bool {
        self.from.0 == self.to.0
    }

    pub fn is_horizontal(&self) -> bool {
        self.from.1 == self.to.1
    }

    /// Pixel footprint of an axis-aligned line.
    pub fn footprint(&self) -> Option<Rect> {
        let (x0, y0) = self.from;
        let (x1, y1) = self.to;
        if self.is_vertical() {
            Some(Rect::new(x0 - self.width, y0.min(y1), self.width, (y1 - y0).abs()))
        } else if self.is_horizontal() {
            Some(Rect::new(x0.min(x1), y0 - self.width, (x1 - x0).abs(), self.width))
        } else {
            None
        }
    }
}

/// Minimal 2-D drawing target.
pub trait DrawSurface {
    fn size(&self) -> (u32, u32);

    fn clear(&mut self, color: Rgba) -> Result<(), RenderError>;

    fn fill_rect(&mut self, rect: Rect, color: Rgba) -> Result<(), RenderError>;

    fn stroke_line(&mut self, line: Line, color: Rgba) -> Result<(), RenderError>;

    fn present(&mut self) -> Result<(), RenderError> {
        Ok(())
    }
}

/// RGBA pixel surface, row-major, four bytes per pixel.
#[derive(Clone, Debug)]
pub struct PixelCanvas {
    width: u32,
    height: u32,
    pixels: Vec<u8>,
}

impl PixelCanvas {
    /// Width and height must both be non-zero.
    pub fn new(width: u32, height: u32) -> Result<Self, RenderError> {
        if width == 0 || height == 0 {
            return Err(RenderError::InvalidCanvas { width, height });
        }
        Ok(Self {
            width,
            height,
            pixels: vec![0; width as usize * height as usize * 4],
        })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Raw buffer, ready for `ImageData` or PNG encoding.
    pub fn as_rgba(&self) -> &[u8] {
        &self.pixels
    }

    pub fn into_pixels(self) -> Vec<u8> {
        self.pixels
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let offset = (y as usize * self.width as usize + x as usize) * 4;
        let bytes = &self.pixels[offset..offset + 4];
        Some(Rgba([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Pixels exactly matching `color`.
    pub fn count(&self, color: Rgba) -> usize {
        self.pixels
            .chunks_exact(4)
            .filter(|px| *px == color.0.as_slice())
            .count()
    }

    fn clip(&self, start: f64, extent: f64, limit: u32) -> (usize, usize) {
        let lo = start.floor().clamp(0.0, f64::from(limit));
        let hi = (start + extent).floor().clamp(0.0, f64::from(limit));
        (lo as usize, hi as usize)
    }
}

impl DrawSurface for PixelCanvas {
    fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn clear(&mut self, color: Rgba) -> Result<(), RenderError> {
        for px in self.pixels.chunks_exact_mut(4) {
            px.copy_from_slice(&color.0);
        }
        Ok(())
    }

    fn fill_rect(&mut self, rect: Rect, color: Rgba) -> Result<(), RenderError> {
        let (x0, x1) = self.clip(rect.x, rect.width, self.width);
        let (y0, y1) = self.clip(rect.y, rect.height, self.height);
        let stride = self.width as usize * 4;
        for y in y0..y1 {
            let row = &mut self.pixels[y * stride + x0 * 4..y * stride + x1 * 4];
            for px in row.chunks_exact_mut(4) {
                px.copy_from_slice(&color.0);
            }
        }
        Ok(())
    }

    fn stroke_line(&mut self, line: Line, color: Rgba) -> Result<(), RenderError> {
        let rect = line.footprint().ok_or(RenderError::UnsupportedLine {
            from: line.from,
            to: line.to,
        })?;
        self.fill_rect(rect, color)
    }
}
