//! Canvas sizing and grid line drawing.

use kalmanviz_core::{Capabilities, Dimensions, DriverConfig};

use crate::RenderError;
use crate::canvas::{DrawSurface, Line};
use crate::palette::Rgba;

/// Largest canvas side accepted on either axis. Browsers refuse larger 2-D canvases.
pub const MAX_CANVAS_SIDE: u32 = 32_767;

/// Cell lattice laid over the canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridGeometry {
    pub columns: u32,
    pub rows: u32,
    pub cell_size: u32,
    pub border: u32,
    /// Canvas extent in pixels, `(width, height)`.
    pub extent: (u32, u32),
}

impl GridGeometry {
    /// One square per engine cell: `(cell_size + border) * n + border` per axis.
    pub fn lattice(
        columns: u32,
        rows: u32,
        cell_size: u32,
        border: u32,
    ) -> Result<Self, RenderError> {
        let pitch = u64::from(cell_size) + u64::from(border);
        let axis = |cells: u32| {
            pitch
                .saturating_mul(u64::from(cells))
                .saturating_add(u64::from(border))
        };
        Ok(Self {
            columns,
            rows,
            cell_size,
            border,
            extent: checked_extent(axis(columns), axis(rows))?,
        })
    }

    /// Domain units map 1:1 to pixels, plus one cell pitch of headroom per axis.
    pub fn continuous(
        dimensions: Dimensions,
        cell_size: u32,
        border: u32,
    ) -> Result<Self, RenderError> {
        let pitch = u64::from(cell_size) + u64::from(border);
        let axis = |dimension: f64| {
            let limit = f64::from(MAX_CANVAS_SIDE);
            if dimension.is_finite() && dimension >= 0.0 && dimension <= limit {
                dimension.ceil() as u64 + pitch
            } else {
                u64::MAX
            }
        };
        let (width, height) = checked_extent(axis(dimensions.width), axis(dimensions.height))?;
        let pitch = u32::try_from(pitch.max(1)).unwrap_or(u32::MAX);
        Ok(Self {
            columns: width / pitch,
            rows: height / pitch,
            cell_size,
            border,
            extent: (width, height),
        })
    }

    /// Picks the layout matching the engine's capabilities.
    pub fn for_engine(
        capabilities: Capabilities,
        dimensions: Dimensions,
        config: &DriverConfig,
    ) -> Result<Self, RenderError> {
        if capabilities.has_cell_grid {
            let (columns, rows) = dimensions.lattice();
            Self::lattice(columns, rows, config.cell_size, config.cell_border)
        } else {
            Self::continuous(dimensions, config.cell_size, config.cell_border)
        }
    }

    pub fn pitch(&self) -> u32 {
        self.cell_size.saturating_add(self.border)
    }

    /// Top-left pixel of the cell at `(row, col)`.
    pub fn cell_origin(&self, row: usize, col: usize) -> (f64, f64) {
        let pitch = f64::from(self.pitch());
        let border = f64::from(self.border);
        (col as f64 * pitch + border, row as f64 * pitch + border)
    }

    /// `columns + 1` lines, each spanning the full canvas height.
    pub fn vertical_lines(&self) -> impl Iterator<Item = Line> + '_ {
        let height = f64::from(self.extent.1);
        (0..=self.columns).map(move |i| Line::vertical(self.offset(i), 0.0, height, self.width()))
    }

    /// `rows + 1` lines, each spanning the full canvas width.
    pub fn horizontal_lines(&self) -> impl Iterator<Item = Line> + '_ {
        let width = f64::from(self.extent.0);
        (0..=self.rows).map(move |j| Line::horizontal(self.offset(j), 0.0, width, self.width()))
    }

    fn offset(&self, index: u32) -> f64 {
        f64::from(index) * f64::from(self.pitch()) + f64::from(self.border)
    }

    fn width(&self) -> f64 {
        f64::from(self.border.max(1))
    }
}

/// Both sides as `u32`, or `InvalidCanvas` past [`MAX_CANVAS_SIDE`].
fn checked_extent(width: u64, height: u64) -> Result<(u32, u32), RenderError> {
    let side = |v: u64| u32::try_from(v).ok().filter(|v| *v <= MAX_CANVAS_SIDE);
    match (side(width), side(height)) {
        (Some(width), Some(height)) => Ok((width, height)),
        _ => Err(RenderError::InvalidCanvas {
            width: u32::try_from(width).unwrap_or(u32::MAX),
            height: u32::try_from(height).unwrap_or(u32::MAX),
        }),
    }
}

/// Strokes the grid. Output depends on the geometry alone.
#[derive(Debug, Clone, Copy)]
pub struct GridRenderer {
    color: Rgba,
}

impl GridRenderer {
    pub fn new(color: Rgba) -> Self {
        Self { color }
    }

    pub fn draw<S: DrawSurface + ?Sized>(
        &self,
        geometry: &GridGeometry,
        surface: &mut S,
    ) -> Result<(), RenderError> {
        for line in geometry.vertical_lines() {
            surface.stroke_line(line, self.color)?;
        }
        for line in geometry.horizontal_lines() {
            surface.stroke_line(line, self.color)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lattice_extent_includes_trailing_border() {
        let geometry = GridGeometry::lattice(4, 3, 10, 1).unwrap();
        assert_eq!(geometry.extent, (45, 34));
        assert_eq!(geometry.cell_origin(2, 3), (34.0, 23.0));
    }

    #[test]
    fn continuous_layout_covers_domain_plus_pitch() {
        let geometry = GridGeometry::continuous(Dimensions::new(30.0, 30.0), 10, 1).unwrap();
        assert_eq!(geometry.extent, (41, 41));
        assert_eq!((geometry.columns, geometry.rows), (3, 3));
    }

    #[test]
    fn layout_follows_capabilities() {
        let config = DriverConfig::default();
        let dims = Dimensions::new(5.0, 2.0);
        let lattice = GridGeometry::for_engine(Capabilities::cell_grid(), dims, &config).unwrap();
        assert_eq!((lattice.columns, lattice.rows), (5, 2));
        let continuous = GridGeometry::for_engine(Capabilities::default(), dims, &config).unwrap();
        assert_eq!(continuous.extent, (16, 13));
    }

    #[test]
    fn oversized_layouts_are_rejected_instead_of_overflowing() {
        assert!(matches!(
            GridGeometry::lattice(400_000_000, 3, 10, 1),
            Err(RenderError::InvalidCanvas { height: 34, .. })
        ));
        assert!(matches!(
            GridGeometry::lattice(u32::MAX, u32::MAX, u32::MAX, u32::MAX),
            Err(RenderError::InvalidCanvas { .. })
        ));
        assert!(matches!(
            GridGeometry::continuous(Dimensions::new(5e9, 1.0), 10, 1),
            Err(RenderError::InvalidCanvas { height: 12, .. })
        ));
        let largest = f64::from(MAX_CANVAS_SIDE - 11);
        let geometry = GridGeometry::continuous(Dimensions::new(largest, 1.0), 10, 1).unwrap();
        assert_eq!(geometry.extent, (MAX_CANVAS_SIDE, 12));
    }
}
