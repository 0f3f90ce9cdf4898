use kalmanviz_core::{Capabilities, CellKind, CellView, Dimensions, Engine, EngineError};
use tracing::{debug, trace};

use crate::SimError;

/// Walled lattice with a single agent cell sweeping back and forth along its row.
#[derive(Debug, Clone)]
pub struct BounceGrid {
    columns: u32,
    rows: u32,
    cells: Vec<u8>,
    epoch: u64,
    step: u64,
    row: u32,
    column: u32,
    heading_east: bool,
}

impl BounceGrid {
    pub fn new(columns: u32, rows: u32) -> Result<Self, SimError> {
        check_size(columns, rows)?;
        let mut grid = Self {
            columns,
            rows,
            cells: Vec::new(),
            epoch: 0,
            step: 0,
            row: rows / 2,
            column: 1,
            heading_east: true,
        };
        grid.rebuild();
        Ok(grid)
    }

    /// Builds a grid from host-supplied sizes, which must be whole cell counts within `u32`.
    pub fn from_dimensions(width: f64, height: f64) -> Result<Self, SimError> {
        let whole =
            |v: f64| v.is_finite() && v >= 0.0 && v.fract() == 0.0 && v <= f64::from(u32::MAX);
        if !whole(width) || !whole(height) {
            return Err(SimError::FractionalGrid { width, height });
        }
        Self::new(width as u32, height as u32)
    }

    /// Reallocates the cell buffer. Any previously borrowed view is invalidated by the epoch bump.
    pub fn resize(&mut self, columns: u32, rows: u32) -> Result<(), SimError> {
        check_size(columns, rows)?;
        self.columns = columns;
        self.rows = rows;
        self.row = self.row.clamp(1, rows - 2);
        self.column = self.column.clamp(1, columns - 2);
        self.epoch += 1;
        self.rebuild();
        debug!(target: "kalmanviz::sim", columns, rows, epoch = self.epoch, "grid resized");
        Ok(())
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// `(row, column)` of the agent cell.
    pub fn agent_cell(&self) -> (u32, u32) {
        (self.row, self.column)
    }

    fn index(&self, row: u32, column: u32) -> usize {
        row as usize * self.columns as usize + column as usize
    }

    fn rebuild(&mut self) {
        let (columns, rows) = (self.columns, self.rows);
        self.cells = (0..rows)
            .flat_map(|row| {
                (0..columns).map(move |col| {
                    let border = row == 0 || col == 0 || row == rows - 1 || col == columns - 1;
                    if border { CellKind::Wall } else { CellKind::Empty }
                })
            })
            .map(|kind| kind as u8)
            .collect();
        let agent = self.index(self.row, self.column);
        self.cells[agent] = CellKind::Agent as u8;
    }
}

fn check_size(columns: u32, rows: u32) -> Result<(), SimError> {
    if columns < 3 || rows < 3 {
        return Err(SimError::GridTooSmall { columns, rows });
    }
    Ok(())
}

impl Engine for BounceGrid {
    fn capabilities(&self) -> Capabilities {
        Capabilities::cell_grid()
    }

    fn dimensions(&self) -> Dimensions {
        Dimensions::new(f64::from(self.columns), f64::from(self.rows))
    }

    fn tick(&mut self) -> Result<(), EngineError> {
        let last_interior = self.columns - 2;
        if self.heading_east && self.column >= last_interior {
            self.heading_east = false;
        } else if !self.heading_east && self.column <= 1 {
            self.heading_east = true;
        }
        let previous = self.index(self.row, self.column);
        if last_interior > 1 {
            self.column = if self.heading_east {
                self.column + 1
            } else {
                self.column - 1
            };
        }
        let next = self.index(self.row, self.column);
        self.cells[previous] = CellKind::Empty as u8;
        self.cells[next] = CellKind::Agent as u8;
        self.step += 1;
        trace!(target: "kalmanviz::sim", step = self.step, row = self.row, column = self.column, "agent cell moved");
        Ok(())
    }

    fn step(&self) -> u64 {
        self.step
    }

    fn cells(&self) -> Option<CellView<'_>> {
        CellView::new(
            &self.cells,
            self.columns as usize,
            self.rows as usize,
            self.epoch,
        )
        .ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn agent_count(grid: &BounceGrid) -> usize {
        grid.cells()
            .expect("view")
            .raw()
            .iter()
            .filter(|&&b| b == CellKind::Agent as u8)
            .count()
    }

    #[test]
    fn host_sizes_must_be_whole_cells() {
        assert_eq!(BounceGrid::from_dimensions(8.0, 6.0).unwrap().agent_cell(), (3, 1));
        for (w, h) in [(8.5, 6.0), (8.0, f64::NAN), (5e10, 4.0), (-4.0, 4.0)] {
            assert!(matches!(
                BounceGrid::from_dimensions(w, h),
                Err(SimError::FractionalGrid { .. })
            ));
        }
        assert!(matches!(
            BounceGrid::from_dimensions(2.0, 6.0),
            Err(SimError::GridTooSmall { columns: 2, rows: 6 })
        ));
    }

    #[test]
    fn border_is_walled() {
        let grid = BounceGrid::new(5, 4).unwrap();
        let view = grid.cells().unwrap();
        for col in 0..5 {
            assert_eq!(view.get(0, col), Some(CellKind::Wall as u8));
            assert_eq!(view.get(3, col), Some(CellKind::Wall as u8));
        }
        assert_eq!(view.get(2, 1), Some(CellKind::Agent as u8));
    }

    #[test]
    fn agent_bounces_between_walls() {
        let mut grid = BounceGrid::new(5, 3).unwrap();
        let mut columns = Vec::new();
        for _ in 0..6 {
            grid.tick().unwrap();
            columns.push(grid.agent_cell().1);
            assert_eq!(agent_count(&grid), 1);
        }
        assert_eq!(columns, vec![2, 3, 2, 1, 2, 3]);
    }

    #[test]
    fn resize_bumps_epoch_and_keeps_agent_inside() {
        let mut grid = BounceGrid::new(10, 10).unwrap();
        for _ in 0..7 {
            grid.tick().unwrap();
        }
        grid.resize(4, 4).unwrap();
        assert_eq!(grid.epoch(), 1);
        let view = grid.cells().unwrap();
        assert_eq!(view.len(), 16);
        assert_eq!(view.epoch(), 1);
        assert_eq!(agent_count(&grid), 1);
        assert!(BounceGrid::new(2, 5).is_err());
    }
}
