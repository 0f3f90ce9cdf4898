//! Stand-in engines for KalmanViz hosts and tests.
//!
//! Neither engine runs a real filter. [`KinematicUniverse`] moves one agent
//! under noisy commands and dead-reckons a belief from noisy readings;
//! [`BounceGrid`] walks an agent cell back and forth inside a walled lattice.

mod bounce;
mod kinematic;

use thiserror::Error;

pub use bounce::BounceGrid;
pub use kinematic::KinematicUniverse;

/// Seed used when the host does not pick one.
pub const DEFAULT_SEED: u64 = 0xFACA_DEAF_0123_4567;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SimError {
    #[error("universe dimensions must be positive and finite, got {width}x{height}")]
    InvalidDimensions { width: f64, height: f64 },
    #[error("grid size must be a whole number of cells, got {width}x{height}")]
    FractionalGrid { width: f64, height: f64 },
    #[error("grid needs at least 3x3 cells to hold walls and an agent, got {columns}x{rows}")]
    GridTooSmall { columns: u32, rows: u32 },
    #[error("invalid noise distribution: {0}")]
    Distribution(#[from] rand_distr::NormalError),
}
