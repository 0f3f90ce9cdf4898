//! Native host plumbing for the KalmanViz driver.

pub mod command;
pub mod headless;

use anyhow::{Context, Result};
use clap::ValueEnum;
use kalmanviz_core::{Engine, ErrorModelShape};
use kalmanviz_sim::{BounceGrid, KinematicUniverse};
use serde::Serialize;

pub use command::{
    CommandReceiver, CommandSender, CommandSubmit, create_command_bus, drain_pending_commands,
    make_command_submit,
};
pub use headless::{HeadlessOptions, HeadlessReport, run_headless};

/// Runtime-selected engine.
pub type DynEngine = Box<dyn Engine>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    /// Continuous agent with goal and tunable noise.
    Kinematic,
    /// Walled cell lattice with a bouncing agent cell.
    Grid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ErrorShapeArg {
    Channels,
    Gaussian,
}

impl From<ErrorShapeArg> for ErrorModelShape {
    fn from(arg: ErrorShapeArg) -> Self {
        match arg {
            ErrorShapeArg::Channels => ErrorModelShape::Channels,
            ErrorShapeArg::Gaussian => ErrorModelShape::Gaussian,
        }
    }
}

/// Parameters for [`build_engine`].
#[derive(Debug, Clone, Copy)]
pub struct EngineSpec {
    pub kind: EngineKind,
    pub width: f64,
    pub height: f64,
    pub seed: Option<u64>,
    pub error_shape: ErrorModelShape,
}

pub fn build_engine(spec: EngineSpec) -> Result<DynEngine> {
    let engine: DynEngine = match spec.kind {
        EngineKind::Kinematic => {
            let universe = KinematicUniverse::new(spec.width, spec.height)
                .context("failed to build kinematic universe")?
                .with_seed(spec.seed.unwrap_or(kalmanviz_sim::DEFAULT_SEED))
                .with_error_shape(spec.error_shape);
            Box::new(universe)
        }
        EngineKind::Grid => {
            let grid = BounceGrid::from_dimensions(spec.width, spec.height)
                .context("failed to build bounce grid")?;
            Box::new(grid)
        }
    };
    Ok(engine)
}
