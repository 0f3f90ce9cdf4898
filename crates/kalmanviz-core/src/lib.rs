//! Core types shared across the KalmanViz workspace.
//!
//! The simulation itself lives behind the [`Engine`] trait. This crate owns
//! everything around it: the per-frame [`Snapshot`], the [`TickScheduler`]
//! that orders tick/paint/telemetry, the rolling [`TelemetrySink`], and the
//! [`ParameterBridge`] that turns form input into [`ControlCommand`]s.

pub mod bridge;
pub mod command;
pub mod config;
pub mod engine;
pub mod scheduler;
pub mod telemetry;

use thiserror::Error;

pub use bridge::{
    BridgeError, CommitAction, CommitRequest, ControlId, ControlSource, ParameterBridge,
};
pub use command::{ControlCommand, apply_control_command};
pub use config::{ConfigError, DriverConfig, FailurePolicy, PaletteConfig, TelemetryConfig};
pub use engine::{
    AgentState, Capabilities, CellKind, CellView, Dimensions, Engine, EngineError, ErrorChannel,
    ErrorModel, ErrorModelShape, ErrorSpec, GoalState, Normal1, Snapshot,
};
pub use scheduler::{CycleOutcome, Frame, FramePainter, SchedulerState, TickScheduler};
pub use telemetry::{
    LogChannel, MemorySurface, NullSurface, ReadinessGate, ReadoutSlot, TelemetryLog,
    TelemetrySink, TelemetrySurface,
};

/// Failures raised while driving an engine through a frame or a commit.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum DriverError {
    /// The engine reported dimensions that cannot size a canvas.
    #[error("engine reported invalid dimensions {width}x{height}")]
    InvalidDimensions { width: f64, height: f64 },
    /// A cell byte outside the known classification set.
    #[error("unknown cell value {value} at index {index}")]
    UnknownCell { index: usize, value: u8 },
    /// The cell buffer does not cover `columns * rows` bytes.
    #[error("cell buffer holds {actual} bytes, expected {expected}")]
    CellBufferMismatch { expected: usize, actual: usize },
    /// The post-tick step counter did not advance.
    #[error("engine step did not advance past {previous} (observed {observed})")]
    StaleSnapshot { previous: u64, observed: u64 },
    /// `tick()` reported a failure.
    #[error("engine tick failed: {0}")]
    Engine(#[from] EngineError),
    /// The engine does not advertise the capability a command needs.
    #[error("engine does not support {0}")]
    Unsupported(&'static str),
    /// An error spec was sent to an engine with a different error model.
    #[error("error spec shape {spec:?} does not match engine error model {model:?}")]
    ShapeMismatch {
        spec: ErrorModelShape,
        model: ErrorModelShape,
    },
    /// The drawing surface rejected an operation.
    #[error("render surface failure: {0}")]
    Surface(String),
    /// A lifecycle call that is not legal from the current state.
    #[error("scheduler cannot {action} while {state:?}")]
    InvalidTransition {
        action: &'static str,
        state: SchedulerState,
    },
}
