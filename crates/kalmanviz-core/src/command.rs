//! Parameter edits queued by control surfaces and applied between ticks.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::DriverError;
use crate::engine::{Engine, ErrorChannel, ErrorModelShape, ErrorSpec};

/// A single setter invocation against the engine.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ControlCommand {
    SetGoal { x: f64, y: f64 },
    SetError { channel: ErrorChannel, spec: ErrorSpec },
    SetVelocity { velocity: f64 },
    SetRotation { theta: f64 },
}

impl ControlCommand {
    pub fn label(&self) -> &'static str {
        match self {
            Self::SetGoal { .. } => "set_goal",
            Self::SetError {
                channel: ErrorChannel::Rotation,
                ..
            } => "set_rotation_error",
            Self::SetError {
                channel: ErrorChannel::Movement,
                ..
            } => "set_movement_error",
            Self::SetError {
                channel: ErrorChannel::Position,
                ..
            } => "set_position_error",
            Self::SetVelocity { .. } => "set_velocity",
            Self::SetRotation { .. } => "set_rotation",
        }
    }
}

/// Checks the command against the engine's capabilities, then invokes the setter.
///
/// Nothing reaches the engine when validation fails.
pub fn apply_control_command<E: Engine + ?Sized>(
    engine: &mut E,
    command: ControlCommand,
) -> Result<(), DriverError> {
    let caps = engine.capabilities();
    match command {
        ControlCommand::SetGoal { x, y } => {
            if !caps.has_goal {
                return Err(DriverError::Unsupported("goal control"));
            }
            engine.set_goal(x, y);
        }
        ControlCommand::SetError { channel, spec } => {
            if caps.error_model == ErrorModelShape::None {
                return Err(DriverError::Unsupported("error model control"));
            }
            if spec.shape() != caps.error_model {
                return Err(DriverError::ShapeMismatch {
                    spec: spec.shape(),
                    model: caps.error_model,
                });
            }
            if !caps.supports_channel(channel) {
                return Err(DriverError::Unsupported(match channel {
                    ErrorChannel::Rotation => "rotation error control",
                    ErrorChannel::Movement => "movement error control",
                    ErrorChannel::Position => "position error control",
                }));
            }
            match channel {
                ErrorChannel::Rotation => engine.set_rotation_error(spec),
                ErrorChannel::Movement => engine.set_movement_error(spec),
                ErrorChannel::Position => engine.set_position_error(spec),
            }
        }
        ControlCommand::SetVelocity { velocity } => {
            if !caps.has_velocity_control {
                return Err(DriverError::Unsupported("velocity control"));
            }
            engine.set_velocity(velocity);
        }
        ControlCommand::SetRotation { theta } => {
            if !caps.has_rotation_control {
                return Err(DriverError::Unsupported("rotation control"));
            }
            engine.set_rotation(theta);
        }
    }
    debug!(target: "kalmanviz::command", command = command.label(), step = engine.step(), "applied control command");
    Ok(())
}
