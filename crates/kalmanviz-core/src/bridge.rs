//! Converts discrete form commits into [`ControlCommand`]s.
//!
//! Every tunable is bound to an explicit commit action. On commit the bridge
//! reads the action's controls from a [`ControlSource`], converts them to the
//! shape the setter expects, and hands back a command. Parse failures are
//! returned to the caller and never reach the engine.

use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;
use thiserror::Error;

use crate::command::ControlCommand;
use crate::engine::{Capabilities, ErrorChannel, ErrorModelShape, ErrorSpec, Normal1};

/// A single numeric input on the control surface.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum ControlId {
    GoalX,
    GoalY,
    RotationMean,
    RotationStdDev,
    MovementMean,
    MovementStdDev,
    MovementMeanVector,
    MovementCovariance,
    PositionMean,
    PositionStdDev,
    Velocity,
    Heading,
}

impl ControlId {
    pub const ALL: [ControlId; 12] = [
        Self::GoalX,
        Self::GoalY,
        Self::RotationMean,
        Self::RotationStdDev,
        Self::MovementMean,
        Self::MovementStdDev,
        Self::MovementMeanVector,
        Self::MovementCovariance,
        Self::PositionMean,
        Self::PositionStdDev,
        Self::Velocity,
        Self::Heading,
    ];

    /// Stable element id used by the DOM surface.
    pub fn element_id(self) -> &'static str {
        match self {
            Self::GoalX => "goal-x",
            Self::GoalY => "goal-y",
            Self::RotationMean => "rotation-mean",
            Self::RotationStdDev => "rotation-std-dev",
            Self::MovementMean => "movement-mean",
            Self::MovementStdDev => "movement-std-dev",
            Self::MovementMeanVector => "movement-mean-vector",
            Self::MovementCovariance => "movement-covariance",
            Self::PositionMean => "position-mean",
            Self::PositionStdDev => "position-std-dev",
            Self::Velocity => "velocity",
            Self::Heading => "heading",
        }
    }
}

/// One commit button.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum CommitAction {
    Goal,
    RotationError,
    MovementError,
    PositionError,
    Velocity,
    Rotation,
}

impl CommitAction {
    pub const ALL: [CommitAction; 6] = [
        Self::Goal,
        Self::RotationError,
        Self::MovementError,
        Self::PositionError,
        Self::Velocity,
        Self::Rotation,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Goal => "goal",
            Self::RotationError => "rotation-error",
            Self::MovementError => "movement-error",
            Self::PositionError => "position-error",
            Self::Velocity => "velocity",
            Self::Rotation => "rotation",
        }
    }

    /// Controls read by this action, in positional order.
    pub fn controls(self, shape: ErrorModelShape) -> &'static [ControlId] {
        match self {
            Self::Goal => &[ControlId::GoalX, ControlId::GoalY],
            Self::RotationError => &[ControlId::RotationMean, ControlId::RotationStdDev],
            Self::MovementError if shape == ErrorModelShape::Gaussian => &[
                ControlId::MovementMeanVector,
                ControlId::MovementCovariance,
            ],
            Self::MovementError => &[ControlId::MovementMean, ControlId::MovementStdDev],
            Self::PositionError => &[ControlId::PositionMean, ControlId::PositionStdDev],
            Self::Velocity => &[ControlId::Velocity],
            Self::Rotation => &[ControlId::Heading],
        }
    }
}

impl FromStr for CommitAction {
    type Err = BridgeError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let wanted = raw.trim();
        Self::ALL
            .into_iter()
            .find(|action| action.name() == wanted)
            .ok_or_else(|| BridgeError::UnknownAction(wanted.to_owned()))
    }
}

/// Errors produced while converting control input.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BridgeError {
    #[error("control `{0}` is missing")]
    MissingControl(&'static str),
    #[error("control `{control}` holds `{input}`, which is not a number")]
    InvalidNumber {
        control: &'static str,
        input: String,
    },
    #[error("control `{control}` expects {expected} values, got {actual}")]
    VectorLength {
        control: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("`{action}` expects {expected} values, got {actual}")]
    Arity {
        action: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("unknown commit action `{0}`")]
    UnknownAction(String),
    #[error("engine does not accept `{0}` commits")]
    UnsupportedAction(&'static str),
    #[error("commit literal `{0}` must look like `action=value[;value]`")]
    MalformedRequest(String),
}

/// Anything that can hand back the current text of a control.
pub trait ControlSource {
    fn read(&self, control: ControlId) -> Option<String>;
}

impl ControlSource for HashMap<ControlId, String> {
    fn read(&self, control: ControlId) -> Option<String> {
        self.get(&control).cloned()
    }
}

/// A commit parsed from `action=v1;v2` text (CLI and stdin surfaces).
#[derive(Debug, Clone, PartialEq)]
pub struct CommitRequest {
    pub action: CommitAction,
    pub values: Vec<String>,
}

impl FromStr for CommitRequest {
    type Err = BridgeError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let (action, values) = raw
            .split_once('=')
            .ok_or_else(|| BridgeError::MalformedRequest(raw.to_owned()))?;
        let action = action.parse::<CommitAction>()?;
        let values = values.split(';').map(|v| v.trim().to_owned()).collect();
        Ok(Self { action, values })
    }
}

/// Reads controls on commit and produces validated setter payloads.
#[derive(Debug, Clone, Copy)]
pub struct ParameterBridge {
    capabilities: Capabilities,
}

impl ParameterBridge {
    pub fn new(capabilities: Capabilities) -> Self {
        Self { capabilities }
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn supports(&self, action: CommitAction) -> bool {
        let caps = &self.capabilities;
        match action {
            CommitAction::Goal => caps.has_goal,
            CommitAction::RotationError => caps.supports_channel(ErrorChannel::Rotation),
            CommitAction::MovementError => caps.supports_channel(ErrorChannel::Movement),
            CommitAction::PositionError => caps.supports_channel(ErrorChannel::Position),
            CommitAction::Velocity => caps.has_velocity_control,
            CommitAction::Rotation => caps.has_rotation_control,
        }
    }

    /// Commit actions the engine accepts; hosts only wire these.
    pub fn actions(&self) -> SmallVec<[CommitAction; 6]> {
        CommitAction::ALL
            .into_iter()
            .filter(|action| self.supports(*action))
            .collect()
    }

    pub fn controls(&self, action: CommitAction) -> &'static [ControlId] {
        action.controls(self.capabilities.error_model)
    }

    /// Reads every control the action needs and converts it.
    pub fn commit(
        &self,
        action: CommitAction,
        source: &dyn ControlSource,
    ) -> Result<ControlCommand, BridgeError> {
        let controls = self.controls(action);
        let mut values: SmallVec<[String; 2]> = SmallVec::new();
        for control in controls {
            let value = source
                .read(*control)
                .ok_or(BridgeError::MissingControl(control.element_id()))?;
            values.push(value);
        }
        let borrowed: SmallVec<[&str; 2]> = values.iter().map(String::as_str).collect();
        self.commit_values(action, &borrowed)
    }

    pub fn commit_request(&self, request: &CommitRequest) -> Result<ControlCommand, BridgeError> {
        let borrowed: SmallVec<[&str; 2]> = request.values.iter().map(String::as_str).collect();
        self.commit_values(request.action, &borrowed)
    }

    /// Converts positional values (ordered as [`Self::controls`]) into a command.
    pub fn commit_values(
        &self,
        action: CommitAction,
        values: &[&str],
    ) -> Result<ControlCommand, BridgeError> {
        if !self.supports(action) {
            return Err(BridgeError::UnsupportedAction(action.name()));
        }
        let controls = self.controls(action);
        if values.len() != controls.len() {
            return Err(BridgeError::Arity {
                action: action.name(),
                expected: controls.len(),
                actual: values.len(),
            });
        }

        let scalar = |slot: usize| parse_number(controls[slot], values[slot]);
        let command = match action {
            CommitAction::Goal => ControlCommand::SetGoal {
                x: scalar(0)?,
                y: scalar(1)?,
            },
            CommitAction::Velocity => ControlCommand::SetVelocity {
                velocity: scalar(0)?,
            },
            CommitAction::Rotation => ControlCommand::SetRotation { theta: scalar(0)? },
            CommitAction::MovementError
                if self.capabilities.error_model == ErrorModelShape::Gaussian =>
            {
                ControlCommand::SetError {
                    channel: ErrorChannel::Movement,
                    spec: ErrorSpec::Gaussian {
                        mean: parse_vector::<2>(controls[0], values[0])?,
                        covariance: parse_vector::<4>(controls[1], values[1])?,
                    },
                }
            }
            CommitAction::RotationError
            | CommitAction::MovementError
            | CommitAction::PositionError => {
                let channel = match action {
                    CommitAction::RotationError => ErrorChannel::Rotation,
                    CommitAction::MovementError => ErrorChannel::Movement,
                    _ => ErrorChannel::Position,
                };
                ControlCommand::SetError {
                    channel,
                    spec: ErrorSpec::Scalar(Normal1::new(scalar(0)?, scalar(1)?)),
                }
            }
        };
        Ok(command)
    }
}

/// Best-effort conversion of control text to a finite `f64`.
pub fn parse_number(control: ControlId, input: &str) -> Result<f64, BridgeError> {
    input
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| BridgeError::InvalidNumber {
            control: control.element_id(),
            input: input.to_owned(),
        })
}

/// Parses `[a, b, ...]` or `a, b, ...` (comma or whitespace separated) with exactly `N` entries.
pub fn parse_vector<const N: usize>(
    control: ControlId,
    input: &str,
) -> Result<[f64; N], BridgeError> {
    let trimmed = input.trim();
    let inner = trimmed
        .strip_prefix('[')
        .and_then(|rest| rest.strip_suffix(']'))
        .unwrap_or(trimmed);

    let parsed: SmallVec<[f64; 4]> = inner
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .map(|token| parse_number(control, token))
        .collect::<Result<_, _>>()?;

    if parsed.len() != N {
        return Err(BridgeError::VectorLength {
            control: control.element_id(),
            expected: N,
            actual: parsed.len(),
        });
    }
    let mut out = [0.0; N];
    out.copy_from_slice(&parsed);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn channels_bridge() -> ParameterBridge {
        ParameterBridge::new(Capabilities::continuous(ErrorModelShape::Channels))
    }

    #[test]
    fn parse_vector_accepts_bracketed_and_bare_literals() {
        assert_eq!(
            parse_vector::<2>(ControlId::MovementMeanVector, "[0.5, -1]").unwrap(),
            [0.5, -1.0]
        );
        assert_eq!(
            parse_vector::<4>(ControlId::MovementCovariance, " 1 0 0 1 ").unwrap(),
            [1.0, 0.0, 0.0, 1.0]
        );
        assert_eq!(
            parse_vector::<2>(ControlId::MovementMeanVector, "[1,2,3]").unwrap_err(),
            BridgeError::VectorLength {
                control: "movement-mean-vector",
                expected: 2,
                actual: 3,
            }
        );
    }

    #[test]
    fn invalid_numbers_name_the_control() {
        let err = channels_bridge()
            .commit_values(CommitAction::Goal, &["3", "abc"])
            .unwrap_err();
        assert_eq!(
            err,
            BridgeError::InvalidNumber {
                control: "goal-y",
                input: "abc".into(),
            }
        );
        assert!(parse_number(ControlId::Velocity, "NaN").is_err());
        assert_eq!(parse_number(ControlId::Velocity, " 2.5 ").unwrap(), 2.5);
    }

    #[test]
    fn commit_reads_controls_from_source() {
        let mut source = HashMap::new();
        source.insert(ControlId::RotationMean, "0.0".to_owned());
        source.insert(ControlId::RotationStdDev, "0.25".to_owned());
        let command = channels_bridge()
            .commit(CommitAction::RotationError, &source)
            .expect("commit");
        assert_eq!(
            command,
            ControlCommand::SetError {
                channel: ErrorChannel::Rotation,
                spec: ErrorSpec::Scalar(Normal1::new(0.0, 0.25)),
            }
        );

        let err = channels_bridge()
            .commit(CommitAction::Goal, &source)
            .unwrap_err();
        assert_eq!(err, BridgeError::MissingControl("goal-x"));
    }

    #[test]
    fn gaussian_bridge_exposes_vector_movement_only() {
        let bridge = ParameterBridge::new(Capabilities::continuous(ErrorModelShape::Gaussian));
        let actions = bridge.actions();
        assert!(actions.contains(&CommitAction::MovementError));
        assert!(!actions.contains(&CommitAction::RotationError));
        assert!(!actions.contains(&CommitAction::PositionError));

        let command = bridge
            .commit_values(CommitAction::MovementError, &["[0, 0]", "[1, 0, 0, 1]"])
            .expect("gaussian commit");
        assert_eq!(
            command,
            ControlCommand::SetError {
                channel: ErrorChannel::Movement,
                spec: ErrorSpec::Gaussian {
                    mean: [0.0, 0.0],
                    covariance: [1.0, 0.0, 0.0, 1.0],
                },
            }
        );
    }

    #[test]
    fn cell_grid_engines_expose_no_actions() {
        let bridge = ParameterBridge::new(Capabilities::cell_grid());
        assert!(bridge.actions().is_empty());
        assert_eq!(
            bridge.commit_values(CommitAction::Velocity, &["1"]),
            Err(BridgeError::UnsupportedAction("velocity"))
        );
    }

    #[test]
    fn commit_request_parses_cli_literals() {
        let request: CommitRequest = "goal=3;5".parse().expect("request");
        assert_eq!(request.action, CommitAction::Goal);
        assert_eq!(request.values, vec!["3".to_owned(), "5".to_owned()]);
        assert_eq!(
            channels_bridge().commit_request(&request).unwrap(),
            ControlCommand::SetGoal { x: 3.0, y: 5.0 }
        );
        assert!(matches!(
            "goal".parse::<CommitRequest>(),
            Err(BridgeError::MalformedRequest(_))
        ));
        assert!(matches!(
            "warp=1".parse::<CommitRequest>(),
            Err(BridgeError::UnknownAction(_))
        ));
    }
}
