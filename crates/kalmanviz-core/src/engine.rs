//! Contract between the driver and an external simulation engine.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::DriverError;

/// Domain size in engine-native units. Queried once per engine instance.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Dimensions {
    pub width: f64,
    pub height: f64,
}

impl Dimensions {
    pub const fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// Rejects non-finite or non-positive extents.
    pub fn validate(self) -> Result<Self, DriverError> {
        let valid = |v: f64| v.is_finite() && v > 0.0;
        if valid(self.width) && valid(self.height) {
            Ok(self)
        } else {
            Err(DriverError::InvalidDimensions {
                width: self.width,
                height: self.height,
            })
        }
    }

    /// Whole lattice columns and rows covered by these dimensions.
    pub fn lattice(self) -> (u32, u32) {
        (self.width.floor() as u32, self.height.floor() as u32)
    }
}

/// Classification of a single grid cell.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CellKind {
    Empty = 0,
    Wall = 1,
    Agent = 2,
}

impl TryFrom<u8> for CellKind {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Empty),
            1 => Ok(Self::Wall),
            2 => Ok(Self::Agent),
            other => Err(other),
        }
    }
}

/// Row-major linear offset of `(row, col)`.
pub const fn linear_index(row: usize, col: usize, columns: usize) -> usize {
    row * columns + col
}

/// Inverse of [`linear_index`].
pub const fn cell_position(index: usize, columns: usize) -> (usize, usize) {
    (index / columns, index % columns)
}

/// Borrowed, read-only view over an engine's cell bytes.
///
/// The view borrows the engine, so it cannot survive a `tick()` or a resize;
/// hosts request a fresh one every frame. `epoch` identifies the backing
/// allocation and changes whenever the engine reallocates it.
#[derive(Debug, Clone, Copy)]
pub struct CellView<'a> {
    cells: &'a [u8],
    columns: usize,
    rows: usize,
    epoch: u64,
}

impl<'a> CellView<'a> {
    pub fn new(
        cells: &'a [u8],
        columns: usize,
        rows: usize,
        epoch: u64,
    ) -> Result<Self, DriverError> {
        let expected = columns * rows;
        if cells.len() != expected {
            return Err(DriverError::CellBufferMismatch {
                expected,
                actual: cells.len(),
            });
        }
        Ok(Self {
            cells,
            columns,
            rows,
            epoch,
        })
    }

    pub fn columns(&self) -> usize {
        self.columns
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    pub fn raw(&self) -> &'a [u8] {
        self.cells
    }

    pub fn index(&self, row: usize, col: usize) -> Option<usize> {
        (row < self.rows && col < self.columns).then(|| linear_index(row, col, self.columns))
    }

    pub fn position(&self, index: usize) -> Option<(usize, usize)> {
        (index < self.cells.len()).then(|| cell_position(index, self.columns))
    }

    pub fn get(&self, row: usize, col: usize) -> Option<u8> {
        self.index(row, col).map(|idx| self.cells[idx])
    }

    /// Classifies the cell at `index`; unknown bytes are an engine contract violation.
    pub fn kind_at(&self, index: usize) -> Result<CellKind, DriverError> {
        let value = self
            .cells
            .get(index)
            .copied()
            .ok_or(DriverError::CellBufferMismatch {
                expected: index + 1,
                actual: self.cells.len(),
            })?;
        CellKind::try_from(value).map_err(|value| DriverError::UnknownCell { index, value })
    }

    /// Visits every cell in row-major order as `(row, col, kind)`.
    pub fn iter_kinds(
        &self,
    ) -> impl Iterator<Item = Result<(usize, usize, CellKind), DriverError>> + 'a {
        let columns = self.columns;
        self.cells.iter().enumerate().map(move |(index, &value)| {
            let (row, col) = cell_position(index, columns);
            CellKind::try_from(value)
                .map(|kind| (row, col, kind))
                .map_err(|value| DriverError::UnknownCell { index, value })
        })
    }
}

/// Agent state vector `[x, y, velocity, heading]`.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct AgentState {
    pub x: f64,
    pub y: f64,
    pub velocity: f64,
    pub heading: f64,
}

impl AgentState {
    pub const fn new(x: f64, y: f64, velocity: f64, heading: f64) -> Self {
        Self {
            x,
            y,
            velocity,
            heading,
        }
    }

    pub const fn as_vector(&self) -> [f64; 4] {
        [self.x, self.y, self.velocity, self.heading]
    }

    pub fn from_vector(values: [f64; 4]) -> Self {
        let [x, y, velocity, heading] = values;
        Self::new(x, y, velocity, heading)
    }
}

/// Goal marker; any non-positive coordinate means "unset".
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct GoalState {
    pub x: f64,
    pub y: f64,
}

impl GoalState {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_set(&self) -> bool {
        self.x > 0.0 && self.y > 0.0
    }
}

/// One-dimensional normal distribution parameters.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Normal1 {
    pub mean: f64,
    pub std_dev: f64,
}

impl Normal1 {
    pub const fn new(mean: f64, std_dev: f64) -> Self {
        Self { mean, std_dev }
    }
}

/// Which error model an engine exposes.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ErrorModelShape {
    #[default]
    None,
    /// Independent `(mean, stddev)` per rotation, movement and position channel.
    Channels,
    /// One 2-D gaussian: mean vector and flattened 2x2 covariance.
    Gaussian,
}

/// Current error-model parameters reported by the engine.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum ErrorModel {
    Channels {
        rotation: Normal1,
        movement: Normal1,
        position: Normal1,
    },
    Gaussian {
        mean: [f64; 2],
        covariance: [f64; 4],
    },
}

impl ErrorModel {
    pub fn shape(&self) -> ErrorModelShape {
        match self {
            Self::Channels { .. } => ErrorModelShape::Channels,
            Self::Gaussian { .. } => ErrorModelShape::Gaussian,
        }
    }
}

/// Error channel addressed by a setter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ErrorChannel {
    Rotation,
    Movement,
    Position,
}

impl ErrorChannel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Rotation => "rotation",
            Self::Movement => "movement",
            Self::Position => "position",
        }
    }
}

/// Value passed to one error setter.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "shape", rename_all = "snake_case")]
pub enum ErrorSpec {
    Scalar(Normal1),
    Gaussian { mean: [f64; 2], covariance: [f64; 4] },
}

impl ErrorSpec {
    pub fn shape(&self) -> ErrorModelShape {
        match self {
            Self::Scalar(_) => ErrorModelShape::Channels,
            Self::Gaussian { .. } => ErrorModelShape::Gaussian,
        }
    }
}

/// Capability descriptor; one driver covers every engine variant through it.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Capabilities {
    pub has_goal: bool,
    pub error_model: ErrorModelShape,
    pub has_velocity_control: bool,
    pub has_rotation_control: bool,
    pub has_cell_grid: bool,
    pub has_agent_states: bool,
}

impl Capabilities {
    /// Continuous agent/goal engine with the given error model.
    pub fn continuous(error_model: ErrorModelShape) -> Self {
        Self {
            has_goal: true,
            error_model,
            has_velocity_control: true,
            has_rotation_control: true,
            has_cell_grid: false,
            has_agent_states: true,
        }
    }

    /// Cell-grid engine with no tunable parameters.
    pub fn cell_grid() -> Self {
        Self {
            has_cell_grid: true,
            ..Self::default()
        }
    }

    /// Whether `channel` can be set under this error model.
    pub fn supports_channel(&self, channel: ErrorChannel) -> bool {
        match self.error_model {
            ErrorModelShape::None => false,
            ErrorModelShape::Channels => true,
            ErrorModelShape::Gaussian => channel == ErrorChannel::Movement,
        }
    }
}

/// Opaque failure reported by an engine's `tick()`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct EngineError(String);

impl EngineError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// Snapshot/query/setter surface of an external simulation.
///
/// Setters default to ignoring the call; engines override the ones their
/// [`Capabilities`] advertise.
pub trait Engine {
    fn capabilities(&self) -> Capabilities;

    fn dimensions(&self) -> Dimensions;

    /// Advance exactly one logical step.
    fn tick(&mut self) -> Result<(), EngineError>;

    /// Monotonic step counter.
    fn step(&self) -> u64;

    fn goal(&self) -> Option<GoalState> {
        None
    }

    /// Raw agent coordinate pair, for engines that track it apart from the state vector.
    fn agent_position(&self) -> Option<(f64, f64)> {
        None
    }

    fn actual_state(&self) -> Option<AgentState> {
        None
    }

    fn belief_state(&self) -> Option<AgentState> {
        None
    }

    fn error_model(&self) -> Option<ErrorModel> {
        None
    }

    fn cells(&self) -> Option<CellView<'_>> {
        None
    }

    fn set_goal(&mut self, x: f64, y: f64) {
        warn!(target: "kalmanviz::engine", x, y, "engine ignores set_goal");
    }

    fn set_movement_error(&mut self, spec: ErrorSpec) {
        warn!(target: "kalmanviz::engine", ?spec, "engine ignores set_movement_error");
    }

    fn set_rotation_error(&mut self, spec: ErrorSpec) {
        warn!(target: "kalmanviz::engine", ?spec, "engine ignores set_rotation_error");
    }

    fn set_position_error(&mut self, spec: ErrorSpec) {
        warn!(target: "kalmanviz::engine", ?spec, "engine ignores set_position_error");
    }

    fn set_velocity(&mut self, velocity: f64) {
        warn!(target: "kalmanviz::engine", velocity, "engine ignores set_velocity");
    }

    fn set_rotation(&mut self, theta: f64) {
        warn!(target: "kalmanviz::engine", theta, "engine ignores set_rotation");
    }
}

impl<E: Engine + ?Sized> Engine for Box<E> {
    fn capabilities(&self) -> Capabilities {
        (**self).capabilities()
    }

    fn dimensions(&self) -> Dimensions {
        (**self).dimensions()
    }

    fn tick(&mut self) -> Result<(), EngineError> {
        (**self).tick()
    }

    fn step(&self) -> u64 {
        (**self).step()
    }

    fn goal(&self) -> Option<GoalState> {
        (**self).goal()
    }

    fn agent_position(&self) -> Option<(f64, f64)> {
        (**self).agent_position()
    }

    fn actual_state(&self) -> Option<AgentState> {
        (**self).actual_state()
    }

    fn belief_state(&self) -> Option<AgentState> {
        (**self).belief_state()
    }

    fn error_model(&self) -> Option<ErrorModel> {
        (**self).error_model()
    }

    fn cells(&self) -> Option<CellView<'_>> {
        (**self).cells()
    }

    fn set_goal(&mut self, x: f64, y: f64) {
        (**self).set_goal(x, y)
    }

    fn set_movement_error(&mut self, spec: ErrorSpec) {
        (**self).set_movement_error(spec)
    }

    fn set_rotation_error(&mut self, spec: ErrorSpec) {
        (**self).set_rotation_error(spec)
    }

    fn set_position_error(&mut self, spec: ErrorSpec) {
        (**self).set_position_error(spec)
    }

    fn set_velocity(&mut self, velocity: f64) {
        (**self).set_velocity(velocity)
    }

    fn set_rotation(&mut self, theta: f64) {
        (**self).set_rotation(theta)
    }
}

/// Values read from the engine for one frame. Never carried across cycles.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Snapshot {
    pub step: u64,
    pub dimensions: Dimensions,
    pub goal: Option<GoalState>,
    pub agent_position: Option<(f64, f64)>,
    pub actual: Option<AgentState>,
    pub belief: Option<AgentState>,
    pub error_model: Option<ErrorModel>,
}

impl Snapshot {
    pub fn capture<E: Engine + ?Sized>(engine: &E, dimensions: Dimensions) -> Self {
        Self {
            step: engine.step(),
            dimensions,
            goal: engine.goal(),
            agent_position: engine.agent_position(),
            actual: engine.actual_state(),
            belief: engine.belief_state(),
            error_model: engine.error_model(),
        }
    }

    /// Pixel position at which the agent is drawn: raw coordinates first, then `actual[0..2]`.
    pub fn agent_pixel(&self) -> Option<(f64, f64)> {
        self.agent_position
            .or_else(|| self.actual.map(|state| (state.x, state.y)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_major_index_round_trips() {
        let columns = 7;
        for row in 0..5 {
            for col in 0..columns {
                let idx = linear_index(row, col, columns);
                assert_eq!(idx, row * columns + col);
                assert_eq!(cell_position(idx, columns), (row, col));
            }
        }
    }

    #[test]
    fn cell_view_rejects_wrong_length() {
        let bytes = [0_u8; 11];
        let err = CellView::new(&bytes, 4, 3, 0).unwrap_err();
        assert_eq!(
            err,
            DriverError::CellBufferMismatch {
                expected: 12,
                actual: 11
            }
        );
    }

    #[test]
    fn cell_view_bounds_checks_lookups() {
        let bytes = [0, 1, 2, 0, 0, 1];
        let view = CellView::new(&bytes, 3, 2, 9).expect("view");
        assert_eq!(view.get(0, 1), Some(1));
        assert_eq!(view.get(1, 2), Some(1));
        assert_eq!(view.get(2, 0), None);
        assert_eq!(view.get(0, 3), None);
        assert_eq!(view.position(4), Some((1, 1)));
        assert_eq!(view.position(6), None);
        assert_eq!(view.epoch(), 9);
        assert_eq!(view.kind_at(2), Ok(CellKind::Agent));
    }

    #[test]
    fn unknown_cell_values_are_reported_with_index() {
        let bytes = [0, 1, 7, 0];
        let view = CellView::new(&bytes, 2, 2, 0).expect("view");
        let failure = view
            .iter_kinds()
            .find_map(Result::err)
            .expect("unknown cell detected");
        assert_eq!(failure, DriverError::UnknownCell { index: 2, value: 7 });
    }

    #[test]
    fn goal_sentinel_requires_both_coordinates_positive() {
        assert!(!GoalState::new(0.0, 5.0).is_set());
        assert!(!GoalState::new(3.0, -1.0).is_set());
        assert!(!GoalState::default().is_set());
        assert!(GoalState::new(3.0, 5.0).is_set());
    }

    #[test]
    fn dimensions_validation() {
        assert!(Dimensions::new(30.0, 30.0).validate().is_ok());
        assert!(Dimensions::new(0.0, 30.0).validate().is_err());
        assert!(Dimensions::new(30.0, f64::NAN).validate().is_err());
        assert_eq!(Dimensions::new(12.7, 3.0).lattice(), (12, 3));
    }

    #[test]
    fn gaussian_model_only_accepts_movement_channel() {
        let caps = Capabilities::continuous(ErrorModelShape::Gaussian);
        assert!(caps.supports_channel(ErrorChannel::Movement));
        assert!(!caps.supports_channel(ErrorChannel::Rotation));
        assert!(!Capabilities::cell_grid().supports_channel(ErrorChannel::Movement));
    }
}
