//! Rolling textual telemetry: actual vs. believed state logs plus error readouts.

use std::collections::{BTreeMap, VecDeque};

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::DriverError;
use crate::config::TelemetryConfig;
use crate::engine::{ErrorModel, Normal1, Snapshot};

/// One of the two scrolling state logs.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum LogChannel {
    Actual,
    Belief,
}

impl LogChannel {
    pub fn element_id(self) -> &'static str {
        match self {
            Self::Actual => "log-actual",
            Self::Belief => "log-belief",
        }
    }
}

/// Distribution readout replaced every frame.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ReadoutSlot {
    Rotation,
    Movement,
    Position,
    Gaussian,
}

impl ReadoutSlot {
    pub fn element_id(self) -> &'static str {
        match self {
            Self::Rotation => "readout-rotation",
            Self::Movement => "readout-movement",
            Self::Position => "readout-position",
            Self::Gaussian => "readout-gaussian",
        }
    }
}

/// Condition a snapshot must meet before a record is appended.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReadinessGate {
    /// Append once the believed velocity is non-zero.
    #[default]
    BeliefVelocity,
    /// Append on every frame that carries agent states.
    Always,
}

/// Bounded ordered line buffer for one channel.
#[derive(Debug, Clone)]
pub struct TelemetryLog {
    lines: VecDeque<String>,
    max_lines: usize,
    revision: u64,
    evicted: u64,
}

impl TelemetryLog {
    pub fn new(max_lines: usize) -> Self {
        let max_lines = max_lines.max(1);
        Self {
            lines: VecDeque::with_capacity(max_lines.min(1024)),
            max_lines,
            revision: 0,
            evicted: 0,
        }
    }

    /// Appends `line`, returning `true` when the oldest line was evicted to make room.
    pub fn push(&mut self, line: String) -> bool {
        let evicted = if self.lines.len() == self.max_lines {
            self.lines.pop_front();
            self.evicted += 1;
            true
        } else {
            false
        };
        self.lines.push_back(line);
        self.revision += 1;
        evicted
    }

    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.lines.iter().map(String::as_str)
    }

    pub fn last(&self) -> Option<&str> {
        self.lines.back().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn max_lines(&self) -> usize {
        self.max_lines
    }

    /// Incremented on every push.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    /// Newline-joined contents, one record per line.
    pub fn to_text(&self) -> String {
        let mut text = String::new();
        for line in &self.lines {
            text.push_str(line);
            text.push('\n');
        }
        text
    }
}

/// Host text sink for telemetry (DOM textareas, in-memory buffers).
pub trait TelemetrySurface {
    fn append(&mut self, channel: LogChannel, line: &str) -> Result<(), DriverError>;

    /// Rewrites the whole channel; used after an eviction.
    fn replace(&mut self, channel: LogChannel, log: &TelemetryLog) -> Result<(), DriverError>;

    fn scroll_to_end(&mut self, _channel: LogChannel) -> Result<(), DriverError> {
        Ok(())
    }

    fn set_readout(&mut self, slot: ReadoutSlot, text: &str) -> Result<(), DriverError>;
}

/// Discards everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSurface;

impl TelemetrySurface for NullSurface {
    fn append(&mut self, _channel: LogChannel, _line: &str) -> Result<(), DriverError> {
        Ok(())
    }

    fn replace(&mut self, _channel: LogChannel, _log: &TelemetryLog) -> Result<(), DriverError> {
        Ok(())
    }

    fn set_readout(&mut self, _slot: ReadoutSlot, _text: &str) -> Result<(), DriverError> {
        Ok(())
    }
}

/// Keeps surface contents in memory; backs tests and the headless report.
#[derive(Debug, Default, Clone, Serialize, PartialEq)]
pub struct MemorySurface {
    pub actual: Vec<String>,
    pub belief: Vec<String>,
    pub readouts: BTreeMap<ReadoutSlot, String>,
    pub appends: u64,
    pub replaces: u64,
    pub scrolls: u64,
}

impl MemorySurface {
    pub fn channel(&self, channel: LogChannel) -> &[String] {
        match channel {
            LogChannel::Actual => &self.actual,
            LogChannel::Belief => &self.belief,
        }
    }

    fn channel_mut(&mut self, channel: LogChannel) -> &mut Vec<String> {
        match channel {
            LogChannel::Actual => &mut self.actual,
            LogChannel::Belief => &mut self.belief,
        }
    }
}

impl TelemetrySurface for MemorySurface {
    fn append(&mut self, channel: LogChannel, line: &str) -> Result<(), DriverError> {
        self.channel_mut(channel).push(line.to_owned());
        self.appends += 1;
        Ok(())
    }

    fn replace(&mut self, channel: LogChannel, log: &TelemetryLog) -> Result<(), DriverError> {
        let lines = self.channel_mut(channel);
        lines.clear();
        lines.extend(log.lines().map(str::to_owned));
        self.replaces += 1;
        Ok(())
    }

    fn scroll_to_end(&mut self, _channel: LogChannel) -> Result<(), DriverError> {
        self.scrolls += 1;
        Ok(())
    }

    fn set_readout(&mut self, slot: ReadoutSlot, text: &str) -> Result<(), DriverError> {
        self.readouts.insert(slot, text.to_owned());
        Ok(())
    }
}

impl<S: TelemetrySurface + ?Sized> TelemetrySurface for Box<S> {
    fn append(&mut self, channel: LogChannel, line: &str) -> Result<(), DriverError> {
        (**self).append(channel, line)
    }

    fn replace(&mut self, channel: LogChannel, log: &TelemetryLog) -> Result<(), DriverError> {
        (**self).replace(channel, log)
    }

    fn scroll_to_end(&mut self, channel: LogChannel) -> Result<(), DriverError> {
        (**self).scroll_to_end(channel)
    }

    fn set_readout(&mut self, slot: ReadoutSlot, text: &str) -> Result<(), DriverError> {
        (**self).set_readout(slot, text)
    }
}

/// `[x, y, v, θ]` with `precision` decimals per entry.
pub fn format_state(values: &[f64], precision: usize) -> String {
    let mut out = String::from("[");
    for (idx, value) in values.iter().enumerate() {
        if idx > 0 {
            out.push_str(", ");
        }
        out.push_str(&format!("{value:.precision$}"));
    }
    out.push(']');
    out
}

/// `"{n}: [x, y, v, θ]"`.
pub fn format_record(record: u64, values: &[f64], precision: usize) -> String {
    format!("{record}: {}", format_state(values, precision))
}

/// `N(mean, stddev)`.
pub fn format_normal(normal: Normal1, precision: usize) -> String {
    format!(
        "N({:.precision$}, {:.precision$})",
        normal.mean, normal.std_dev
    )
}

/// `N([m0, m1], [c00, c01, c10, c11])`.
pub fn format_gaussian(mean: &[f64; 2], covariance: &[f64; 4], precision: usize) -> String {
    format!(
        "N({}, {})",
        format_state(mean, precision),
        format_state(covariance, precision)
    )
}

/// Appends gated state records and refreshes error readouts.
#[derive(Debug, Clone)]
pub struct TelemetrySink {
    config: TelemetryConfig,
    actual: TelemetryLog,
    belief: TelemetryLog,
    next_record: u64,
}

impl TelemetrySink {
    pub fn new(config: TelemetryConfig) -> Self {
        Self {
            actual: TelemetryLog::new(config.max_lines),
            belief: TelemetryLog::new(config.max_lines),
            config,
            next_record: 1,
        }
    }

    pub fn config(&self) -> &TelemetryConfig {
        &self.config
    }

    pub fn log(&self, channel: LogChannel) -> &TelemetryLog {
        match channel {
            LogChannel::Actual => &self.actual,
            LogChannel::Belief => &self.belief,
        }
    }

    /// Records appended so far.
    pub fn records(&self) -> u64 {
        self.next_record - 1
    }

    /// Publishes one frame. Returns whether a record was appended.
    pub fn publish(
        &mut self,
        snapshot: &Snapshot,
        surface: &mut dyn TelemetrySurface,
    ) -> Result<bool, DriverError> {
        let appended = match (snapshot.actual, snapshot.belief) {
            (Some(actual), Some(belief)) if self.is_ready(belief.velocity) => {
                let record = self.next_record;
                let precision = self.config.state_precision;
                self.append_line(
                    LogChannel::Actual,
                    format_record(record, &actual.as_vector(), precision),
                    surface,
                )?;
                self.append_line(
                    LogChannel::Belief,
                    format_record(record, &belief.as_vector(), precision),
                    surface,
                )?;
                self.next_record += 1;
                trace!(target: "kalmanviz::telemetry", record, step = snapshot.step, "appended state record");
                true
            }
            _ => false,
        };

        if let Some(model) = snapshot.error_model {
            self.publish_readouts(model, surface)?;
        }
        Ok(appended)
    }

    fn is_ready(&self, belief_velocity: f64) -> bool {
        match self.config.gate {
            ReadinessGate::BeliefVelocity => belief_velocity != 0.0,
            ReadinessGate::Always => true,
        }
    }

    fn append_line(
        &mut self,
        channel: LogChannel,
        line: String,
        surface: &mut dyn TelemetrySurface,
    ) -> Result<(), DriverError> {
        let log = match channel {
            LogChannel::Actual => &mut self.actual,
            LogChannel::Belief => &mut self.belief,
        };
        if log.push(line) {
            surface.replace(channel, log)?;
        } else if let Some(last) = log.last() {
            surface.append(channel, last)?;
        }
        surface.scroll_to_end(channel)
    }

    fn publish_readouts(
        &self,
        model: ErrorModel,
        surface: &mut dyn TelemetrySurface,
    ) -> Result<(), DriverError> {
        let precision = self.config.error_precision;
        match model {
            ErrorModel::Channels {
                rotation,
                movement,
                position,
            } => {
                surface.set_readout(ReadoutSlot::Rotation, &format_normal(rotation, precision))?;
                surface.set_readout(ReadoutSlot::Movement, &format_normal(movement, precision))?;
                surface.set_readout(ReadoutSlot::Position, &format_normal(position, precision))
            }
            ErrorModel::Gaussian { mean, covariance } => surface.set_readout(
                ReadoutSlot::Gaussian,
                &format_gaussian(&mean, &covariance, precision),
            ),
        }
    }
}
