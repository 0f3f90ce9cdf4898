//! Driver configuration shared by the native and web hosts.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::telemetry::ReadinessGate;

/// Errors raised while loading or validating a [`DriverConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Indicates an invalid configuration value.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
    /// A palette entry is not a `#rrggbb` literal.
    #[error("palette entry `{field}` holds `{value}`, expected #rrggbb")]
    InvalidColor { field: &'static str, value: String },
    /// The configuration document could not be parsed.
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] serde_json::Error),
}

/// What the scheduler does when a cycle fails.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Continue until too many failures in a row. Engine failures are caught
    /// before the surface is touched, so the last good frame stays visible.
    #[default]
    SkipFrame,
    /// Halt on the first failure.
    Halt,
}

/// Rolling telemetry settings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Lines kept per log channel before the oldest is evicted.
    pub max_lines: usize,
    /// Decimal places for state vector entries.
    pub state_precision: usize,
    /// Decimal places for error distribution readouts.
    pub error_precision: usize,
    /// Condition under which a record is appended.
    pub gate: ReadinessGate,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            max_lines: 1000,
            state_precision: 2,
            error_precision: 5,
            gate: ReadinessGate::default(),
        }
    }
}

/// Canvas colours as `#rrggbb` literals.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PaletteConfig {
    pub background: String,
    pub grid: String,
    pub empty: String,
    pub wall: String,
    pub agent: String,
    pub goal: String,
}

impl Default for PaletteConfig {
    fn default() -> Self {
        Self {
            background: "#ffffff".into(),
            grid: "#cccccc".into(),
            empty: "#ffffff".into(),
            wall: "#000000".into(),
            agent: "#850c5d".into(),
            goal: "#2e8b57".into(),
        }
    }
}

impl PaletteConfig {
    /// Entries in a fixed order, paired with their field names.
    pub fn entries(&self) -> [(&'static str, &str); 6] {
        [
            ("background", &self.background),
            ("grid", &self.grid),
            ("empty", &self.empty),
            ("wall", &self.wall),
            ("agent", &self.agent),
            ("goal", &self.goal),
        ]
    }
}

/// Parses `#rrggbb` (leading `#` optional) into RGB bytes.
pub fn parse_hex_color(field: &'static str, value: &str) -> Result<[u8; 3], ConfigError> {
    let invalid = || ConfigError::InvalidColor {
        field,
        value: value.to_owned(),
    };
    let hex = value.trim().trim_start_matches('#');
    if hex.len() != 6 || !hex.is_ascii() {
        return Err(invalid());
    }
    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&hex[range], 16).map_err(|_| invalid())
    };
    Ok([channel(0..2)?, channel(2..4)?, channel(4..6)?])
}

/// Static configuration for one driver instance.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DriverConfig {
    /// Fixed pause between cycles, in milliseconds.
    pub tick_delay_ms: u64,
    /// Side of one drawn cell in pixels.
    pub cell_size: u32,
    /// Grid line width in pixels.
    pub cell_border: u32,
    pub telemetry: TelemetryConfig,
    pub failure_policy: FailurePolicy,
    /// Failures in a row tolerated by [`FailurePolicy::SkipFrame`] before halting.
    pub max_consecutive_failures: u32,
    pub palette: PaletteConfig,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            tick_delay_ms: 100,
            cell_size: 10,
            cell_border: 1,
            telemetry: TelemetryConfig::default(),
            failure_policy: FailurePolicy::default(),
            max_consecutive_failures: 3,
            palette: PaletteConfig::default(),
        }
    }
}

impl DriverConfig {
    pub const TICK_DELAY_RANGE_MS: std::ops::RangeInclusive<u64> = 1..=1000;

    /// Parses a JSON document; missing fields keep their defaults.
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !Self::TICK_DELAY_RANGE_MS.contains(&self.tick_delay_ms) {
            return Err(ConfigError::InvalidConfig(
                "tick_delay_ms must be between 1 and 1000",
            ));
        }
        if self.cell_size == 0 {
            return Err(ConfigError::InvalidConfig("cell_size must be non-zero"));
        }
        if self.telemetry.max_lines == 0 {
            return Err(ConfigError::InvalidConfig(
                "telemetry.max_lines must be non-zero",
            ));
        }
        if self.max_consecutive_failures == 0 {
            return Err(ConfigError::InvalidConfig(
                "max_consecutive_failures must be non-zero",
            ));
        }
        for (field, value) in self.palette.entries() {
            parse_hex_color(field, value)?;
        }
        Ok(())
    }

    pub fn tick_delay(&self) -> Duration {
        Duration::from_millis(self.tick_delay_ms)
    }

    /// Distance between consecutive grid lines.
    pub fn cell_pitch(&self) -> u32 {
        self.cell_size + self.cell_border
    }
}
