//! Tick/paint/telemetry ordering and the driver lifecycle.
//!
//! One cycle is `tick → snapshot → clear → grid → scene → telemetry → present`.
//! The scheduler never sleeps; hosts wait [`TickScheduler::inter_tick_delay`]
//! and then call [`TickScheduler::run_cycle`] again from their own timer or
//! frame callback while [`TickScheduler::is_running`] holds.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

use crate::DriverError;
use crate::command::{ControlCommand, apply_control_command};
use crate::config::{DriverConfig, FailurePolicy};
use crate::engine::{Capabilities, CellView, Dimensions, Engine, Snapshot};
use crate::telemetry::{TelemetrySink, TelemetrySurface};

/// Everything a painter may read for one frame.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub snapshot: &'a Snapshot,
    pub capabilities: Capabilities,
    /// Borrowed for this frame only.
    pub cells: Option<CellView<'a>>,
}

/// Drawing half of a cycle. Implemented by the render crate.
pub trait FramePainter {
    fn clear(&mut self) -> Result<(), DriverError>;

    fn draw_grid(&mut self, frame: &Frame<'_>) -> Result<(), DriverError>;

    fn draw_scene(&mut self, frame: &Frame<'_>) -> Result<(), DriverError>;

    /// Makes the finished frame visible.
    fn present(&mut self) -> Result<(), DriverError> {
        Ok(())
    }
}

impl<P: FramePainter + ?Sized> FramePainter for Box<P> {
    fn clear(&mut self) -> Result<(), DriverError> {
        (**self).clear()
    }

    fn draw_grid(&mut self, frame: &Frame<'_>) -> Result<(), DriverError> {
        (**self).draw_grid(frame)
    }

    fn draw_scene(&mut self, frame: &Frame<'_>) -> Result<(), DriverError> {
        (**self).draw_scene(frame)
    }

    fn present(&mut self) -> Result<(), DriverError> {
        (**self).present()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SchedulerState {
    Idle,
    Running,
    Paused,
    Stopped,
    Faulted,
}

/// Result of one [`TickScheduler::run_cycle`] call.
#[derive(Debug, Clone, PartialEq)]
pub enum CycleOutcome {
    /// A frame was ticked and painted.
    Rendered { step: u64, appended: bool },
    /// The cycle failed. `halted` is set when the scheduler moved to `Faulted`.
    Failed { error: DriverError, halted: bool },
    /// The scheduler is not running; nothing happened.
    Inactive(SchedulerState),
}

/// Owns the engine and drives it one cycle at a time.
pub struct TickScheduler<E, P, S> {
    engine: E,
    painter: P,
    surface: S,
    telemetry: TelemetrySink,
    config: DriverConfig,
    capabilities: Capabilities,
    dimensions: Dimensions,
    state: SchedulerState,
    cycles: u64,
    consecutive_failures: u32,
    last_failure: Option<DriverError>,
}

impl<E, P, S> TickScheduler<E, P, S>
where
    E: Engine,
    P: FramePainter,
    S: TelemetrySurface,
{
    /// Queries dimensions and capabilities once; `config` is expected to be validated.
    pub fn new(
        engine: E,
        painter: P,
        surface: S,
        config: DriverConfig,
    ) -> Result<Self, DriverError> {
        let dimensions = engine.dimensions().validate()?;
        let capabilities = engine.capabilities();
        let telemetry = TelemetrySink::new(config.telemetry.clone());
        Ok(Self {
            engine,
            painter,
            surface,
            telemetry,
            config,
            capabilities,
            dimensions,
            state: SchedulerState::Idle,
            cycles: 0,
            consecutive_failures: 0,
            last_failure: None,
        })
    }

    /// Paints the initial snapshot without ticking, then enters `Running`.
    pub fn start(&mut self) -> Result<(), DriverError> {
        if !matches!(self.state, SchedulerState::Idle | SchedulerState::Stopped) {
            return Err(DriverError::InvalidTransition {
                action: "start",
                state: self.state,
            });
        }
        self.consecutive_failures = 0;
        match self.render_pass(false) {
            Ok((step, _)) => {
                self.state = SchedulerState::Running;
                info!(
                    target: "kalmanviz::scheduler",
                    step,
                    width = self.dimensions.width,
                    height = self.dimensions.height,
                    "scheduler started"
                );
                Ok(())
            }
            Err(err) => {
                self.state = SchedulerState::Faulted;
                self.last_failure = Some(err.clone());
                error!(target: "kalmanviz::scheduler", error = %err, "initial render failed");
                Err(err)
            }
        }
    }

    /// Runs one full cycle if the scheduler is running.
    pub fn run_cycle(&mut self) -> CycleOutcome {
        if self.state != SchedulerState::Running {
            return CycleOutcome::Inactive(self.state);
        }
        match self.render_pass(true) {
            Ok((step, appended)) => {
                self.cycles += 1;
                self.consecutive_failures = 0;
                debug!(target: "kalmanviz::scheduler", step, cycles = self.cycles, appended, "cycle rendered");
                CycleOutcome::Rendered { step, appended }
            }
            Err(err) => {
                self.consecutive_failures += 1;
                self.last_failure = Some(err.clone());
                let halted = match self.config.failure_policy {
                    FailurePolicy::Halt => true,
                    FailurePolicy::SkipFrame => {
                        self.consecutive_failures >= self.config.max_consecutive_failures
                    }
                };
                if halted {
                    self.state = SchedulerState::Faulted;
                    error!(
                        target: "kalmanviz::scheduler",
                        error = %err,
                        failures = self.consecutive_failures,
                        cycles = self.cycles,
                        "scheduler halted"
                    );
                } else {
                    warn!(
                        target: "kalmanviz::scheduler",
                        error = %err,
                        failures = self.consecutive_failures,
                        "frame skipped"
                    );
                }
                CycleOutcome::Failed { error: err, halted }
            }
        }
    }

    pub fn pause(&mut self) -> Result<(), DriverError> {
        self.transition("pause", SchedulerState::Running, SchedulerState::Paused)
    }

    pub fn resume(&mut self) -> Result<(), DriverError> {
        self.transition("resume", SchedulerState::Paused, SchedulerState::Running)
    }

    /// Stops the loop from any state. Hosts stop re-arming their callbacks once this runs.
    pub fn stop(&mut self) {
        if self.state != SchedulerState::Stopped {
            info!(target: "kalmanviz::scheduler", cycles = self.cycles, from = ?self.state, "scheduler stopped");
            self.state = SchedulerState::Stopped;
        }
    }

    /// Applies a control command between cycles. Loop state is never changed.
    pub fn apply(&mut self, command: ControlCommand) -> Result<(), DriverError> {
        apply_control_command(&mut self.engine, command).inspect_err(|err| {
            warn!(target: "kalmanviz::scheduler", command = command.label(), error = %err, "control command rejected");
        })
    }

    pub fn inter_tick_delay(&self) -> Duration {
        self.config.tick_delay()
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == SchedulerState::Running
    }

    /// Cycles rendered since construction.
    pub fn cycles(&self) -> u64 {
        self.cycles
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn last_failure(&self) -> Option<&DriverError> {
        self.last_failure.as_ref()
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    pub fn engine(&self) -> &E {
        &self.engine
    }

    pub fn painter(&self) -> &P {
        &self.painter
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn telemetry(&self) -> &TelemetrySink {
        &self.telemetry
    }

    /// Reads the engine as it stands now.
    pub fn snapshot(&self) -> Snapshot {
        Snapshot::capture(&self.engine, self.dimensions)
    }

    fn transition(
        &mut self,
        action: &'static str,
        from: SchedulerState,
        to: SchedulerState,
    ) -> Result<(), DriverError> {
        if self.state != from {
            return Err(DriverError::InvalidTransition {
                action,
                state: self.state,
            });
        }
        debug!(target: "kalmanviz::scheduler", action, "state transition");
        self.state = to;
        Ok(())
    }

    fn render_pass(&mut self, tick: bool) -> Result<(u64, bool), DriverError> {
        let previous = self.engine.step();
        if tick {
            self.engine.tick()?;
        }
        let snapshot = Snapshot::capture(&self.engine, self.dimensions);
        if tick && snapshot.step <= previous {
            return Err(DriverError::StaleSnapshot {
                previous,
                observed: snapshot.step,
            });
        }

        let cells = if self.capabilities.has_cell_grid {
            Some(
                self.engine
                    .cells()
                    .ok_or(DriverError::Unsupported("cell view"))?,
            )
        } else {
            None
        };
        if let Some(view) = &cells {
            view.iter_kinds().try_for_each(|cell| cell.map(drop))?;
        }
        let frame = Frame {
            snapshot: &snapshot,
            capabilities: self.capabilities,
            cells,
        };

        // Every engine-side check is done; only surface failures remain past here.
        self.painter.clear()?;
        self.painter.draw_grid(&frame)?;
        self.painter.draw_scene(&frame)?;
        let appended = self.telemetry.publish(&snapshot, &mut self.surface)?;
        self.painter.present()?;
        Ok((snapshot.step, appended))
    }
}
