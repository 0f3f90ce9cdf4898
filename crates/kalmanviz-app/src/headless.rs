//! Headless frame loop: paces the scheduler, applies queued commits and
//! records per-frame statistics for the JSON report.

use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use kalmanviz_core::{
    AgentState, Capabilities, CommitRequest, CycleOutcome, Dimensions, DriverConfig, Engine,
    MemorySurface, ParameterBridge, ReadoutSlot, SchedulerState, Snapshot, TickScheduler,
};
use kalmanviz_render::{CanvasPainter, GridGeometry, PixelCanvas, encode_png};
use serde::Serialize;
use tracing::{info, warn};

use crate::command::{CommandReceiver, drain_pending_commands};

pub const DEFAULT_HEADLESS_FRAMES: usize = 120;
pub const MAX_HEADLESS_FRAMES: usize = 100_000;

#[derive(Debug, Clone, Default)]
pub struct HeadlessOptions {
    pub frames: usize,
    /// Sleep for the configured inter-tick delay between cycles.
    pub paced: bool,
    pub commits: Vec<CommitRequest>,
    pub report: Option<PathBuf>,
    pub png: Option<PathBuf>,
}

impl HeadlessOptions {
    /// Frame budget clamped to `1..=MAX_HEADLESS_FRAMES`.
    pub fn frame_budget(&self) -> usize {
        if self.frames == 0 {
            DEFAULT_HEADLESS_FRAMES
        } else {
            self.frames.min(MAX_HEADLESS_FRAMES)
        }
    }
}

type HeadlessScheduler<E> = TickScheduler<E, CanvasPainter<PixelCanvas>, MemorySurface>;

/// Drives `engine` for the frame budget and returns the report.
pub fn run_headless<E: Engine>(
    engine: E,
    config: DriverConfig,
    options: &HeadlessOptions,
    commands: Option<&CommandReceiver>,
) -> Result<HeadlessReport> {
    let capabilities = engine.capabilities();
    let dimensions = engine.dimensions();
    let geometry = GridGeometry::for_engine(capabilities, dimensions, &config)
        .context("engine domain does not fit a canvas")?;
    let canvas = PixelCanvas::new(geometry.extent.0, geometry.extent.1)
        .context("failed to allocate offscreen canvas")?;
    let painter = CanvasPainter::for_engine(canvas, capabilities, dimensions, &config)
        .context("failed to build canvas painter")?;
    let mut scheduler: HeadlessScheduler<E> =
        TickScheduler::new(engine, painter, MemorySurface::default(), config)
            .context("engine rejected by scheduler")?;

    scheduler.start().context("initial render failed")?;
    let mut report = HeadlessReport::new(&scheduler, geometry.extent);

    let bridge = ParameterBridge::new(capabilities);
    for request in &options.commits {
        let outcome = bridge
            .commit_request(request)
            .map_err(anyhow::Error::from)
            .and_then(|command| scheduler.apply(command).map_err(anyhow::Error::from));
        match outcome {
            Ok(()) => report.commits_applied += 1,
            Err(err) => {
                warn!(action = request.action.name(), error = %err, "commit rejected");
                report.commits_rejected += 1;
            }
        }
    }

    let frames = options.frame_budget();
    for cycle in 1..=frames {
        if let Some(receiver) = commands {
            let (applied, rejected) = drain_pending_commands(receiver, &mut scheduler);
            report.commits_applied += applied;
            report.commits_rejected += rejected;
        }
        let outcome = scheduler.run_cycle();
        report.record(cycle, &outcome, &scheduler.snapshot());
        if !scheduler.is_running() {
            warn!(cycle, state = ?scheduler.state(), "headless loop ended early");
            break;
        }
        if options.paced {
            std::thread::sleep(scheduler.inter_tick_delay());
        }
    }

    report.finalize(&scheduler);
    info!(
        frames = report.summary.frame_count,
        final_step = report.summary.final_step,
        records = report.summary.telemetry_records,
        "headless run complete"
    );

    if let Some(path) = &options.png {
        let png = encode_png(scheduler.painter().surface()).context("failed to encode frame")?;
        write_bytes(path, &png)
            .with_context(|| format!("failed to write PNG to {}", path.display()))?;
    }
    if let Some(path) = &options.report {
        report
            .write_json(path)
            .with_context(|| format!("failed to write headless report to {}", path.display()))?;
    }
    Ok(report)
}

fn write_bytes(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, bytes)?;
    Ok(())
}

#[derive(Debug, Clone, Serialize)]
pub struct HeadlessReport {
    pub dimensions: Dimensions,
    pub capabilities: Capabilities,
    pub canvas: (u32, u32),
    pub initial: FrameStats,
    pub frames: Vec<FrameStats>,
    pub commits_applied: usize,
    pub commits_rejected: usize,
    pub telemetry: TelemetryDump,
    pub summary: ReportSummary,
}

impl HeadlessReport {
    fn new<E: Engine>(scheduler: &HeadlessScheduler<E>, canvas: (u32, u32)) -> Self {
        Self {
            dimensions: scheduler.dimensions(),
            capabilities: scheduler.capabilities(),
            canvas,
            initial: FrameStats::from_snapshot(0, "initial", false, &scheduler.snapshot()),
            frames: Vec::new(),
            commits_applied: 0,
            commits_rejected: 0,
            telemetry: TelemetryDump::default(),
            summary: ReportSummary::default(),
        }
    }

    fn record(&mut self, cycle: usize, outcome: &CycleOutcome, snapshot: &Snapshot) {
        let (label, appended) = match outcome {
            CycleOutcome::Rendered { appended, .. } => ("rendered", *appended),
            CycleOutcome::Failed { halted: true, .. } => ("halted", false),
            CycleOutcome::Failed { .. } => ("skipped", false),
            CycleOutcome::Inactive(_) => ("inactive", false),
        };
        self.frames
            .push(FrameStats::from_snapshot(cycle, label, appended, snapshot));
    }

    fn finalize<E: Engine>(&mut self, scheduler: &HeadlessScheduler<E>) {
        let surface = scheduler.surface();
        self.telemetry = TelemetryDump {
            actual: surface.actual.clone(),
            belief: surface.belief.clone(),
            readouts: surface.readouts.clone(),
        };
        let telemetry = scheduler.telemetry();
        self.summary = ReportSummary {
            frame_count: self.frames.len(),
            rendered: self.frames.iter().filter(|f| f.outcome == "rendered").count(),
            failed: self
                .frames
                .iter()
                .filter(|f| matches!(f.outcome, "skipped" | "halted"))
                .count(),
            final_step: self.frames.last().map_or(self.initial.step, |f| f.step),
            final_state: scheduler.state(),
            telemetry_records: telemetry.records(),
            evicted_lines: telemetry.log(kalmanviz_core::LogChannel::Actual).evicted(),
            last_failure: scheduler.last_failure().map(ToString::to_string),
        };
    }

    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let file = File::create(path)?;
        serde_json::to_writer_pretty(file, self).context("failed to serialize headless report")?;
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FrameStats {
    pub cycle: usize,
    pub step: u64,
    pub outcome: &'static str,
    pub appended: bool,
    pub actual: Option<AgentState>,
    pub belief: Option<AgentState>,
}

impl FrameStats {
    fn from_snapshot(
        cycle: usize,
        outcome: &'static str,
        appended: bool,
        snapshot: &Snapshot,
    ) -> Self {
        Self {
            cycle,
            step: snapshot.step,
            outcome,
            appended,
            actual: snapshot.actual,
            belief: snapshot.belief,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TelemetryDump {
    pub actual: Vec<String>,
    pub belief: Vec<String>,
    pub readouts: BTreeMap<ReadoutSlot, String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary {
    pub frame_count: usize,
    pub rendered: usize,
    pub failed: usize,
    pub final_step: u64,
    pub final_state: SchedulerState,
    pub telemetry_records: u64,
    pub evicted_lines: u64,
    pub last_failure: Option<String>,
}

impl Default for ReportSummary {
    fn default() -> Self {
        Self {
            frame_count: 0,
            rendered: 0,
            failed: 0,
            final_step: 0,
            final_state: SchedulerState::Idle,
            telemetry_records: 0,
            evicted_lines: 0,
            last_failure: None,
        }
    }
}
