use std::io::BufRead;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use kalmanviz_app::{
    CommandSubmit, EngineKind, EngineSpec, ErrorShapeArg, HeadlessOptions, build_engine,
    create_command_bus, make_command_submit, run_headless,
};
use kalmanviz_app::headless::DEFAULT_HEADLESS_FRAMES;
use kalmanviz_core::{CommitRequest, DriverConfig, ParameterBridge};
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(
    name = "kalmanviz",
    version,
    about = "Drive a KalmanViz engine headlessly and export its frames"
)]
struct Cli {
    /// Engine to drive.
    #[arg(long, value_enum, default_value_t = EngineKind::Kinematic)]
    engine: EngineKind,

    /// Domain width (cells for the grid engine).
    #[arg(long, default_value_t = 30.0)]
    width: f64,

    /// Domain height (cells for the grid engine).
    #[arg(long, default_value_t = 30.0)]
    height: f64,

    /// Error model exposed by the kinematic engine.
    #[arg(long, value_enum, default_value_t = ErrorShapeArg::Channels)]
    error_shape: ErrorShapeArg,

    /// Number of cycles to run.
    #[arg(long, env = "KALMANVIZ_FRAMES", default_value_t = DEFAULT_HEADLESS_FRAMES)]
    frames: usize,

    /// Inter-tick delay in milliseconds; overrides the config file.
    #[arg(long)]
    delay_ms: Option<u64>,

    /// RNG seed for noisy engines.
    #[arg(long)]
    seed: Option<u64>,

    /// JSON driver configuration file.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the final frame as PNG.
    #[arg(long, env = "KALMANVIZ_PNG")]
    png: Option<PathBuf>,

    /// Write a JSON run report.
    #[arg(long, env = "KALMANVIZ_REPORT")]
    report: Option<PathBuf>,

    /// Commit applied before the first tick, e.g. `goal=3;5` (repeatable).
    #[arg(long = "commit")]
    commits: Vec<CommitRequest>,

    /// Read further `action=value[;value]` commits from stdin while running.
    #[arg(long)]
    interactive: bool,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let config = load_config(&cli)?;

    let engine = build_engine(EngineSpec {
        kind: cli.engine,
        width: cli.width,
        height: cli.height,
        seed: cli.seed,
        error_shape: cli.error_shape.into(),
    })?;

    let (sender, receiver) = create_command_bus(64);
    if cli.interactive {
        let bridge = ParameterBridge::new(engine.capabilities());
        spawn_stdin_reader(bridge, make_command_submit(sender));
    } else {
        drop(sender);
    }

    let options = HeadlessOptions {
        frames: cli.frames,
        paced: true,
        commits: cli.commits.clone(),
        report: cli.report.clone(),
        png: cli.png.clone(),
    };
    info!(engine = ?cli.engine, frames = options.frame_budget(), "starting KalmanViz driver");
    let report = run_headless(engine, config, &options, Some(&receiver))?;

    println!(
        "{} frames, final step {}, {} telemetry records, state {:?}",
        report.summary.frame_count,
        report.summary.final_step,
        report.summary.telemetry_records,
        report.summary.final_state
    );
    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

fn load_config(cli: &Cli) -> Result<DriverConfig> {
    let mut config = match &cli.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read config {}", path.display()))?;
            DriverConfig::from_json_str(&raw)
                .with_context(|| format!("invalid config {}", path.display()))?
        }
        None => DriverConfig::default(),
    };
    if let Some(delay) = cli.delay_ms {
        config.tick_delay_ms = delay;
    }
    config.validate().context("invalid driver configuration")?;
    Ok(config)
}

/// Parses commits from stdin on a background thread and queues them for the loop.
fn spawn_stdin_reader(bridge: ParameterBridge, submit: CommandSubmit) {
    let actions: Vec<&str> = bridge.actions().iter().map(|a| a.name()).collect();
    info!(?actions, "reading commits from stdin");
    std::thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let command = line
                .parse::<CommitRequest>()
                .and_then(|request| bridge.commit_request(&request));
            match command {
                Ok(command) => {
                    submit(command);
                }
                Err(err) => warn!(input = line, error = %err, "ignoring commit"),
            }
        }
    });
}
