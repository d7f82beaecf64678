//! # railsim
//!
//! CLI host for the multi-fab AGV/OHT rail traffic simulator (spec.md §14).
//! Loads a `SimulatorConfig`, spawns a `MultiWorkerController` worker task
//! per configured slot, and drives the simulation until a ctrl-c signal
//! requests a graceful shutdown.
//!
//! Grounded on `evo_hal`'s `clap`-derived CLI / `setup_tracing` /
//! signal-handler shape, adapted from a synchronous `ctrlc` handler
//! flipping an `AtomicBool` to `tokio::signal::ctrl_c()` inside an async
//! task, since this binary is async top to bottom rather than driving one
//! synchronous RT loop.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::Parser;
use railsim::controller::MultiWorkerController;
use railsim_common::config::{ConfigLoader, FabConfig, SimulatorConfig};
use railsim_common::vehicle::{LockGrantStrategy, TransferMode};
use tracing::{error, info, Level};
use tracing_subscriber::EnvFilter;

/// Convenience default for fabs supplied only via `--fab id=mapPath`,
/// without a full `SimulatorConfig` fab entry to draw `max_vehicles` from.
const CLI_FAB_DEFAULT_MAX_VEHICLES: u32 = 500;

/// railsim - multi-fab AGV/OHT rail traffic simulator
#[derive(Parser, Debug)]
#[command(name = "railsim")]
#[command(author = "RTS007")]
#[command(version)]
#[command(about = "Multi-fab AGV/OHT rail traffic simulator")]
#[command(long_about = None)]
struct Args {
    /// Path to the simulator configuration file (TOML).
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Override (or, with no `--config`, set) the worker task count.
    #[arg(short, long)]
    workers: Option<usize>,

    /// Add/override a fab as `id=mapPath` (repeatable).
    #[arg(short, long = "fab", action = clap::ArgAction::Append)]
    fabs: Vec<String>,

    /// Log level: trace, debug, info, warn, error.
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    setup_tracing(&args);

    if let Err(e) = run(args).await {
        error!("railsim startup failed: {}", e);
        std::process::exit(1);
    }
    Ok(())
}

async fn run(args: Args) -> Result<(), Box<dyn std::error::Error>> {
    info!("railsim v{} starting...", env!("CARGO_PKG_VERSION"));

    let mut config = load_config(&args)?;
    if let Some(workers) = args.workers {
        config.worker_count = workers;
    }
    apply_fab_overrides(&mut config, &args.fabs)?;
    config.validate().map_err(|e| format!("invalid configuration: {e}"))?;

    let mut controller = MultiWorkerController::new(config);
    controller.initialize().await?;
    controller.start().await?;
    info!(workers = controller.worker_count(), "simulation running");

    let running = Arc::new(AtomicBool::new(true));
    let running_for_signal = Arc::clone(&running);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received shutdown signal");
            running_for_signal.store(false, Ordering::SeqCst);
        }
    });

    controller.run_until_shutdown(running).await;
    info!("railsim shutdown complete");
    Ok(())
}

/// Loads `SimulatorConfig` from `--config`, resolving relative fab map
/// paths against the config file's directory, or (with no `--config`)
/// builds an empty shell config that `--fab`/`--workers` overrides fill in.
fn load_config(args: &Args) -> Result<SimulatorConfig, Box<dyn std::error::Error>> {
    if let Some(path) = &args.config {
        let mut config = SimulatorConfig::load(path)?;
        if let Some(dir) = path.parent() {
            resolve_relative_map_paths(&mut config, dir);
        }
        Ok(config)
    } else {
        Ok(SimulatorConfig {
            shared: None,
            worker_count: args.workers.unwrap_or(1),
            target_fps: railsim_common::consts::DEFAULT_TARGET_FPS,
            max_delta: railsim_common::consts::DEFAULT_MAX_DELTA_S,
            fabs: Vec::new(),
            sensor_presets: Vec::new(),
        })
    }
}

fn resolve_relative_map_paths(config: &mut SimulatorConfig, config_dir: &std::path::Path) {
    for fab in &mut config.fabs {
        if fab.map_path.is_relative() {
            fab.map_path = config_dir.join(&fab.map_path);
        }
    }
}

/// Parses `--fab id=mapPath` entries, overriding an existing fab with the
/// same id or appending a new one with CLI-convenience defaults.
fn apply_fab_overrides(config: &mut SimulatorConfig, entries: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    for entry in entries {
        let (fab_id, map_path) = entry
            .split_once('=')
            .ok_or_else(|| format!("--fab entry must be id=mapPath, got {entry:?}"))?;
        let fab_config = FabConfig {
            fab_id: fab_id.to_string(),
            map_path: PathBuf::from(map_path),
            max_vehicles: CLI_FAB_DEFAULT_MAX_VEHICLES,
            lock_grant_strategy: LockGrantStrategy::Fifo,
            transfer_mode: TransferMode::Loop,
            render_offset_x: 0.0,
            render_offset_y: 0.0,
            linear_max_speed: 2.0,
            curve_max_speed: 1.0,
            lock_wait_distance_straight: 1.0,
            lock_wait_distance_curve: 1.5,
        };
        if let Some(existing) = config.fabs.iter_mut().find(|f| f.fab_id == fab_id) {
            *existing = fab_config;
        } else {
            config.fabs.push(fab_config);
        }
    }
    Ok(())
}

fn setup_tracing(args: &Args) {
    let level = match args.log_level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };
    let filter = EnvFilter::from_default_env().add_directive(level.into());
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}
