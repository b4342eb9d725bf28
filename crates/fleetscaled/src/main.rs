//! fleetscaled — the fleet scale-in daemon.
//!
//! Three ways in, one evaluation loop:
//! - `run`: scheduled passes every `--interval` seconds until Ctrl-C
//! - `once`: a single pass
//! - `invoke`: a single pass driven by a JSON event payload; dry-run comes
//!   from `DRY_RUN` unless the payload says otherwise
//!
//! # Usage
//!
//! ```text
//! fleetscaled --fleet demos/fleet.toml run --interval 300
//! DRY_RUN=1 fleetscaled --fleet demos/fleet.toml invoke --event event.json
//! ```

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use tokio::sync::watch;
use tracing::info;

use fleetscale_core::{RunMode, ScaleConfig};
use fleetscale_gateway::MemoryFleet;
use fleetscale_runner::{RunReport, Runner, TriggerEvent};

#[derive(Parser)]
#[command(name = "fleetscaled", about = "Fleet scale-in daemon", version)]
struct Cli {
    /// Fleet fixture (JSON or TOML) backing the gateways.
    #[arg(long, global = true, default_value = "demos/fleet.toml")]
    fleet: PathBuf,

    /// Optional TOML config; environment variables override it.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Force dry-run regardless of DRY_RUN.
    #[arg(long, global = true)]
    dry_run: bool,

    #[arg(long, global = true, value_enum, default_value = "text")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Command {
    /// Run a scale-in pass on a fixed schedule.
    Run {
        /// Seconds between passes.
        #[arg(long, default_value = "300")]
        interval: u64,
    },
    /// Run a single scale-in pass and print its report.
    Once,
    /// Run a single pass for an event payload (file path, or `-` for stdin).
    Invoke {
        #[arg(long)]
        event: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_format);

    let mut config = load_config(cli.config.as_deref())?;
    if cli.dry_run {
        config.dry_run = true;
    }

    let fleet = MemoryFleet::from_file(&cli.fleet)
        .with_context(|| format!("loading fleet fixture {}", cli.fleet.display()))?;
    let fleet = Arc::new(fleet);
    let runner = Runner::new(fleet.clone(), fleet.clone(), fleet, config);

    match cli.command {
        Command::Run { interval } => run_scheduled(&runner, interval).await,
        Command::Once => {
            let report = runner.run_once().await;
            print_report(&report)
        }
        Command::Invoke { event } => {
            let payload = read_event(event.as_deref())?;
            let event = TriggerEvent::parse(&payload).context("parsing event payload")?;
            let mode = event.run_mode(runner.config());
            info!(?mode, "event invocation");
            let report = runner.run_once_with(runner.sink_for(mode)).await;
            print_report(&report)
        }
    }
}

fn init_tracing(format: LogFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,fleetscale=debug"));

    match format {
        LogFormat::Text => tracing_subscriber::fmt().with_env_filter(filter).init(),
        LogFormat::Json => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .init(),
    }
}

fn load_config(path: Option<&Path>) -> anyhow::Result<ScaleConfig> {
    let mut config = match path {
        Some(path) => ScaleConfig::from_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ScaleConfig::default(),
    };
    config
        .apply_env(|key| std::env::var(key).ok())
        .context("reading configuration from environment")?;

    info!(
        cpu_threshold = config.scale_in_cpu_threshold,
        mem_threshold = config.scale_in_mem_threshold,
        future_mem_threshold = config.future_mem_threshold,
        avoid = %config.cluster_avoid_substring,
        dry_run = config.run_mode() == RunMode::DryRun,
        "configuration loaded"
    );
    Ok(config)
}

fn read_event(path: Option<&Path>) -> anyhow::Result<String> {
    match path {
        None => Ok(String::new()),
        Some(p) if p == Path::new("-") => {
            let mut payload = String::new();
            std::io::stdin()
                .read_to_string(&mut payload)
                .context("reading event from stdin")?;
            Ok(payload)
        }
        Some(p) => std::fs::read_to_string(p)
            .with_context(|| format!("reading event {}", p.display())),
    }
}

async fn run_scheduled(runner: &Runner, interval: u64) -> anyhow::Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(async move {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install CTRL+C handler");
        info!("shutdown signal received");
        let _ = shutdown_tx.send(true);
    });

    runner
        .run(Duration::from_secs(interval), shutdown_rx)
        .await;

    info!("fleetscaled stopped");
    Ok(())
}

fn print_report(report: &RunReport) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(report)?);
    Ok(())
}
