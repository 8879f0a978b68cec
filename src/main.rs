use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use log::{error, info, warn, LevelFilter};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};
use tokio::runtime::Runtime;
use tokio_util::sync::CancellationToken;

use pst_collector::cli::{Args, Commands};
use pst_collector::collectors::runner::CollectionRunner;
use pst_collector::config::{create_sample_config_file, load_config, CollectorConfig};
use pst_collector::constants::SUMMARY_FILE_NAME;
use pst_collector::remote::mounted::MountedShareStore;
use pst_collector::report::{HostState, RunReport};
use pst_collector::utils::summary::write_run_summary;

fn main() -> Result<()> {
    let args = Args::parse();

    initialize_logging(args.level_filter())?;

    if handle_subcommand(&args)? {
        return Ok(());
    }

    let (config_path, destination) = require_run_arguments(&args)?;
    let config = load_run_config(&config_path, &args)?;

    fs::create_dir_all(&destination).with_context(|| {
        format!("Failed to create destination directory {}", destination.display())
    })?;

    let runtime = Runtime::new().context("Failed to create Tokio runtime")?;
    let report = runtime.block_on(run_collection(&config, &destination));

    write_summary(&args, &config, &destination, &report);
    log_host_digest(&report);

    Ok(())
}

/// Initialize the logging system
fn initialize_logging(level: LevelFilter) -> Result<()> {
    TermLogger::init(level, Config::default(), TerminalMode::Mixed, ColorChoice::Auto)
        .context("Failed to initialize logger")?;
    Ok(())
}

/// Handle subcommands. Returns true when one ran and the process should exit.
fn handle_subcommand(args: &Args) -> Result<bool> {
    match &args.command {
        Some(Commands::InitConfig { path }) => {
            create_sample_config_file(path)?;
            info!("Edit {} and run with --config {}", path.display(), path.display());
            Ok(true)
        }
        None => Ok(false),
    }
}

fn require_run_arguments(args: &Args) -> Result<(PathBuf, PathBuf)> {
    let config = args
        .config
        .clone()
        .ok_or_else(|| anyhow!("--config <path> is required (see `pst-collector init-config`)"))?;
    let destination = args
        .destination
        .clone()
        .ok_or_else(|| anyhow!("--destination <path> is required"))?;
    Ok((config, destination))
}

/// Load the configuration and apply command-line overrides
fn load_run_config(path: &Path, args: &Args) -> Result<CollectorConfig> {
    info!("Loading configuration from {}", path.display());
    let mut config = load_config(path)
        .with_context(|| format!("Failed to load configuration from {}", path.display()))?;

    if let Some(template) = &args.share_root {
        info!("Using share root template from command line: {}", template);
        config.share_root = Some(template.clone());
    }

    info!(
        "Configured {} host(s), extensions [{}]",
        config.hosts.len(),
        config.extensions.join(", ")
    );
    Ok(config)
}

async fn run_collection(config: &CollectorConfig, destination: &Path) -> RunReport {
    let store = MountedShareStore::from_config(config);
    info!("Reaching shares through {}", store.template());

    let cancel = CancellationToken::new();
    let runner = CollectionRunner::new(Arc::new(store)).with_cancellation(cancel.clone());

    let signal_token = cancel.clone();
    let signal_task = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; stopping after the current file");
            signal_token.cancel();
        }
    });

    let report = runner.run(config, destination).await;
    signal_task.abort();
    report
}

fn write_summary(args: &Args, config: &CollectorConfig, destination: &Path, report: &RunReport) {
    if args.no_summary {
        return;
    }

    let path = args
        .summary
        .clone()
        .unwrap_or_else(|| destination.join(SUMMARY_FILE_NAME));

    // The archives are already on disk, so a summary failure is not fatal.
    if let Err(e) = write_run_summary(report, &config.client_name(), &path) {
        error!("Failed to write run summary: {:#}", e);
    }
}

fn log_host_digest(report: &RunReport) {
    for host in &report.hosts {
        let state = match &host.state {
            HostState::Failed(stage) => format!("failed during {:?}", stage).to_lowercase(),
            other => format!("{:?}", other).to_lowercase(),
        };
        info!(
            "{} ({}): {}, {} file(s), {} byte(s), {} error(s)",
            host.address,
            host.server_name,
            state,
            host.files_collected,
            host.bytes_collected,
            host.errors.len()
        );
    }

    if report.cancelled {
        warn!("Run was cancelled; the report covers completed work only");
    }
    info!(
        "Collected {} file(s), {} byte(s) from {} host(s) with {} error(s)",
        report.files_collected(),
        report.total_bytes_collected,
        report.hosts.len(),
        report.error_count()
    );
}
