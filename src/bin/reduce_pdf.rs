//! Shrink a PDF below a target size by re-encoding its JPEG images.
//!
//! Exit status is 0 when the target was reached, 1 when the best attempt is
//! still larger than the target, and 2 on bad arguments.

use std::fs;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use log::{error, info, warn, LevelFilter};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode};

use pst_collector::cli::ReducePdfArgs;
use pst_collector::pdf::{
    compress_to_target, human_readable_size, parse_size, resolve_output_path,
    CompressionOutcome, CompressionSettings, LopdfRecompressor, ReduceError,
};

fn main() -> ExitCode {
    let args = ReducePdfArgs::parse();

    let level = if args.verbose { LevelFilter::Debug } else { LevelFilter::Info };
    if let Err(e) = TermLogger::init(level, Config::default(), TerminalMode::Mixed, ColorChoice::Auto)
        .context("Failed to initialize logger")
    {
        eprintln!("{:#}", e);
    }

    match run(&args) {
        Ok(outcome) => {
            println!(
                "Saved {} ({})",
                outcome.output.display(),
                human_readable_size(outcome.size_bytes)
            );
            if outcome.reached_target {
                ExitCode::SUCCESS
            } else {
                warn!(
                    "Could not reach {}; kept the smallest result at {}",
                    args.target,
                    human_readable_size(outcome.size_bytes)
                );
                ExitCode::from(1)
            }
        }
        Err(e) if e.is_usage_error() => {
            error!("{}", e);
            ExitCode::from(2)
        }
        Err(e) => {
            error!("{}", e);
            ExitCode::from(1)
        }
    }
}

fn run(args: &ReducePdfArgs) -> Result<CompressionOutcome, ReduceError> {
    let settings = CompressionSettings {
        target_size: parse_size(&args.target)?,
        tolerance: args.tolerance,
        min_quality: args.min_quality,
        max_quality: args.max_quality,
        max_iterations: args.max_iterations,
    };
    settings.validate()?;

    if !args.input.is_file() {
        return Err(ReduceError::InputNotFound(args.input.clone()));
    }

    let output = resolve_output_path(&args.input, &args.output);
    if let Some(parent) = output.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent).map_err(|e| ReduceError::Io {
            context: format!("failed to create {}", parent.display()),
            source: e,
        })?;
    }

    info!(
        "Reducing {} to at most {} (tolerance {:.0}%)",
        args.input.display(),
        human_readable_size(settings.target_size),
        settings.tolerance * 100.0
    );

    let outcome = compress_to_target(&args.input, &output, &settings, &LopdfRecompressor::new())?;
    if let Some(quality) = outcome.quality {
        info!("Chose quality {} after {} pass(es)", quality, outcome.iterations);
    }
    Ok(outcome)
}
