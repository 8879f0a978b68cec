use clap::{Parser, Subcommand, ValueEnum};
use log::LevelFilter;
use std::path::PathBuf;

use crate::constants::{
    PDF_DEFAULT_MAX_ITERATIONS, PDF_DEFAULT_MAX_QUALITY, PDF_DEFAULT_MIN_QUALITY,
    PDF_DEFAULT_TOLERANCE,
};

/// Command-line arguments for the pst-collector tool.
///
/// A run needs both `--config` and `--destination`; the `init-config`
/// subcommand needs neither.
#[derive(Parser, Debug)]
#[clap(
    name = "pst-collector",
    version,
    about = "Collect Outlook PST/OST archives from Windows hosts over SMB shares"
)]
pub struct Args {
    /// Path to the host configuration file (YAML, or JSON by extension)
    #[clap(short = 'c', long)]
    pub config: Option<PathBuf>,

    /// Local directory receiving <host>/<share>/<path> trees
    #[clap(short = 'd', long)]
    pub destination: Option<PathBuf>,

    /// Log level
    #[clap(long, value_enum, default_value = "info")]
    pub log_level: LogLevel,

    /// Verbose logging (same as --log-level debug)
    #[clap(short, long)]
    pub verbose: bool,

    /// Where to write the JSON run summary (default: <destination>/collection_summary.json)
    #[clap(long)]
    pub summary: Option<PathBuf>,

    /// Do not write a run summary
    #[clap(long, conflicts_with = "summary")]
    pub no_summary: bool,

    /// Share-root template overriding the configuration ({address}, {server}, {share})
    #[clap(long)]
    pub share_root: Option<String>,

    /// Subcommands
    #[clap(subcommand)]
    pub command: Option<Commands>,
}

impl Args {
    /// Level after applying `--verbose`
    pub fn level_filter(&self) -> LevelFilter {
        let level = self.log_level.to_level_filter();
        if self.verbose && level < LevelFilter::Debug {
            LevelFilter::Debug
        } else {
            level
        }
    }
}

/// Logging verbosity.
#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn to_level_filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

impl std::fmt::Display for LogLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogLevel::Error => write!(f, "error"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Trace => write!(f, "trace"),
        }
    }
}

/// Available subcommands for the collector.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Write a commented sample configuration file
    InitConfig {
        /// Path to output configuration file
        #[clap(default_value = "pst_collector.yaml")]
        path: PathBuf,
    },
}

/// Command-line arguments for the reduce-pdf tool.
#[derive(Parser, Debug)]
#[clap(
    name = "reduce-pdf",
    version,
    about = "Reduce a PDF below a target size by recompressing its images"
)]
pub struct ReducePdfArgs {
    /// Path to the input PDF file
    pub input: PathBuf,

    /// Path to the output PDF file, or a directory to place it in
    pub output: PathBuf,

    /// Desired maximum size (e.g. 500KB, 1.5MB)
    #[clap(long)]
    pub target: String,

    /// Accepted relative overshoot of the target
    #[clap(long, default_value_t = PDF_DEFAULT_TOLERANCE)]
    pub tolerance: f64,

    /// Lower bound for image quality
    #[clap(long, default_value_t = PDF_DEFAULT_MIN_QUALITY)]
    pub min_quality: u8,

    /// Upper bound for image quality
    #[clap(long, default_value_t = PDF_DEFAULT_MAX_QUALITY)]
    pub max_quality: u8,

    /// Maximum number of compression passes
    #[clap(long, default_value_t = PDF_DEFAULT_MAX_ITERATIONS)]
    pub max_iterations: u32,

    /// Verbose logging
    #[clap(short, long)]
    pub verbose: bool,
}
