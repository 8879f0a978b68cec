//! # pst-collector
//!
//! Collects Outlook data files (`.pst`, `.ost`) from Windows hosts over SMB
//! administrative shares into a local evidence tree.
//!
//! ## Overview
//!
//! For every configured host the collector opens one session, resolves each
//! user's search roots (`Users/{user}/...`), walks them for archive files and
//! copies every match to `<destination>/<host>/<share>/<remote path>`. Failures
//! are recorded at the narrowest scope they apply to (host, share, user, search
//! root or file) and never stop the run. The result is a [`report::RunReport`],
//! optionally written as `collection_summary.json`.
//!
//! ## Features
//!
//! - **Scoped failure isolation**: one unreachable host or unreadable folder
//!   never hides results from the rest
//! - **Bounded waits**: connect, list and fetch calls all carry timeouts
//! - **Safe destinations**: remote names are validated so nothing is written
//!   outside the destination root
//! - **Atomic copies**: files land under a `.partial` name and are renamed on
//!   completion
//! - **Cooperative cancellation**: Ctrl-C stops between chunks and cleans up
//! - **reduce-pdf**: a companion tool that shrinks PDFs to a target size
//!
//! ## Usage
//!
//! ```no_run
//! use pst_collector::collectors::runner::CollectionRunner;
//! use pst_collector::config::load_config;
//! use pst_collector::remote::mounted::MountedShareStore;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = load_config(Path::new("pst_collector.yaml"))?;
//! let store = MountedShareStore::from_config(&config);
//!
//! let report = CollectionRunner::new(Arc::new(store))
//!     .run(&config, Path::new("/evidence/pst"))
//!     .await;
//!
//! println!("Collected {} file(s)", report.files_collected());
//! # Ok(())
//! # }
//! ```
//!
//! ## Module Organization
//!
//! - [`cli`]: Command-line interface definitions and argument parsing
//! - [`collectors`]: Discovery planning and the collection runner
//! - [`config`]: Host configuration loading and validation
//! - [`remote`]: Remote store abstraction and its implementations
//! - [`report`]: Run and host reports
//! - [`security`]: Path validation and credential scrubbing
//! - [`pdf`]: Size-targeted PDF reduction
//! - [`utils`]: Run summary output
//!
//! ## Safety
//!
//! `unsafe` is confined to the Windows network connection calls in
//! `remote::windows`.

/// Command-line interface definitions and argument parsing
pub mod cli;

/// Core data models
pub mod models;

/// Discovery planning and collection
pub mod collectors;

/// Run summary output
pub mod utils;

/// Configuration loading and validation
pub mod config;

/// Application constants
pub mod constants;

/// Error taxonomy shared by discovery and collection
pub mod errors;

/// Size-targeted PDF reduction
pub mod pdf;

/// Remote store abstraction
pub mod remote;

/// Run reports
pub mod report;

/// Security utilities for path validation and credential protection
pub mod security;

/// Test utilities and helpers
#[cfg(test)]
pub mod test_utils;
