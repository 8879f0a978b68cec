//! Discovery and collection of mail archives from remote hosts.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │           CollectionRunner              │
//! │   hosts → session → scan → copy         │
//! ├─────────────────────────────────────────┤
//! │           HostScanPlanner               │
//! │   shares × users × search roots         │
//! │  ┌──────────────┬──────────────────┐    │
//! │  │  template    │ DestinationMapper│    │
//! │  └──────────────┴──────────────────┘    │
//! ├─────────────────────────────────────────┤
//! │            RemoteStore                  │
//! │  ┌──────────────┬──────────────────┐    │
//! │  │   Mounted    │     Memory       │    │
//! │  └──────────────┴──────────────────┘    │
//! └─────────────────────────────────────────┘
//! ```
//!
//! ## Usage Example
//!
//! ```no_run
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! use pst_collector::collectors::runner::CollectionRunner;
//! use pst_collector::config::load_config;
//! use pst_collector::remote::mounted::MountedShareStore;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = load_config(Path::new("hosts.yaml"))?;
//! let store = Arc::new(MountedShareStore::from_config(&config));
//!
//! let report = CollectionRunner::new(store)
//!     .run(&config, Path::new("/evidence/pst"))
//!     .await;
//!
//! println!("Collected {} archives", report.files_collected());
//! # Ok(())
//! # }
//! ```

/// Per-host discovery of archive files
pub mod planner;

/// Orchestration across hosts, copying and reporting
pub mod runner;

/// Search-root template expansion
pub mod template;
