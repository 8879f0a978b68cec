//! Utility functions for reporting on a collection run.
//!
//! ## Writing a Run Summary
//!
//! ```no_run
//! use pst_collector::report::RunReport;
//! use pst_collector::utils::summary::write_run_summary;
//! use std::path::Path;
//!
//! # fn example() -> anyhow::Result<()> {
//! let report = RunReport::new();
//! write_run_summary(&report, "forensics01", Path::new("/evidence/collection_summary.json"))?;
//! # Ok(())
//! # }
//! ```

/// Run summary generation and reporting
pub mod summary;
