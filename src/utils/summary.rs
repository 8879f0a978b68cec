use std::path::Path;

use anyhow::{Context, Result};
use log::info;
use serde_json::json;

use crate::report::RunReport;

/// Create a JSON summary of a collection run.
///
/// The summary wraps the run report with the collecting machine's name, the
/// collector version and the local OS, which together document where and
/// how the archives were acquired.
///
/// # Arguments
///
/// * `report` - The finished run report
/// * `client_name` - Name the collector presented to the hosts
///
/// # Example Output
///
/// ```json
/// {
///   "run_id": "550e8400-e29b-41d4-a716-446655440000",
///   "client_name": "forensics01",
///   "started_at": "2024-01-15T14:30:52Z",
///   "files_collected": 3,
///   "hosts": [...]
/// }
/// ```
pub fn create_run_summary(report: &RunReport, client_name: &str) -> Result<String> {
    let hosts = serde_json::to_value(&report.hosts).context("Failed to serialize host reports")?;

    let summary = json!({
        "run_id": report.run_id,
        "client_name": client_name,
        "started_at": report.started_at,
        "finished_at": report.finished_at,
        "cancelled": report.cancelled,
        "os": std::env::consts::OS,
        "collector_version": env!("CARGO_PKG_VERSION"),
        "host_count": report.hosts.len(),
        "files_collected": report.files_collected(),
        "total_bytes_collected": report.total_bytes_collected,
        "error_count": report.error_count(),
        "hosts": hosts,
    });

    serde_json::to_string_pretty(&summary).context("Failed to serialize run summary to JSON")
}

/// Write the run summary to `path`, creating parent directories.
pub fn write_run_summary(report: &RunReport, client_name: &str, path: &Path) -> Result<()> {
    let summary = create_run_summary(report, client_name)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .context(format!("Failed to create directory {}", parent.display()))?;
    }

    std::fs::write(path, summary)
        .context(format!("Failed to write run summary to {}", path.display()))?;

    info!("Wrote run summary to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HostConfig;
    use crate::errors::CollectError;
    use crate::models::CollectedFile;
    use crate::report::{ErrorScope, HostReport, HostState};
    use serde_json::Value;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn sample_report() -> RunReport {
        let mut host = HostReport::new(&HostConfig::new("10.0.0.5", "WS01"));
        host.state = HostState::Closed;
        host.record_collected(CollectedFile {
            share_name: "C$".to_string(),
            remote_relative_path: "Users/alice/Documents/Outlook Files/Outlook.pst".to_string(),
            destination: PathBuf::from("/out/10.0.0.5/C$/Users/alice/Documents/Outlook Files/Outlook.pst"),
            bytes: 2048,
            collection_time: "2024-01-01T00:00:00Z".to_string(),
        });
        host.record_error(
            ErrorScope::Root {
                share: "C$".to_string(),
                path: "Users/alice/AppData/Local/Microsoft/Outlook".to_string(),
            },
            &CollectError::List {
                share: "C$".to_string(),
                path: "Users/alice/AppData/Local/Microsoft/Outlook".to_string(),
                reason: "not found".to_string(),
            },
        );

        let mut report = RunReport::new();
        report.push_host(host);
        report.finish();
        report
    }

    #[test]
    fn test_summary_fields() {
        let report = sample_report();
        let json: Value = serde_json::from_str(&create_run_summary(&report, "forensics01").unwrap()).unwrap();

        assert_eq!(json["run_id"], report.run_id);
        assert_eq!(json["client_name"], "forensics01");
        assert_eq!(json["files_collected"], 1);
        assert_eq!(json["total_bytes_collected"], 2048);
        assert_eq!(json["error_count"], 1);
        assert_eq!(json["cancelled"], false);
        assert!(json["collector_version"].is_string());
        assert!(json["finished_at"].is_string());

        let host = &json["hosts"][0];
        assert_eq!(host["address"], "10.0.0.5");
        assert_eq!(host["state"]["state"], "closed");
        assert_eq!(host["files"][0]["bytes"], 2048);
        assert_eq!(host["errors"][0]["kind"], "list");
        assert_eq!(host["errors"][0]["scope"]["level"], "root");
    }

    #[test]
    fn test_empty_report() {
        let report = RunReport::new();
        let json: Value = serde_json::from_str(&create_run_summary(&report, "x").unwrap()).unwrap();
        assert_eq!(json["hosts"].as_array().unwrap().len(), 0);
        assert!(json["finished_at"].is_null());
    }

    #[test]
    fn test_write_summary_creates_parents() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("reports").join("summary.json");

        write_run_summary(&sample_report(), "forensics01", &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains('\n'));
        assert!(content.contains("Outlook.pst"));
    }
}
