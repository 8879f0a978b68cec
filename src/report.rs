//! Run report built by the collection runner.
//!
//! The report is the only output of a run besides the files written to the
//! destination tree. Hosts appear in configured order; hosts never started
//! because the run was cancelled are absent.

use log::warn;
use serde::Serialize;
use uuid::Uuid;

use crate::config::HostConfig;
use crate::errors::{CollectError, ErrorKind};
use crate::models::CollectedFile;
use crate::security::scrub_credentials;

/// Stage at which a host failed terminally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum HostStage {
    Connect,
}

/// Per-host lifecycle: `Pending → SessionOpen → Scanning → Copying → Closed`,
/// or `Failed(Connect)` when no session could be opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "stage", rename_all = "snake_case")]
pub enum HostState {
    Pending,
    SessionOpen,
    Scanning,
    Copying,
    Closed,
    Failed(HostStage),
}

/// Narrowest context an error applies to. The host is implied by the
/// enclosing [`HostReport`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "level", rename_all = "snake_case")]
pub enum ErrorScope {
    Host,
    Share { share: String },
    User { user: String },
    Root { share: String, path: String },
    File { share: String, path: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReportedError {
    pub kind: ErrorKind,
    pub scope: ErrorScope,
    pub message: String,
}

impl ReportedError {
    pub fn new(scope: ErrorScope, error: &CollectError) -> Self {
        Self {
            kind: error.kind(),
            scope,
            message: scrub_credentials(&error.to_string()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct HostReport {
    pub address: String,
    pub server_name: String,
    pub state: HostState,
    pub files_collected: usize,
    pub bytes_collected: u64,
    pub files: Vec<CollectedFile>,
    pub errors: Vec<ReportedError>,
}

impl HostReport {
    pub fn new(host: &HostConfig) -> Self {
        Self {
            address: host.address.clone(),
            server_name: host.server_name.clone(),
            state: HostState::Pending,
            files_collected: 0,
            bytes_collected: 0,
            files: Vec::new(),
            errors: Vec::new(),
        }
    }

    /// Append an error at the given scope and log it.
    pub fn record_error(&mut self, scope: ErrorScope, error: &CollectError) {
        let reported = ReportedError::new(scope, error);
        warn!("[{}] {}", self.address, reported.message);
        self.errors.push(reported);
    }

    pub fn record_collected(&mut self, file: CollectedFile) {
        self.files_collected += 1;
        self.bytes_collected += file.bytes;
        self.files.push(file);
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub hosts: Vec<HostReport>,
    pub total_bytes_collected: u64,
    pub cancelled: bool,
}

impl RunReport {
    pub fn new() -> Self {
        Self {
            run_id: Uuid::new_v4().to_string(),
            started_at: chrono::Utc::now().to_rfc3339(),
            finished_at: None,
            hosts: Vec::new(),
            total_bytes_collected: 0,
            cancelled: false,
        }
    }

    pub fn push_host(&mut self, host: HostReport) {
        self.total_bytes_collected += host.bytes_collected;
        self.hosts.push(host);
    }

    pub fn finish(&mut self) {
        self.finished_at = Some(chrono::Utc::now().to_rfc3339());
    }

    /// Look up the report of one host by address (case-insensitive).
    pub fn host(&self, address: &str) -> Option<&HostReport> {
        self.hosts
            .iter()
            .find(|h| h.address.eq_ignore_ascii_case(address))
    }

    pub fn files_collected(&self) -> usize {
        self.hosts.iter().map(|h| h.files_collected).sum()
    }

    pub fn error_count(&self) -> usize {
        self.hosts.iter().map(|h| h.errors.len()).sum()
    }
}

impl Default for RunReport {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn host() -> HostConfig {
        HostConfig::new("10.0.0.5", "WS01")
    }

    #[test]
    fn test_host_report_accumulates() {
        let mut report = HostReport::new(&host());
        report.record_collected(CollectedFile {
            share_name: "C$".to_string(),
            remote_relative_path: "Users/a/x.pst".to_string(),
            destination: PathBuf::from("/out/10.0.0.5/C$/Users/a/x.pst"),
            bytes: 100,
            collection_time: "2024-01-01T00:00:00Z".to_string(),
        });
        report.record_error(
            ErrorScope::Host,
            &CollectError::Connect {
                host: "10.0.0.5".to_string(),
                reason: "refused".to_string(),
            },
        );

        assert_eq!(report.files_collected, 1);
        assert_eq!(report.bytes_collected, 100);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].kind, ErrorKind::Connect);

        let mut run = RunReport::new();
        run.push_host(report);
        assert_eq!(run.total_bytes_collected, 100);
        assert!(run.host("10.0.0.5").is_some());
        assert!(run.host("10.0.0.6").is_none());
        assert_eq!(run.error_count(), 1);
    }

    #[test]
    fn test_reported_error_scrubs_password() {
        let err = CollectError::Connect {
            host: "ws01".to_string(),
            reason: "login failed with password=hunter2".to_string(),
        };
        let reported = ReportedError::new(ErrorScope::Host, &err);
        assert!(!reported.message.contains("hunter2"));
    }

    #[test]
    fn test_state_serialization() {
        let json = serde_json::to_value(HostState::Failed(HostStage::Connect)).unwrap();
        assert_eq!(json["state"], "failed");
        assert_eq!(json["stage"], "connect");
        let json = serde_json::to_value(HostState::Closed).unwrap();
        assert_eq!(json["state"], "closed");
    }
}
