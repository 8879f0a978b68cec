use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use futures::future;
use log::{debug, info, warn};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;

use crate::collectors::planner::{HostScanPlanner, ScanSettings};
use crate::config::{CollectorConfig, HostConfig, TimeoutConfig};
use crate::constants::COPY_BUFFER_SIZE;
use crate::errors::CollectError;
use crate::models::{CollectedFile, DiscoveredFile};
use crate::remote::{FetchStream, RemoteSession, RemoteStore};
use crate::report::{ErrorScope, HostReport, HostStage, HostState, RunReport};
use crate::security::{partial_path, scrub_secret, DestinationMapper};

/// Result of copying one file that did not fail
enum CopyOutcome {
    Copied(u64),
    Cancelled,
}

/// Drives discovery and copying across every configured host.
pub struct CollectionRunner {
    store: Arc<dyn RemoteStore>,
    cancel: CancellationToken,
}

impl CollectionRunner {
    pub fn new(store: Arc<dyn RemoteStore>) -> Self {
        Self {
            store,
            cancel: CancellationToken::new(),
        }
    }

    /// Use an externally owned cancellation token.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Collect archives from every host into `destination`.
    ///
    /// Failures are recorded in the returned report at the narrowest scope
    /// they apply to; nothing here aborts the run. Hosts run up to
    /// `max_concurrent_hosts` at a time and are reported in configured order.
    pub async fn run(&self, config: &CollectorConfig, destination: &Path) -> RunReport {
        let mut report = RunReport::new();
        let settings = ScanSettings::from_config(config);
        let client_name = config.client_name();
        let mapper = DestinationMapper::new(destination);
        let semaphore = Arc::new(Semaphore::new(config.max_concurrent_hosts.max(1)));

        info!(
            "Starting run {} over {} host(s) into {} as {}",
            report.run_id,
            config.hosts.len(),
            destination.display(),
            client_name
        );

        let tasks = config.hosts.iter().map(|host| {
            let semaphore = Arc::clone(&semaphore);
            let settings = &settings;
            let mapper = &mapper;
            let client_name = client_name.as_str();

            async move {
                let _permit = semaphore.acquire().await.ok()?;
                if self.cancel.is_cancelled() {
                    debug!("Run cancelled; not starting {}", host.address);
                    return None;
                }
                Some(
                    self.collect_host(host, settings, &config.timeouts, client_name, mapper)
                        .await,
                )
            }
        });

        for host_report in future::join_all(tasks).await.into_iter().flatten() {
            report.push_host(host_report);
        }

        report.cancelled = self.cancel.is_cancelled();
        report.finish();

        info!(
            "Run {} finished: {} file(s), {} byte(s), {} error(s){}",
            report.run_id,
            report.files_collected(),
            report.total_bytes_collected,
            report.error_count(),
            if report.cancelled { " (cancelled)" } else { "" }
        );
        report
    }

    async fn collect_host(
        &self,
        host: &HostConfig,
        settings: &ScanSettings,
        timeouts: &TimeoutConfig,
        client_name: &str,
        mapper: &DestinationMapper,
    ) -> HostReport {
        let mut report = HostReport::new(host);
        info!("Connecting to {} ({})", host.server_name, host.address);

        let opened = tokio::time::timeout(timeouts.connect(), self.store.open(host, client_name)).await;
        let mut session = match opened {
            Ok(Ok(session)) => session,
            Ok(Err(e)) => return self.connect_failed(host, report, format!("{:#}", e)),
            Err(_) => {
                let reason = format!("timed out after {}s", timeouts.connect().as_secs_f64());
                return self.connect_failed(host, report, reason);
            }
        };
        self.transition(&mut report, HostState::SessionOpen);

        self.transition(&mut report, HostState::Scanning);
        let scan = HostScanPlanner::new(host, settings)
            .with_cancellation(self.cancel.clone())
            .scan(session.as_mut())
            .await;
        for (scope, error) in scan.errors {
            report.record_error(scope, &error);
        }

        self.transition(&mut report, HostState::Copying);
        for file in &scan.files {
            if self.cancel.is_cancelled() {
                info!("Cancelled; stopping copies from {}", host.address);
                break;
            }
            self.collect_file(session.as_mut(), file, mapper, timeouts.fetch(), &mut report)
                .await;
        }

        match tokio::time::timeout(timeouts.connect(), session.close()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Failed to close session to {}: {:#}", host.address, e),
            Err(_) => warn!("Timed out closing session to {}", host.address),
        }
        self.transition(&mut report, HostState::Closed);

        info!(
            "Finished {}: {} file(s), {} byte(s), {} error(s)",
            host.address,
            report.files_collected,
            report.bytes_collected,
            report.errors.len()
        );
        report
    }

    fn connect_failed(&self, host: &HostConfig, mut report: HostReport, reason: String) -> HostReport {
        let error = CollectError::Connect {
            host: host.address.clone(),
            reason: scrub_secret(&reason, &host.credentials.password),
        };
        report.record_error(ErrorScope::Host, &error);
        self.transition(&mut report, HostState::Failed(HostStage::Connect));
        report
    }

    fn transition(&self, report: &mut HostReport, state: HostState) {
        debug!("[{}] {:?} -> {:?}", report.address, report.state, state);
        report.state = state;
    }

    async fn collect_file(
        &self,
        session: &mut dyn RemoteSession,
        file: &DiscoveredFile,
        mapper: &DestinationMapper,
        idle_timeout: Duration,
        report: &mut HostReport,
    ) {
        let scope = ErrorScope::File {
            share: file.share_name.clone(),
            path: file.remote_relative_path.clone(),
        };

        let destination = match mapper.map(&file.host_address, &file.share_name, &file.remote_relative_path) {
            Ok(destination) => destination,
            Err(e) => {
                report.record_error(scope, &e);
                return;
            }
        };

        match self.copy_file(session, file, &destination, idle_timeout).await {
            Ok(CopyOutcome::Copied(bytes)) => {
                debug!(
                    "Copied {}:{} to {} ({} bytes)",
                    file.share_name,
                    file.remote_relative_path,
                    destination.display(),
                    bytes
                );
                report.record_collected(CollectedFile {
                    share_name: file.share_name.clone(),
                    remote_relative_path: file.remote_relative_path.clone(),
                    destination,
                    bytes,
                    collection_time: chrono::Utc::now().to_rfc3339(),
                });
            }
            Ok(CopyOutcome::Cancelled) => {
                debug!("Copy of {}:{} cancelled", file.share_name, file.remote_relative_path);
            }
            Err(e) => report.record_error(scope, &e),
        }
    }

    /// Stream one remote file into `<destination>.partial`, then rename it
    /// over the destination. The partial file never survives a failure
    /// unless its removal fails too, which is reported.
    async fn copy_file(
        &self,
        session: &mut dyn RemoteSession,
        file: &DiscoveredFile,
        destination: &Path,
        idle_timeout: Duration,
    ) -> Result<CopyOutcome, CollectError> {
        let fetch_error = |reason: String| CollectError::Fetch {
            share: file.share_name.clone(),
            path: file.remote_relative_path.clone(),
            reason,
        };

        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| fetch_error(format!("failed to create {}: {}", parent.display(), e)))?;
        }

        let opened = tokio::time::timeout(
            idle_timeout,
            session.fetch(&file.share_name, &file.remote_relative_path),
        )
        .await;
        let mut stream = match opened {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(fetch_error(format!("{:#}", e))),
            Err(_) => {
                return Err(fetch_error(format!(
                    "timed out opening after {}s",
                    idle_timeout.as_secs_f64()
                )))
            }
        };

        let partial = partial_path(destination);
        let streamed = self.stream_to_file(&mut stream, &partial, idle_timeout).await;
        drop(stream);

        let failure = match streamed {
            Ok(Some(bytes)) => match tokio::fs::rename(&partial, destination).await {
                Ok(()) => return Ok(CopyOutcome::Copied(bytes)),
                Err(e) => Some(format!("failed to move into place: {}", e)),
            },
            Ok(None) => None,
            Err(reason) => Some(reason),
        };

        let cleanup = remove_partial(&partial).await;
        match (failure, cleanup) {
            (None, Ok(())) => Ok(CopyOutcome::Cancelled),
            (None, Err(leftover)) => Err(fetch_error(format!("cancelled; {}", leftover))),
            (Some(reason), Ok(())) => Err(fetch_error(reason)),
            (Some(reason), Err(leftover)) => Err(fetch_error(format!("{}; {}", reason, leftover))),
        }
    }

    /// Copy the stream in chunks. `Ok(None)` means the run was cancelled.
    async fn stream_to_file(
        &self,
        stream: &mut FetchStream,
        partial: &Path,
        idle_timeout: Duration,
    ) -> Result<Option<u64>, String> {
        let mut output = tokio::fs::File::create(partial)
            .await
            .map_err(|e| format!("failed to create {}: {}", partial.display(), e))?;

        let mut buffer = vec![0u8; COPY_BUFFER_SIZE];
        let mut total: u64 = 0;

        loop {
            let read = tokio::select! {
                _ = self.cancel.cancelled() => return Ok(None),
                read = tokio::time::timeout(idle_timeout, stream.read(&mut buffer)) => read,
            };

            let count = match read {
                Ok(Ok(0)) => break,
                Ok(Ok(count)) => count,
                Ok(Err(e)) => return Err(format!("read failed after {} bytes: {}", total, e)),
                Err(_) => {
                    return Err(format!(
                        "no data received for {}s after {} bytes",
                        idle_timeout.as_secs_f64(),
                        total
                    ))
                }
            };

            output
                .write_all(&buffer[..count])
                .await
                .map_err(|e| format!("failed to write {}: {}", partial.display(), e))?;
            total += count as u64;
        }

        output
            .flush()
            .await
            .map_err(|e| format!("failed to flush {}: {}", partial.display(), e))?;

        Ok(Some(total))
    }
}

/// Remove an in-flight file; a missing file is fine.
async fn remove_partial(partial: &Path) -> Result<(), String> {
    match tokio::fs::remove_file(partial).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => {
            warn!("Failed to remove partial file {}: {}", partial.display(), e);
            Err(format!("partial file {} left behind: {}", partial.display(), e))
        }
    }
}
