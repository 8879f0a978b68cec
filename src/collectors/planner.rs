use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use anyhow::Result;
use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;

use crate::collectors::template;
use crate::config::{CollectorConfig, HostConfig};
use crate::constants::DEFAULT_LIST_TIMEOUT_SECS;
use crate::errors::CollectError;
use crate::models::DiscoveredFile;
use crate::remote::{RemoteEntry, RemoteSession};
use crate::report::ErrorScope;
use crate::security::normalize_remote_path;

/// Discovery settings shared by every host of a run.
#[derive(Debug, Clone)]
pub struct ScanSettings {
    pub default_search_roots: Vec<String>,
    /// Lower-case extensions without a leading dot
    pub extensions: Vec<String>,
    /// Directory levels below a search root to descend; `None` is unlimited
    pub max_depth: Option<usize>,
    pub follow_links: bool,
    pub list_timeout: Duration,
}

impl Default for ScanSettings {
    fn default() -> Self {
        let config = CollectorConfig::default();
        Self {
            default_search_roots: config.default_search_roots,
            extensions: config.extensions,
            max_depth: None,
            follow_links: false,
            list_timeout: Duration::from_secs(DEFAULT_LIST_TIMEOUT_SECS),
        }
    }
}

impl ScanSettings {
    pub fn from_config(config: &CollectorConfig) -> Self {
        Self {
            default_search_roots: config.default_search_roots.clone(),
            extensions: config
                .extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            max_depth: config.max_depth,
            follow_links: config.follow_links,
            list_timeout: config.timeouts.list(),
        }
    }

    /// Whether a file name carries one of the collected extensions
    pub fn matches_extension(&self, file_name: &str) -> bool {
        match file_name.rsplit_once('.') {
            Some((_, ext)) => self
                .extensions
                .iter()
                .any(|allowed| allowed.eq_ignore_ascii_case(ext)),
            None => false,
        }
    }
}

/// Outcome of scanning one host: files in discovery order plus every
/// non-fatal error met on the way.
#[derive(Debug, Default)]
pub struct HostScan {
    pub files: Vec<DiscoveredFile>,
    pub errors: Vec<(ErrorScope, CollectError)>,
}

/// A search root resolved for one user
struct ResolvedRoot {
    user: String,
    path: String,
}

/// Directory being enumerated: listed path, cycle key, depth, pending entries
struct Frame {
    path: String,
    key: String,
    depth: usize,
    entries: std::vec::IntoIter<RemoteEntry>,
}

/// Finds the archive files of one host through an open session.
pub struct HostScanPlanner<'a> {
    host: &'a HostConfig,
    settings: &'a ScanSettings,
    cancel: Option<CancellationToken>,
}

impl<'a> HostScanPlanner<'a> {
    pub fn new(host: &'a HostConfig, settings: &'a ScanSettings) -> Self {
        Self {
            host,
            settings,
            cancel: None,
        }
    }

    /// Stop descending as soon as `token` is cancelled.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    fn cancelled(&self) -> bool {
        self.cancel.as_ref().map(|t| t.is_cancelled()).unwrap_or(false)
    }

    /// Enumerate shares, users and search roots, depth-first in listing
    /// order. The first occurrence of a (share, path) pair wins.
    pub async fn scan(&self, session: &mut dyn RemoteSession) -> HostScan {
        let mut scan = HostScan::default();

        if self.host.users.is_empty() {
            warn!("No users configured for {}; nothing to scan", self.host.address);
            return scan;
        }

        let roots = self.resolve_roots(&mut scan);
        let shares = self.available_shares(session, &mut scan).await;
        let mut seen = HashSet::new();

        for share in &shares {
            for root in &roots {
                if self.cancelled() {
                    debug!("Scan of {} cancelled", self.host.address);
                    return scan;
                }
                debug!(
                    "Scanning {}:{}/{} for user {}",
                    self.host.address, share, root.path, root.user
                );
                self.scan_root(session, share, &root.path, &mut seen, &mut scan).await;
            }
        }

        info!(
            "Discovered {} file(s) on {} ({} error(s))",
            scan.files.len(),
            self.host.address,
            scan.errors.len()
        );
        scan
    }

    /// Resolve every user's templates once, in user then template order.
    fn resolve_roots(&self, scan: &mut HostScan) -> Vec<ResolvedRoot> {
        let mut roots = Vec::new();

        for user in &self.host.users {
            let templates = user.search_root_templates(&self.settings.default_search_roots);
            for template in templates {
                let resolved = template::resolve(template, &user.username)
                    .and_then(|path| normalize_remote_path(&path));
                match resolved {
                    Ok(path) => roots.push(ResolvedRoot {
                        user: user.username.clone(),
                        path,
                    }),
                    Err(e) => scan.errors.push((
                        ErrorScope::User {
                            user: user.username.clone(),
                        },
                        e,
                    )),
                }
            }
        }

        roots
    }

    /// Configured shares, minus those a successful share listing lacks.
    async fn available_shares(&self, session: &mut dyn RemoteSession, scan: &mut HostScan) -> Vec<String> {
        let configured = self.host.effective_shares();

        let listed = match self.with_timeout(session.list_shares()).await {
            Ok(listed) => listed,
            Err(reason) => {
                debug!(
                    "Share listing on {} unavailable ({}); scanning configured shares",
                    self.host.address, reason
                );
                return configured;
            }
        };

        configured
            .into_iter()
            .filter(|share| {
                let offered = listed.iter().any(|l| l.eq_ignore_ascii_case(share));
                if !offered {
                    scan.errors.push((
                        ErrorScope::Share { share: share.clone() },
                        CollectError::List {
                            share: share.clone(),
                            path: String::new(),
                            reason: "share is not available on this host".to_string(),
                        },
                    ));
                }
                offered
            })
            .collect()
    }

    async fn scan_root(
        &self,
        session: &mut dyn RemoteSession,
        share: &str,
        root: &str,
        seen: &mut HashSet<(String, String)>,
        scan: &mut HostScan,
    ) {
        let root_key = root.to_ascii_lowercase();
        let entries = match self.list(session, share, root).await {
            Ok(entries) => entries,
            Err(e) => {
                scan.errors.push((
                    ErrorScope::Root {
                        share: share.to_string(),
                        path: root.to_string(),
                    },
                    e,
                ));
                return;
            }
        };

        let mut visited = HashSet::new();
        visited.insert(root_key.clone());

        let mut stack = vec![Frame {
            path: root.to_string(),
            key: root_key,
            depth: 0,
            entries: entries.into_iter(),
        }];

        while let Some(frame) = stack.last_mut() {
            let Some(entry) = frame.entries.next() else {
                stack.pop();
                continue;
            };
            let (parent, parent_key, depth) = (frame.path.clone(), frame.key.clone(), frame.depth);

            if entry.name.is_empty()
                || entry.name == "."
                || entry.name == ".."
                || entry.name.contains(|c| c == '/' || c == '\\')
            {
                debug!("Skipping entry {:?} in {}:{}", entry.name, share, parent);
                continue;
            }

            let path = format!("{}/{}", parent, entry.name);

            if entry.is_link && !self.settings.follow_links {
                debug!("Not following link {}:{}", share, path);
                continue;
            }

            if entry.is_directory {
                if let Some(max_depth) = self.settings.max_depth {
                    if depth >= max_depth {
                        debug!("Depth limit reached at {}:{}", share, path);
                        continue;
                    }
                }

                let key = if entry.is_link {
                    match &entry.link_target {
                        Some(target) => target.to_ascii_lowercase(),
                        None => {
                            debug!("Link {}:{} has no resolvable target", share, path);
                            continue;
                        }
                    }
                } else {
                    format!("{}/{}", parent_key, entry.name.to_ascii_lowercase())
                };

                if !visited.insert(key.clone()) {
                    debug!("Already visited {}:{}; skipping", share, path);
                    continue;
                }

                if self.cancelled() {
                    return;
                }

                match self.list(session, share, &path).await {
                    Ok(children) => stack.push(Frame {
                        path,
                        key,
                        depth: depth + 1,
                        entries: children.into_iter(),
                    }),
                    Err(e) => scan.errors.push((
                        ErrorScope::Root {
                            share: share.to_string(),
                            path,
                        },
                        e,
                    )),
                }
                continue;
            }

            if !self.settings.matches_extension(&entry.name) {
                continue;
            }

            if !seen.insert((share.to_ascii_lowercase(), path.to_ascii_lowercase())) {
                debug!("Duplicate {}:{}; keeping first occurrence", share, path);
                continue;
            }

            debug!("Found {}:{} ({} bytes)", share, path, entry.size_bytes);
            scan.files.push(DiscoveredFile {
                host_address: self.host.address.clone(),
                share_name: share.to_string(),
                remote_relative_path: path,
                size_bytes: entry.size_bytes,
            });
        }
    }

    async fn list(&self, session: &mut dyn RemoteSession, share: &str, path: &str) -> Result<Vec<RemoteEntry>, CollectError> {
        self.with_timeout(session.list_entries(share, path))
            .await
            .map_err(|reason| CollectError::List {
                share: share.to_string(),
                path: path.to_string(),
                reason,
            })
    }

    async fn with_timeout<T>(&self, call: impl Future<Output = Result<T>>) -> Result<T, String> {
        match tokio::time::timeout(self.settings.list_timeout, call).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(format!("{:#}", e)),
            Err(_) => Err(format!(
                "timed out after {}s",
                self.settings.list_timeout.as_secs_f64()
            )),
        }
    }
}
