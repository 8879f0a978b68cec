use std::path::{Component, Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use log::{debug, warn};

use crate::collectors::template::expand_placeholders;
use crate::config::{CollectorConfig, HostConfig};
use crate::constants::{SMB_DEFAULT_PORT, UNIX_SHARE_ROOT_TEMPLATE, WINDOWS_SHARE_ROOT_TEMPLATE};
use crate::remote::{FetchStream, RemoteEntry, RemoteSession, RemoteStore};
use crate::security::normalize_remote_path;

/// Store reaching shares through the local filesystem.
///
/// Each share of a host maps to a directory given by a template with the
/// placeholders `{address}`, `{server}` and `{share}`. On Windows the default
/// template is a UNC path, so the OS SMB client handles the protocol; the
/// host credentials are registered with the network provider when the
/// session opens. Elsewhere the shares must already be mounted.
#[derive(Debug, Clone)]
pub struct MountedShareStore {
    share_root_template: String,
}

impl MountedShareStore {
    pub fn new(share_root_template: impl Into<String>) -> Self {
        Self {
            share_root_template: share_root_template.into(),
        }
    }

    /// Store using the platform's default share-root template
    pub fn platform_default() -> Self {
        if cfg!(target_os = "windows") {
            Self::new(WINDOWS_SHARE_ROOT_TEMPLATE)
        } else {
            Self::new(UNIX_SHARE_ROOT_TEMPLATE)
        }
    }

    pub fn from_config(config: &CollectorConfig) -> Self {
        match &config.share_root {
            Some(template) if !template.trim().is_empty() => Self::new(template.trim()),
            _ => Self::platform_default(),
        }
    }

    pub fn template(&self) -> &str {
        &self.share_root_template
    }

    /// Local directory of one share of `host`
    pub fn share_root(&self, host: &HostConfig, share: &str) -> PathBuf {
        PathBuf::from(expand_placeholders(
            &self.share_root_template,
            &[
                ("address", host.address.as_str()),
                ("server", host.server_name.as_str()),
                ("share", share),
            ],
        ))
    }
}

#[async_trait]
impl RemoteStore for MountedShareStore {
    async fn open(&self, host: &HostConfig, client_name: &str) -> Result<Box<dyn RemoteSession>> {
        debug!(
            "Opening mounted session to {} ({}) as client {}",
            host.server_name, host.address, client_name
        );

        if host.port != SMB_DEFAULT_PORT {
            warn!(
                "Host {} is configured for port {}; the mounted store always uses the OS default",
                host.address, host.port
            );
        }

        #[cfg(target_os = "windows")]
        let connection = super::windows::NetworkConnection::establish(host).await?;

        let mut shares = Vec::new();
        let mut last_error = None;

        for share in host.effective_shares() {
            let root = self.share_root(host, &share);
            match tokio::fs::canonicalize(&root).await {
                Ok(canonical) if canonical.is_dir() => {
                    debug!("Share {} of {} reachable at {}", share, host.address, root.display());
                    shares.push(MountedShare { name: share, root, canonical });
                }
                Ok(_) => last_error = Some(format!("{} is not a directory", root.display())),
                Err(e) => last_error = Some(format!("{}: {}", root.display(), e)),
            }
        }

        if shares.is_empty() {
            #[cfg(target_os = "windows")]
            if let Some(connection) = connection {
                if let Err(e) = connection.cancel().await {
                    debug!("Failed to release connection to {}: {}", host.address, e);
                }
            }

            bail!(
                "no share of {} is reachable ({})",
                host.address,
                last_error.unwrap_or_else(|| "no shares configured".to_string())
            );
        }

        Ok(Box::new(MountedSession {
            address: host.address.clone(),
            shares,
            #[cfg(target_os = "windows")]
            connection,
        }))
    }
}

struct MountedShare {
    name: String,
    root: PathBuf,
    canonical: PathBuf,
}

struct MountedSession {
    address: String,
    shares: Vec<MountedShare>,
    #[cfg(target_os = "windows")]
    connection: Option<super::windows::NetworkConnection>,
}

impl MountedSession {
    fn share(&self, name: &str) -> Result<&MountedShare> {
        self.shares
            .iter()
            .find(|s| s.name.eq_ignore_ascii_case(name))
            .ok_or_else(|| anyhow!("share {} is not available on {}", name, self.address))
    }

    fn local_path(&self, share: &str, path: &str) -> Result<PathBuf> {
        let share = self.share(share)?;
        let mut local = share.root.clone();

        if !path.trim_matches(|c| c == '/' || c == '\\').is_empty() {
            let normalized = normalize_remote_path(path)?;
            for segment in normalized.split('/') {
                local.push(segment);
            }
        }

        Ok(local)
    }
}

/// Share-relative form of a canonical path, if it lies inside the share.
fn share_relative(canonical_root: &Path, target: &Path) -> Option<String> {
    let relative = target.strip_prefix(canonical_root).ok()?;
    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            Component::Normal(name) => segments.push(name.to_string_lossy().to_string()),
            _ => return None,
        }
    }
    Some(segments.join("/"))
}

#[async_trait]
impl RemoteSession for MountedSession {
    async fn list_shares(&mut self) -> Result<Vec<String>> {
        Ok(self.shares.iter().map(|s| s.name.clone()).collect())
    }

    async fn list_entries(&mut self, share: &str, path: &str) -> Result<Vec<RemoteEntry>> {
        let dir = self.local_path(share, path)?;
        let canonical_root = self.share(share)?.canonical.clone();

        let mut reader = tokio::fs::read_dir(&dir)
            .await
            .context(format!("Failed to read directory: {}", dir.display()))?;

        let mut entries = Vec::new();
        while let Some(entry) = reader
            .next_entry()
            .await
            .context(format!("Failed to read directory entry in {}", dir.display()))?
        {
            let name = entry.file_name().to_string_lossy().to_string();
            if name == "." || name == ".." {
                continue;
            }

            let file_type = match entry.file_type().await {
                Ok(file_type) => file_type,
                Err(e) => {
                    debug!("Skipping {}: {}", entry.path().display(), e);
                    continue;
                }
            };

            if file_type.is_symlink() {
                let target_meta = tokio::fs::metadata(entry.path()).await.ok();
                let link_target = match tokio::fs::canonicalize(entry.path()).await {
                    Ok(target) => share_relative(&canonical_root, &target),
                    Err(_) => None,
                };
                entries.push(RemoteEntry {
                    name,
                    is_directory: target_meta.as_ref().map(|m| m.is_dir()).unwrap_or(false),
                    size_bytes: target_meta
                        .as_ref()
                        .filter(|m| m.is_file())
                        .map(|m| m.len())
                        .unwrap_or(0),
                    is_link: true,
                    link_target,
                });
            } else if file_type.is_dir() {
                entries.push(RemoteEntry::directory(&name));
            } else {
                let size_bytes = entry.metadata().await.map(|m| m.len()).unwrap_or(0);
                entries.push(RemoteEntry::file(&name, size_bytes));
            }
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn fetch(&mut self, share: &str, path: &str) -> Result<FetchStream> {
        let local = self.local_path(share, path)?;
        let file = tokio::fs::File::open(&local)
            .await
            .context(format!("Failed to open {}", local.display()))?;
        Ok(Box::new(file))
    }

    async fn close(&mut self) -> Result<()> {
        debug!("Closing mounted session to {}", self.address);

        #[cfg(target_os = "windows")]
        if let Some(connection) = self.connection.take() {
            connection.cancel().await?;
        }

        Ok(())
    }
}
