//! Remote file store capability.
//!
//! The collector never speaks the file-sharing protocol itself. A
//! [`RemoteStore`] opens one [`RemoteSession`] per host; the session lists
//! shares and directories and hands out byte streams for files. Sessions are
//! never shared between hosts or between concurrent operations.
//!
//! Implementations:
//!
//! - [`mounted::MountedShareStore`]: shares reached through the local
//!   filesystem (UNC paths on Windows, pre-mounted shares elsewhere)
//! - [`memory::MemoryStore`]: in-memory hosts for tests and dry runs

use anyhow::Result;
use async_trait::async_trait;
use tokio::io::AsyncRead;

use crate::config::HostConfig;

pub mod memory;
pub mod mounted;

#[cfg(target_os = "windows")]
mod windows;

/// Byte stream of one remote file.
pub type FetchStream = Box<dyn AsyncRead + Send + Unpin>;

/// One item of a directory listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub name: String,
    pub is_directory: bool,
    pub size_bytes: u64,
    /// Symlink, junction or other reparse point
    pub is_link: bool,
    /// Share-relative target of a link, when it resolves inside the share
    pub link_target: Option<String>,
}

impl RemoteEntry {
    pub fn file(name: &str, size_bytes: u64) -> Self {
        Self {
            name: name.to_string(),
            is_directory: false,
            size_bytes,
            is_link: false,
            link_target: None,
        }
    }

    pub fn directory(name: &str) -> Self {
        Self {
            name: name.to_string(),
            is_directory: true,
            size_bytes: 0,
            is_link: false,
            link_target: None,
        }
    }

    pub fn directory_link(name: &str, target: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            is_directory: true,
            size_bytes: 0,
            is_link: true,
            link_target: target.map(|t| t.to_string()),
        }
    }
}

/// Opens sessions to hosts.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Authenticate against `host` as `client_name`.
    async fn open(&self, host: &HostConfig, client_name: &str) -> Result<Box<dyn RemoteSession>>;
}

/// An authenticated connection to one host.
///
/// Paths are share-relative with `/` separators; an empty path is the share
/// root.
#[async_trait]
pub trait RemoteSession: Send {
    async fn list_shares(&mut self) -> Result<Vec<String>>;

    /// Entries of one directory in a stable order, without `.` and `..`.
    async fn list_entries(&mut self, share: &str, path: &str) -> Result<Vec<RemoteEntry>>;

    async fn fetch(&mut self, share: &str, path: &str) -> Result<FetchStream>;

    async fn close(&mut self) -> Result<()>;
}
