use std::path::PathBuf;

use serde::{Serialize, Deserialize};

/// An archive file found on a remote share.
///
/// Identity is (host_address, share_name, remote_relative_path); the planner
/// never yields two files with the same identity in one run.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredFile {
    pub host_address: String,
    pub share_name: String,
    /// Share-relative path with `/` separators and no leading separator
    pub remote_relative_path: String,
    pub size_bytes: u64,
}

/// A file that was copied to the destination tree.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct CollectedFile {
    pub share_name: String,
    pub remote_relative_path: String,
    pub destination: PathBuf,
    pub bytes: u64,
    pub collection_time: String,
}
