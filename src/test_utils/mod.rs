//! Test utilities for pst-collector
//!
//! Shared builders for configurations and in-memory hosts used by the unit
//! tests across modules.

#![cfg(test)]

use crate::config::{CollectorConfig, HostConfig, UserConfig};
use crate::remote::memory::MemoryStore;

pub const OUTLOOK_ROOT: &str = "Users/{user}/AppData/Local/Microsoft/Outlook";
pub const DOCUMENTS_ROOT: &str = "Users/{user}/Documents/Outlook Files";

/// Configuration with a fixed client name and the given hosts
pub fn collector_config(hosts: Vec<HostConfig>) -> CollectorConfig {
    CollectorConfig {
        client_name: Some("tester".to_string()),
        hosts,
        ..Default::default()
    }
}

/// Host with one user, `alice`, searching only `Mail`
pub fn mail_host(address: &str) -> HostConfig {
    HostConfig::new(address, &address.to_uppercase())
        .with_user(UserConfig::new("alice").with_search_roots(&["Mail"]))
}

/// Host with one user on the default search roots
pub fn default_roots_host(address: &str, user: &str) -> HostConfig {
    HostConfig::new(address, &address.to_uppercase()).with_user(UserConfig::new(user))
}

/// In-memory host laid out like a typical workstation: an `Outlook.pst` of
/// `size` bytes under Documents, an unrelated text file next to it and an
/// empty AppData Outlook folder.
pub fn outlook_workstation(store: &mut MemoryStore, address: &str, user: &str, size: usize) {
    let documents = DOCUMENTS_ROOT.replace("{user}", user);
    store
        .add_file(address, "C$", &format!("{}/Outlook.pst", documents), vec![0x21u8; size])
        .add_file(address, "C$", &format!("{}/notes.txt", documents), b"not an archive".to_vec())
        .add_dir(address, "C$", &OUTLOOK_ROOT.replace("{user}", user));
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::RemoteStore;

    #[tokio::test]
    async fn test_outlook_workstation_layout() {
        let mut store = MemoryStore::new();
        outlook_workstation(&mut store, "ws01", "alice", 16);

        let host = default_roots_host("ws01", "alice");
        let mut session = store.open(&host, "tester").await.unwrap();
        let entries = session
            .list_entries("C$", "Users/alice/Documents/Outlook Files")
            .await
            .unwrap();

        let names: Vec<&str> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Outlook.pst", "notes.txt"]);
        assert_eq!(entries[0].size_bytes, 16);
    }

    #[test]
    fn test_collector_config_validates() {
        let config = collector_config(vec![mail_host("ws01"), mail_host("ws02")]);
        assert!(config.validate().is_ok());
        assert_eq!(config.client_name(), "tester");
    }
}
