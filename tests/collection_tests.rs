//! Integration tests for end-to-end collection runs against in-memory hosts.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tempfile::TempDir;

use pst_collector::collectors::runner::CollectionRunner;
use pst_collector::config::{CollectorConfig, HostConfig, UserConfig};
use pst_collector::errors::ErrorKind;
use pst_collector::remote::memory::MemoryStore;
use pst_collector::report::{ErrorScope, HostStage, HostState};
use pst_collector::utils::summary::write_run_summary;

const DOCUMENTS: &str = "Users/alice/Documents/Outlook Files";
const APPDATA: &str = "Users/alice/AppData/Local/Microsoft/Outlook";

fn config(hosts: Vec<HostConfig>) -> CollectorConfig {
    CollectorConfig {
        client_name: Some("forensics01".to_string()),
        hosts,
        ..Default::default()
    }
}

fn alice(address: &str) -> HostConfig {
    HostConfig::new(address, &address.to_uppercase()).with_user(UserConfig::new("alice"))
}

fn workstation(store: &mut MemoryStore, address: &str) {
    store
        .add_file(address, "C$", &format!("{}/Outlook.pst", DOCUMENTS), vec![7u8; 2048])
        .add_file(address, "C$", &format!("{}/readme.txt", DOCUMENTS), b"hello".to_vec())
        .add_dir(address, "C$", APPDATA);
}

/// One user, default roots, one archive: it lands at the mirrored path.
#[tokio::test]
async fn test_single_archive_default_roots() -> Result<()> {
    let output = TempDir::new()?;
    let mut store = MemoryStore::new();
    workstation(&mut store, "10.0.0.5");

    let report = CollectionRunner::new(Arc::new(store))
        .run(&config(vec![alice("10.0.0.5")]), output.path())
        .await;

    assert!(!report.cancelled);
    assert_eq!(report.files_collected(), 1);
    assert_eq!(report.total_bytes_collected, 2048);
    assert_eq!(report.error_count(), 0);

    let collected = output
        .path()
        .join("10.0.0.5")
        .join("C$")
        .join("Users")
        .join("alice")
        .join("Documents")
        .join("Outlook Files")
        .join("Outlook.pst");
    assert_eq!(fs::read(&collected)?, vec![7u8; 2048]);
    assert!(!collected.with_file_name("readme.txt").exists());

    Ok(())
}

/// A host that cannot be reached does not affect the others.
#[tokio::test]
async fn test_unreachable_host_is_isolated() -> Result<()> {
    let output = TempDir::new()?;
    let mut store = MemoryStore::new();
    workstation(&mut store, "ws01");
    workstation(&mut store, "ws03");
    store.fail_connect("ws02", "connection refused");

    let report = CollectionRunner::new(Arc::new(store))
        .run(&config(vec![alice("ws01"), alice("ws02"), alice("ws03")]), output.path())
        .await;

    assert_eq!(report.hosts.len(), 3);
    assert_eq!(report.files_collected(), 2);

    let failed = report.host("ws02").expect("ws02 reported");
    assert_eq!(failed.state, HostState::Failed(HostStage::Connect));
    assert_eq!(failed.errors.len(), 1);
    assert_eq!(failed.errors[0].kind, ErrorKind::Connect);
    assert_eq!(failed.errors[0].scope, ErrorScope::Host);
    assert!(!output.path().join("ws02").exists());

    for address in ["ws01", "ws03"] {
        let host = report.host(address).expect("host reported");
        assert_eq!(host.state, HostState::Closed);
        assert_eq!(host.files_collected, 1);
    }

    Ok(())
}

/// A missing search root is recorded against that root only.
#[tokio::test]
async fn test_missing_root_is_root_scoped() -> Result<()> {
    let output = TempDir::new()?;
    let mut store = MemoryStore::new();
    store.add_file("ws01", "C$", &format!("{}/Outlook.pst", DOCUMENTS), vec![1u8; 32]);

    let report = CollectionRunner::new(Arc::new(store))
        .run(&config(vec![alice("ws01")]), output.path())
        .await;

    let host = report.host("ws01").expect("ws01 reported");
    assert_eq!(host.files_collected, 1);
    assert_eq!(host.errors.len(), 1);
    assert_eq!(host.errors[0].kind, ErrorKind::List);
    assert_eq!(
        host.errors[0].scope,
        ErrorScope::Root {
            share: "C$".to_string(),
            path: APPDATA.to_string()
        }
    );

    Ok(())
}

/// Archives found under two overlapping roots are copied once.
#[tokio::test]
async fn test_overlapping_roots_copy_once() -> Result<()> {
    let output = TempDir::new()?;
    let mut store = MemoryStore::new();
    store
        .add_file("ws01", "C$", "Mail/Archive/2019.pst", vec![1u8; 10])
        .add_file("ws01", "C$", "Mail/current.ost", vec![2u8; 20]);

    let host = HostConfig::new("ws01", "WS01")
        .with_user(UserConfig::new("alice").with_search_roots(&["Mail", "Mail/Archive"]));

    let report = CollectionRunner::new(Arc::new(store))
        .run(&config(vec![host]), output.path())
        .await;

    let host = report.host("ws01").expect("ws01 reported");
    let paths: Vec<&str> = host.files.iter().map(|f| f.remote_relative_path.as_str()).collect();
    assert_eq!(paths, vec!["Mail/Archive/2019.pst", "Mail/current.ost"]);
    assert_eq!(host.bytes_collected, 30);

    Ok(())
}

/// Running twice into the same destination overwrites with identical bytes.
#[tokio::test]
async fn test_rerun_overwrites_identically() -> Result<()> {
    let output = TempDir::new()?;
    let mut store = MemoryStore::new();
    workstation(&mut store, "ws01");
    let store = Arc::new(store);
    let config = config(vec![alice("ws01")]);

    let target = output
        .path()
        .join("ws01/C$")
        .join(DOCUMENTS)
        .join("Outlook.pst");

    let first = CollectionRunner::new(store.clone()).run(&config, output.path()).await;
    assert_eq!(first.files_collected(), 1);
    fs::write(&target, b"tampered")?;

    let second = CollectionRunner::new(store.clone()).run(&config, output.path()).await;
    assert_eq!(second.files_collected(), 1);
    assert_ne!(first.run_id, second.run_id);
    assert_eq!(fs::read(&target)?, vec![7u8; 2048]);
    assert_eq!(store.opened_sessions(), 2);
    assert_eq!(store.closed_sessions(), 2);

    Ok(())
}

/// The JSON summary mirrors the report and never carries passwords.
#[tokio::test]
async fn test_summary_written_without_secrets() -> Result<()> {
    let output = TempDir::new()?;
    let mut store = MemoryStore::new();
    workstation(&mut store, "ws01");
    store.fail_connect("ws02", "logon failure: administrator / S3cret!pass");

    let mut bad = alice("ws02");
    bad.credentials.username = "administrator".to_string();
    bad.credentials.password = "S3cret!pass".to_string();

    let report = CollectionRunner::new(Arc::new(store))
        .run(&config(vec![alice("ws01"), bad]), output.path())
        .await;

    let summary_path = output.path().join("collection_summary.json");
    write_run_summary(&report, "forensics01", &summary_path)?;

    let content = fs::read_to_string(&summary_path)?;
    assert!(!content.contains("S3cret!pass"));

    let json: serde_json::Value = serde_json::from_str(&content)?;
    assert_eq!(json["files_collected"], 1);
    assert_eq!(json["host_count"], 2);
    assert_eq!(json["hosts"][1]["state"]["state"], "failed");
    assert_eq!(json["hosts"][1]["errors"][0]["kind"], "connect");

    Ok(())
}

/// Nothing outside the destination root is ever created.
#[tokio::test]
async fn test_destination_confined_to_root() -> Result<()> {
    let output = TempDir::new()?;
    let root = output.path().join("evidence");
    let mut store = MemoryStore::new();
    store
        .add_file("ws01", "C$", "Mail/ok.pst", vec![1u8; 4])
        .add_file("ws01", "C$", "Mail/bad:ads.pst", vec![1u8; 4]);

    let host = HostConfig::new("ws01", "WS01")
        .with_user(UserConfig::new("alice").with_search_roots(&["Mail"]));
    let report = CollectionRunner::new(Arc::new(store))
        .run(&config(vec![host]), &root)
        .await;

    let host = report.host("ws01").expect("ws01 reported");
    assert_eq!(host.files_collected, 1);
    assert!(host
        .errors
        .iter()
        .any(|e| e.kind == ErrorKind::PathTraversal));

    let entries: Vec<_> = fs::read_dir(output.path())?.collect::<Result<_, _>>()?;
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].path(), root);
    assert!(Path::new(&root).join("ws01/C$/Mail/ok.pst").is_file());

    Ok(())
}
