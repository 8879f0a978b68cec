//! Integration tests running the collector over shares mounted as local
//! directories.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use tempfile::TempDir;

use pst_collector::collectors::runner::CollectionRunner;
use pst_collector::config::{CollectorConfig, HostConfig, UserConfig};
use pst_collector::errors::ErrorKind;
use pst_collector::remote::mounted::MountedShareStore;
use pst_collector::report::{HostStage, HostState};

fn mount_template(mounts: &Path) -> String {
    format!("{}/{{address}}/{{share}}", mounts.display())
}

fn populate(mounts: &Path, address: &str) -> Result<()> {
    let share = mounts.join(address).join("C$");
    let documents = share.join("Users/bob/Documents/Outlook Files");
    let appdata = share.join("Users/bob/AppData/Local/Microsoft/Outlook");
    fs::create_dir_all(&documents)?;
    fs::create_dir_all(&appdata)?;

    fs::write(documents.join("archive.pst"), vec![0xABu8; 4096])?;
    fs::write(documents.join("archive.pst.bak"), b"backup")?;
    fs::write(appdata.join("bob@corp.example.ost"), vec![0xCDu8; 1024])?;
    Ok(())
}

#[tokio::test]
async fn test_collect_from_mounted_share() -> Result<()> {
    let mounts = TempDir::new()?;
    let output = TempDir::new()?;
    populate(mounts.path(), "ws07")?;

    let config = CollectorConfig {
        client_name: Some("forensics01".to_string()),
        share_root: Some(mount_template(mounts.path())),
        hosts: vec![HostConfig::new("ws07", "WS07").with_user(UserConfig::new("bob"))],
        ..Default::default()
    };

    let store = MountedShareStore::from_config(&config);
    let report = CollectionRunner::new(Arc::new(store))
        .run(&config, output.path())
        .await;

    let host = report.host("ws07").expect("ws07 reported");
    assert_eq!(host.state, HostState::Closed);
    assert!(host.errors.is_empty(), "unexpected errors: {:?}", host.errors);
    assert_eq!(host.files_collected, 2);
    assert_eq!(host.bytes_collected, 5120);

    let collected = output.path().join("ws07").join("C$");
    assert_eq!(
        fs::read(collected.join("Users/bob/Documents/Outlook Files/archive.pst"))?,
        vec![0xABu8; 4096]
    );
    assert_eq!(
        fs::read(collected.join("Users/bob/AppData/Local/Microsoft/Outlook/bob@corp.example.ost"))?
            .len(),
        1024
    );
    assert!(!collected
        .join("Users/bob/Documents/Outlook Files/archive.pst.bak")
        .exists());

    Ok(())
}

#[tokio::test]
async fn test_unmounted_host_fails_connect() -> Result<()> {
    let mounts = TempDir::new()?;
    let output = TempDir::new()?;
    populate(mounts.path(), "ws07")?;

    let config = CollectorConfig {
        share_root: Some(mount_template(mounts.path())),
        hosts: vec![
            HostConfig::new("ws07", "WS07").with_user(UserConfig::new("bob")),
            HostConfig::new("ws08", "WS08").with_user(UserConfig::new("bob")),
        ],
        ..Default::default()
    };

    let store = MountedShareStore::from_config(&config);
    let report = CollectionRunner::new(Arc::new(store))
        .run(&config, output.path())
        .await;

    assert_eq!(report.host("ws07").expect("ws07").files_collected, 2);

    let missing = report.host("ws08").expect("ws08");
    assert_eq!(missing.state, HostState::Failed(HostStage::Connect));
    assert_eq!(missing.errors[0].kind, ErrorKind::Connect);
    assert!(!output.path().join("ws08").exists());

    Ok(())
}

#[tokio::test]
async fn test_unreadable_subfolder_does_not_stop_host() -> Result<()> {
    let mounts = TempDir::new()?;
    let output = TempDir::new()?;
    populate(mounts.path(), "ws07")?;

    let config = CollectorConfig {
        share_root: Some(mount_template(mounts.path())),
        hosts: vec![HostConfig::new("ws07", "WS07")
            .with_user(UserConfig::new("bob").with_search_roots(&[
                "Users/{user}/Missing Folder",
                "Users/{user}/Documents",
            ]))],
        ..Default::default()
    };

    let store = MountedShareStore::from_config(&config);
    let report = CollectionRunner::new(Arc::new(store))
        .run(&config, output.path())
        .await;

    let host = report.host("ws07").expect("ws07");
    assert_eq!(host.files_collected, 1);
    assert_eq!(host.errors.len(), 1);
    assert_eq!(host.errors[0].kind, ErrorKind::List);

    Ok(())
}
