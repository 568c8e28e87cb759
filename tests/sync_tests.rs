//! End-to-end sync tests
//!
//! Two simulated machines share one folder exchange point and converge
//! through it. No network, no mocks; this exercises the real engine,
//! store accessor, backup manager, and folder provider together.
//!
//! Run with: cargo test --test sync_tests

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use tandem::config::{ProviderConfig, SyncConfig};
use tandem::store::STORE_DB;
use tandem::sync::{FolderProvider, SyncEngine};
use tandem::{SkipReason, SyncResult};
use tempfile::TempDir;

/// A blob that passes the structural header check
fn valid_db(tail: &[u8]) -> Vec<u8> {
    let mut data = b"SQLite format 3\0".to_vec();
    data.extend_from_slice(tail);
    data
}

/// One simulated machine: its own store and backup dirs, sharing the
/// given exchange directory
fn machine(tmp: &TempDir, name: &str, exchange: &PathBuf) -> SyncEngine {
    let store_dir = tmp.path().join(name).join("store");
    fs::create_dir_all(&store_dir).unwrap();
    let config = SyncConfig {
        store_dir,
        backup_dir: tmp.path().join(name).join("backups"),
        max_backups: 10,
        debounce_secs: 1,
        poll_interval_secs: 30,
        device_name: name.to_string(),
        owner_processes: Vec::new(),
        provider: ProviderConfig::Folder {
            sync_dir: exchange.clone(),
        },
    };
    let provider = Arc::new(FolderProvider::new(exchange.clone()));
    SyncEngine::new(config, provider)
}

fn store_path(tmp: &TempDir, name: &str) -> PathBuf {
    tmp.path().join(name).join("store").join(STORE_DB)
}

#[tokio::test]
async fn two_machines_converge_through_the_exchange() {
    let tmp = TempDir::new().unwrap();
    let exchange = tmp.path().join("exchange");
    let machine_a = machine(&tmp, "machine-a", &exchange);
    let machine_b = machine(&tmp, "machine-b", &exchange);

    // A has state, B has nothing
    fs::write(store_path(&tmp, "machine-a"), valid_db(b"from-a")).unwrap();
    assert_eq!(machine_a.sync().await.unwrap(), SyncResult::Pushed);

    // B syncs and receives A's state byte-for-byte
    assert_eq!(
        machine_b.sync().await.unwrap(),
        SyncResult::Pulled {
            device: "machine-a".into()
        }
    );
    assert_eq!(
        fs::read(store_path(&tmp, "machine-b")).unwrap(),
        valid_db(b"from-a")
    );

    // B edits locally; its copy is now newer than the exchange
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    fs::write(store_path(&tmp, "machine-b"), valid_db(b"from-b")).unwrap();
    assert_eq!(machine_b.sync().await.unwrap(), SyncResult::Pushed);

    // A pulls the newer state and keeps its old one in a backup
    assert_eq!(
        machine_a.sync().await.unwrap(),
        SyncResult::Pulled {
            device: "machine-b".into()
        }
    );
    assert_eq!(
        fs::read(store_path(&tmp, "machine-a")).unwrap(),
        valid_db(b"from-b")
    );
    let backups = machine_a.backups().list_backups().unwrap();
    assert_eq!(backups.len(), 1);
    assert!(backups[0].name.starts_with("pre-pull"));
    assert_eq!(
        fs::read(backups[0].path.join(STORE_DB)).unwrap(),
        valid_db(b"from-a")
    );
}

#[tokio::test]
async fn empty_exchange_skips_cleanly() {
    let tmp = TempDir::new().unwrap();
    let exchange = tmp.path().join("exchange");
    let engine = machine(&tmp, "solo", &exchange);

    assert_eq!(
        engine.pull_from_remote().await.unwrap(),
        SyncResult::Skipped(SkipReason::NoRemoteStore)
    );
    assert_eq!(
        engine.sync().await.unwrap(),
        SyncResult::Skipped(SkipReason::NoLocalStore)
    );
}

#[tokio::test]
async fn push_pull_roundtrip_preserves_all_blobs() {
    let tmp = TempDir::new().unwrap();
    let exchange = tmp.path().join("exchange");
    let sender = machine(&tmp, "sender", &exchange);
    let receiver = machine(&tmp, "receiver", &exchange);

    let store_dir = tmp.path().join("sender").join("store");
    fs::write(store_dir.join(STORE_DB), valid_db(b"primary")).unwrap();
    fs::write(store_dir.join("config.db-shm"), b"shm-bytes").unwrap();
    fs::write(store_dir.join("config.db-wal"), b"wal-bytes").unwrap();

    assert_eq!(sender.push_to_remote().await.unwrap(), SyncResult::Pushed);
    assert_eq!(
        receiver.pull_from_remote().await.unwrap(),
        SyncResult::Pulled {
            device: "sender".into()
        }
    );

    let received = tmp.path().join("receiver").join("store");
    assert_eq!(fs::read(received.join(STORE_DB)).unwrap(), valid_db(b"primary"));
    assert_eq!(fs::read(received.join("config.db-shm")).unwrap(), b"shm-bytes");
    assert_eq!(fs::read(received.join("config.db-wal")).unwrap(), b"wal-bytes");
}

#[tokio::test]
async fn corrupt_exchange_payload_never_lands_locally() {
    let tmp = TempDir::new().unwrap();
    let exchange = tmp.path().join("exchange");
    let machine_a = machine(&tmp, "machine-a", &exchange);
    let machine_b = machine(&tmp, "machine-b", &exchange);

    fs::write(store_path(&tmp, "machine-a"), valid_db(b"good")).unwrap();
    machine_a.push_to_remote().await.unwrap();

    // the exchange copy gets corrupted in transit
    fs::write(exchange.join(STORE_DB), b"corrupted garbage").unwrap();

    fs::write(store_path(&tmp, "machine-b"), valid_db(b"existing")).unwrap();
    assert_eq!(
        machine_b.pull_from_remote().await.unwrap(),
        SyncResult::Skipped(SkipReason::InvalidRemotePayload)
    );
    // B's store is exactly what it was
    assert_eq!(
        fs::read(store_path(&tmp, "machine-b")).unwrap(),
        valid_db(b"existing")
    );
}
