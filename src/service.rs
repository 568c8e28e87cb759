//! Background sync service
//!
//! Wires the watcher and a periodic poller to one engine. Outbound: a
//! debounced local change triggers a push. Inbound: the poller reads
//! remote metadata on an interval and pulls when the remote moved past
//! what we have already seen. The periodic path never pushes; pushing
//! happens only on a watched change or an explicit user action.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::config::SyncConfig;
use crate::error::Result;
use crate::sync::{SyncEngine, SyncProvider};
use crate::types::SyncResult;
use crate::watch::{StoreWatcher, WatcherHandle};

/// Running watcher + poller pair around one engine
pub struct SyncService {
    engine: Arc<SyncEngine>,
    watcher: Mutex<Option<WatcherHandle>>,
    poller: Mutex<Option<JoinHandle<()>>>,
    stop_tx: tokio::sync::watch::Sender<bool>,
}

impl SyncService {
    /// Start both background tasks. Must be called from within a tokio
    /// runtime.
    pub fn start(config: SyncConfig, provider: Arc<dyn SyncProvider>) -> Result<Self> {
        let engine = Arc::new(SyncEngine::new(config.clone(), provider));
        let (stop_tx, stop_rx) = tokio::sync::watch::channel(false);

        // the watcher needs the store directory to exist, even when the
        // store itself has not been created yet
        std::fs::create_dir_all(&config.store_dir)?;

        // outbound: debounced local change -> push
        let watcher = StoreWatcher::new(
            config.store_dir.clone(),
            Duration::from_secs(config.debounce_secs),
        );
        let push_engine = engine.clone();
        let watcher_handle = watcher.start(move || {
            let engine = push_engine.clone();
            tokio::spawn(async move {
                if engine.take_pull_marker() {
                    debug!("change was our own pull, suppressing auto-push");
                    return;
                }
                match engine.push_on_change().await {
                    Ok(result) => info!("auto-push: {}", result),
                    Err(e) => error!("auto-push failed: {}", e),
                }
            });
        })?;

        // inbound: poll remote meta, pull when it moves past our watermark
        let poll_engine = engine.clone();
        let poll_interval = Duration::from_secs(config.poll_interval_secs);
        let poller = tokio::spawn(async move {
            let mut stop_rx = stop_rx;
            let mut last_seen = DateTime::<Utc>::MIN_UTC;
            let mut ticker = tokio::time::interval(poll_interval);
            loop {
                tokio::select! {
                    _ = stop_rx.changed() => break,
                    _ = ticker.tick() => {
                        last_seen = poll_once(&poll_engine, last_seen).await;
                    }
                }
            }
            debug!("poller stopped");
        });

        Ok(Self {
            engine,
            watcher: Mutex::new(Some(watcher_handle)),
            poller: Mutex::new(Some(poller)),
            stop_tx,
        })
    }

    /// The engine driving this service, for user-triggered operations
    pub fn engine(&self) -> &Arc<SyncEngine> {
        &self.engine
    }

    /// Stop both tasks cleanly. In-flight provider calls finish on their
    /// own; nothing is forcibly cancelled mid-transfer.
    pub async fn stop(&self) {
        let _ = self.stop_tx.send(true);
        let watcher = self.watcher.lock().take();
        if let Some(handle) = watcher {
            handle.stop().await;
        }
        let poller = self.poller.lock().take();
        if let Some(handle) = poller {
            let _ = handle.await;
        }
        info!("sync service stopped");
    }
}

/// One inbound poll step. Returns the new watermark.
async fn poll_once(engine: &SyncEngine, last_seen: DateTime<Utc>) -> DateTime<Utc> {
    let meta = match engine.remote_meta().await {
        Ok(meta) => meta,
        Err(e) => {
            // no remote yet or a transient transport failure; the next
            // tick retries either way
            debug!("remote poll: {}", e);
            return last_seen;
        }
    };
    if meta.last_modified <= last_seen {
        return last_seen;
    }

    match engine.pull_from_remote().await {
        Ok(SyncResult::Pulled { ref device }) => {
            info!("inbound sync: pulled from {}", device);
            meta.last_modified
        }
        Ok(SyncResult::Skipped(reason)) => {
            debug!("inbound poll skipped: {}", reason);
            meta.last_modified
        }
        Ok(_) => meta.last_modified,
        Err(e) => {
            error!("inbound pull failed: {}", e);
            last_seen
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProviderConfig;
    use crate::store::STORE_DB;
    use crate::sync::FolderProvider;
    use tempfile::TempDir;

    fn valid_db(tail: &[u8]) -> Vec<u8> {
        let mut data = b"SQLite format 3\0".to_vec();
        data.extend_from_slice(tail);
        data
    }

    fn test_config(tmp: &TempDir) -> SyncConfig {
        SyncConfig {
            store_dir: tmp.path().join("store"),
            backup_dir: tmp.path().join("backups"),
            max_backups: 5,
            debounce_secs: 1,
            poll_interval_secs: 1,
            device_name: "svc-test".into(),
            owner_processes: Vec::new(),
            provider: ProviderConfig::Folder {
                sync_dir: tmp.path().join("exchange"),
            },
        }
    }

    #[tokio::test]
    async fn poller_pulls_new_remote_state() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(&tmp);
        std::fs::create_dir_all(&config.store_dir).unwrap();

        // another device already pushed to the exchange folder
        let other = FolderProvider::new(tmp.path().join("exchange"));
        other
            .push(&crate::types::ConfigSnapshot {
                db: valid_db(b"from-other"),
                db_shm: None,
                db_wal: None,
                meta: crate::types::SyncMeta {
                    last_modified: Utc::now(),
                    device_name: "other-device".into(),
                },
            })
            .await
            .unwrap();

        let provider = Arc::new(FolderProvider::new(tmp.path().join("exchange")));
        let service = SyncService::start(config.clone(), provider).unwrap();

        // the first tick fires immediately; wait for the pull to land
        let mut pulled = false;
        for _ in 0..50 {
            tokio::time::sleep(Duration::from_millis(100)).await;
            if config.store_dir.join(STORE_DB).exists() {
                pulled = true;
                break;
            }
        }
        assert!(pulled);
        assert_eq!(
            std::fs::read(config.store_dir.join(STORE_DB)).unwrap(),
            valid_db(b"from-other")
        );

        service.stop().await;
    }

    #[tokio::test]
    async fn stop_is_idempotent_and_clean() {
        let tmp = TempDir::new().unwrap();
        let config = test_config(&tmp);
        std::fs::create_dir_all(&config.store_dir).unwrap();

        let provider = Arc::new(FolderProvider::new(tmp.path().join("exchange")));
        let service = SyncService::start(config, provider).unwrap();
        service.stop().await;
        // a second stop finds nothing left to tear down
        service.stop().await;
    }
}
