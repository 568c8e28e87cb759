//! Sync orchestration
//!
//! The engine owns the safety guard and backup manager and drives pushes
//! and pulls against one provider. Conflict policy is last-write-wins by
//! wall-clock timestamp; the losing side survives only in the backup
//! trail, never through any field-level merge.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{debug, info};

use super::{ProviderError, SyncProvider};
use crate::backup::BackupManager;
use crate::config::SyncConfig;
use crate::error::Result;
use crate::safety::{validate_sqlite_header, SafetyCheck, SafetyGuard};
use crate::store::LocalStore;
use crate::types::{SkipReason, SyncMeta, SyncResult};

/// Stateful coordinator for one store and one provider
pub struct SyncEngine {
    config: SyncConfig,
    store: LocalStore,
    provider: Arc<dyn SyncProvider>,
    backups: BackupManager,
    guard: Mutex<SafetyGuard>,
    /// Serializes every store-touching operation. A watcher-triggered push
    /// and a poller-triggered pull must never interleave file operations,
    /// so the lock is held for the whole orchestration call, network
    /// round-trips included.
    store_lock: Mutex<()>,
    /// Set right before a pull-driven overwrite. The watcher path consumes
    /// it and drops one notification so our own write does not bounce back
    /// out as a push.
    pull_marker: AtomicBool,
}

impl SyncEngine {
    pub fn new(config: SyncConfig, provider: Arc<dyn SyncProvider>) -> Self {
        let store = LocalStore::new(config.store_dir.clone());
        let backups = BackupManager::new(config.backup_dir.clone(), config.max_backups);
        let guard = Mutex::new(SafetyGuard::new(config.owner_processes.clone()));
        Self {
            config,
            store,
            provider,
            backups,
            guard,
            store_lock: Mutex::new(()),
            pull_marker: AtomicBool::new(false),
        }
    }

    /// Upload the local store to the provider
    pub async fn push_to_remote(&self) -> Result<SyncResult> {
        let _excl = self.store_lock.lock().await;
        self.push_inner().await
    }

    /// Download the remote store and overwrite local state, backing up
    /// whatever is there first
    pub async fn pull_from_remote(&self) -> Result<SyncResult> {
        let _excl = self.store_lock.lock().await;
        self.pull_inner().await
    }

    /// Watcher-path push: back up the current store, then push. The
    /// service calls this after a debounced change notification.
    pub async fn push_on_change(&self) -> Result<SyncResult> {
        let _excl = self.store_lock.lock().await;
        if self.store.exists() {
            self.backups.create_backup(self.store.dir(), "pre-push")?;
        }
        self.push_inner().await
    }

    /// Full reconciliation: compare local and remote timestamps and push,
    /// pull, or skip accordingly
    pub async fn sync(&self) -> Result<SyncResult> {
        let _excl = self.store_lock.lock().await;
        self.sync_inner().await
    }

    /// Remote metadata, for pollers deciding whether a pull is worthwhile
    pub async fn remote_meta(&self) -> Result<SyncMeta> {
        Ok(self.provider.remote_meta().await?)
    }

    /// True exactly once after each pull-driven overwrite. The watcher
    /// callback checks this before auto-pushing; without it every inbound
    /// sync would produce a spurious outbound one and two machines could
    /// ping-pong forever.
    pub fn take_pull_marker(&self) -> bool {
        self.pull_marker.swap(false, Ordering::SeqCst)
    }

    /// The backup manager for this store
    pub fn backups(&self) -> &BackupManager {
        &self.backups
    }

    async fn push_inner(&self) -> Result<SyncResult> {
        {
            let mut guard = self.guard.lock().await;
            match guard.safe_to_read(self.store.dir()) {
                SafetyCheck::Missing => {
                    return Ok(SyncResult::Skipped(SkipReason::NoLocalStore))
                }
                SafetyCheck::Locked => return Ok(SyncResult::Skipped(SkipReason::Locked)),
                // the owner running does not block reads
                SafetyCheck::Safe | SafetyCheck::OwnerRunning => {}
            }
        }

        let snapshot = self.store.read(SyncMeta {
            last_modified: Utc::now(),
            device_name: self.config.device_name.clone(),
        })?;
        self.provider.push(&snapshot).await?;
        info!("pushed local store");
        Ok(SyncResult::Pushed)
    }

    async fn pull_inner(&self) -> Result<SyncResult> {
        {
            let mut guard = self.guard.lock().await;
            match guard.safe_to_write(self.store.dir()) {
                SafetyCheck::OwnerRunning => {
                    return Ok(SyncResult::Skipped(SkipReason::OwnerRunning))
                }
                SafetyCheck::Locked => return Ok(SyncResult::Skipped(SkipReason::Locked)),
                SafetyCheck::Safe | SafetyCheck::Missing => {}
            }
        }

        let remote = match self.provider.pull().await {
            Ok(snapshot) => snapshot,
            Err(ProviderError::NotFound) => {
                return Ok(SyncResult::Skipped(SkipReason::NoRemoteStore))
            }
            Err(e) => return Err(e.into()),
        };

        if !validate_sqlite_header(&remote.db) {
            debug!("remote payload failed header validation, local store untouched");
            return Ok(SyncResult::Skipped(SkipReason::InvalidRemotePayload));
        }

        if self.store.exists() {
            self.backups.create_backup(self.store.dir(), "pre-pull")?;
        }

        self.pull_marker.store(true, Ordering::SeqCst);
        self.store.write(&remote)?;
        info!("pulled store from {}", remote.meta.device_name);
        Ok(SyncResult::Pulled {
            device: remote.meta.device_name,
        })
    }

    async fn sync_inner(&self) -> Result<SyncResult> {
        let local_exists = self.store.exists();
        let remote_meta = match self.provider.remote_meta().await {
            Ok(meta) => Some(meta),
            Err(ProviderError::NotFound) => None,
            Err(e) => return Err(e.into()),
        };

        match (local_exists, remote_meta) {
            (true, Some(remote)) => {
                let local_ts = self.store.modified_at()?;
                if local_ts > remote.last_modified {
                    debug!("local store is newer, pushing");
                    self.backups.create_backup(self.store.dir(), "pre-push")?;
                    self.push_inner().await
                } else if remote.last_modified > local_ts {
                    debug!("remote store is newer, pulling");
                    self.pull_inner().await
                } else {
                    // equal stamps are treated as in sync even though the
                    // content could differ under clock skew; the backup
                    // trail is the only recovery path in that case
                    Ok(SyncResult::Skipped(SkipReason::AlreadyInSync))
                }
            }
            (true, None) => self.push_inner().await,
            (false, Some(_)) => self.pull_inner().await,
            (false, None) => Ok(SyncResult::Skipped(SkipReason::NoLocalStore)),
        }
    }
}
