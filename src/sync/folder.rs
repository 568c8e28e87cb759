//! Folder exchange provider
//!
//! The exchange point is just a directory, typically inside a synced
//! folder (Dropbox, Syncthing, a network mount). The tracked files are
//! stored as-is next to a small JSON metadata record.

use std::fs;
use std::path::PathBuf;

use async_trait::async_trait;
use tracing::debug;

use super::{ProviderError, ProviderResult, SyncProvider};
use crate::store::{STORE_DB, STORE_SHM, STORE_WAL};
use crate::types::{ConfigSnapshot, SyncMeta};

const META_FILE: &str = "sync_meta.json";

/// Exchange point backed by a shared directory
pub struct FolderProvider {
    sync_dir: PathBuf,
}

impl FolderProvider {
    pub fn new(sync_dir: PathBuf) -> Self {
        Self { sync_dir }
    }

    fn write_optional(&self, name: &str, content: Option<&[u8]>) -> std::io::Result<()> {
        let path = self.sync_dir.join(name);
        match content {
            Some(bytes) => fs::write(path, bytes),
            None => match fs::remove_file(path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(e),
            },
        }
    }
}

#[async_trait]
impl SyncProvider for FolderProvider {
    async fn push(&self, snapshot: &ConfigSnapshot) -> ProviderResult<()> {
        fs::create_dir_all(&self.sync_dir)?;
        fs::write(self.sync_dir.join(STORE_DB), &snapshot.db)?;
        self.write_optional(STORE_SHM, snapshot.db_shm.as_deref())?;
        self.write_optional(STORE_WAL, snapshot.db_wal.as_deref())?;

        let meta_json = serde_json::to_string_pretty(&snapshot.meta)?;
        fs::write(self.sync_dir.join(META_FILE), meta_json)?;
        debug!("pushed snapshot to {}", self.sync_dir.display());
        Ok(())
    }

    async fn pull(&self) -> ProviderResult<ConfigSnapshot> {
        let db =
            fs::read(self.sync_dir.join(STORE_DB)).map_err(|_| ProviderError::NotFound)?;
        let db_shm = fs::read(self.sync_dir.join(STORE_SHM)).ok();
        let db_wal = fs::read(self.sync_dir.join(STORE_WAL)).ok();
        let meta = self.remote_meta().await?;
        Ok(ConfigSnapshot {
            db,
            db_shm,
            db_wal,
            meta,
        })
    }

    async fn remote_meta(&self) -> ProviderResult<SyncMeta> {
        let meta_json = fs::read_to_string(self.sync_dir.join(META_FILE))
            .map_err(|_| ProviderError::NotFound)?;
        Ok(serde_json::from_str(&meta_json)?)
    }
}
