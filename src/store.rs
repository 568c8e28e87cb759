//! Local store access
//!
//! The store is three files in one directory: the primary database and two
//! optional SQLite sidecars. Everything here treats them as opaque bytes;
//! the only party that ever looks inside is the header check in [`crate::safety`].

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::types::{ConfigSnapshot, SyncMeta};

/// Primary database file name
pub const STORE_DB: &str = "config.db";
/// Shared-memory sidecar file name
pub const STORE_SHM: &str = "config.db-shm";
/// Write-ahead-log sidecar file name
pub const STORE_WAL: &str = "config.db-wal";

/// Whether a file name belongs to the tracked set. This prefix match is the
/// single rule shared by the watcher and the backup manager.
pub fn is_tracked_name(name: &str) -> bool {
    name.starts_with(STORE_DB)
}

/// Reads and writes the tracked files in a store directory
#[derive(Debug, Clone)]
pub struct LocalStore {
    dir: PathBuf,
}

impl LocalStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the primary database file
    pub fn db_path(&self) -> PathBuf {
        self.dir.join(STORE_DB)
    }

    /// Whether a local store exists (the primary file is the marker;
    /// sidecars without it are leftovers, not a store)
    pub fn exists(&self) -> bool {
        self.db_path().exists()
    }

    /// Modification time of the primary file, as UTC
    pub fn modified_at(&self) -> io::Result<DateTime<Utc>> {
        let modified = fs::metadata(self.db_path())?.modified()?;
        Ok(DateTime::<Utc>::from(modified))
    }

    /// Read the tracked files into a snapshot carrying the given metadata.
    /// Missing sidecars are simply absent, not an error.
    pub fn read(&self, meta: SyncMeta) -> io::Result<ConfigSnapshot> {
        let db = fs::read(self.dir.join(STORE_DB))?;
        let db_shm = fs::read(self.dir.join(STORE_SHM)).ok();
        let db_wal = fs::read(self.dir.join(STORE_WAL)).ok();
        Ok(ConfigSnapshot {
            db,
            db_shm,
            db_wal,
            meta,
        })
    }

    /// Write a snapshot's files into the store directory, creating it if
    /// needed. Sidecars absent from the snapshot are removed so the
    /// directory matches the snapshot exactly.
    pub fn write(&self, snapshot: &ConfigSnapshot) -> io::Result<()> {
        fs::create_dir_all(&self.dir)?;
        fs::write(self.dir.join(STORE_DB), &snapshot.db)?;
        write_or_remove(&self.dir.join(STORE_SHM), snapshot.db_shm.as_deref())?;
        write_or_remove(&self.dir.join(STORE_WAL), snapshot.db_wal.as_deref())?;
        Ok(())
    }
}

fn write_or_remove(path: &Path, content: Option<&[u8]>) -> io::Result<()> {
    match content {
        Some(bytes) => fs::write(path, bytes),
        None => match fs::remove_file(path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e),
        },
    }
}
