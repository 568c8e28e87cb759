//! Timestamped backups with retention
//!
//! Every destructive operation on the store is preceded by a backup, so the
//! losing side of any sync decision stays recoverable. The manager owns the
//! backup directory outright and prunes it after every creation.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use chrono::Utc;
use tracing::{debug, info};

use crate::store::is_tracked_name;

/// One retained backup, a directory holding copies of the tracked files
#[derive(Debug, Clone)]
pub struct BackupEntry {
    /// Directory name, `{label}-{timestamp}`
    pub name: String,
    /// Full path of the backup directory
    pub path: PathBuf,
    /// When the backup was created
    pub created: std::time::SystemTime,
}

/// Creates, lists, restores, and prunes backups of a store directory
pub struct BackupManager {
    backup_dir: PathBuf,
    max_backups: usize,
}

impl BackupManager {
    pub fn new(backup_dir: PathBuf, max_backups: usize) -> Self {
        Self {
            backup_dir,
            max_backups,
        }
    }

    /// Copy the tracked files from `source_dir` into a new timestamped
    /// backup directory, then prune to the retention count. The name
    /// encodes second-precision UTC time so equal-label backups sort
    /// chronologically by name as well.
    pub fn create_backup(&self, source_dir: &Path, label: &str) -> io::Result<PathBuf> {
        let timestamp = Utc::now().format("%Y-%m-%dT%H-%M-%S");
        let backup_name = format!("{}-{}", label, timestamp);
        let backup_path = self.backup_dir.join(&backup_name);
        fs::create_dir_all(&backup_path)?;

        for entry in fs::read_dir(source_dir)? {
            let entry = entry?;
            let name = entry.file_name();
            if is_tracked_name(&name.to_string_lossy()) {
                fs::copy(entry.path(), backup_path.join(&name))?;
            }
        }
        info!("created backup {}", backup_name);

        self.prune_old_backups()?;
        Ok(backup_path)
    }

    /// All retained backups, newest first
    pub fn list_backups(&self) -> io::Result<Vec<BackupEntry>> {
        let mut entries = Vec::new();
        if !self.backup_dir.exists() {
            return Ok(entries);
        }
        for entry in fs::read_dir(&self.backup_dir)? {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                entries.push(BackupEntry {
                    name: entry.file_name().to_string_lossy().to_string(),
                    path: entry.path(),
                    created: entry.metadata()?.modified()?,
                });
            }
        }
        entries.sort_by(|a, b| b.created.cmp(&a.created));
        Ok(entries)
    }

    /// Copy a backup's files into `target_dir`, overwriting what is there.
    /// Does not back up the overwritten state; callers that need that must
    /// create a backup first.
    pub fn restore_backup(&self, backup_path: &Path, target_dir: &Path) -> io::Result<()> {
        fs::create_dir_all(target_dir)?;
        for entry in fs::read_dir(backup_path)? {
            let entry = entry?;
            fs::copy(entry.path(), target_dir.join(entry.file_name()))?;
        }
        info!("restored backup from {}", backup_path.display());
        Ok(())
    }

    fn prune_old_backups(&self) -> io::Result<()> {
        let backups = self.list_backups()?;
        if backups.len() > self.max_backups {
            for old in &backups[self.max_backups..] {
                debug!("pruning backup {}", old.name);
                fs::remove_dir_all(&old.path)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{STORE_DB, STORE_SHM, STORE_WAL};
    use std::thread::sleep;
    use std::time::Duration;
    use tempfile::TempDir;

    fn setup_source_dir(tmp: &TempDir) -> PathBuf {
        let src = tmp.path().join("source");
        fs::create_dir_all(&src).unwrap();
        fs::write(src.join(STORE_DB), b"main-db-content").unwrap();
        fs::write(src.join(STORE_SHM), b"shm-content").unwrap();
        fs::write(src.join(STORE_WAL), b"wal-content").unwrap();
        fs::write(src.join("unrelated.txt"), b"ignore-me").unwrap();
        src
    }

    #[test]
    fn backup_copies_only_tracked_files() {
        let tmp = TempDir::new().unwrap();
        let src = setup_source_dir(&tmp);
        let mgr = BackupManager::new(tmp.path().join("backups"), 20);

        let backup_path = mgr.create_backup(&src, "sync").unwrap();

        assert!(backup_path.join(STORE_DB).exists());
        assert!(backup_path.join(STORE_SHM).exists());
        assert!(backup_path.join(STORE_WAL).exists());
        assert!(!backup_path.join("unrelated.txt").exists());
    }

    #[test]
    fn list_returns_newest_first() {
        let tmp = TempDir::new().unwrap();
        let src = setup_source_dir(&tmp);
        let mgr = BackupManager::new(tmp.path().join("backups"), 20);

        mgr.create_backup(&src, "first").unwrap();
        sleep(Duration::from_millis(50));
        mgr.create_backup(&src, "second").unwrap();

        let list = mgr.list_backups().unwrap();
        assert_eq!(list.len(), 2);
        assert!(list[0].name.starts_with("second"));
        assert!(list[1].name.starts_with("first"));
    }

    #[test]
    fn prune_respects_retention() {
        let tmp = TempDir::new().unwrap();
        let src = setup_source_dir(&tmp);
        let mgr = BackupManager::new(tmp.path().join("backups"), 2);

        mgr.create_backup(&src, "a").unwrap();
        sleep(Duration::from_millis(50));
        mgr.create_backup(&src, "b").unwrap();
        sleep(Duration::from_millis(50));
        mgr.create_backup(&src, "c").unwrap();

        let list = mgr.list_backups().unwrap();
        assert_eq!(list.len(), 2);
        assert!(list[0].name.starts_with("c"));
        assert!(list[1].name.starts_with("b"));
    }

    #[test]
    fn restore_overwrites_target() {
        let tmp = TempDir::new().unwrap();
        let src = setup_source_dir(&tmp);
        let mgr = BackupManager::new(tmp.path().join("backups"), 20);

        let backup_path = mgr.create_backup(&src, "snap").unwrap();
        fs::write(src.join(STORE_DB), b"modified").unwrap();

        mgr.restore_backup(&backup_path, &src).unwrap();
        assert_eq!(fs::read(src.join(STORE_DB)).unwrap(), b"main-db-content");
    }

    #[test]
    fn list_empty_when_dir_missing() {
        let tmp = TempDir::new().unwrap();
        let mgr = BackupManager::new(tmp.path().join("never-created"), 5);
        assert!(mgr.list_backups().unwrap().is_empty());
    }
}
