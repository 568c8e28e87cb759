//! Safety guard
//!
//! Precondition checks that run before every store read or write: is the
//! owning application up, is the file locked, does the store exist at all.
//! Results are computed fresh on each call and never cached.

use std::fs::File;
use std::path::Path;

use sysinfo::{ProcessesToUpdate, System};

use crate::store::{LocalStore, STORE_DB};

/// Result of a safety check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SafetyCheck {
    /// Safe to proceed
    Safe,
    /// The store's owning application is running (unsafe to write)
    OwnerRunning,
    /// The store file could not be opened (held by another process)
    Locked,
    /// No local store exists
    Missing,
}

/// Checks whether the store can be read or written right now
pub struct SafetyGuard {
    system: System,
    owner_processes: Vec<String>,
}

impl SafetyGuard {
    /// `owner_processes` is the set of process names that identify the
    /// store's owning application. Matching is a case-sensitive substring
    /// test. An empty set means no owner is registered and writes are
    /// never blocked on process state.
    pub fn new(owner_processes: Vec<String>) -> Self {
        Self {
            system: System::new(),
            owner_processes,
        }
    }

    /// Whether any owning-application process is currently running.
    /// Refreshes the process snapshot on every call.
    pub fn owner_running(&mut self) -> bool {
        if self.owner_processes.is_empty() {
            return false;
        }
        self.system
            .refresh_processes(ProcessesToUpdate::All, true);
        let owners = &self.owner_processes;
        self.system.processes().values().any(|p| {
            let name = p.name().to_string_lossy();
            owners.iter().any(|o| name.contains(o.as_str()))
        })
    }

    /// Whether a file can currently be opened for reading
    pub fn can_open(path: &Path) -> bool {
        File::open(path).is_ok()
    }

    /// Check preconditions for reading the store. The owner running does
    /// not block reads.
    pub fn safe_to_read(&mut self, store_dir: &Path) -> SafetyCheck {
        let db_path = store_dir.join(STORE_DB);
        if !db_path.exists() {
            return SafetyCheck::Missing;
        }
        if !Self::can_open(&db_path) {
            return SafetyCheck::Locked;
        }
        SafetyCheck::Safe
    }

    /// Check preconditions for overwriting the store. A running owner wins
    /// over everything else: its in-progress writes would be corrupted by
    /// ours. A missing store is fine to write, it is being created.
    pub fn safe_to_write(&mut self, store_dir: &Path) -> SafetyCheck {
        if self.owner_running() {
            return SafetyCheck::OwnerRunning;
        }
        let store = LocalStore::new(store_dir.to_path_buf());
        if !store.exists() {
            return SafetyCheck::Safe;
        }
        if !Self::can_open(&store.db_path()) {
            return SafetyCheck::Locked;
        }
        SafetyCheck::Safe
    }
}

/// SQLite magic header, the first 16 bytes of every real database file
const SQLITE_MAGIC: &[u8] = b"SQLite format 3\0";

/// Structural sanity check for a candidate primary blob. A blob failing
/// this must never be written to the local store.
pub fn validate_sqlite_header(data: &[u8]) -> bool {
    data.len() > SQLITE_MAGIC.len() && data[..SQLITE_MAGIC.len()] == *SQLITE_MAGIC
}
