//! Core types for Tandem

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Metadata describing one synced copy of the store
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncMeta {
    /// When the copy was last written
    pub last_modified: DateTime<Utc>,
    /// Name of the device that wrote it
    pub device_name: String,
}

/// In-memory bundle of the store's files, used to move state to and from
/// a provider. Constructed fresh for every push and pull, never cached.
#[derive(Debug, Clone)]
pub struct ConfigSnapshot {
    /// Primary database file
    pub db: Vec<u8>,
    /// Shared-memory sidecar, if present on disk
    pub db_shm: Option<Vec<u8>>,
    /// Write-ahead-log sidecar, if present on disk
    pub db_wal: Option<Vec<u8>>,
    /// Timestamp and origin device
    pub meta: SyncMeta,
}

/// Outcome of one orchestration attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncResult {
    /// Local state was uploaded to the provider
    Pushed,
    /// Remote state was downloaded and written locally
    Pulled {
        /// Device that produced the remote state
        device: String,
    },
    /// Nothing was transferred; the reason says why
    Skipped(SkipReason),
}

/// Why an orchestration attempt transferred nothing. These are normal,
/// expected outcomes, not errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The store's owning application is running; writing now risks corruption
    OwnerRunning,
    /// The store file is locked by another process
    Locked,
    /// No local store exists yet
    NoLocalStore,
    /// No remote store exists yet
    NoRemoteStore,
    /// Local and remote timestamps are equal
    AlreadyInSync,
    /// The remote payload failed structural validation
    InvalidRemotePayload,
}

impl std::fmt::Display for SyncResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncResult::Pushed => write!(f, "pushed"),
            SyncResult::Pulled { device } => write!(f, "pulled from {}", device),
            SyncResult::Skipped(reason) => write!(f, "skipped: {}", reason),
        }
    }
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::OwnerRunning => write!(f, "owner application is running"),
            SkipReason::Locked => write!(f, "store file is locked"),
            SkipReason::NoLocalStore => write!(f, "no local store"),
            SkipReason::NoRemoteStore => write!(f, "no remote store"),
            SkipReason::AlreadyInSync => write!(f, "already in sync"),
            SkipReason::InvalidRemotePayload => write!(f, "remote payload failed validation"),
        }
    }
}
