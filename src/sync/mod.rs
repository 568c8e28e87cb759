//! Sync providers and the orchestration engine
//!
//! A provider is any exchange point that can hold one copy of the store:
//! push a snapshot up, pull one down, report metadata. The engine depends
//! only on that three-operation contract, never on a concrete backend.

pub mod engine;
pub mod folder;
#[cfg(feature = "hosted")]
pub mod hosted;

pub use engine::SyncEngine;
pub use folder::FolderProvider;
#[cfg(feature = "hosted")]
pub use hosted::HostedProvider;

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::config::{ProviderConfig, SyncConfig};
use crate::error::Result;
use crate::types::{ConfigSnapshot, SyncMeta};

/// Result type alias for provider operations
pub type ProviderResult<T> = std::result::Result<T, ProviderError>;

/// Errors a provider can produce. `NotFound` is a normal outcome (no
/// remote state exists yet), distinct from transport failures.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[cfg(feature = "hosted")]
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("no remote store found")]
    NotFound,

    #[error("metadata error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("backend error: {0}")]
    Backend(String),
}

/// The contract every exchange point implements. Each call is
/// self-contained; callers need no extra locking around them.
#[async_trait]
pub trait SyncProvider: Send + Sync {
    /// Upload a snapshot, replacing whatever the remote holds
    async fn push(&self, snapshot: &ConfigSnapshot) -> ProviderResult<()>;

    /// Download the remote snapshot
    async fn pull(&self) -> ProviderResult<ConfigSnapshot>;

    /// Remote metadata without downloading the blobs
    async fn remote_meta(&self) -> ProviderResult<SyncMeta>;
}

/// Construct the provider named by the configuration
pub fn build_provider(config: &SyncConfig) -> Result<Arc<dyn SyncProvider>> {
    match &config.provider {
        ProviderConfig::Folder { sync_dir } => {
            Ok(Arc::new(FolderProvider::new(sync_dir.clone())))
        }
        #[cfg(feature = "hosted")]
        ProviderConfig::Hosted { api_url, api_key } => Ok(Arc::new(HostedProvider::new(
            api_url.clone(),
            api_key.clone(),
        ))),
        #[cfg(not(feature = "hosted"))]
        ProviderConfig::Hosted { .. } => Err(crate::error::TandemError::Config(
            "hosted provider support not compiled in (enable the `hosted` feature)".into(),
        )),
    }
}
