//! Error types for Tandem

use thiserror::Error;

/// Result type alias for Tandem operations
pub type Result<T> = std::result::Result<T, TandemError>;

/// Main error type for Tandem
#[derive(Error, Debug)]
pub enum TandemError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Provider error: {0}")]
    Provider(#[from] crate::sync::ProviderError),

    #[error("Watch error: {0}")]
    Watch(#[from] notify::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl TandemError {
    /// Check if this error came from the provider transport rather than the
    /// local machine. Callers driving retries key off this.
    pub fn is_remote(&self) -> bool {
        matches!(self, TandemError::Provider(_))
    }
}
