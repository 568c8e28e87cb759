//! Configuration - paths, provider choice, sync options
//!
//! One immutable value per session. Changing it means rebuilding the
//! engine and service, never mutating a live one.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Everything the engine and service need to run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Directory holding the local store's tracked files
    pub store_dir: PathBuf,
    /// Directory the backup manager owns
    pub backup_dir: PathBuf,
    /// Backups retained per store
    #[serde(default = "default_max_backups")]
    pub max_backups: usize,
    /// Quiet period for the change watcher, in seconds
    #[serde(default = "default_debounce_secs")]
    pub debounce_secs: u64,
    /// Remote poll interval, in seconds
    #[serde(default = "default_poll_secs")]
    pub poll_interval_secs: u64,
    /// This machine's name, recorded as the origin of pushed state
    #[serde(default = "hostname")]
    pub device_name: String,
    /// Process names identifying the store's owning application; writes
    /// are blocked while any of them is running
    #[serde(default)]
    pub owner_processes: Vec<String>,
    /// Active exchange point
    pub provider: ProviderConfig,
}

/// Which exchange point to sync through
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProviderConfig {
    /// A shared directory (Dropbox, Syncthing, a network mount)
    Folder { sync_dir: PathBuf },
    /// A hosted sync endpoint
    Hosted { api_url: String, api_key: String },
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            store_dir: data_dir().join("store"),
            backup_dir: data_dir().join("backups"),
            max_backups: default_max_backups(),
            debounce_secs: default_debounce_secs(),
            poll_interval_secs: default_poll_secs(),
            device_name: hostname(),
            owner_processes: Vec::new(),
            provider: ProviderConfig::Folder {
                sync_dir: dirs::home_dir()
                    .unwrap_or_else(|| PathBuf::from("."))
                    .join("TandemSync"),
            },
        }
    }
}

fn default_max_backups() -> usize {
    20
}

fn default_debounce_secs() -> u64 {
    3
}

fn default_poll_secs() -> u64 {
    30
}

fn hostname() -> String {
    sysinfo::System::host_name().unwrap_or_else(|| "unknown-device".to_string())
}

fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tandem")
}

/// Default on-disk location of the configuration file
pub fn config_file_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tandem")
        .join("config.json")
}

/// Load the configuration from the default location, falling back to
/// defaults when no file exists yet
pub fn load_config() -> Result<SyncConfig> {
    let path = config_file_path();
    if !path.exists() {
        return Ok(SyncConfig::default());
    }
    load_config_from(&path)
}

/// Load the configuration from an explicit path
pub fn load_config_from(path: &Path) -> Result<SyncConfig> {
    let raw = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

/// Persist the configuration to the default location
pub fn save_config(config: &SyncConfig) -> Result<()> {
    save_config_to(&config_file_path(), config)
}

/// Persist the configuration to an explicit path
pub fn save_config_to(path: &Path, config: &SyncConfig) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(path, serde_json::to_string_pretty(config)?)?;
    Ok(())
}
