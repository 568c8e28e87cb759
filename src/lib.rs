//! Tandem - configuration store sync
//!
//! Keeps a device-local configuration database (an opaque SQLite file plus
//! its sidecar files) consistent across machines that share nothing but an
//! exchange point: a synced folder or a hosted HTTP endpoint.

pub mod backup;
pub mod config;
pub mod error;
pub mod safety;
pub mod service;
pub mod store;
pub mod sync;
pub mod types;
pub mod watch;

pub use error::{Result, TandemError};
pub use types::*;

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
