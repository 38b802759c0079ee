//! ASA Backup Library
//!
//! Topology aware configuration and diagnostic backups for Cisco ASA
//! firewalls in single or multiple context mode, standalone or as a
//! failover pair.

pub mod config;
pub mod daemon;
pub mod destination;
pub mod orchestrator;
pub mod plan;
pub mod retention;
pub mod topology;
pub mod transport;
pub mod utils;
pub mod verify;

#[cfg(test)]
pub(crate) mod testing;

// Re-export commonly used types
pub use config::{BackupConfig, DeviceParams};
pub use orchestrator::{backup_device, DeviceReport};
pub use utils::errors::{BackupError, ConfigError, TransportError};
pub type Result<T> = std::result::Result<T, BackupError>;
