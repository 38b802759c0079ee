//! Error types for the backup engine.
//!
//! Only conditions that abort a device run are errors. Skipped context
//! configs, firmware without the `backup` command and unreadable files during
//! verification are logged and reported instead.

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("Parse error: {what} not found in device output {output:?}")]
    Parse { what: &'static str, output: String },

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Destination directory {path}: {source}")]
    Destination {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl BackupError {
    pub fn parse(what: &'static str, output: &str) -> Self {
        BackupError::Parse {
            what,
            output: output.trim().to_string(),
        }
    }
}

/// Failures of the session layer. Never retried by the engine.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Connection to {host} failed: {source}")]
    Connect {
        host: String,
        #[source]
        source: std::io::Error,
    },

    #[error("SSH error: {0}")]
    Ssh(#[from] ssh2::Error),

    #[error("Authentication failed for {username}@{host}")]
    Authentication { username: String, host: String },

    #[error("Timed out waiting for prompt after {command:?}")]
    Timeout { command: String },

    #[error("Session closed by device")]
    Closed,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Reading {path} failed: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Writing default config {path} failed: {source}")]
    WriteDefault {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML format error in {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Firewall {firewall}: missing key '{key}'")]
    MissingKey { firewall: String, key: &'static str },

    #[error("Firewalls not configured: {}", .0.join(", "))]
    UnknownFirewalls(Vec<String>),

    #[error("Unable to resolve home directory")]
    HomeDir,
}

pub type Result<T> = std::result::Result<T, BackupError>;
