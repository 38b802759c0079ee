//! Configuration management for the backup tool.
//!
//! Loads the YAML configuration file. Values under `defaults` apply to every
//! firewall unless the firewall sets them itself.

use crate::utils::ConfigError;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE: &str = ".asa_backup.yaml";

pub const CONFIG_DEFAULT: &str = r#"---
# CISCO ASA FIREWALLS BACKUP CONFIGURATION
#
# Use yamllint <thisfile> for syntax checking after editing this file.
# Defaults to be used for all the firewalls defined further below. They can
# be overwritten per firewall when needed.

defaults:
  device-type: cisco_asa
  conn-timeout: 30
  read-timeout: 1800
  username: asa-username
  password: YoUr.AsApAsSwOrD.HeRe
  ssh-key: ~/.ssh/id_rsa
  backup-host: 10.0.x.y
  backup-username: backup-username
  backup-password: YoUr.BaCkUpSerVeRpAsSwOrD.HeRe
  backup-dir: /mnt/backup/cisco/asa

firewalls:
  asa1:
    hostname: asa1-admin.example.com
    enable-secret: YoUr.EnAbLeSeCrEt.HeRe
  asa2:
    hostname: asa2-admin.example.com
    enable-secret: YoUr.EnAbLeSeCrEt.HeRe
"#;

/// Device type the command set is written for.
pub const DEVICE_TYPE_ASA: &str = "cisco_asa";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BackupConfig {
    #[serde(default)]
    pub defaults: DeviceSettings,

    #[serde(default)]
    pub firewalls: BTreeMap<String, DeviceSettings>,
}

/// One `defaults` or `firewalls.<name>` block. Every key is optional here;
/// [`BackupConfig::device_params`] decides what is required.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct DeviceSettings {
    pub device_type: Option<String>,
    pub hostname: Option<String>,
    pub port: Option<u16>,

    /// Seconds
    pub conn_timeout: Option<u64>,

    /// Seconds. Tech-support and backup commands can take many minutes.
    pub read_timeout: Option<u64>,

    pub username: Option<String>,
    pub password: Option<String>,
    pub ssh_key: Option<PathBuf>,
    pub enable_secret: Option<String>,
    pub backup_host: Option<String>,
    pub backup_username: Option<String>,
    pub backup_password: Option<String>,
    pub backup_dir: Option<PathBuf>,

    /// Encrypts the full backup archives. Falls back to `password`.
    pub backup_passphrase: Option<String>,
}

impl DeviceSettings {
    /// Fill unset keys from `defaults`.
    pub fn merged_with(&self, defaults: &DeviceSettings) -> DeviceSettings {
        fn pick<T: Clone>(own: &Option<T>, fallback: &Option<T>) -> Option<T> {
            own.clone().or_else(|| fallback.clone())
        }

        DeviceSettings {
            device_type: pick(&self.device_type, &defaults.device_type),
            hostname: pick(&self.hostname, &defaults.hostname),
            port: pick(&self.port, &defaults.port),
            conn_timeout: pick(&self.conn_timeout, &defaults.conn_timeout),
            read_timeout: pick(&self.read_timeout, &defaults.read_timeout),
            username: pick(&self.username, &defaults.username),
            password: pick(&self.password, &defaults.password),
            ssh_key: pick(&self.ssh_key, &defaults.ssh_key),
            enable_secret: pick(&self.enable_secret, &defaults.enable_secret),
            backup_host: pick(&self.backup_host, &defaults.backup_host),
            backup_username: pick(&self.backup_username, &defaults.backup_username),
            backup_password: pick(&self.backup_password, &defaults.backup_password),
            backup_dir: pick(&self.backup_dir, &defaults.backup_dir),
            backup_passphrase: pick(&self.backup_passphrase, &defaults.backup_passphrase),
        }
    }
}

/// Everything needed to back up one firewall (HA pair).
#[derive(Clone)]
pub struct DeviceParams {
    /// Name from the config file, used for the backup directory
    pub name: String,
    pub device_type: String,
    pub hostname: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub ssh_key: Option<PathBuf>,
    pub enable_secret: String,
    pub conn_timeout: Duration,
    pub read_timeout: Duration,
    pub backup_host: String,
    pub backup_username: String,
    pub backup_password: String,
    pub backup_dir: PathBuf,
    pub backup_passphrase: String,
}

impl std::fmt::Debug for DeviceParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceParams")
            .field("name", &self.name)
            .field("hostname", &self.hostname)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("backup_host", &self.backup_host)
            .field("backup_dir", &self.backup_dir)
            .finish_non_exhaustive()
    }
}

// Default values
fn default_port() -> u16 {
    22
}

fn default_conn_timeout() -> u64 {
    30
}

fn default_read_timeout() -> u64 {
    1800
}

impl BackupConfig {
    /// Load configuration from a YAML file
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content, path)
    }

    pub fn parse(content: &str, path: &Path) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(|source| ConfigError::Yaml {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Resolve the parameters of firewall `name`, defaults applied.
    pub fn device_params(&self, name: &str) -> Result<DeviceParams, ConfigError> {
        let own = self
            .firewalls
            .get(name)
            .ok_or_else(|| ConfigError::UnknownFirewalls(vec![name.to_string()]))?;
        let s = own.merged_with(&self.defaults);

        let require = |value: Option<String>, key: &'static str| {
            value.ok_or_else(|| ConfigError::MissingKey {
                firewall: name.to_string(),
                key,
            })
        };

        let password = require(s.password, "password")?;
        let backup_dir = s.backup_dir.ok_or_else(|| ConfigError::MissingKey {
            firewall: name.to_string(),
            key: "backup-dir",
        })?;

        Ok(DeviceParams {
            name: name.to_string(),
            device_type: s.device_type.unwrap_or_else(|| DEVICE_TYPE_ASA.to_string()),
            hostname: require(s.hostname, "hostname")?,
            port: s.port.unwrap_or_else(default_port),
            username: require(s.username, "username")?,
            ssh_key: s.ssh_key.map(expand_home).transpose()?,
            enable_secret: require(s.enable_secret, "enable-secret")?,
            conn_timeout: Duration::from_secs(s.conn_timeout.unwrap_or_else(default_conn_timeout)),
            read_timeout: Duration::from_secs(s.read_timeout.unwrap_or_else(default_read_timeout)),
            backup_host: require(s.backup_host, "backup-host")?,
            backup_username: require(s.backup_username, "backup-username")?,
            backup_password: require(s.backup_password, "backup-password")?,
            backup_dir: expand_home(backup_dir)?,
            backup_passphrase: s.backup_passphrase.unwrap_or_else(|| password.clone()),
            password,
        })
    }

    /// Firewalls to back up. No names, or just `all`, selects every
    /// configured firewall. The result is sorted and free of duplicates.
    pub fn select(&self, requested: &[String]) -> Result<Vec<String>, ConfigError> {
        let all = || self.firewalls.keys().cloned().collect::<Vec<_>>();

        if requested.is_empty() {
            return Ok(all());
        }

        let unknown: BTreeSet<&String> = requested
            .iter()
            .filter(|name| !self.firewalls.contains_key(*name))
            .collect();

        if unknown.is_empty() {
            let selected: BTreeSet<String> = requested.iter().cloned().collect();
            return Ok(selected.into_iter().collect());
        }

        if requested.len() == 1 && requested[0] == "all" {
            return Ok(all());
        }

        Err(ConfigError::UnknownFirewalls(
            unknown.into_iter().cloned().collect(),
        ))
    }
}

/// `~/.asa_backup.yaml`
pub fn default_config_path() -> Result<PathBuf, ConfigError> {
    home::home_dir()
        .map(|home| home.join(CONFIG_FILE))
        .ok_or(ConfigError::HomeDir)
}

/// Write the commented template to `path` unless a file already exists.
/// Returns whether a file was written.
pub fn write_default_config(path: &Path) -> Result<bool, ConfigError> {
    if path.exists() {
        return Ok(false);
    }

    let write_err = |source| ConfigError::WriteDefault {
        path: path.to_path_buf(),
        source,
    };

    std::fs::write(path, CONFIG_DEFAULT).map_err(write_err)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).map_err(write_err)?;
    }

    Ok(true)
}

/// Resolve a leading `~/` to the user's home directory.
pub fn expand_home(path: PathBuf) -> Result<PathBuf, ConfigError> {
    match path.strip_prefix("~") {
        Ok(rest) => home::home_dir()
            .map(|home| home.join(rest))
            .ok_or(ConfigError::HomeDir),
        Err(_) => Ok(path),
    }
}
