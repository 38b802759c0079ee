//! Device topology: what the appliance is running and how it is deployed.
//!
//! A [`DeviceTopology`] is discovered once per backup run by
//! [`inspector::inspect`] and passed by reference to everything downstream.
//! Nothing after discovery talks to the session to learn about the device.

pub mod inspector;

pub use inspector::inspect;

use std::fmt;

/// First release that ships the `backup` exec command.
pub const MIN_FULL_BACKUP_VERSION: SoftwareVersion = SoftwareVersion {
    major: 9,
    minor: 3,
    maintenance: 2,
    interim: 0,
};

/// Token appended to copy destinations so the ASA sources the transfer from
/// the inside interface instead of the outside one.
pub const INSIDE_INTERFACE_HACK: &str = ";int=inside";

/// ASA software version, e.g. `9.16(3)23`.
///
/// Field order matters: the derived `Ord` compares lexicographically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SoftwareVersion {
    pub major: u32,
    pub minor: u32,
    pub maintenance: u32,
    pub interim: u32,
}

impl SoftwareVersion {
    pub fn new(major: u32, minor: u32, maintenance: u32, interim: u32) -> Self {
        Self {
            major,
            minor,
            maintenance,
            interim,
        }
    }

    /// Whether the device supports `backup /noconfirm ... location flash:/...`.
    pub fn supports_full_backup(&self) -> bool {
        (self.major, self.minor, self.maintenance)
            >= (
                MIN_FULL_BACKUP_VERSION.major,
                MIN_FULL_BACKUP_VERSION.minor,
                MIN_FULL_BACKUP_VERSION.maintenance,
            )
    }
}

impl fmt::Display for SoftwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}({})", self.major, self.minor, self.maintenance)?;
        if self.interim > 0 {
            write!(f, "{}", self.interim)?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContextMode {
    Single,
    Multiple,
}

impl fmt::Display for ContextMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContextMode::Single => f.write_str("single"),
            ContextMode::Multiple => f.write_str("multiple"),
        }
    }
}

/// One half of a failover pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailoverUnit {
    Active,
    Standby,
}

impl FailoverUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailoverUnit::Active => "active",
            FailoverUnit::Standby => "standby",
        }
    }
}

impl fmt::Display for FailoverUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceTopology {
    pub version: SoftwareVersion,
    pub context_mode: ContextMode,
    /// Always starts with [`FailoverUnit::Active`].
    pub failover_units: Vec<FailoverUnit>,
    /// User contexts in device order. Empty in single context mode; the
    /// system context is implied and not listed.
    pub contexts: Vec<String>,
    pub interface_hack: Option<String>,
}

impl DeviceTopology {
    pub fn has_standby(&self) -> bool {
        self.failover_units.contains(&FailoverUnit::Standby)
    }

    pub fn has_contexts(&self) -> bool {
        !self.contexts.is_empty()
    }

    /// Suffix for copy destination URLs, empty when no hack applies.
    pub fn url_suffix(&self) -> &str {
        self.interface_hack.as_deref().unwrap_or("")
    }
}
