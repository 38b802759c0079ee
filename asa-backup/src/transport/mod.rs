//! Command transport to the appliance.
//!
//! The engine only needs two things from a session: send a command and read
//! the reply, and switch the execution scope (`changeto ...`). [`ssh`] provides
//! the production implementation; tests use a scripted fake.

pub mod executor;
pub mod ssh;

pub use executor::{run_batch, run_plan, wrap_for_unit};
pub use ssh::{SshConnector, SshSession};

use crate::config::DeviceParams;
use crate::utils::TransportError;
use std::path::Path;

/// Execution scope on a multiple context device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    /// The system execution space, where backups of every context run.
    System,
}

impl Scope {
    pub fn command(&self) -> &'static str {
        match self {
            Scope::System => "changeto system",
        }
    }
}

/// An authenticated, privileged command channel to one device.
///
/// Sessions carry scope state and must not be shared between device runs.
pub trait Session {
    /// Send one command and return its output without the echoed command and
    /// the trailing prompt.
    fn send(&mut self, command: &str) -> Result<String, TransportError>;

    /// Switch the execution scope.
    fn change_scope(&mut self, scope: &Scope) -> Result<(), TransportError> {
        self.send(scope.command()).map(|_| ())
    }
}

/// Opens sessions for device runs.
pub trait Connector {
    type Session: Session;

    /// Open a session to `params`, writing the session transcript under
    /// `log_dir`.
    fn connect(&self, params: &DeviceParams, log_dir: &Path)
        -> Result<Self::Session, TransportError>;
}
