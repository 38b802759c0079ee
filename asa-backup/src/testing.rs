//! Test doubles shared by the unit tests.

use crate::config::DeviceParams;
use crate::transport::{Connector, Session};
use crate::utils::TransportError;
use std::cell::RefCell;
use std::collections::HashMap;
use std::path::Path;
use std::rc::Rc;

/// Session answering from a fixed script. Unknown commands get an empty
/// reply. Every command sent is recorded, including the failing one.
#[derive(Debug, Default, Clone)]
pub struct ScriptedSession {
    replies: HashMap<String, String>,
    fail_on: Option<String>,
    sent: Rc<RefCell<Vec<String>>>,
}

impl ScriptedSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reply(mut self, command: &str, output: &str) -> Self {
        self.replies.insert(command.to_string(), output.to_string());
        self
    }

    pub fn fail_on(mut self, command: &str) -> Self {
        self.fail_on = Some(command.to_string());
        self
    }

    /// Commands sent so far, shared between clones.
    pub fn sent(&self) -> Vec<String> {
        self.sent.borrow().clone()
    }
}

impl Session for ScriptedSession {
    fn send(&mut self, command: &str) -> Result<String, TransportError> {
        self.sent.borrow_mut().push(command.to_string());
        if self.fail_on.as_deref() == Some(command) {
            return Err(TransportError::Closed);
        }
        Ok(self.replies.get(command).cloned().unwrap_or_default())
    }
}

/// Hands out clones of one scripted session.
pub struct ScriptedConnector {
    pub session: ScriptedSession,
    pub refuse: bool,
}

impl ScriptedConnector {
    pub fn new(session: ScriptedSession) -> Self {
        Self {
            session,
            refuse: false,
        }
    }
}

impl Connector for ScriptedConnector {
    type Session = ScriptedSession;

    fn connect(&self, params: &DeviceParams, _log_dir: &Path) -> Result<ScriptedSession, TransportError> {
        if self.refuse {
            return Err(TransportError::Authentication {
                username: params.username.clone(),
                host: params.hostname.clone(),
            });
        }
        Ok(self.session.clone())
    }
}
