//! Runs command batches against a session.

use super::Session;
use crate::plan::CommandBatch;
use crate::topology::FailoverUnit;
use crate::utils::TransportError;
use std::borrow::Cow;
use tracing::debug;

/// Route `command` to `unit`. Commands for the active unit are unchanged.
pub fn wrap_for_unit(unit: FailoverUnit, command: &str) -> Cow<'_, str> {
    match unit {
        FailoverUnit::Active => Cow::Borrowed(command),
        FailoverUnit::Standby => Cow::Owned(format!("failover exec {} {}", unit, command)),
    }
}

/// Send every command of `batch` in order. Output is left to the session log.
pub fn run_batch<S: Session + ?Sized>(
    session: &mut S,
    batch: &CommandBatch,
) -> Result<(), TransportError> {
    for command in &batch.commands {
        let command = wrap_for_unit(batch.target, command);
        let output = session.send(&command)?;
        debug!(unit = %batch.target, command = %command, bytes = output.len(), "Command sent");
    }
    Ok(())
}

pub fn run_plan<S: Session + ?Sized>(
    session: &mut S,
    plan: &[CommandBatch],
) -> Result<(), TransportError> {
    plan.iter().try_for_each(|batch| run_batch(session, batch))
}
