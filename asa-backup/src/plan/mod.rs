//! Command plans for one backup run.
//!
//! A plan is an ordered list of [`CommandBatch`]es. Batches hold the literal
//! command text as the active unit would run it; routing a batch to the
//! standby unit is the executor's job (see [`crate::transport::wrap_for_unit`]).

pub mod builder;
pub mod context_sources;

pub use builder::PlanBuilder;
pub use context_sources::{resolve_context_sources, ContextSource};

use crate::topology::FailoverUnit;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandBatch {
    pub target: FailoverUnit,
    pub commands: Vec<String>,
}

impl CommandBatch {
    pub fn new(target: FailoverUnit, commands: Vec<String>) -> Self {
        Self { target, commands }
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

pub type CommandPlan = Vec<CommandBatch>;

/// Total number of commands in `plan` targeted at `unit`.
pub fn command_count(plan: &[CommandBatch], unit: FailoverUnit) -> usize {
    plan.iter()
        .filter(|batch| batch.target == unit)
        .map(CommandBatch::len)
        .sum()
}
