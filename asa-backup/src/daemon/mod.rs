//! Running backups for a set of firewalls, once or on a schedule.

pub mod batch;
pub mod scheduler;
pub mod shutdown;

pub use batch::{run_firewalls, BatchSummary};
pub use scheduler::BackupScheduler;
pub use shutdown::shutdown_signal;
