//! Sequential backup of several firewalls.
//!
//! Each device gets its own session and runs to completion on a blocking
//! worker before the next one starts. A failing device is reported and the
//! batch moves on.

use crate::config::BackupConfig;
use crate::orchestrator::backup_device;
use crate::transport::Connector;
use std::io;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[derive(Debug, Default)]
pub struct BatchSummary {
    pub succeeded: Vec<String>,
    /// Firewall name and error message
    pub failed: Vec<(String, String)>,
    /// Firewalls not started because of shutdown
    pub skipped: Vec<String>,
}

impl BatchSummary {
    pub fn is_success(&self) -> bool {
        self.failed.is_empty() && self.skipped.is_empty()
    }
}

pub async fn run_firewalls<C>(
    config: Arc<BackupConfig>,
    firewalls: Vec<String>,
    connector: Arc<C>,
    cancel: CancellationToken,
) -> BatchSummary
where
    C: Connector + Send + Sync + 'static,
{
    let mut summary = BatchSummary::default();

    for (idx, name) in firewalls.iter().enumerate() {
        if cancel.is_cancelled() {
            warn!(remaining = firewalls.len() - idx, "Shutdown requested, skipping remaining firewalls");
            summary.skipped.extend(firewalls[idx..].iter().cloned());
            break;
        }

        let params = match config.device_params(name) {
            Ok(p) => p,
            Err(e) => {
                error!(device = %name, error = %e, "Invalid firewall configuration");
                summary.failed.push((name.clone(), e.to_string()));
                continue;
            }
        };

        let connector = Arc::clone(&connector);
        let result = tokio::task::spawn_blocking(move || {
            let stdout = io::stdout();
            let mut out = stdout.lock();
            backup_device(&params, connector.as_ref(), chrono::Local::now(), &mut out)
        })
        .await;

        match result {
            Ok(Ok(report)) => {
                info!(
                    device = %name,
                    slot = %report.slot,
                    commands = report.commands_sent,
                    "Backup finished"
                );
                summary.succeeded.push(name.clone());
            }
            Ok(Err(e)) => {
                error!(device = %name, error = %e, "Backup failed");
                summary.failed.push((name.clone(), e.to_string()));
            }
            Err(e) => {
                error!(device = %name, error = %e, "Backup task panicked");
                summary.failed.push((name.clone(), e.to_string()));
            }
        }
    }

    info!(
        succeeded = summary.succeeded.len(),
        failed = summary.failed.len(),
        skipped = summary.skipped.len(),
        "Batch complete"
    );
    summary
}
