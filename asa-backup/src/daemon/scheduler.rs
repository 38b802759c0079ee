//! Cron driven backups for daemon mode.

use super::batch::run_firewalls;
use crate::config::BackupConfig;
use crate::transport::Connector;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use tokio_util::sync::CancellationToken;

pub struct BackupScheduler {
    scheduler: Mutex<JobScheduler>,
    running: Arc<AtomicBool>,
}

impl BackupScheduler {
    pub async fn new() -> anyhow::Result<Self> {
        let scheduler = JobScheduler::new().await?;
        Ok(Self {
            scheduler: Mutex::new(scheduler),
            running: Arc::new(AtomicBool::new(false)),
        })
    }

    /// Run the batch for `firewalls` whenever `cron_expression` fires
    /// (`sec min hour day month weekday`).
    pub async fn schedule_batch<C>(
        &self,
        cron_expression: &str,
        config: Arc<BackupConfig>,
        firewalls: Vec<String>,
        connector: Arc<C>,
        cancel: CancellationToken,
    ) -> anyhow::Result<()>
    where
        C: Connector + Send + Sync + 'static,
    {
        let running = Arc::clone(&self.running);

        let job = Job::new_async(cron_expression, move |_uuid, _lock| {
            let config = Arc::clone(&config);
            let firewalls = firewalls.clone();
            let connector = Arc::clone(&connector);
            let cancel = cancel.clone();
            let running = Arc::clone(&running);
            Box::pin(async move {
                if running.swap(true, Ordering::SeqCst) {
                    tracing::warn!("Skipping scheduled run: previous batch still running");
                    return;
                }

                tracing::info!(count = firewalls.len(), "Starting scheduled backup");
                let summary = run_firewalls(config, firewalls, connector, cancel).await;
                if !summary.is_success() {
                    tracing::error!(failed = summary.failed.len(), "Scheduled backup had failures");
                }

                running.store(false, Ordering::SeqCst);
            })
        })?;

        self.scheduler.lock().await.add(job).await?;
        tracing::info!(cron = %cron_expression, "Backup scheduled");
        Ok(())
    }

    pub async fn start(&self) -> anyhow::Result<()> {
        self.scheduler.lock().await.start().await?;
        Ok(())
    }

    pub async fn shutdown(&self) -> anyhow::Result<()> {
        self.scheduler.lock().await.shutdown().await?;
        Ok(())
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::SshConnector;

    #[tokio::test]
    async fn test_invalid_cron_expression_is_rejected() {
        let scheduler = BackupScheduler::new().await.unwrap();
        let result = scheduler
            .schedule_batch(
                "every day at noon",
                Arc::new(BackupConfig::default()),
                vec![],
                Arc::new(SshConnector),
                CancellationToken::new(),
            )
            .await;

        assert!(result.is_err());
        assert!(!scheduler.is_running());
    }

    #[tokio::test]
    async fn test_valid_cron_expression_is_accepted() {
        let scheduler = BackupScheduler::new().await.unwrap();
        scheduler
            .schedule_batch(
                "0 30 0 * * *",
                Arc::new(BackupConfig::default()),
                vec![],
                Arc::new(SshConnector),
                CancellationToken::new(),
            )
            .await
            .unwrap();
    }
}
