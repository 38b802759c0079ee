//! ASA Backup - Main entry point
//!
//! Backs up the selected firewalls once, or on a cron schedule with `--cron`.

use anyhow::Result;
use asa_backup::config::{self, BackupConfig};
use asa_backup::daemon::{self, BackupScheduler};
use asa_backup::transport::SshConnector;
use asa_backup::utils;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Configuration file in YAML format (default: ~/.asa_backup.yaml)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Firewalls (HA pairs) to back up as listed in the config file, or `all`
    #[arg(short, long, value_name = "NAME", num_args = 1.., required = true)]
    firewalls: Vec<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Stay running and back up on this schedule (`sec min hour day month weekday`)
    #[arg(long, value_name = "EXPR")]
    cron: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    utils::logger::init(&args.log_level)?;

    // A fresh installation gets a commented template to edit
    let default_path = config::default_config_path()?;
    if config::write_default_config(&default_path)? {
        tracing::info!(path = %default_path.display(), "Wrote default configuration");
    }

    let config_path = args.config.unwrap_or(default_path);
    let config = BackupConfig::from_file(&config_path)?;
    let firewalls = config.select(&args.firewalls)?;

    tracing::info!(
        "Starting asa-backup v{} ({} firewalls)",
        env!("CARGO_PKG_VERSION"),
        firewalls.len()
    );

    let config = Arc::new(config);
    let connector = Arc::new(SshConnector);
    let cancel = CancellationToken::new();

    match args.cron {
        Some(cron) => {
            let scheduler = BackupScheduler::new().await?;
            scheduler
                .schedule_batch(&cron, config, firewalls, connector, cancel.clone())
                .await?;
            scheduler.start().await?;

            daemon::shutdown_signal(cancel.clone()).await;
            scheduler.shutdown().await?;

            // Let a batch in progress finish its current device
            while scheduler.is_running() {
                tokio::time::sleep(Duration::from_millis(500)).await;
            }
            tracing::info!("Scheduler stopped");
            Ok(())
        }
        None => {
            tokio::spawn(daemon::shutdown_signal(cancel.clone()));

            let summary = daemon::run_firewalls(config, firewalls, connector, cancel).await;
            if summary.is_success() {
                return Ok(());
            }

            for (name, error) in &summary.failed {
                eprintln!("ERROR: Backing up {} failed: {}", name, error);
            }
            anyhow::bail!(
                "{} firewall(s) failed, {} skipped",
                summary.failed.len(),
                summary.skipped.len()
            )
        }
    }
}
