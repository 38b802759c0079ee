//! Backup of one firewall (HA pair), start to finish.
//!
//! Runs strictly in order over a single session: topology discovery, then
//! per unit tech-support, configuration and full backup, active unit first.
//! The session is closed before the backup directory is verified.

use crate::config::{DeviceParams, DEVICE_TYPE_ASA};
use crate::destination::BackupDestination;
use crate::plan::{command_count, resolve_context_sources, PlanBuilder};
use crate::retention::{retention_slot, RetentionSlot};
use crate::topology::{self, DeviceTopology};
use crate::transport::{run_plan, Connector, Session};
use crate::utils::{BackupError, Result};
use crate::verify::{verify_backup, VerificationReport};
use chrono::{DateTime, Local};
use std::fs::File;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tracing::{info, warn};

const RULE_WIDTH: usize = 80;

/// What a successful device run did.
#[derive(Debug, Clone)]
pub struct DeviceReport {
    pub device: String,
    pub slot: RetentionSlot,
    pub directory: PathBuf,
    pub topology: DeviceTopology,
    pub commands_sent: usize,
    pub verification: VerificationReport,
}

/// Back up the firewall described by `params`.
///
/// Artifacts copied before a failure are left in place, and verification
/// still runs whenever the topology had been discovered.
pub fn backup_device<C: Connector>(
    params: &DeviceParams,
    connector: &C,
    now: DateTime<Local>,
    out: &mut dyn Write,
) -> Result<DeviceReport> {
    if params.device_type != DEVICE_TYPE_ASA {
        warn!(device = %params.name, device_type = %params.device_type, "Unsupported device type, assuming {}", DEVICE_TYPE_ASA);
    }

    let slot = retention_slot(&now);
    let destination = BackupDestination::new(
        &params.backup_dir,
        &params.name,
        &slot,
        &params.backup_host,
        &params.backup_username,
        &params.backup_password,
    );

    if let Err(e) = print_banner(params, &destination, &now, out) {
        warn!(error = %e, "Writing report header failed");
    }

    prepare_directory(&destination.directory, now)?;

    let (topology, captured) = capture(params, connector, &destination)?;

    let verification = verify_backup(
        &destination.directory,
        &topology.failover_units,
        &topology.contexts,
        out,
    );
    info!(
        device = %params.name,
        mismatches = verification.mismatches(),
        unreadable = verification.unreadable(),
        "Verification finished"
    );

    let commands_sent = captured?;
    Ok(DeviceReport {
        device: params.name.clone(),
        slot,
        directory: destination.directory,
        topology,
        commands_sent,
        verification,
    })
}

/// Everything that needs the session. The outer error means the device was
/// never inspected; the inner result carries the capture outcome. The session
/// is dropped, and thereby closed, on return.
fn capture<C: Connector>(
    params: &DeviceParams,
    connector: &C,
    destination: &BackupDestination,
) -> Result<(DeviceTopology, Result<usize>)> {
    let mut session = connector.connect(params, &destination.directory)?;
    let topology = topology::inspect(&mut session)?;
    let captured = capture_units(&mut session, params, destination, &topology);
    Ok((topology, captured))
}

/// Run every unit's plan, active unit first. Returns the number of plan
/// commands sent.
fn capture_units<S: Session>(
    session: &mut S,
    params: &DeviceParams,
    destination: &BackupDestination,
    topology: &DeviceTopology,
) -> Result<usize> {
    let device = params.name.as_str();
    let url = destination.url();
    let builder = PlanBuilder::new(topology, &url, &params.backup_passphrase);
    let mut sent = 0;

    for &unit in &topology.failover_units {
        let sources = resolve_context_sources(session, &topology.contexts)?;
        let plan = builder.unit_plan(unit, &sources);
        let commands = command_count(&plan, unit);

        info!(
            device,
            unit = %unit,
            commands,
            contexts = sources.len(),
            "Collecting tech-support, config and backups"
        );
        run_plan(session, &plan)?;
        sent += commands;
    }

    info!(device, commands = sent, destination = %destination, "All units captured");
    Ok(sent)
}

/// Create the destination directory, or bump its mtime when a previous run
/// already created it, so the slot shows when it was last written.
pub fn prepare_directory(dir: &Path, now: DateTime<Local>) -> Result<()> {
    let dest_err = |source| BackupError::Destination {
        path: dir.to_path_buf(),
        source,
    };

    if dir.exists() {
        File::open(dir)
            .and_then(|d| d.set_modified(SystemTime::from(now)))
            .map_err(dest_err)?;
    } else {
        std::fs::create_dir_all(dir).map_err(dest_err)?;
    }
    Ok(())
}

fn print_banner(
    params: &DeviceParams,
    destination: &BackupDestination,
    now: &DateTime<Local>,
    out: &mut dyn Write,
) -> io::Result<()> {
    let rule = "=".repeat(RULE_WIDTH);
    writeln!(out)?;
    writeln!(out, "{}", rule)?;
    writeln!(out, "Firewall name   : {}", params.name)?;
    writeln!(out, "Firewall host   : {}", params.hostname)?;
    writeln!(out, "Backup host     : {}", params.backup_host)?;
    writeln!(out, "Backup directory: {}", destination.directory.display())?;
    writeln!(out, "Backup date/time: {}", now.format("%Y-%m-%d %H:%M:%S"))?;
    writeln!(out, "{}", rule)?;
    writeln!(out)?;
    Ok(())
}
