//! Post-backup consistency checks on the destination directory.
//!
//! Startup and running config of a unit should carry the same
//! `Cryptochecksum`, otherwise someone forgot a `write memory`. Active and
//! standby copies of a context config should match too, otherwise failover
//! replication is broken. Mismatches are shown as a unified diff.

use crate::destination::ArtifactKind;
use crate::topology::FailoverUnit;
use chrono::{DateTime, Local};
use regex::Regex;
use similar::TextDiff;
use std::io::{self, Write};
use std::path::Path;
use std::sync::LazyLock;
use tracing::{error, info, warn};
use walkdir::WalkDir;

static CRYPTOCHECKSUM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^Cryptochecksum:([0-9a-f]+)$").unwrap());

const RULE_WIDTH: usize = 80;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairOutcome {
    Match,
    Mismatch,
    /// One of the files could not be read; the pair was not compared.
    Unreadable(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairReport {
    pub first: String,
    pub second: String,
    pub outcome: PairOutcome,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerificationReport {
    pub pairs: Vec<PairReport>,
}

impl VerificationReport {
    pub fn mismatches(&self) -> usize {
        self.count(|o| *o == PairOutcome::Mismatch)
    }

    pub fn unreadable(&self) -> usize {
        self.count(|o| matches!(o, PairOutcome::Unreadable(_)))
    }

    pub fn is_consistent(&self) -> bool {
        self.pairs.iter().all(|p| p.outcome == PairOutcome::Match)
    }

    fn count(&self, pred: impl Fn(&PairOutcome) -> bool) -> usize {
        self.pairs.iter().filter(|p| pred(&p.outcome)).count()
    }
}

/// Checksum from the last `Cryptochecksum:<hex>` line of a config.
pub fn extract_checksum(content: &str) -> Option<&str> {
    content
        .lines()
        .filter_map(|line| CRYPTOCHECKSUM.captures(line.trim()))
        .last()
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
}

/// Files match only when both carry a checksum and the checksums are equal.
pub fn checksums_match(first: &str, second: &str) -> bool {
    match (extract_checksum(first), extract_checksum(second)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// `ls -l` style listing of the backup directory.
pub fn list_directory(dir: &Path, out: &mut dyn Write) -> io::Result<()> {
    writeln!(out, "Verifying backup on {}:", dir.display())?;

    let entries = WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|e| e.ok());

    for entry in entries {
        let Ok(metadata) = entry.metadata() else {
            continue;
        };
        let modified = metadata
            .modified()
            .map(|t| DateTime::<Local>::from(t).format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|_| "-".to_string());
        let kind = if metadata.is_dir() { "d" } else { "-" };

        writeln!(
            out,
            "{} {:>12} {} {}",
            kind,
            metadata.len(),
            modified,
            entry.file_name().to_string_lossy()
        )?;
    }
    writeln!(out)?;

    Ok(())
}

/// Compare two files of `dir`, printing a diff to `out` when they differ.
///
/// The outcome never depends on `out`: a failing writer only costs the
/// printed report.
pub fn compare_files(dir: &Path, first: &str, second: &str, out: &mut dyn Write) -> PairOutcome {
    let read = |name: &str| std::fs::read(dir.join(name)).map(|b| String::from_utf8_lossy(&b).into_owned());

    let (a, b) = match (read(first), read(second)) {
        (Ok(a), Ok(b)) => (a, b),
        (Err(e), _) | (_, Err(e)) => {
            error!(first, second, error = %e, "Reading files for comparison failed");
            report_write(writeln!(out, "ERROR: Reading files {}, {} failed: {}", first, second, e));
            return PairOutcome::Unreadable(e.to_string());
        }
    };

    if checksums_match(&a, &b) {
        info!(first, second, "Cryptochecksums match");
        return PairOutcome::Match;
    }

    warn!(first, second, "Files differ");
    report_write(print_diff(first, second, &a, &b, out));
    PairOutcome::Mismatch
}

fn print_diff(first: &str, second: &str, a: &str, b: &str, out: &mut dyn Write) -> io::Result<()> {
    let rule = "-".repeat(RULE_WIDTH);
    writeln!(out, "{}", rule)?;
    writeln!(out, "Files {} and {} differ:", first, second)?;
    writeln!(out, "{}", rule)?;
    let diff = TextDiff::from_lines(a, b);
    write!(out, "{}", diff.unified_diff().header(first, second))
}

fn report_write(result: io::Result<()>) {
    if let Err(e) = result {
        warn!(error = %e, "Writing verification report failed");
    }
}

/// Run all comparisons for a finished backup. Every pair is compared even
/// when some files are unreadable or the report cannot be written.
pub fn verify_backup(
    dir: &Path,
    failover_units: &[FailoverUnit],
    contexts: &[String],
    out: &mut dyn Write,
) -> VerificationReport {
    report_write(list_directory(dir, out));

    let mut pairs: Vec<(String, String)> = failover_units
        .iter()
        .map(|unit| {
            (
                ArtifactKind::StartupConfig.file_name(*unit),
                ArtifactKind::RunningConfig.file_name(*unit),
            )
        })
        .collect();

    if failover_units.contains(&FailoverUnit::Standby) {
        pairs.extend(contexts.iter().map(|context| {
            (
                ArtifactKind::ContextConfig(context).file_name(FailoverUnit::Active),
                ArtifactKind::ContextConfig(context).file_name(FailoverUnit::Standby),
            )
        }));
    }

    let mut report = VerificationReport::default();
    for (first, second) in pairs {
        let outcome = compare_files(dir, &first, &second, out);
        report.pairs.push(PairReport {
            first,
            second,
            outcome,
        });
    }

    report
}
