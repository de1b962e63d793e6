//! Purge executor: applies the retention policy's delete set.
//!
//! Each filesystem is handled independently under its own lock, so a purge
//! can never race a backup of the same filesystem. Condemned directories
//! are re-validated against the live directory state right before removal,
//! and nothing outside the evaluator's delete set is ever touched.

use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use crate::catalog;
use crate::config::{Config, RetentionConfig};
use crate::error::{HardsnapError, Result};
use crate::lock;
use crate::prune::{apply_policy, PruneDecision, PruneEntry};

#[derive(Debug)]
pub enum PurgeOutcome {
    Done {
        kept: usize,
        removed: usize,
        /// (snapshot name, error) for directories that failed to delete.
        failures: Vec<(String, String)>,
    },
    /// Another operation holds the filesystem's lock; skipped this run.
    LockContention { holder: String },
    Failed { error: String },
}

impl PurgeOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, PurgeOutcome::Done { failures, .. } if failures.is_empty())
    }
}

impl fmt::Display for PurgeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PurgeOutcome::Done {
                kept,
                removed,
                failures,
            } if failures.is_empty() => write!(f, "kept {kept}, removed {removed}"),
            PurgeOutcome::Done {
                kept,
                removed,
                failures,
            } => write!(
                f,
                "kept {kept}, removed {removed}, {} failed to delete",
                failures.len()
            ),
            PurgeOutcome::LockContention { holder } => write!(f, "skipped: locked, {holder}"),
            PurgeOutcome::Failed { error } => write!(f, "failed: {error}"),
        }
    }
}

#[derive(Debug)]
pub struct FsPurge {
    pub name: String,
    pub outcome: PurgeOutcome,
    /// Keep/prune decision per snapshot, newest first (for --list output).
    pub entries: Vec<PruneEntry>,
}

#[derive(Debug)]
pub struct PurgeReport {
    pub filesystems: Vec<FsPurge>,
    pub dry_run: bool,
}

impl PurgeReport {
    pub fn all_succeeded(&self) -> bool {
        self.filesystems.iter().all(|fs| fs.outcome.is_success())
    }
}

/// Purge every selected filesystem under its retention policy.
///
/// Rule-set problems are fatal before any filesystem is touched; from then
/// on failures are isolated per filesystem and per snapshot directory.
pub fn run(
    config: &Config,
    filter: &[String],
    dry_run: bool,
    now: DateTime<Utc>,
) -> Result<PurgeReport> {
    let selected = super::select_filesystems(config, filter)?;
    let dest_root = Path::new(&config.destination);

    // Validate every effective policy up front: no side effects happen
    // when any filesystem's rules are unusable.
    for fs in &selected {
        let policy = effective_policy(config, fs.retention.as_ref());
        if !policy.has_any_rule() {
            return Err(HardsnapError::Config(format!(
                "no retention rules configured for filesystem '{}'; set at least one keep_* option",
                fs.name
            )));
        }
        policy.validate()?;
    }

    let mut filesystems = Vec::with_capacity(selected.len());
    for fs in selected {
        let policy = effective_policy(config, fs.retention.as_ref());
        let fs_dir = dest_root.join(&fs.name);
        let (outcome, entries) = purge_filesystem(&fs_dir, policy, dry_run, now);
        filesystems.push(FsPurge {
            name: fs.name.clone(),
            outcome,
            entries,
        });
    }

    Ok(PurgeReport {
        filesystems,
        dry_run,
    })
}

fn effective_policy<'a>(
    config: &'a Config,
    override_policy: Option<&'a RetentionConfig>,
) -> &'a RetentionConfig {
    override_policy.unwrap_or(&config.retention)
}

fn purge_filesystem(
    fs_dir: &Path,
    policy: &RetentionConfig,
    dry_run: bool,
    now: DateTime<Utc>,
) -> (PurgeOutcome, Vec<PruneEntry>) {
    let failed = |e: HardsnapError| {
        (
            PurgeOutcome::Failed {
                error: e.to_string(),
            },
            Vec::new(),
        )
    };

    if !fs_dir.is_dir() {
        // Nothing ever backed up here; an empty catalog is a no-op.
        return (
            PurgeOutcome::Done {
                kept: 0,
                removed: 0,
                failures: Vec::new(),
            },
            Vec::new(),
        );
    }

    let _guard = match lock::acquire(fs_dir) {
        Ok(guard) => guard,
        Err(HardsnapError::Locked(holder)) => {
            warn!(path = %fs_dir.display(), %holder, "lock contention, skipping purge");
            return (PurgeOutcome::LockContention { holder }, Vec::new());
        }
        Err(e) => return failed(e),
    };

    let snapshots = match catalog::list_complete(fs_dir) {
        Ok(s) => s,
        Err(e) => return failed(e),
    };
    let entries = match apply_policy(&snapshots, policy, now) {
        Ok(entries) => entries,
        Err(e) => return failed(e),
    };

    let mut kept = 0usize;
    let mut removed = 0usize;
    let mut failures = Vec::new();

    for entry in &entries {
        match entry.decision {
            PruneDecision::Keep { .. } => kept += 1,
            PruneDecision::Prune => {
                if dry_run {
                    removed += 1;
                    continue;
                }
                let path = fs_dir.join(&entry.snapshot_name);
                // Re-validate against live directory state: only a
                // still-present, still-complete snapshot is removed.
                if !still_complete(&path) {
                    continue;
                }
                match std::fs::remove_dir_all(&path) {
                    Ok(()) => {
                        info!(path = %path.display(), "removed snapshot");
                        removed += 1;
                    }
                    Err(e) => {
                        warn!(path = %path.display(), error = %e, "failed to remove snapshot");
                        failures.push((entry.snapshot_name.clone(), e.to_string()));
                    }
                }
            }
        }
    }

    (
        PurgeOutcome::Done {
            kept,
            removed,
            failures,
        },
        entries,
    )
}

/// The delete set was computed from complete snapshots; confirm the path
/// still names one before removal.
fn still_complete(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    catalog::parse_timestamp(name).is_some()
        && !name.ends_with(catalog::WORKING_SUFFIX)
        && !path.is_symlink()
        && path.is_dir()
}
