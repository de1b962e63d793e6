//! Backup orchestrator and snapshot writer.
//!
//! Filesystems are backed up by a bounded pool of worker threads; within
//! one filesystem the pipeline is strictly sequential:
//! lock → pre hooks → transfer into a `.part` working directory →
//! rename promotion → post hooks → unlock. A failure in one filesystem
//! never cancels or blocks another's pipeline.

use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use tracing::{debug, info, warn};

use crate::catalog;
use crate::config::{Config, FilesystemEntry, HookSet};
use crate::error::{HardsnapError, Result};
use crate::hooks::{self, HookContext, HookPhase};
use crate::lock;
use crate::transfer::{Transfer, TransferRequest};

/// Outcome of one filesystem's backup attempt.
#[derive(Debug, Clone)]
pub enum FsOutcome {
    /// A new complete snapshot exists.
    Success { snapshot: String },
    /// The snapshot was promoted, but a post hook failed.
    PostHookFailed { snapshot: String, error: String },
    /// Another operation holds the filesystem's lock; skipped this run.
    LockContention { holder: String },
    /// A pre hook failed; no snapshot directory was created.
    PreHookFailed { error: String },
    /// The transfer tool failed; the working directory was not promoted.
    TransferFailed { error: String },
    /// Setup or promotion I/O failure.
    Failed { error: String },
}

impl FsOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, FsOutcome::Success { .. })
    }
}

impl fmt::Display for FsOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FsOutcome::Success { snapshot } => write!(f, "ok ({snapshot})"),
            FsOutcome::PostHookFailed { snapshot, error } => {
                write!(f, "post-hook failed ({snapshot} kept): {error}")
            }
            FsOutcome::LockContention { holder } => write!(f, "skipped: locked, {holder}"),
            FsOutcome::PreHookFailed { error } => write!(f, "pre-hook failed: {error}"),
            FsOutcome::TransferFailed { error } => write!(f, "transfer failed: {error}"),
            FsOutcome::Failed { error } => write!(f, "failed: {error}"),
        }
    }
}

/// Per-run report: one outcome per selected filesystem, config order.
#[derive(Debug)]
pub struct BackupReport {
    pub outcomes: Vec<(String, FsOutcome)>,
}

impl BackupReport {
    /// True only if every filesystem produced a new snapshot without any
    /// hook failure.
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(|(_, o)| o.is_success())
    }
}

/// Back up every selected filesystem, at most `config.jobs` concurrently.
///
/// `now` names the snapshots for this run; all filesystems in a run share
/// one timestamp.
pub fn run(
    config: &Config,
    transfer: &dyn Transfer,
    filter: &[String],
    now: DateTime<Utc>,
) -> Result<BackupReport> {
    let selected = super::select_filesystems(config, filter)?;
    let dest_root = Path::new(&config.destination);
    std::fs::create_dir_all(dest_root)?;

    let jobs = config.jobs.min(selected.len()).max(1);
    let (work_tx, work_rx) = crossbeam_channel::unbounded::<(usize, &FilesystemEntry)>();
    let (result_tx, result_rx) = crossbeam_channel::unbounded::<(usize, FsOutcome)>();

    for item in selected.iter().copied().enumerate() {
        // Unbounded channel and the receivers outlive the senders; the
        // sends cannot fail.
        let _ = work_tx.send(item);
    }
    drop(work_tx);

    std::thread::scope(|scope| {
        for _ in 0..jobs {
            let work_rx = work_rx.clone();
            let result_tx = result_tx.clone();
            scope.spawn(move || {
                while let Ok((idx, fs)) = work_rx.recv() {
                    let outcome = backup_filesystem(dest_root, fs, &config.hooks, transfer, now);
                    let _ = result_tx.send((idx, outcome));
                }
            });
        }
    });
    drop(result_tx);

    let mut slots: Vec<Option<FsOutcome>> = selected.iter().map(|_| None).collect();
    for (idx, outcome) in result_rx {
        slots[idx] = Some(outcome);
    }

    let outcomes = selected
        .iter()
        .zip(slots)
        .map(|(fs, slot)| {
            let outcome = slot.unwrap_or(FsOutcome::Failed {
                error: "worker terminated without reporting".into(),
            });
            (fs.name.clone(), outcome)
        })
        .collect();

    Ok(BackupReport { outcomes })
}

/// One filesystem's full pipeline. Never panics across the pool boundary;
/// every failure is folded into the outcome.
fn backup_filesystem(
    dest_root: &Path,
    fs: &FilesystemEntry,
    global_hooks: &HookSet,
    transfer: &dyn Transfer,
    now: DateTime<Utc>,
) -> FsOutcome {
    let fs_dir = dest_root.join(&fs.name);
    if let Err(e) = std::fs::create_dir_all(&fs_dir) {
        return FsOutcome::Failed {
            error: format!("cannot create {}: {e}", fs_dir.display()),
        };
    }

    let _guard = match lock::acquire(&fs_dir) {
        Ok(guard) => guard,
        Err(HardsnapError::Locked(holder)) => {
            warn!(filesystem = %fs.name, %holder, "lock contention, skipping");
            return FsOutcome::LockContention { holder };
        }
        Err(e) => {
            return FsOutcome::Failed {
                error: e.to_string(),
            }
        }
    };

    let timestamp = catalog::timestamp_name(now);
    let ctx = HookContext {
        filesystem: fs.name.clone(),
        source: fs.source.clone(),
        destination: fs_dir.to_string_lossy().to_string(),
        timestamp: timestamp.clone(),
        phase: HookPhase::Pre,
    };

    // Pre hooks: global first, then per-filesystem. A failure aborts the
    // pipeline before any snapshot directory exists.
    if let Err(e) = hooks::run_hook_list(&global_hooks.pre, &ctx)
        .and_then(|()| hooks::run_hook_list(&fs.hooks.pre, &ctx))
    {
        return FsOutcome::PreHookFailed {
            error: e.to_string(),
        };
    }

    let snapshot = match write_snapshot(&fs_dir, fs, transfer, &timestamp) {
        Ok(name) => name,
        Err(outcome) => return outcome,
    };

    // Post hooks: per-filesystem first, then global. A failure is recorded
    // but never invalidates the promoted snapshot.
    let ctx = HookContext {
        phase: HookPhase::Post,
        ..ctx
    };
    if let Err(e) = hooks::run_hook_list(&fs.hooks.post, &ctx)
        .and_then(|()| hooks::run_hook_list(&global_hooks.post, &ctx))
    {
        warn!(filesystem = %fs.name, error = %e, "post hook failed, snapshot kept");
        return FsOutcome::PostHookFailed {
            snapshot,
            error: e.to_string(),
        };
    }

    FsOutcome::Success { snapshot }
}

/// Produce exactly one new complete snapshot, or leave no new complete
/// snapshot. Errors are returned as the filesystem's outcome.
fn write_snapshot(
    fs_dir: &Path,
    fs: &FilesystemEntry,
    transfer: &dyn Transfer,
    timestamp: &str,
) -> std::result::Result<String, FsOutcome> {
    let io_failed = |error: String| FsOutcome::Failed { error };

    // Leftover working directories from a crashed run are not restore
    // points; discard them before starting a new one.
    match catalog::discard_incomplete(fs_dir) {
        Ok(0) => {}
        Ok(n) => info!(filesystem = %fs.name, count = n, "discarded incomplete snapshots"),
        Err(e) => return Err(io_failed(e.to_string())),
    }

    let base = catalog::latest_complete(fs_dir).map_err(|e| io_failed(e.to_string()))?;
    let final_dir = fs_dir.join(timestamp);
    if final_dir.exists() {
        return Err(io_failed(format!("snapshot {timestamp} already exists")));
    }

    let working = fs_dir.join(format!("{timestamp}{}", catalog::WORKING_SUFFIX));
    std::fs::create_dir(&working).map_err(|e| io_failed(e.to_string()))?;

    match &base {
        Some(snapshot) => {
            debug!(filesystem = %fs.name, base = %snapshot.name, "incremental snapshot")
        }
        None => debug!(filesystem = %fs.name, "first snapshot, full copy"),
    }

    let request = TransferRequest {
        source: &fs.source,
        dest: &working,
        link_dest: base.as_ref().map(|s| s.path.as_path()),
        preserve_hard_links: false,
    };
    if let Err(e) = transfer.run(&request) {
        // The working directory stays behind unpromoted; the catalog never
        // reports it and the next run discards it.
        return Err(FsOutcome::TransferFailed {
            error: e.to_string(),
        });
    }

    // Promotion is a single rename: a concurrent reader sees either an
    // in-progress directory or a complete snapshot, nothing in between.
    std::fs::rename(&working, &final_dir).map_err(|e| io_failed(e.to_string()))?;

    if let Err(e) = catalog::update_latest_link(fs_dir, timestamp) {
        warn!(filesystem = %fs.name, error = %e, "failed to update latest link");
    }

    info!(filesystem = %fs.name, snapshot = timestamp, "snapshot complete");
    Ok(timestamp.to_string())
}
