//! Replicate each filesystem's latest snapshot to a secondary volume.
//!
//! Intended for rotating offline media: the newest complete snapshot of
//! every filesystem is copied to `<dest>/<name>/<timestamp>/` through the
//! same transfer seam as backups, preserving the hardlink structure inside
//! the snapshot. Targets that already exist are skipped.

use std::fmt;
use std::path::Path;

use tracing::{info, warn};

use crate::catalog;
use crate::config::Config;
use crate::error::{HardsnapError, Result};
use crate::lock;
use crate::transfer::{Transfer, TransferRequest};

#[derive(Debug)]
pub enum OfflineOutcome {
    Copied { snapshot: String },
    AlreadyPresent { snapshot: String },
    NoSnapshots,
    LockContention { holder: String },
    TransferFailed { error: String },
    Failed { error: String },
}

impl OfflineOutcome {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            OfflineOutcome::Copied { .. }
                | OfflineOutcome::AlreadyPresent { .. }
                | OfflineOutcome::NoSnapshots
        )
    }
}

impl fmt::Display for OfflineOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OfflineOutcome::Copied { snapshot } => write!(f, "copied {snapshot}"),
            OfflineOutcome::AlreadyPresent { snapshot } => {
                write!(f, "{snapshot} already present, skipped")
            }
            OfflineOutcome::NoSnapshots => write!(f, "no snapshots, skipped"),
            OfflineOutcome::LockContention { holder } => write!(f, "skipped: locked, {holder}"),
            OfflineOutcome::TransferFailed { error } => write!(f, "transfer failed: {error}"),
            OfflineOutcome::Failed { error } => write!(f, "failed: {error}"),
        }
    }
}

#[derive(Debug)]
pub struct OfflineReport {
    pub outcomes: Vec<(String, OfflineOutcome)>,
}

impl OfflineReport {
    pub fn all_succeeded(&self) -> bool {
        self.outcomes.iter().all(|(_, o)| o.is_success())
    }
}

/// Copy the latest complete snapshot of each selected filesystem to
/// `offline_root`.
pub fn run(
    config: &Config,
    offline_root: &Path,
    transfer: &dyn Transfer,
    filter: &[String],
) -> Result<OfflineReport> {
    let selected = super::select_filesystems(config, filter)?;
    let dest_root = Path::new(&config.destination);

    let mut outcomes = Vec::with_capacity(selected.len());
    for fs in selected {
        let fs_dir = dest_root.join(&fs.name);
        let outcome = replicate_latest(&fs_dir, &offline_root.join(&fs.name), transfer);
        outcomes.push((fs.name.clone(), outcome));
    }

    Ok(OfflineReport { outcomes })
}

fn replicate_latest(fs_dir: &Path, offline_dir: &Path, transfer: &dyn Transfer) -> OfflineOutcome {
    let failed = |e: HardsnapError| OfflineOutcome::Failed {
        error: e.to_string(),
    };

    if !fs_dir.is_dir() {
        return OfflineOutcome::NoSnapshots;
    }

    // Hold the lock so a purge cannot delete the snapshot mid-copy.
    let _guard = match lock::acquire(fs_dir) {
        Ok(guard) => guard,
        Err(HardsnapError::Locked(holder)) => {
            warn!(path = %fs_dir.display(), %holder, "lock contention, skipping replication");
            return OfflineOutcome::LockContention { holder };
        }
        Err(e) => return failed(e),
    };

    let latest = match catalog::latest_complete(fs_dir) {
        Ok(Some(snapshot)) => snapshot,
        Ok(None) => return OfflineOutcome::NoSnapshots,
        Err(e) => return failed(e),
    };

    let target = offline_dir.join(&latest.name);
    if target.exists() {
        return OfflineOutcome::AlreadyPresent {
            snapshot: latest.name,
        };
    }
    if let Err(e) = std::fs::create_dir_all(&target) {
        return failed(e.into());
    }

    let source = latest.path.to_string_lossy().to_string();
    let request = TransferRequest {
        source: &source,
        dest: &target,
        link_dest: None,
        preserve_hard_links: true,
    };
    if let Err(e) = transfer.run(&request) {
        return OfflineOutcome::TransferFailed {
            error: e.to_string(),
        };
    }

    info!(snapshot = %latest.name, dest = %target.display(), "snapshot replicated");
    OfflineOutcome::Copied {
        snapshot: latest.name,
    }
}
