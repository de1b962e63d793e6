//! Read-only view over a filesystem's snapshot directory.
//!
//! A snapshot is a directory named by its UTC timestamp
//! (`20260830.142501`). A directory still being written carries the
//! `.part` suffix and is never reported as a restore point. Entries that
//! match neither convention (including the `latest` symlink) are foreign
//! and ignored.

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, Utc};
use tracing::debug;

use crate::error::Result;

pub const TIMESTAMP_FORMAT: &str = "%Y%m%d.%H%M%S";
pub const WORKING_SUFFIX: &str = ".part";
pub const LATEST_LINK: &str = "latest";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapshotState {
    Complete,
    InProgress,
}

#[derive(Debug, Clone)]
pub struct Snapshot {
    /// Final directory name, without the working suffix.
    pub name: String,
    pub time: DateTime<Utc>,
    pub path: PathBuf,
    pub state: SnapshotState,
}

impl Snapshot {
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        now.signed_duration_since(self.time)
    }
}

/// Directory name for a snapshot taken at `time`.
pub fn timestamp_name(time: DateTime<Utc>) -> String {
    time.format(TIMESTAMP_FORMAT).to_string()
}

/// Parse a snapshot directory name back into its timestamp.
/// Returns `None` for anything that does not match the naming convention.
pub fn parse_timestamp(name: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(name, TIMESTAMP_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}

/// List every snapshot under `fs_dir`, complete and in-progress, ascending
/// by timestamp. A missing directory yields an empty list.
pub fn list(fs_dir: &Path) -> Result<Vec<Snapshot>> {
    let mut snapshots = Vec::new();
    if !fs_dir.is_dir() {
        return Ok(snapshots);
    }

    for entry in std::fs::read_dir(fs_dir)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        // Symlinks (the `latest` pointer in particular) are not snapshots.
        if file_type.is_symlink() || !file_type.is_dir() {
            continue;
        }
        let file_name = entry.file_name();
        let Some(name) = file_name.to_str() else {
            continue;
        };

        let (base, state) = match name.strip_suffix(WORKING_SUFFIX) {
            Some(base) => (base, SnapshotState::InProgress),
            None => (name, SnapshotState::Complete),
        };
        let Some(time) = parse_timestamp(base) else {
            debug!(entry = name, "ignoring foreign entry in snapshot directory");
            continue;
        };

        snapshots.push(Snapshot {
            name: base.to_string(),
            time,
            path: entry.path(),
            state,
        });
    }

    snapshots.sort_by_key(|s| s.time);
    Ok(snapshots)
}

/// List only complete snapshots, ascending by timestamp.
pub fn list_complete(fs_dir: &Path) -> Result<Vec<Snapshot>> {
    let mut snapshots = list(fs_dir)?;
    snapshots.retain(|s| s.state == SnapshotState::Complete);
    Ok(snapshots)
}

/// The most recent complete snapshot, used as the hardlink base.
pub fn latest_complete(fs_dir: &Path) -> Result<Option<Snapshot>> {
    Ok(list_complete(fs_dir)?.pop())
}

/// Remove leftover in-progress directories from earlier runs.
/// Returns the number of directories removed.
pub fn discard_incomplete(fs_dir: &Path) -> Result<usize> {
    let mut removed = 0usize;
    for snapshot in list(fs_dir)? {
        if snapshot.state == SnapshotState::InProgress {
            debug!(path = %snapshot.path.display(), "discarding incomplete snapshot");
            std::fs::remove_dir_all(&snapshot.path)?;
            removed += 1;
        }
    }
    Ok(removed)
}

/// Point `<fs_dir>/latest` at the named snapshot.
#[cfg(unix)]
pub fn update_latest_link(fs_dir: &Path, name: &str) -> Result<()> {
    let link = fs_dir.join(LATEST_LINK);
    if link.symlink_metadata().is_ok() {
        std::fs::remove_file(&link)?;
    }
    std::os::unix::fs::symlink(name, &link)?;
    Ok(())
}

#[cfg(not(unix))]
pub fn update_latest_link(_fs_dir: &Path, _name: &str) -> Result<()> {
    Ok(())
}
