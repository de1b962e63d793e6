//! Per-filesystem advisory lock.
//!
//! A backup and a purge (or two backups) must never operate on the same
//! snapshot directory at once. The lock is a JSON file created with
//! `create_new` inside the filesystem's destination directory; whoever
//! creates it owns the filesystem until the guard is dropped. Acquisition
//! is always fail-fast; a contended filesystem is skipped this run.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{HardsnapError, Result};

pub const LOCK_FILE: &str = ".hardsnap-lock.json";

/// Locks older than this are assumed to belong to a dead process.
const STALE_LOCK_SECS: i64 = 6 * 60 * 60;

#[derive(Debug, Serialize, Deserialize)]
struct LockEntry {
    hostname: String,
    pid: u32,
    time: String,
}

/// Handle to an acquired lock. Releases on drop, on every exit path.
#[derive(Debug)]
pub struct LockGuard {
    path: PathBuf,
    released: bool,
}

impl LockGuard {
    /// Explicit release, surfacing any removal error.
    pub fn release(mut self) -> Result<()> {
        self.released = true;
        std::fs::remove_file(&self.path)?;
        Ok(())
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if !self.released {
            if let Err(e) = std::fs::remove_file(&self.path) {
                warn!(path = %self.path.display(), error = %e, "failed to release lock");
            }
        }
    }
}

/// Acquire the lock for a filesystem's destination directory.
///
/// Fails immediately with [`HardsnapError::Locked`] when another operation
/// holds it; never blocks. A stale lock is reaped and acquisition retried
/// once.
pub fn acquire(fs_dir: &Path) -> Result<LockGuard> {
    let path = fs_dir.join(LOCK_FILE);

    for attempt in 0..2 {
        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
        {
            Ok(mut file) => {
                let entry = LockEntry {
                    hostname: crate::platform::hostname(),
                    pid: std::process::id(),
                    time: Utc::now().to_rfc3339(),
                };
                let data = serde_json::to_vec(&entry)
                    .map_err(|e| HardsnapError::Other(format!("lock serialize: {e}")))?;
                file.write_all(&data)?;
                debug!(path = %path.display(), "lock acquired");
                return Ok(LockGuard {
                    path,
                    released: false,
                });
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                if attempt == 0 && reap_if_stale(&path)? {
                    continue;
                }
                return Err(HardsnapError::Locked(describe_holder(&path)));
            }
            Err(e) => return Err(e.into()),
        }
    }

    Err(HardsnapError::Locked(describe_holder(&path)))
}

/// Forcibly remove a filesystem's lock file. Recovery mechanism for locks
/// left behind by killed processes. Returns true if a lock was removed.
pub fn break_lock(fs_dir: &Path) -> Result<bool> {
    let path = fs_dir.join(LOCK_FILE);
    match std::fs::remove_file(&path) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e.into()),
    }
}

/// Remove the lock file if it is too old. Returns true if it was removed.
///
/// A file without a readable entry is judged by its mtime: a holder that
/// just won `create_new` but has not finished writing looks malformed for
/// a moment, and must not be reaped.
fn reap_if_stale(path: &Path) -> Result<bool> {
    let stale = match read_entry(path) {
        Some(entry) => match chrono::DateTime::parse_from_rfc3339(&entry.time) {
            Ok(acquired) => {
                let age = Utc::now().signed_duration_since(acquired.with_timezone(&Utc));
                age.num_seconds() > STALE_LOCK_SECS
            }
            Err(_) => stale_by_mtime(path),
        },
        None => stale_by_mtime(path),
    };

    if stale {
        warn!(path = %path.display(), "reaping stale lock");
        match std::fs::remove_file(path) {
            Ok(()) => Ok(true),
            // Lost the race to the (live) holder releasing it; retry acquire.
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(true),
            Err(e) => Err(e.into()),
        }
    } else {
        Ok(false)
    }
}

fn stale_by_mtime(path: &Path) -> bool {
    match std::fs::metadata(path).and_then(|m| m.modified()) {
        Ok(modified) => modified
            .elapsed()
            .map(|age| age.as_secs() > STALE_LOCK_SECS as u64)
            .unwrap_or(false),
        // Already gone; the removal attempt settles the race.
        Err(_) => true,
    }
}

fn read_entry(path: &Path) -> Option<LockEntry> {
    let data = std::fs::read(path).ok()?;
    serde_json::from_slice(&data).ok()
}

fn describe_holder(path: &Path) -> String {
    match read_entry(path) {
        Some(entry) => format!(
            "held by {} pid {} since {}",
            entry.hostname, entry.pid, entry.time
        ),
        None => "holder unknown".to_string(),
    }
}
