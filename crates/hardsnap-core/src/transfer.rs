//! The transfer-tool seam.
//!
//! The orchestrator never copies files itself; it hands the source, the
//! destination working directory, and (when available) the previous
//! snapshot as a hardlink reference to an external synchronizing copy
//! tool and interprets only its exit status. The seam is a trait so the
//! orchestration logic is testable without spawning rsync.

use std::path::Path;
use std::process::Command;

use tracing::{debug, warn};

use crate::config::TransferConfig;
use crate::error::{HardsnapError, Result};

/// One copy operation: replicate `source` into `dest`, hardlinking any file
/// unchanged relative to `link_dest` instead of copying it.
pub struct TransferRequest<'a> {
    /// rsync-style source: a local path or `[user@]host:/path`.
    pub source: &'a str,
    /// Destination working directory (created by the caller).
    pub dest: &'a Path,
    /// Base snapshot for hardlink sharing; `None` means full copy.
    pub link_dest: Option<&'a Path>,
    /// Preserve existing hardlinks within the source tree
    /// (volume-to-volume replication).
    pub preserve_hard_links: bool,
}

pub trait Transfer: Sync {
    fn run(&self, req: &TransferRequest<'_>) -> Result<()>;
}

/// Baseline argument set for every invocation.
const BASE_ARGS: &[&str] = &[
    "--acls",
    "--archive",
    "--compress",
    "--human-readable",
    "--numeric-ids",
    "--one-file-system",
    "--quiet",
    "--sparse",
    "--stats",
    "--xattrs",
    "-F",
];

/// Well-known rsync exit statuses, used to enrich error messages.
fn describe_status(code: i32) -> Option<&'static str> {
    match code {
        23 => Some("partial transfer due to error"),
        24 => Some("partial transfer due to vanished source files"),
        30 => Some("timeout in data send/receive"),
        255 => Some("ssh connection failure"),
        _ => None,
    }
}

/// Production transfer: shells out to rsync (or a compatible program).
pub struct RsyncTransfer {
    program: String,
    extra_args: Vec<String>,
}

impl RsyncTransfer {
    pub fn new(program: impl Into<String>, extra_args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            extra_args,
        }
    }

    pub fn from_config(config: &TransferConfig) -> Self {
        Self::new(config.program.clone(), config.args.clone())
    }

    fn build_args(&self, req: &TransferRequest<'_>) -> Vec<String> {
        let mut args: Vec<String> = BASE_ARGS.iter().map(|s| s.to_string()).collect();
        args.extend(self.extra_args.iter().cloned());

        if req.preserve_hard_links {
            args.push("--hard-links".to_string());
        }
        if let Some(base) = req.link_dest {
            args.push(format!("--link-dest={}", base.display()));
        }

        // Trailing slashes: copy directory contents, not the directory.
        args.push("--".to_string());
        args.push(format!("{}/", req.source.trim_end_matches('/')));
        args.push(format!("{}/", req.dest.display()));
        args
    }
}

impl Transfer for RsyncTransfer {
    fn run(&self, req: &TransferRequest<'_>) -> Result<()> {
        let args = self.build_args(req);
        debug!(program = %self.program, ?args, "invoking transfer tool");

        let output = Command::new(&self.program)
            .args(&args)
            .output()
            .map_err(|e| {
                HardsnapError::Transfer(format!("failed to execute '{}': {e}", self.program))
            })?;

        match output.status.code() {
            Some(0) => Ok(()),
            // Vanished source files happen on any live system; the files
            // that were transferred are intact.
            Some(24) => {
                warn!(source = req.source, "transfer finished with vanished source files");
                Ok(())
            }
            Some(code) => {
                let detail = describe_status(code)
                    .map(|d| format!(" ({d})"))
                    .unwrap_or_default();
                let stderr = String::from_utf8_lossy(&output.stderr);
                Err(HardsnapError::Transfer(format!(
                    "{} exited with {code}{detail}: {}",
                    self.program,
                    stderr.trim_end()
                )))
            }
            None => Err(HardsnapError::Transfer(format!(
                "{} terminated by signal",
                self.program
            ))),
        }
    }
}
