use serde::{Deserialize, Deserializer, Serialize};

use super::defaults::*;
use crate::error::{HardsnapError, Result};
use crate::prune::parse_duration;

/// Top-level configuration: where snapshots land, how many filesystems run
/// at once, and the per-filesystem backup targets.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Destination root; each filesystem gets `<destination>/<name>/`.
    pub destination: String,
    /// Concurrency limit for filesystem backups.
    #[serde(default = "default_jobs")]
    pub jobs: usize,
    #[serde(default)]
    pub transfer: TransferConfig,
    /// Global retention rules; per-filesystem entries may override.
    #[serde(default)]
    pub retention: RetentionConfig,
    /// Global hooks, run for every filesystem.
    #[serde(default)]
    pub hooks: HookSet,
    pub filesystems: Vec<FilesystemEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FilesystemEntry {
    /// Stable name; becomes the snapshot parent directory.
    pub name: String,
    /// rsync-style source: a local path or `[user@]host:/path`.
    pub source: String,
    #[serde(default)]
    pub hooks: HookSet,
    /// Overrides the global retention rules for this filesystem.
    pub retention: Option<RetentionConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TransferConfig {
    /// Transfer program; anything argument-compatible with rsync works.
    #[serde(default = "default_transfer_program")]
    pub program: String,
    /// Extra arguments appended to the built-in set.
    #[serde(default)]
    pub args: Vec<String>,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            program: default_transfer_program(),
            args: Vec::new(),
        }
    }
}

/// Pre/post hook command lists. A single string is accepted as a
/// one-element list.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HookSet {
    #[serde(default, deserialize_with = "string_or_vec")]
    pub pre: Vec<String>,
    #[serde(default, deserialize_with = "string_or_vec")]
    pub post: Vec<String>,
}

impl HookSet {
    pub fn is_empty(&self) -> bool {
        self.pre.is_empty() && self.post.is_empty()
    }
}

fn string_or_vec<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Input {
        One(String),
        Many(Vec<String>),
    }
    Ok(match Input::deserialize(deserializer)? {
        Input::One(s) => vec![s],
        Input::Many(v) => v,
    })
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RetentionConfig {
    /// Keep all snapshots within this interval (e.g. "2d", "48h", "1w").
    pub keep_within: Option<String>,
    /// Keep the N most recent snapshots.
    pub keep_last: Option<usize>,
    pub keep_hourly: Option<usize>,
    pub keep_daily: Option<usize>,
    pub keep_weekly: Option<usize>,
    pub keep_monthly: Option<usize>,
    pub keep_yearly: Option<usize>,
}

impl RetentionConfig {
    /// Returns true if at least one keep_* option is set.
    pub fn has_any_rule(&self) -> bool {
        self.keep_within.is_some()
            || self.keep_last.is_some()
            || self.keep_hourly.is_some()
            || self.keep_daily.is_some()
            || self.keep_weekly.is_some()
            || self.keep_monthly.is_some()
            || self.keep_yearly.is_some()
    }

    /// A rule set never degrades to "keep nothing": zero counts are
    /// rejected up front (omit the rule instead), and `keep_within` must
    /// parse.
    pub fn validate(&self) -> Result<()> {
        if let Some(ref within) = self.keep_within {
            parse_duration(within)?;
        }
        let counts = [
            ("keep_last", self.keep_last),
            ("keep_hourly", self.keep_hourly),
            ("keep_daily", self.keep_daily),
            ("keep_weekly", self.keep_weekly),
            ("keep_monthly", self.keep_monthly),
            ("keep_yearly", self.keep_yearly),
        ];
        for (name, value) in counts {
            if value == Some(0) {
                return Err(HardsnapError::Config(format!(
                    "{name} must be at least 1 (omit the rule to disable it)"
                )));
            }
        }
        Ok(())
    }
}
