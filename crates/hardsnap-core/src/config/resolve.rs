use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use super::types::Config;
use crate::error::{HardsnapError, Result};

/// Tracks where the config file was found.
#[derive(Debug, Clone)]
pub enum ConfigSource {
    /// Explicitly passed via `--config`.
    CliArg(PathBuf),
    /// Set via the `HARDSNAP_CONFIG` env var.
    EnvVar(PathBuf),
    /// Found by searching standard locations.
    SearchOrder { path: PathBuf, level: &'static str },
}

impl ConfigSource {
    pub fn path(&self) -> &Path {
        match self {
            ConfigSource::CliArg(p) => p,
            ConfigSource::EnvVar(p) => p,
            ConfigSource::SearchOrder { path, .. } => path,
        }
    }
}

impl fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigSource::CliArg(p) => write!(f, "{} (--config)", p.display()),
            ConfigSource::EnvVar(p) => write!(f, "{} (HARDSNAP_CONFIG)", p.display()),
            ConfigSource::SearchOrder { path, level } => {
                write!(f, "{} ({})", path.display(), level)
            }
        }
    }
}

/// Returns search locations in priority order: project, user, system.
pub fn default_config_search_paths() -> Vec<(PathBuf, &'static str)> {
    let mut paths = vec![(PathBuf::from("hardsnap.yaml"), "project")];

    let user_config = std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .filter(|p| p.is_absolute())
        .or_else(|| dirs::home_dir().map(|h| h.join(".config")))
        .map(|base| base.join("hardsnap").join("config.yaml"));
    if let Some(p) = user_config {
        paths.push((p, "user"));
    }

    paths.push((PathBuf::from("/etc/hardsnap/config.yaml"), "system"));
    paths
}

/// Resolve which config file to use.
///
/// Priority: CLI arg > `HARDSNAP_CONFIG` env var > first existing file from
/// the search paths. Returns `None` if nothing is found.
pub fn resolve_config_path(cli_config: Option<&str>) -> Option<ConfigSource> {
    if let Some(path) = cli_config {
        return Some(ConfigSource::CliArg(PathBuf::from(path)));
    }

    if let Ok(val) = std::env::var("HARDSNAP_CONFIG") {
        if !val.is_empty() {
            return Some(ConfigSource::EnvVar(PathBuf::from(val)));
        }
    }

    for (path, level) in default_config_search_paths() {
        if path.exists() {
            return Some(ConfigSource::SearchOrder { path, level });
        }
    }

    None
}

/// Load, parse, and validate a config file. Any error here is fatal and
/// reported before a single filesystem is touched.
pub fn load_config(path: &Path) -> Result<Config> {
    let contents = std::fs::read_to_string(path).map_err(|e| {
        HardsnapError::Config(format!("cannot read '{}': {e}", path.display()))
    })?;
    let mut config: Config = serde_yaml::from_str(&contents).map_err(|e| {
        HardsnapError::Config(format!("invalid config '{}': {e}", path.display()))
    })?;
    config.destination = expand_tilde(&config.destination);
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    if config.destination.is_empty() {
        return Err(HardsnapError::Config("'destination:' must not be empty".into()));
    }
    if config.jobs == 0 {
        return Err(HardsnapError::Config("'jobs:' must be at least 1".into()));
    }
    if config.filesystems.is_empty() {
        return Err(HardsnapError::Config("'filesystems:' must not be empty".into()));
    }
    if config.transfer.program.is_empty() {
        return Err(HardsnapError::Config("'transfer.program:' must not be empty".into()));
    }

    let mut seen = HashSet::new();
    for fs in &config.filesystems {
        if fs.name.is_empty() {
            return Err(HardsnapError::Config("filesystem name must not be empty".into()));
        }
        if fs.name.contains('/') || fs.name.contains('\\') || fs.name == "." || fs.name == ".." {
            return Err(HardsnapError::Config(format!(
                "filesystem name '{}' must be a single path component",
                fs.name
            )));
        }
        if fs.name == crate::catalog::LATEST_LINK {
            return Err(HardsnapError::Config(format!(
                "filesystem name '{}' is reserved",
                fs.name
            )));
        }
        if !seen.insert(fs.name.as_str()) {
            return Err(HardsnapError::Config(format!(
                "duplicate filesystem name: '{}'",
                fs.name
            )));
        }
        if fs.source.is_empty() {
            return Err(HardsnapError::Config(format!(
                "filesystem '{}' has an empty source",
                fs.name
            )));
        }
        if let Some(ref retention) = fs.retention {
            retention.validate().map_err(|e| {
                HardsnapError::Config(format!("filesystem '{}': {e}", fs.name))
            })?;
        }
    }

    config.retention.validate()?;
    Ok(())
}

/// Expand a leading `~/` to the user's home directory.
pub(crate) fn expand_tilde(path: &str) -> String {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest).to_string_lossy().to_string();
        }
    }
    path.to_string()
}

/// Returns a minimal YAML config template suitable for bootstrapping.
pub fn minimal_config_template() -> &'static str {
    r#"# hardsnap configuration file

# Snapshots land in <destination>/<filesystem-name>/<timestamp>/
destination: /var/backup

# How many filesystems to back up concurrently.
jobs: 2

# Retention rules applied by `hardsnap purge`. A filesystem entry may
# override this block. The most recent snapshot is always kept.
retention:
  keep_within: 1d
  keep_daily: 7
  keep_weekly: 5
  keep_monthly: 12

filesystems:
  - name: home
    source: backup@server:/home
  - name: etc
    source: backup@server:/etc

# --- Optional settings ---
#
# transfer:
#   program: rsync
#   args: ["--bwlimit=50M"]
#
# hooks:                    # global, run for every filesystem
#   pre: "logger starting backup of {filesystem}"
#   post:
#     - "logger finished {filesystem} snapshot {timestamp}"
"#
}
