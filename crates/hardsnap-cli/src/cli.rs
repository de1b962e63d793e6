use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "hardsnap",
    version,
    about = "Incremental filesystem snapshots over rsync with hardlink sharing",
    after_help = "\
Configuration file lookup order:
  1. --config <path>             (explicit flag)
  2. $HARDSNAP_CONFIG            (environment variable)
  3. ./hardsnap.yaml             (project)
  4. $XDG_CONFIG_HOME/hardsnap/config.yaml (user, ~/.config fallback)
  5. /etc/hardsnap/config.yaml   (system)

Hook environment:
  Every hook command receives HARDSNAP_FILESYSTEM, HARDSNAP_SOURCE,
  HARDSNAP_DESTINATION, HARDSNAP_TIMESTAMP and HARDSNAP_PHASE, and may
  use the matching {filesystem}-style placeholders inline."
)]
pub(crate) struct Cli {
    /// Path to configuration file (overrides HARDSNAP_CONFIG and default search)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Take a snapshot of the configured filesystems
    Backup {
        /// Back up only the named filesystems (default: all)
        #[arg(short = 'F', long = "filesystem")]
        filesystem: Vec<String>,

        /// Concurrency override (number of filesystems in flight)
        #[arg(short, long)]
        jobs: Option<usize>,
    },

    /// Delete snapshots that fall outside the retention rules
    Purge {
        /// Show what would be deleted without touching anything
        #[arg(short = 'n', long)]
        dry_run: bool,

        /// List the keep/prune decision for every snapshot
        #[arg(long)]
        list: bool,

        /// Purge only the named filesystems (default: all)
        #[arg(short = 'F', long = "filesystem")]
        filesystem: Vec<String>,
    },

    /// Copy each filesystem's latest snapshot to a secondary volume
    Offline {
        /// Mount point of the offline volume
        dest: String,

        /// Replicate only the named filesystems (default: all)
        #[arg(short = 'F', long = "filesystem")]
        filesystem: Vec<String>,
    },

    /// Forcibly remove a filesystem's lock left behind by a dead process
    BreakLock {
        /// Filesystem whose lock to remove
        filesystem: String,
    },

    /// Generate a starter configuration file
    Config {
        /// Where to write it (default: ./hardsnap.yaml)
        dest: Option<String>,
    },
}
