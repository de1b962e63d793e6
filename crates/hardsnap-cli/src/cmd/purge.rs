use chrono::{DateTime, Utc};

use hardsnap_core::commands::purge;
use hardsnap_core::config::Config;
use hardsnap_core::prune::PruneDecision;

use super::CmdResult;

pub(crate) fn run_purge(
    config: &Config,
    dry_run: bool,
    list: bool,
    filter: &[String],
    now: DateTime<Utc>,
) -> CmdResult {
    let report = purge::run(config, filter, dry_run, now)?;

    for fs in &report.filesystems {
        if list || dry_run {
            for entry in &fs.entries {
                match &entry.decision {
                    PruneDecision::Keep { reasons } => println!(
                        "{:<6} {}/{}  [{}]",
                        "keep",
                        fs.name,
                        entry.snapshot_name,
                        reasons.join(", "),
                    ),
                    PruneDecision::Prune => {
                        println!("{:<6} {}/{}", "prune", fs.name, entry.snapshot_name)
                    }
                }
            }
        }
        println!("{}: {}", fs.name, fs.outcome);
    }

    if dry_run {
        println!("Dry run: nothing was deleted");
    }

    Ok(report.all_succeeded())
}
