use chrono::{DateTime, Utc};

use hardsnap_core::commands::backup;
use hardsnap_core::config::Config;
use hardsnap_core::transfer::Transfer;

use super::CmdResult;

pub(crate) fn run_backup(
    config: &Config,
    transfer: &dyn Transfer,
    filter: &[String],
    now: DateTime<Utc>,
) -> CmdResult {
    let report = backup::run(config, transfer, filter, now)?;

    for (name, outcome) in &report.outcomes {
        println!("{name}: {outcome}");
    }

    Ok(report.all_succeeded())
}
