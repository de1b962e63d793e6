use std::path::Path;

use hardsnap_core::commands::offline;
use hardsnap_core::config::Config;
use hardsnap_core::transfer::Transfer;

use super::CmdResult;

pub(crate) fn run_offline(
    config: &Config,
    dest: &str,
    transfer: &dyn Transfer,
    filter: &[String],
) -> CmdResult {
    let offline_root = Path::new(dest);
    if !offline_root.is_dir() {
        return Err(format!("offline destination is not a directory: {dest}").into());
    }

    let report = offline::run(config, offline_root, transfer, filter)?;

    for (name, outcome) in &report.outcomes {
        println!("{name}: {outcome}");
    }

    Ok(report.all_succeeded())
}
