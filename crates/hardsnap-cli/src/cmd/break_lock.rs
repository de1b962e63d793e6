use std::path::Path;

use hardsnap_core::config::Config;
use hardsnap_core::lock;

use super::CmdResult;

pub(crate) fn run_break_lock(config: &Config, filesystem: &str) -> CmdResult {
    if !config.filesystems.iter().any(|fs| fs.name == filesystem) {
        return Err(format!("no filesystem named '{filesystem}'").into());
    }

    let fs_dir = Path::new(&config.destination).join(filesystem);
    if lock::break_lock(&fs_dir)? {
        println!("{filesystem}: lock removed");
    } else {
        println!("{filesystem}: no lock present");
    }
    Ok(true)
}
