pub mod backup;
pub mod offline;
pub mod purge;

use crate::config::{Config, FilesystemEntry};
use crate::error::{HardsnapError, Result};

/// Select filesystems by name, or all of them when no filter is given.
pub(crate) fn select_filesystems<'a>(
    config: &'a Config,
    filter: &[String],
) -> Result<Vec<&'a FilesystemEntry>> {
    if filter.is_empty() {
        return Ok(config.filesystems.iter().collect());
    }
    let mut selected = Vec::new();
    for name in filter {
        match config.filesystems.iter().find(|fs| fs.name == *name) {
            Some(fs) => selected.push(fs),
            None => {
                let available: Vec<&str> =
                    config.filesystems.iter().map(|fs| fs.name.as_str()).collect();
                return Err(HardsnapError::Config(format!(
                    "no filesystem named '{name}' (available: {})",
                    available.join(", ")
                )));
            }
        }
    }
    Ok(selected)
}
