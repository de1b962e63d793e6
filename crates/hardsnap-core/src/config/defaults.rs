pub(super) fn default_jobs() -> usize {
    1
}

pub(super) fn default_transfer_program() -> String {
    "rsync".to_string()
}
