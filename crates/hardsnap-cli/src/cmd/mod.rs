pub(crate) mod backup;
pub(crate) mod break_lock;
pub(crate) mod offline;
pub(crate) mod purge;

pub(crate) type CmdResult = Result<bool, Box<dyn std::error::Error>>;
