use thiserror::Error;

pub type Result<T> = std::result::Result<T, HardsnapError>;

#[derive(Debug, Error)]
pub enum HardsnapError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("filesystem is locked by another operation ({0})")]
    Locked(String),

    #[error("hook error: {0}")]
    Hook(String),

    #[error("transfer error: {0}")]
    Transfer(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}
