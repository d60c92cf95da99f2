use thiserror::Error;

#[derive(Debug, Error)]
pub enum NodeError {
    #[error(transparent)]
    Ledger(#[from] tally_types::TallyError),

    #[error("config error: {0}")]
    Config(String),

    #[error("node already started")]
    AlreadyStarted,

    #[error("node has been stopped")]
    Stopped,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("shutdown timeout")]
    ShutdownTimeout,
}
