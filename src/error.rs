use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("a typing session is already active")]
    AlreadyActive,

    #[error("invalid session configuration: {0:#}")]
    InvalidConfig(anyhow::Error),

    #[error("keystroke sink failed: {0:#}")]
    Sink(anyhow::Error),

    #[error("failed to spawn typing thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error("typing thread panicked")]
    Panicked,
}
