use thiserror::Error;

/// Errors that can occur while framing, transmitting or decoding an exchange.
///
/// Every variant renders a human-readable message suitable for showing to the user.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModemError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("already running")]
    AlreadyRunning,

    #[error("exchange must not run on the event dispatch thread")]
    InvalidThread,

    #[error("aborted")]
    Aborted,

    #[error("invalid size: {0}")]
    DecodeInvalidLength(usize),

    #[error("no signal received")]
    NoSignal,

    #[error("audio engine error: {0}")]
    Engine(String),

    #[error("failed: {0}")]
    Failed(String),

    #[error("timeout")]
    Timeout,

    #[error("storage error: {0}")]
    StorageError(String),
}
