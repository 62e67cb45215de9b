use thiserror::Error;

use digibattle_core::models::error::ModemError;

/// Failures of the simulated audio line.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SimError {
    #[error("engine not initialized")]
    NotInitialized,

    #[error("engine already running")]
    AlreadyRunning,

    #[error("unsupported rate: {0} Hz")]
    UnsupportedRate(u32),

    #[error("failed to spawn playback thread: {0}")]
    Spawn(String),

    #[error("stream disconnected")]
    Disconnected,
}

impl From<SimError> for ModemError {
    fn from(err: SimError) -> Self {
        ModemError::Engine(err.to_string())
    }
}
