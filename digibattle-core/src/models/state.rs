use serde::{Deserialize, Serialize};

use super::error::ModemError;

/// Which side of the exchange this device plays.
///
/// The sender transmits partition 0 first; the receiver waits for the
/// peer's first partition and replies after each one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExchangeRole {
    Sender,
    Receiver,
}

impl ExchangeRole {
    pub fn is_sender(&self) -> bool {
        matches!(self, Self::Sender)
    }
}

/// Exchange state machine.
///
/// State transitions:
/// ```text
/// idle → armed → exchanging → completed / aborted / failed → idle
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum ExchangeState {
    Idle,
    Armed { role: ExchangeRole },
    Exchanging { role: ExchangeRole },
    Completed,
    Aborted,
    Failed(ModemError),
}

impl ExchangeState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_exchanging(&self) -> bool {
        matches!(self, Self::Exchanging { .. })
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Aborted | Self::Failed(_))
    }

    /// The role of the session in flight, if any.
    pub fn role(&self) -> Option<ExchangeRole> {
        match self {
            Self::Armed { role } | Self::Exchanging { role } => Some(*role),
            _ => None,
        }
    }
}

/// Status reported by the audio engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineStatus {
    /// Streams are open but no partition activity has been seen yet.
    Pending,
    /// Partition activity detected; the exchange is under way.
    Processing,
    Finished,
}

impl EngineStatus {
    /// Maps the numeric status codes used by native engines (0, 1, 2).
    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Pending),
            1 => Some(Self::Processing),
            2 => Some(Self::Finished),
            _ => None,
        }
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finished)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn terminal_states() {
        assert!(ExchangeState::Completed.is_terminal());
        assert!(ExchangeState::Aborted.is_terminal());
        assert!(ExchangeState::Failed(ModemError::NoSignal).is_terminal());
        assert!(!ExchangeState::Exchanging { role: ExchangeRole::Sender }.is_terminal());
        assert!(!ExchangeState::Idle.is_terminal());
    }

    #[test]
    fn role_only_while_in_flight() {
        let armed = ExchangeState::Armed { role: ExchangeRole::Receiver };
        assert_eq!(armed.role(), Some(ExchangeRole::Receiver));
        assert_eq!(ExchangeState::Completed.role(), None);
    }

    #[test]
    fn status_codes() {
        assert_eq!(EngineStatus::from_code(0), Some(EngineStatus::Pending));
        assert_eq!(EngineStatus::from_code(1), Some(EngineStatus::Processing));
        assert_eq!(EngineStatus::from_code(2), Some(EngineStatus::Finished));
        assert_eq!(EngineStatus::from_code(7), None);
    }
}
