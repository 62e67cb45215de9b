use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::error::ModemError;

/// Which analog rail a logical `true` is driven to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputPolarity {
    /// `true` → `i16::MIN`. The output stage has an inverting transistor.
    Inverted,
    /// `true` → `i16::MAX`. Runs still ramp like the inverted stage.
    Direct,
}

/// Tunables shared by the waveform codec and the transmission coordinator.
///
/// Immutable once handed to a coordinator. Unknown or missing JSON fields
/// fall back to the defaults, so a partially filled settings file still loads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModemConfig {
    /// Minimum sample-to-sample swing recognised as an edge (default: 10000).
    pub voltage_change_threshold: i32,

    /// Fraction of the rail used on the first sample of a run (default: 0.7).
    pub analog_init_ratio: f32,

    /// Per-sample amplitude step applied along a run (default: 50).
    pub analog_delta: i32,

    /// Expected round trip through the audio jack in milliseconds (default: 30).
    pub expected_rtt_ms: i32,

    /// Output polarity (default: inverted).
    pub polarity: OutputPolarity,

    /// Let the engine finish on its own after the last partition (default: true).
    pub timeout_to_finish: bool,

    /// Fallback polling cadence of the exchange wait loop (default: 100ms).
    #[serde(with = "duration_millis")]
    pub poll_interval: Duration,
}

impl ModemConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.voltage_change_threshold <= 0 {
            return Err("voltage change threshold must be positive".into());
        }
        if !(self.analog_init_ratio > 0.0 && self.analog_init_ratio <= 1.0) {
            return Err(format!("analog init ratio out of range: {}", self.analog_init_ratio));
        }
        if self.analog_delta < 0 {
            return Err(format!("analog delta must not be negative: {}", self.analog_delta));
        }
        if self.expected_rtt_ms < 0 {
            return Err(format!("expected rtt must not be negative: {}", self.expected_rtt_ms));
        }
        if self.poll_interval.is_zero() {
            return Err("poll interval must be non-zero".into());
        }
        Ok(())
    }

    /// Parse and validate a JSON settings document.
    pub fn from_json(json: &str) -> Result<Self, ModemError> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| ModemError::InvalidArgument(format!("failed to parse modem config: {}", e)))?;
        config.validate().map_err(ModemError::InvalidArgument)?;
        Ok(config)
    }
}

impl Default for ModemConfig {
    fn default() -> Self {
        Self {
            voltage_change_threshold: 10000,
            analog_init_ratio: 0.7,
            analog_delta: 50,
            expected_rtt_ms: 30,
            polarity: OutputPolarity::Inverted,
            timeout_to_finish: true,
            poll_interval: Duration::from_millis(100),
        }
    }
}

mod duration_millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
