use serde::{Deserialize, Serialize};

use super::partition::PartitionBoundary;
use super::state::ExchangeRole;
use crate::processing::waveform;

/// Result returned when an exchange completes.
///
/// `hex_messages[i]` is the payload decoded from `partitions[i]`; partitions
/// the engine never detected decode to all-zero payloads.
#[derive(Debug, Clone, PartialEq)]
pub struct ExchangeResult {
    pub hex_messages: Vec<String>,
    pub digital_signal: Vec<bool>,
    pub analog_signal: Vec<i16>,
    pub partitions: Vec<PartitionBoundary>,
    pub rate: u32,
    pub rtt_ms: i64,
    pub metadata: ExchangeMetadata,
}

impl ExchangeResult {
    /// Raw capture samples of partition `index`, from handshake end to message end.
    pub fn partition_analog(&self, index: usize) -> Vec<i16> {
        match self.partitions.get(index) {
            Some(p) => waveform::slice(&self.analog_signal, p.handshake_end, p.message_end),
            None => Vec::new(),
        }
    }

    /// Recovered bits of partition `index`, from handshake end to message end.
    pub fn partition_digital(&self, index: usize) -> Vec<bool> {
        match self.partitions.get(index) {
            Some(p) => waveform::slice(&self.digital_signal, p.handshake_end, p.message_end),
            None => Vec::new(),
        }
    }
}

/// Serializable summary of an exchange.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExchangeMetadata {
    pub id: String,
    pub created_at: String,
    pub variant: String,
    pub role: ExchangeRole,
    pub rate: u32,
    pub rtt_ms: i64,
    pub hex_messages: Vec<String>,
    pub partitions: Vec<PartitionBoundary>,
}

impl ExchangeMetadata {
    pub fn new(
        variant: &str,
        role: ExchangeRole,
        rate: u32,
        rtt_ms: i64,
        hex_messages: &[String],
        partitions: &[PartitionBoundary],
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            variant: variant.to_string(),
            role,
            rate,
            rtt_ms,
            hex_messages: hex_messages.to_vec(),
            partitions: partitions.to_vec(),
        }
    }
}
