use serde::{Deserialize, Serialize};

/// Maximum number of signal partitions detected in one capture.
///
/// Both sides transmit up to ten message partitions, so a full exchange
/// interleaves twenty partitions on the line.
pub const MAX_PARTITIONS: usize = 20;

/// Maximum number of message partitions one side submits per exchange.
pub const MAX_MESSAGE_PARTITIONS: usize = MAX_PARTITIONS / 2;

/// Sample offsets of one partition inside the composite capture.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PartitionBoundary {
    pub handshake_start: usize,
    pub handshake_end: usize,
    pub message_end: usize,
}

impl PartitionBoundary {
    pub fn new(handshake_start: usize, handshake_end: usize, message_end: usize) -> Self {
        Self {
            handshake_start,
            handshake_end,
            message_end,
        }
    }

    /// `handshake_start ≤ handshake_end ≤ message_end`, with a non-empty message.
    pub fn is_well_formed(&self) -> bool {
        self.handshake_start <= self.handshake_end && self.handshake_end < self.message_end
    }

    /// Number of samples from the end of the handshake to the end of the message, inclusive.
    pub fn message_len(&self) -> usize {
        if self.handshake_end > self.message_end {
            return 0;
        }
        self.message_end - self.handshake_end + 1
    }
}
