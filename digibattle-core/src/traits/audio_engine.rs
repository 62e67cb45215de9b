use std::sync::Arc;

use crate::models::error::ModemError;
use crate::models::partition::PartitionBoundary;
use crate::models::state::EngineStatus;

/// Callback invoked whenever the engine's status changes.
///
/// Fires on the engine's own thread; keep it short.
pub type StatusListener = Arc<dyn Fn(EngineStatus) + Send + Sync + 'static>;

/// Parameters for one exchange on a full-duplex audio engine.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineInit {
    /// Expected loopback latency, used to time replies.
    pub expected_rtt_ms: i32,
    /// Duration of one message partition on the line.
    pub expected_msg_duration_ms: u32,
    /// One analog frame per partition this side transmits, at `rate`.
    pub frames: Vec<Vec<i16>>,
    pub rate: u32,
    pub voltage_threshold: i32,
    pub is_sender: bool,
    pub handshake_len: usize,
    /// Run length, in captured samples, that opens or closes a partition.
    pub partition_threshold: u32,
    /// Finish on its own once every frame went out and the line is quiet.
    pub timeout_enabled: bool,
}

/// Full-duplex audio engine that plays frames and records the line.
///
/// Implemented by platform backends and by `digibattle-sim`. The engine
/// owns partition timing: it plays frame `n` after the peer's partition
/// `n - 1` (or immediately for a sender), records everything it hears,
/// and stamps partition boundaries into the capture.
pub trait AudioEngine: Send {
    fn init(&mut self, init: EngineInit) -> Result<(), ModemError>;

    /// Open the streams and begin the exchange.
    fn start(&mut self) -> Result<(), ModemError>;

    /// Close the streams. Must be safe to call repeatedly.
    fn stop(&mut self) -> Result<(), ModemError>;

    fn status(&self) -> Result<EngineStatus, ModemError>;

    /// Loopback round-trip time of the last exchange, in milliseconds.
    fn rtt_ms(&self) -> i64;

    /// Everything recorded since the exchange started, at [`received_rate`](Self::received_rate).
    fn received_samples(&self) -> Vec<i16>;

    /// Rate the input stream actually runs at.
    fn received_rate(&self) -> u32;

    /// Boundary triple of detected partition `index` (`0..MAX_PARTITIONS`).
    fn partition_index(&self, index: usize) -> Result<PartitionBoundary, ModemError>;

    /// Install a status-change notifier. Engines that cannot notify are polled instead.
    fn set_status_listener(&mut self, _listener: StatusListener) {}
}
