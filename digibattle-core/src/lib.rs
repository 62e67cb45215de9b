//! # digibattle-core
//!
//! Platform-agnostic acoustic modem core.
//!
//! Provides line coding, protocol framing, checksums, capture decoding, WAV
//! export and exchange orchestration. Audio backends implement the
//! `AudioEngine` trait and plug into the generic `SessionOrchestrator`.
//!
//! ## Architecture
//!
//! ```text
//! digibattle-core (this crate)
//! ├── traits/       ← AudioEngine, ExchangeDelegate
//! ├── models/       ← ModemError, ExchangeState, ModemConfig, PartitionBoundary, ExchangeResult
//! ├── processing/   ← WaveformCodec, PartitionTracker, CaptureDecoder, WAV encoding
//! ├── protocol/     ← ProtocolVariant, checksum, battle messages
//! ├── transport/    ← TransmissionCoordinator
//! ├── session/      ← SessionOrchestrator (exchange state machine)
//! └── storage/      ← capture export, metadata sidecar
//! ```

pub mod models;
pub mod processing;
pub mod protocol;
pub mod session;
pub mod storage;
pub mod traits;
pub mod transport;

#[cfg(test)]
pub(crate) mod testing;

// Re-export key types at crate root for convenience.
pub use models::config::{ModemConfig, OutputPolarity};
pub use models::error::ModemError;
pub use models::exchange_result::{ExchangeMetadata, ExchangeResult};
pub use models::partition::{PartitionBoundary, MAX_MESSAGE_PARTITIONS, MAX_PARTITIONS};
pub use models::state::{EngineStatus, ExchangeRole, ExchangeState};
pub use processing::capture_decoder::{CaptureDecoder, DecodedCapture};
pub use processing::partition_tracker::{partition_threshold, BoundaryRecorder, PartitionTracker};
pub use processing::waveform::WaveformCodec;
pub use protocol::battle::{BattleSetup, DeviceModel, Monster, OpponentInfo};
pub use protocol::variant::{BitOrder, ProtocolVariant, VariantTable};
pub use session::orchestrator::{ExchangeCallback, SessionOrchestrator};
pub use storage::capture_writer::{export_capture, load_capture, CaptureExport, LoadedCapture};
pub use traits::audio_engine::{AudioEngine, EngineInit, StatusListener};
pub use traits::exchange_delegate::ExchangeDelegate;
pub use transport::coordinator::TransmissionCoordinator;
