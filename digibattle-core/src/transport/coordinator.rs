use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::models::config::ModemConfig;
use crate::models::error::ModemError;
use crate::models::partition::{PartitionBoundary, MAX_PARTITIONS};
use crate::models::state::{EngineStatus, ExchangeRole};
use crate::processing::partition_tracker::partition_threshold;
use crate::processing::waveform::WaveformCodec;
use crate::traits::audio_engine::{AudioEngine, EngineInit, StatusListener};

/// Drives one audio engine through send and wait exchanges.
///
/// Converts digital partitions to line-coded frames, hands them to the
/// engine with the tunables from [`ModemConfig`], and exposes the capture
/// and partition boundaries once the engine is done.
pub struct TransmissionCoordinator<E: AudioEngine> {
    engine: Mutex<E>,
    codec: WaveformCodec,
    config: ModemConfig,
    stopped: AtomicBool,
}

impl<E: AudioEngine> TransmissionCoordinator<E> {
    pub fn new(engine: E, config: ModemConfig) -> Self {
        Self {
            engine: Mutex::new(engine),
            codec: WaveformCodec::new(&config),
            config,
            stopped: AtomicBool::new(true),
        }
    }

    pub fn codec(&self) -> &WaveformCodec {
        &self.codec
    }

    pub fn config(&self) -> &ModemConfig {
        &self.config
    }

    /// Transmit `partitions` first, alternating with the peer's replies.
    ///
    /// Returns the rate the engine actually captures at.
    pub fn send_digital(
        &self,
        partitions: &[Vec<bool>],
        rate: u32,
        handshake_len: usize,
        timeout_enabled: bool,
        msg_duration_ms: u32,
    ) -> Result<u32, ModemError> {
        let frames = self.codec.to_analog_partitions(partitions);
        self.send_analog(frames, rate, handshake_len, partition_threshold(rate), timeout_enabled, msg_duration_ms)
    }

    /// Wait for the peer, then reply with `partitions` one at a time.
    pub fn wait_digital(
        &self,
        partitions: &[Vec<bool>],
        rate: u32,
        handshake_len: usize,
        timeout_enabled: bool,
        msg_duration_ms: u32,
    ) -> Result<u32, ModemError> {
        let frames = self.codec.to_analog_partitions(partitions);
        self.wait_analog(frames, rate, handshake_len, partition_threshold(rate), timeout_enabled, msg_duration_ms)
    }

    pub fn send_analog(
        &self,
        frames: Vec<Vec<i16>>,
        rate: u32,
        handshake_len: usize,
        partition_threshold: u32,
        timeout_enabled: bool,
        msg_duration_ms: u32,
    ) -> Result<u32, ModemError> {
        self.start_engine(ExchangeRole::Sender, frames, rate, handshake_len, partition_threshold, timeout_enabled, msg_duration_ms)
    }

    pub fn wait_analog(
        &self,
        frames: Vec<Vec<i16>>,
        rate: u32,
        handshake_len: usize,
        partition_threshold: u32,
        timeout_enabled: bool,
        msg_duration_ms: u32,
    ) -> Result<u32, ModemError> {
        self.start_engine(ExchangeRole::Receiver, frames, rate, handshake_len, partition_threshold, timeout_enabled, msg_duration_ms)
    }

    #[allow(clippy::too_many_arguments)]
    fn start_engine(
        &self,
        role: ExchangeRole,
        frames: Vec<Vec<i16>>,
        rate: u32,
        handshake_len: usize,
        partition_threshold: u32,
        timeout_enabled: bool,
        msg_duration_ms: u32,
    ) -> Result<u32, ModemError> {
        if rate == 0 {
            return Err(ModemError::InvalidArgument("rate must be positive".into()));
        }
        let init = EngineInit {
            expected_rtt_ms: self.config.expected_rtt_ms,
            expected_msg_duration_ms: msg_duration_ms,
            frames,
            rate,
            voltage_threshold: self.config.voltage_change_threshold,
            is_sender: role.is_sender(),
            handshake_len,
            partition_threshold,
            timeout_enabled,
        };
        log::info!(
            "starting engine as {:?}: {} frames at {} Hz, partition threshold {}",
            role,
            init.frames.len(),
            rate,
            partition_threshold
        );

        let mut engine = self.engine.lock();
        engine.init(init).map_err(engine_error)?;
        self.stopped.store(false, Ordering::SeqCst);
        engine.start().map_err(engine_error)?;
        Ok(engine.received_rate())
    }

    pub fn status(&self) -> Result<EngineStatus, ModemError> {
        self.engine.lock().status()
    }

    pub fn rtt(&self) -> i64 {
        self.engine.lock().rtt_ms()
    }

    pub fn received_analog(&self) -> Vec<i16> {
        self.engine.lock().received_samples()
    }

    /// Capture recovered to bits; `None` when nothing was recorded.
    pub fn received_digital(&self) -> Option<Vec<bool>> {
        self.codec.to_digital(&self.received_analog())
    }

    pub fn received_rate(&self) -> u32 {
        self.engine.lock().received_rate()
    }

    /// Boundaries of every detected partition slot, in order.
    pub fn partition_boundaries(&self) -> Result<Vec<PartitionBoundary>, ModemError> {
        let engine = self.engine.lock();
        let boundaries = (0..MAX_PARTITIONS)
            .map(|index| engine.partition_index(index))
            .collect::<Result<Vec<_>, _>>()?;
        for (index, b) in boundaries.iter().enumerate().filter(|(_, b)| b.is_well_formed()) {
            log::debug!("partition {}: {},{},{}", index, b.handshake_start, b.handshake_end, b.message_end);
        }
        Ok(boundaries)
    }

    /// Stop the engine. Repeated calls after the first are no-ops.
    pub fn stop(&self) -> Result<(), ModemError> {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        log::info!("stopping engine");
        self.engine.lock().stop()
    }

    pub fn set_status_listener(&self, listener: StatusListener) {
        self.engine.lock().set_status_listener(listener);
    }
}

fn engine_error(err: ModemError) -> ModemError {
    match err {
        ModemError::Engine(_) => err,
        other => ModemError::Engine(other.to_string()),
    }
}
