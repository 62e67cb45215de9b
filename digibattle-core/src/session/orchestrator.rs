use std::sync::Arc;
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};

use crate::models::config::ModemConfig;
use crate::models::error::ModemError;
use crate::models::exchange_result::{ExchangeMetadata, ExchangeResult};
use crate::models::partition::MAX_MESSAGE_PARTITIONS;
use crate::models::state::{EngineStatus, ExchangeRole, ExchangeState};
use crate::processing::capture_decoder::CaptureDecoder;
use crate::protocol::variant::ProtocolVariant;
use crate::traits::audio_engine::AudioEngine;
use crate::traits::exchange_delegate::ExchangeDelegate;
use crate::transport::coordinator::TransmissionCoordinator;

/// One-shot progress notification.
pub type ExchangeCallback = Box<dyn FnOnce() + Send + 'static>;

const PING_RATE: u32 = 48000;
const PING_SAMPLES: usize = 100;
const PING_TICKS: u32 = 30;
const PING_MIN_RTT_MS: i64 = 1;

/// The exchange in flight. At most one exists per orchestrator.
struct Session {
    id: String,
    stop_requested: bool,
}

impl Session {
    fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            stop_requested: false,
        }
    }
}

/// Session slot plus the condvar the wait loop sleeps on.
///
/// Shared with the engine's status listener so a status change wakes the
/// loop before the next poll tick.
struct Shared {
    session: Mutex<Option<Session>>,
    wake: Condvar,
}

impl Shared {
    fn stop_requested(&self) -> bool {
        self.session.lock().as_ref().is_some_and(|s| s.stop_requested)
    }

    /// Sleep until woken or `timeout` elapses. Returns early if a stop is pending.
    fn park(&self, timeout: Duration) {
        let mut guard = self.session.lock();
        if guard.as_ref().is_some_and(|s| s.stop_requested) {
            return;
        }
        self.wake.wait_for(&mut guard, timeout);
    }
}

/// Stops the engine when the exchange leaves scope, whatever the exit path.
struct EngineGuard<'a, E: AudioEngine> {
    coordinator: &'a TransmissionCoordinator<E>,
}

impl<E: AudioEngine> Drop for EngineGuard<'_, E> {
    fn drop(&mut self) {
        if let Err(e) = self.coordinator.stop() {
            log::error!("failed to stop audio engine: {}", e);
        }
    }
}

/// Runs complete exchanges: encode, transmit, wait, decode.
///
/// Every public operation blocks the calling thread until the exchange
/// ends. Share the orchestrator behind an `Arc` to call
/// [`request_stop`](Self::request_stop) from another thread.
///
/// State transitions:
/// ```text
/// idle → armed → exchanging → completed / aborted / failed → idle
/// ```
pub struct SessionOrchestrator<E: AudioEngine> {
    coordinator: TransmissionCoordinator<E>,
    decoder: CaptureDecoder,
    config: ModemConfig,
    shared: Arc<Shared>,
    state: Mutex<ExchangeState>,
    delegate: Option<Arc<dyn ExchangeDelegate>>,
    event_thread: Option<ThreadId>,
}

impl<E: AudioEngine> SessionOrchestrator<E> {
    pub fn new(engine: E, variant: ProtocolVariant, config: ModemConfig) -> Result<Self, ModemError> {
        config.validate().map_err(ModemError::InvalidArgument)?;
        let coordinator = TransmissionCoordinator::new(engine, config.clone());
        let decoder = CaptureDecoder::new(variant, coordinator.codec().clone());
        let shared = Arc::new(Shared {
            session: Mutex::new(None),
            wake: Condvar::new(),
        });

        let listener_shared = Arc::clone(&shared);
        coordinator.set_status_listener(Arc::new(move |status: EngineStatus| {
            log::trace!("engine status -> {:?}", status);
            listener_shared.wake.notify_all();
        }));

        Ok(Self {
            coordinator,
            decoder,
            config,
            shared,
            state: Mutex::new(ExchangeState::Idle),
            delegate: None,
            event_thread: None,
        })
    }

    /// Reject blocking calls made from `thread` (typically a UI event loop).
    pub fn with_event_thread(mut self, thread: ThreadId) -> Self {
        self.event_thread = Some(thread);
        self
    }

    pub fn set_delegate(&mut self, delegate: Arc<dyn ExchangeDelegate>) {
        self.delegate = Some(delegate);
    }

    pub fn variant(&self) -> &ProtocolVariant {
        self.decoder.variant()
    }

    pub fn state(&self) -> ExchangeState {
        self.state.lock().clone()
    }

    pub fn is_busy(&self) -> bool {
        self.shared.session.lock().is_some()
    }

    /// Sampling positions of every payload bit at `rate`, for plotting captures.
    pub fn marker_positions(&self, rate: u32) -> Vec<usize> {
        self.variant().marker_positions(rate)
    }

    /// Transmit `partitions` first and collect the peer's replies.
    ///
    /// `on_processing_started` fires once the engine is running.
    pub fn submit_send<S: AsRef<str>>(
        &self,
        partitions: &[S],
        on_processing_started: Option<ExchangeCallback>,
    ) -> Result<ExchangeResult, ModemError> {
        self.run_exchange(ExchangeRole::Sender, partitions, on_processing_started, None)
    }

    /// Wait for the peer and answer each of its partitions with ours.
    ///
    /// `on_reply_started` fires once, when the engine first reports activity.
    pub fn submit_reply<S: AsRef<str>>(
        &self,
        partitions: &[S],
        on_processing_started: Option<ExchangeCallback>,
        on_reply_started: Option<ExchangeCallback>,
    ) -> Result<ExchangeResult, ModemError> {
        self.run_exchange(ExchangeRole::Receiver, partitions, on_processing_started, on_reply_started)
    }

    /// Ask the running exchange to stop at its next tick. No-op when idle.
    pub fn request_stop(&self) {
        let mut guard = self.shared.session.lock();
        if let Some(session) = guard.as_mut() {
            if !session.stop_requested {
                log::info!("stop requested for session {}", session.id);
            }
            session.stop_requested = true;
            self.shared.wake.notify_all();
        }
    }

    /// Measure the loopback latency with a single full-scale pulse.
    pub fn measure_rtt(&self) -> Result<i64, ModemError> {
        self.check_thread()?;
        self.claim(ExchangeRole::Sender, 0)?;

        let outcome = self.ping();
        match &outcome {
            Ok(rtt) => {
                log::info!("measured rtt: {}ms", rtt);
                self.release(ExchangeState::Completed);
            }
            Err(ModemError::Aborted) => self.release(ExchangeState::Aborted),
            Err(e) => self.release(ExchangeState::Failed(e.clone())),
        }
        outcome
    }

    fn ping(&self) -> Result<i64, ModemError> {
        let _guard = EngineGuard {
            coordinator: &self.coordinator,
        };
        let frames = vec![vec![i16::MAX; PING_SAMPLES]];
        self.coordinator.send_analog(frames, PING_RATE, 1, 1, true, 0)?;
        self.set_state(ExchangeState::Exchanging {
            role: ExchangeRole::Sender,
        });

        let deadline = Instant::now() + self.config.poll_interval * PING_TICKS;
        loop {
            if self.shared.stop_requested() {
                return Err(ModemError::Aborted);
            }
            if self.coordinator.status()?.is_finished() {
                let rtt = self.coordinator.rtt();
                if rtt > PING_MIN_RTT_MS {
                    return Ok(rtt);
                }
            }
            let now = Instant::now();
            if now >= deadline {
                return Err(ModemError::Timeout);
            }
            self.shared.park(self.config.poll_interval.min(deadline - now));
        }
    }

    fn run_exchange<S: AsRef<str>>(
        &self,
        role: ExchangeRole,
        partitions: &[S],
        on_processing_started: Option<ExchangeCallback>,
        on_reply_started: Option<ExchangeCallback>,
    ) -> Result<ExchangeResult, ModemError> {
        self.check_thread()?;
        let frames = self.build_frames(partitions)?;
        self.claim(role, frames.len())?;

        let outcome = self.exchange(role, &frames, on_processing_started, on_reply_started);
        match &outcome {
            Ok(result) => {
                log::info!(
                    "exchange complete: {} partitions at {} Hz, rtt {}ms",
                    result.partitions.iter().filter(|p| p.is_well_formed()).count(),
                    result.rate,
                    result.rtt_ms
                );
                self.release(ExchangeState::Completed);
            }
            Err(ModemError::Aborted) => self.release(ExchangeState::Aborted),
            Err(e) => {
                log::error!("exchange failed: {}", e);
                self.release(ExchangeState::Failed(e.clone()));
            }
        }
        outcome
    }

    fn exchange(
        &self,
        role: ExchangeRole,
        frames: &[Vec<bool>],
        on_processing_started: Option<ExchangeCallback>,
        mut on_reply_started: Option<ExchangeCallback>,
    ) -> Result<ExchangeResult, ModemError> {
        let _guard = EngineGuard {
            coordinator: &self.coordinator,
        };
        let variant = self.decoder.variant();
        let (native_rate, handshake_len) = (variant.rate(), variant.handshake_length());
        let msg_duration_ms = variant.frame_duration_ms();
        let timeout = self.config.timeout_to_finish;
        let rate = if role.is_sender() {
            self.coordinator
                .send_digital(frames, native_rate, handshake_len, timeout, msg_duration_ms)?
        } else {
            self.coordinator
                .wait_digital(frames, native_rate, handshake_len, timeout, msg_duration_ms)?
        };
        self.set_state(ExchangeState::Exchanging { role });
        if let Some(callback) = on_processing_started {
            callback();
        }

        loop {
            if self.shared.stop_requested() {
                log::info!("exchange aborted");
                return Err(ModemError::Aborted);
            }
            let status = self
                .coordinator
                .status()
                .map_err(|e| ModemError::Failed(e.to_string()))?;
            match status {
                EngineStatus::Processing => {
                    if let Some(callback) = on_reply_started.take() {
                        callback();
                    }
                }
                EngineStatus::Finished => return self.collect(role, rate),
                EngineStatus::Pending => {}
            }
            self.shared.park(self.config.poll_interval);
        }
    }

    fn collect(&self, role: ExchangeRole, rate: u32) -> Result<ExchangeResult, ModemError> {
        let partitions = self
            .coordinator
            .partition_boundaries()
            .map_err(|e| ModemError::Failed(e.to_string()))?;
        let analog_signal = self.coordinator.received_analog();
        let decoded = self.decoder.decode_with_boundaries(&analog_signal, rate, &partitions)?;
        let rtt_ms = self.coordinator.rtt();
        let metadata = ExchangeMetadata::new(
            self.variant().name(),
            role,
            rate,
            rtt_ms,
            &decoded.hex_messages,
            &decoded.partitions,
        );
        Ok(ExchangeResult {
            hex_messages: decoded.hex_messages,
            digital_signal: decoded.digital_signal,
            analog_signal,
            partitions: decoded.partitions,
            rate,
            rtt_ms,
            metadata,
        })
    }

    fn build_frames<S: AsRef<str>>(&self, partitions: &[S]) -> Result<Vec<Vec<bool>>, ModemError> {
        if partitions.is_empty() || partitions.len() > MAX_MESSAGE_PARTITIONS {
            return Err(ModemError::InvalidArgument(format!(
                "expected 1 to {} partitions, got {}",
                MAX_MESSAGE_PARTITIONS,
                partitions.len()
            )));
        }
        partitions
            .iter()
            .map(|p| self.variant().encode_frame(p.as_ref()))
            .collect()
    }

    fn check_thread(&self) -> Result<(), ModemError> {
        match self.event_thread {
            Some(id) if id == thread::current().id() => Err(ModemError::InvalidThread),
            _ => Ok(()),
        }
    }

    /// Claim the session slot. Transitions: idle → armed.
    fn claim(&self, role: ExchangeRole, partition_count: usize) -> Result<(), ModemError> {
        {
            let mut slot = self.shared.session.lock();
            if slot.is_some() {
                return Err(ModemError::AlreadyRunning);
            }
            let session = Session::new();
            log::info!(
                "session {} claimed as {:?} with {} partitions",
                session.id,
                role,
                partition_count
            );
            *slot = Some(session);
        }
        self.set_state(ExchangeState::Armed { role });
        Ok(())
    }

    /// Publish the terminal state, then free the slot. Transitions: terminal → idle.
    fn release(&self, terminal: ExchangeState) {
        self.set_state(terminal);
        *self.state.lock() = ExchangeState::Idle;
        if let Some(session) = self.shared.session.lock().take() {
            log::debug!("session {} released", session.id);
        }
    }

    fn set_state(&self, new_state: ExchangeState) {
        {
            let mut state = self.state.lock();
            *state = new_state.clone();
        }
        if let Some(ref delegate) = self.delegate {
            delegate.on_state_changed(&new_state);
        }
    }
}
