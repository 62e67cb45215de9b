//! Simulated full-duplex audio engine.
//!
//! Plays our frames and a scripted peer's frames onto one virtual line,
//! captures the composite in 10ms bursts on a dedicated thread, and
//! stamps partition boundaries with the same tracker a hardware engine
//! runs.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use digibattle_core::models::config::{ModemConfig, OutputPolarity};
use digibattle_core::models::error::ModemError;
use digibattle_core::models::partition::{PartitionBoundary, MAX_PARTITIONS};
use digibattle_core::models::state::EngineStatus;
use digibattle_core::processing::partition_tracker::{BoundaryRecorder, PartitionTracker};
use digibattle_core::processing::waveform::WaveformCodec;
use digibattle_core::traits::audio_engine::{AudioEngine, EngineInit, StatusListener};

use crate::config::SimConfig;
use crate::error::SimError;
use crate::line;

/// State the playback thread publishes.
#[derive(Debug)]
struct Playback {
    capture: Vec<i16>,
    recorder: BoundaryRecorder,
    status: EngineStatus,
    rtt_ms: i64,
    fault: Option<SimError>,
}

impl Playback {
    fn new() -> Self {
        Self {
            capture: Vec::new(),
            recorder: BoundaryRecorder::new(),
            status: EngineStatus::Pending,
            rtt_ms: 0,
            fault: None,
        }
    }

    fn reset(&mut self) {
        *self = Self::new();
    }
}

enum BurstOutcome {
    Played,
    BecameActive,
    Disconnected(EngineStatus),
}

/// Everything the playback thread needs besides the line itself.
struct PlaybackContext {
    running: Arc<AtomicBool>,
    playback: Arc<Mutex<Playback>>,
    listener: Option<StatusListener>,
    voltage_threshold: i32,
    partition_threshold: u32,
    burst_samples: usize,
    burst_interval: Duration,
    timeout_enabled: bool,
    loopback_ms: i64,
    disconnect_after: Option<usize>,
}

/// [`AudioEngine`] backed by a virtual audio jack.
///
/// The peer is a device that drives the line directly; our samples pass
/// through [`SimConfig::polarity`] on the way out.
pub struct SimulatedEngine {
    config: SimConfig,
    init: Option<EngineInit>,
    playback: Arc<Mutex<Playback>>,
    running: Arc<AtomicBool>,
    worker: Option<thread::JoinHandle<()>>,
    listener: Option<StatusListener>,
}

impl SimulatedEngine {
    pub fn new(config: SimConfig) -> Result<Self, ModemError> {
        config.validate().map_err(ModemError::InvalidArgument)?;
        Ok(Self {
            config,
            init: None,
            playback: Arc::new(Mutex::new(Playback::new())),
            running: Arc::new(AtomicBool::new(false)),
            worker: None,
            listener: None,
        })
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Partition-change run length at the device rate. `init` states it at the frame rate.
    fn device_partition_threshold(&self, init: &EngineInit) -> u32 {
        (init.partition_threshold as u64 * self.config.device_rate as u64 / init.rate as u64) as u32
    }

    /// Build the composite line for the current init parameters.
    fn compose_line(&self, init: &EngineInit) -> Vec<i16> {
        let device_rate = self.config.device_rate;
        let own: Vec<Vec<i16>> = init
            .frames
            .iter()
            .map(|frame| line::output_stage(&line::resample(frame, init.rate, device_rate), self.config.polarity))
            .collect();

        let peer_codec = WaveformCodec::new(&ModemConfig {
            voltage_change_threshold: init.voltage_threshold,
            polarity: OutputPolarity::Direct,
            ..Default::default()
        });
        let peer = &self.config.peer;
        let peer_frames: Vec<Vec<i16>> = peer
            .frames()
            .iter()
            .map(|bits| peer_codec.to_analog(&line::resample(bits, peer.rate(), device_rate)))
            .collect();

        let gap = line::samples_for_ms(init.expected_rtt_ms as i64, device_rate);
        let quiet = (init.handshake_len as u64 * 4 * device_rate as u64 / init.rate as u64) as usize;
        let tail = quiet.max(self.device_partition_threshold(init) as usize + 1);
        line::compose(&own, &peer_frames, init.is_sender, gap, tail)
    }
}

impl AudioEngine for SimulatedEngine {
    fn init(&mut self, init: EngineInit) -> Result<(), ModemError> {
        if self.is_running() {
            return Err(SimError::AlreadyRunning.into());
        }
        if init.rate == 0 {
            return Err(SimError::UnsupportedRate(init.rate).into());
        }
        log::info!(
            "sim init: {} frames at {} Hz, sender {}, handshake {}, msg {}ms",
            init.frames.len(),
            init.rate,
            init.is_sender,
            init.handshake_len,
            init.expected_msg_duration_ms
        );
        self.playback.lock().reset();
        self.init = Some(init);
        Ok(())
    }

    fn start(&mut self) -> Result<(), ModemError> {
        let init = self.init.as_ref().ok_or(SimError::NotInitialized)?;
        if self.is_running() {
            return Err(SimError::AlreadyRunning.into());
        }
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
        }

        let line = self.compose_line(init);
        log::info!(
            "sim line: {} samples at {} Hz, peer frames {}",
            line.len(),
            self.config.device_rate,
            self.config.peer.len()
        );
        let context = PlaybackContext {
            running: Arc::clone(&self.running),
            playback: Arc::clone(&self.playback),
            listener: self.listener.clone(),
            voltage_threshold: init.voltage_threshold,
            partition_threshold: self.device_partition_threshold(init),
            burst_samples: self.config.burst_samples(),
            burst_interval: self.config.burst_interval,
            timeout_enabled: init.timeout_enabled,
            loopback_ms: self.config.loopback_ms,
            disconnect_after: self.config.disconnect_after,
        };

        self.playback.lock().reset();
        self.running.store(true, Ordering::SeqCst);
        let running = Arc::clone(&self.running);
        let handle = thread::Builder::new()
            .name("sim-playback".into())
            .spawn(move || {
                playback_loop(&line, &context);
                running.store(false, Ordering::SeqCst);
            })
            .map_err(|e| {
                self.running.store(false, Ordering::SeqCst);
                SimError::Spawn(e.to_string())
            })?;
        self.worker = Some(handle);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), ModemError> {
        self.running.store(false, Ordering::SeqCst);
        if let Some(handle) = self.worker.take() {
            let _ = handle.join();
            log::info!("sim playback stopped after {} samples", self.playback.lock().capture.len());
        }
        Ok(())
    }

    fn status(&self) -> Result<EngineStatus, ModemError> {
        let playback = self.playback.lock();
        match &playback.fault {
            Some(fault) => Err(fault.clone().into()),
            None => Ok(playback.status),
        }
    }

    fn rtt_ms(&self) -> i64 {
        self.playback.lock().rtt_ms
    }

    fn received_samples(&self) -> Vec<i16> {
        self.playback.lock().capture.clone()
    }

    fn received_rate(&self) -> u32 {
        self.config.device_rate
    }

    fn partition_index(&self, index: usize) -> Result<PartitionBoundary, ModemError> {
        self.playback
            .lock()
            .recorder
            .boundary(index)
            .ok_or_else(|| ModemError::InvalidArgument(format!("partition index out of range: {}", index)))
    }

    fn set_status_listener(&mut self, listener: StatusListener) {
        self.listener = Some(listener);
    }
}

impl Drop for SimulatedEngine {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}

fn notify(listener: &Option<StatusListener>, status: EngineStatus) {
    if let Some(listener) = listener {
        listener(status);
    }
}

/// Feed the line to the capture in bursts until it runs out or we are stopped.
fn playback_loop(line: &[i16], ctx: &PlaybackContext) {
    let mut tracker = PartitionTracker::new(ctx.voltage_threshold, ctx.partition_threshold);
    for burst in line.chunks(ctx.burst_samples.max(1)) {
        if !ctx.running.load(Ordering::SeqCst) {
            return;
        }

        let outcome = {
            let mut guard = ctx.playback.lock();
            let playback = &mut *guard;
            if ctx.disconnect_after.is_some_and(|limit| playback.capture.len() >= limit) {
                log::warn!("sim stream disconnected at sample {}", playback.capture.len());
                playback.fault = Some(SimError::Disconnected);
                BurstOutcome::Disconnected(playback.status)
            } else {
                for &sample in burst {
                    let index = playback.capture.len();
                    playback.capture.push(sample);
                    if tracker.partition() < MAX_PARTITIONS && tracker.update(sample) {
                        playback.recorder.record(&tracker, index);
                    }
                }
                if playback.status == EngineStatus::Pending && tracker.is_active() {
                    playback.status = EngineStatus::Processing;
                    BurstOutcome::BecameActive
                } else {
                    BurstOutcome::Played
                }
            }
        };
        match outcome {
            BurstOutcome::Played => {}
            BurstOutcome::BecameActive => notify(&ctx.listener, EngineStatus::Processing),
            BurstOutcome::Disconnected(status) => {
                notify(&ctx.listener, status);
                return;
            }
        }

        if ctx.burst_interval.is_zero() {
            thread::yield_now();
        } else {
            thread::sleep(ctx.burst_interval);
        }
    }

    if ctx.timeout_enabled {
        {
            let mut playback = ctx.playback.lock();
            playback.rtt_ms = ctx.loopback_ms;
            playback.status = EngineStatus::Finished;
        }
        log::info!("sim exchange finished: {} partitions", tracker.partition());
        notify(&ctx.listener, EngineStatus::Finished);
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use super::*;
    use crate::config::PeerScript;
    use digibattle_core::processing::partition_tracker::partition_threshold;
    use digibattle_core::protocol::variant::ProtocolVariant;

    fn wait_until_finished(engine: &SimulatedEngine) -> Result<(), ModemError> {
        let deadline = Instant::now() + Duration::from_secs(10);
        while !engine.status()?.is_finished() {
            assert!(Instant::now() < deadline, "simulated exchange never finished");
            thread::sleep(Duration::from_millis(1));
        }
        Ok(())
    }

    fn init_for(variant: &ProtocolVariant, payloads: &[&str], is_sender: bool) -> EngineInit {
        let codec = WaveformCodec::new(&ModemConfig::default());
        EngineInit {
            expected_rtt_ms: 30,
            expected_msg_duration_ms: variant.frame_duration_ms(),
            frames: payloads
                .iter()
                .map(|p| codec.to_analog(&variant.encode_frame(p).unwrap()))
                .collect(),
            rate: variant.rate(),
            voltage_threshold: 10000,
            is_sender,
            handshake_len: variant.handshake_length(),
            partition_threshold: partition_threshold(variant.rate()),
            timeout_enabled: true,
        }
    }

    fn engine_with_peer(payloads: &[&str]) -> SimulatedEngine {
        let variant = ProtocolVariant::original();
        SimulatedEngine::new(SimConfig {
            peer: PeerScript::from_payloads(&variant, payloads).unwrap(),
            burst_interval: Duration::ZERO,
            ..Default::default()
        })
        .unwrap()
    }

    #[test]
    fn exchange_stamps_every_partition() {
        let variant = ProtocolVariant::original();
        let mut engine = engine_with_peer(&["8001", "0a0a"]);
        engine.init(init_for(&variant, &["1234", "abcd"], true)).unwrap();
        engine.start().unwrap();
        wait_until_finished(&engine).unwrap();

        let boundaries: Vec<PartitionBoundary> =
            (0..MAX_PARTITIONS).map(|i| engine.partition_index(i).unwrap()).collect();
        assert!(boundaries[..4].iter().all(|b| b.is_well_formed()));
        // Start marker plus 16 bit slots, at ten device samples per frame sample.
        let message_len = (variant.frame_len() - variant.handshake_length()) * 10;
        for b in &boundaries[..4] {
            assert!(b.message_end - b.handshake_end >= message_len, "short partition: {:?}", b);
        }
        assert!(!boundaries[4].is_well_formed());
        // Partitions follow each other on the line.
        assert!(boundaries[0].message_end < boundaries[1].handshake_end);
        assert!(boundaries[2].message_end < boundaries[3].handshake_end);

        assert_eq!(engine.rtt_ms(), 25);
        assert_eq!(engine.received_rate(), 48000);
        assert!(!engine.received_samples().is_empty());
        engine.stop().unwrap();
        engine.stop().unwrap();
    }

    #[test]
    fn status_moves_through_processing_and_notifies() {
        let variant = ProtocolVariant::original();
        let mut engine = engine_with_peer(&["ffff"]);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        engine.set_status_listener(Arc::new(move |status: EngineStatus| sink.lock().push(status)));

        engine.init(init_for(&variant, &["0000"], false)).unwrap();
        engine.start().unwrap();
        wait_until_finished(&engine).unwrap();
        engine.stop().unwrap();

        assert_eq!(*seen.lock(), vec![EngineStatus::Processing, EngineStatus::Finished]);
    }

    #[test]
    fn frame_rate_threshold_is_scaled_to_device_rate() {
        let variant = ProtocolVariant::original();
        let mut engine = engine_with_peer(&["ffff"]);
        let init = init_for(&variant, &["ffff"], false);
        assert_eq!(init.partition_threshold, 30);
        assert_eq!(engine.device_partition_threshold(&init), 300);

        engine.init(init).unwrap();
        engine.start().unwrap();
        wait_until_finished(&engine).unwrap();
        engine.stop().unwrap();

        let first = engine.partition_index(0).unwrap();
        let message_len = (variant.frame_len() - variant.handshake_length()) * 10;
        assert!(first.message_end - first.handshake_end >= message_len, "short partition: {:?}", first);
        assert!(engine.partition_index(1).unwrap().is_well_formed());
    }

    #[test]
    fn ping_threshold_is_unchanged_at_device_rate() {
        let engine = SimulatedEngine::new(SimConfig::default()).unwrap();
        let mut init = init_for(&ProtocolVariant::original(), &["0000"], true);
        init.rate = 48000;
        init.partition_threshold = 1;
        assert_eq!(engine.device_partition_threshold(&init), 1);
    }

    #[test]
    fn start_requires_init() {
        let mut engine = SimulatedEngine::new(SimConfig::default()).unwrap();
        assert_eq!(engine.start(), Err(ModemError::Engine("engine not initialized".into())));
        assert_eq!(engine.status(), Ok(EngineStatus::Pending));
    }

    #[test]
    fn zero_rate_is_unsupported() {
        let mut engine = SimulatedEngine::new(SimConfig::default()).unwrap();
        let mut init = init_for(&ProtocolVariant::original(), &["0000"], true);
        init.rate = 0;
        assert_eq!(engine.init(init), Err(ModemError::Engine("unsupported rate: 0 Hz".into())));
    }

    #[test]
    fn disconnect_surfaces_as_engine_error() {
        let variant = ProtocolVariant::original();
        let mut engine = SimulatedEngine::new(SimConfig {
            burst_interval: Duration::ZERO,
            disconnect_after: Some(4800),
            ..Default::default()
        })
        .unwrap();
        engine.init(init_for(&variant, &["0001"], true)).unwrap();
        engine.start().unwrap();

        let deadline = Instant::now() + Duration::from_secs(10);
        while engine.status().is_ok() {
            assert!(Instant::now() < deadline, "stream never disconnected");
            thread::sleep(Duration::from_millis(1));
        }
        assert_eq!(engine.status(), Err(ModemError::Engine("stream disconnected".into())));
        assert_eq!(engine.received_samples().len(), 4800);
        engine.stop().unwrap();
    }

    #[test]
    fn partition_index_is_bounded() {
        let engine = SimulatedEngine::new(SimConfig::default()).unwrap();
        assert_eq!(engine.partition_index(0), Ok(PartitionBoundary::default()));
        assert!(matches!(
            engine.partition_index(MAX_PARTITIONS),
            Err(ModemError::InvalidArgument(_))
        ));
    }

    #[test]
    fn invalid_config_is_rejected() {
        let config = SimConfig {
            loopback_ms: -1,
            ..Default::default()
        };
        assert!(matches!(SimulatedEngine::new(config), Err(ModemError::InvalidArgument(_))));
    }
}
