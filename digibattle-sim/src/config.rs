use std::time::Duration;

use digibattle_core::models::config::OutputPolarity;
use digibattle_core::models::error::ModemError;
use digibattle_core::protocol::variant::ProtocolVariant;

/// Frames the simulated peer device answers with, at the peer's native rate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PeerScript {
    rate: u32,
    frames: Vec<Vec<bool>>,
}

impl PeerScript {
    /// A peer that never transmits.
    pub fn silent() -> Self {
        Self::default()
    }

    /// Frame every payload the way a device speaking `variant` would.
    pub fn from_payloads<S: AsRef<str>>(variant: &ProtocolVariant, payloads: &[S]) -> Result<Self, ModemError> {
        let frames = payloads
            .iter()
            .map(|p| variant.encode_frame(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            rate: variant.rate(),
            frames,
        })
    }

    pub fn rate(&self) -> u32 {
        self.rate
    }

    pub fn frames(&self) -> &[Vec<bool>] {
        &self.frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// Simulated audio jack setup.
#[derive(Debug, Clone, PartialEq)]
pub struct SimConfig {
    /// Rate both streams run at (default: 48000).
    pub device_rate: u32,

    /// Our output stage. `Inverted` flips every sample we play (default: inverted).
    pub polarity: OutputPolarity,

    /// Round trip reported once the exchange finishes (default: 25ms).
    pub loopback_ms: i64,

    pub peer: PeerScript,

    /// Wall-clock pause between 10ms bursts of line audio (default: 10ms, real time).
    pub burst_interval: Duration,

    /// Drop the stream after this many captured samples.
    pub disconnect_after: Option<usize>,
}

impl SimConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.device_rate < 100 {
            return Err(format!("device rate too low: {}", self.device_rate));
        }
        if !self.peer.is_empty() && self.peer.rate() == 0 {
            return Err("peer script has no rate".into());
        }
        if self.loopback_ms < 0 {
            return Err(format!("loopback must not be negative: {}", self.loopback_ms));
        }
        Ok(())
    }

    /// Samples per burst: 10ms of line audio.
    pub fn burst_samples(&self) -> usize {
        (self.device_rate / 100) as usize
    }
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            device_rate: 48000,
            polarity: OutputPolarity::Inverted,
            loopback_ms: 25,
            peer: PeerScript::silent(),
            burst_interval: Duration::from_millis(10),
            disconnect_after: None,
        }
    }
}
