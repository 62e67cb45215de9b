//! # digibattle-sim
//!
//! Simulated audio backend for digibattle.
//!
//! Provides:
//! - `SimulatedEngine`: `AudioEngine` over a virtual audio jack shared with a scripted peer
//! - `SimConfig` / `PeerScript`: device rate, output stage, loopback latency, peer replies
//! - `line`: resampling, output stage and composite line helpers
//!
//! ## Usage
//! ```ignore
//! use digibattle_core::{ModemConfig, ProtocolVariant, SessionOrchestrator};
//! use digibattle_sim::{PeerScript, SimConfig, SimulatedEngine};
//!
//! let variant = ProtocolVariant::original();
//! let engine = SimulatedEngine::new(SimConfig {
//!     peer: PeerScript::from_payloads(&variant, &["8001"])?,
//!     ..Default::default()
//! })?;
//! let orchestrator = SessionOrchestrator::new(engine, variant, ModemConfig::default())?;
//! let result = orchestrator.submit_send(&["1234"], None)?;
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod line;

pub use config::{PeerScript, SimConfig};
pub use engine::SimulatedEngine;
pub use error::SimError;
