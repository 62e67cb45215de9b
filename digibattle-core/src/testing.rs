//! Scripted audio engine shared by unit tests.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::models::error::ModemError;
use crate::models::partition::{PartitionBoundary, MAX_PARTITIONS};
use crate::models::state::EngineStatus;
use crate::traits::audio_engine::{AudioEngine, EngineInit, StatusListener};

/// Calls observed by a [`ScriptedEngine`].
#[derive(Default)]
pub(crate) struct EngineLog {
    pub inits: Vec<EngineInit>,
    pub starts: usize,
    pub stops: usize,
    pub status_polls: usize,
}

/// Engine that replays a fixed status script.
///
/// Each `status()` call pops the next scripted value; the last one repeats.
pub(crate) struct ScriptedEngine {
    pub log: Arc<Mutex<EngineLog>>,
    pub statuses: VecDeque<Result<EngineStatus, ModemError>>,
    pub samples: Vec<i16>,
    pub rate: u32,
    pub rtt: i64,
    pub boundaries: Vec<PartitionBoundary>,
    pub init_error: Option<ModemError>,
    pub start_error: Option<ModemError>,
    pub listener: Arc<Mutex<Option<StatusListener>>>,
    cursor: Mutex<usize>,
}

impl ScriptedEngine {
    pub fn new(statuses: Vec<Result<EngineStatus, ModemError>>) -> Self {
        Self {
            log: Arc::new(Mutex::new(EngineLog::default())),
            statuses: statuses.into(),
            samples: Vec::new(),
            rate: 48000,
            rtt: 0,
            boundaries: Vec::new(),
            init_error: None,
            start_error: None,
            listener: Arc::new(Mutex::new(None)),
            cursor: Mutex::new(0),
        }
    }
}

impl AudioEngine for ScriptedEngine {
    fn init(&mut self, init: EngineInit) -> Result<(), ModemError> {
        self.log.lock().inits.push(init);
        match &self.init_error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    fn start(&mut self) -> Result<(), ModemError> {
        self.log.lock().starts += 1;
        match &self.start_error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    fn stop(&mut self) -> Result<(), ModemError> {
        self.log.lock().stops += 1;
        Ok(())
    }

    fn status(&self) -> Result<EngineStatus, ModemError> {
        self.log.lock().status_polls += 1;
        let mut cursor = self.cursor.lock();
        let index = (*cursor).min(self.statuses.len().saturating_sub(1));
        *cursor += 1;
        self.statuses.get(index).cloned().unwrap_or(Ok(EngineStatus::Pending))
    }

    fn rtt_ms(&self) -> i64 {
        self.rtt
    }

    fn received_samples(&self) -> Vec<i16> {
        self.samples.clone()
    }

    fn received_rate(&self) -> u32 {
        self.rate
    }

    fn partition_index(&self, index: usize) -> Result<PartitionBoundary, ModemError> {
        if index >= MAX_PARTITIONS {
            return Err(ModemError::InvalidArgument(format!("partition {}", index)));
        }
        Ok(self.boundaries.get(index).copied().unwrap_or_default())
    }

    fn set_status_listener(&mut self, listener: StatusListener) {
        *self.listener.lock() = Some(listener);
    }
}
