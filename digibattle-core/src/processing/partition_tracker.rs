use crate::models::partition::{PartitionBoundary, MAX_PARTITIONS};

/// Run length at or below which both levels count as "just toggled".
const TOGGLE_RUN_LIMIT: u32 = 3;

/// Capture rate the partition-change run length is tuned at.
pub const REFERENCE_RATE: u32 = 48000;
/// Partition-change run length at [`REFERENCE_RATE`], in samples.
pub const REFERENCE_PARTITION_THRESHOLD: u32 = 300;

/// Partition-change run length scaled to a capture rate.
pub fn partition_threshold(rate: u32) -> u32 {
    (REFERENCE_PARTITION_THRESHOLD as u64 * rate as u64 / REFERENCE_RATE as u64) as u32
}

/// Where the line currently is within a partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionPhase {
    /// Waiting for a long low run to begin a handshake.
    Pending,
    /// Inside the handshake silence.
    Handshake,
    /// Receiving the start marker and payload bits.
    Message,
}

/// Streaming partition detector.
///
/// Digitizes each sample by its delta to the previous one and segments the
/// capture into partitions using run lengths:
///
/// ```text
/// pending ──(low run ≥ threshold)──→ handshake
/// handshake ──(both runs ≤ 3, i.e. an edge)──→ message
/// message ──(either run ≥ threshold)──→ pending, partition + 1
/// ```
#[derive(Debug, Clone)]
pub struct PartitionTracker {
    voltage_change_threshold: i32,
    change_threshold: u32,
    phase: PartitionPhase,
    partition: usize,
    started: bool,
    continuous_low: u32,
    continuous_high: u32,
    previous_sample: i16,
    previous_level: bool,
}

impl PartitionTracker {
    /// `change_threshold` is the run length, in samples at the capture rate,
    /// that opens a handshake or closes a message.
    pub fn new(voltage_change_threshold: i32, change_threshold: u32) -> Self {
        Self {
            voltage_change_threshold,
            change_threshold,
            phase: PartitionPhase::Pending,
            partition: 0,
            started: false,
            continuous_low: 0,
            continuous_high: 0,
            previous_sample: 0,
            previous_level: true,
        }
    }

    pub fn phase(&self) -> PartitionPhase {
        self.phase
    }

    /// Number of partitions completed so far.
    pub fn partition(&self) -> usize {
        self.partition
    }

    /// Whether any partition activity has been seen.
    pub fn is_active(&self) -> bool {
        self.partition > 0 || self.phase != PartitionPhase::Pending
    }

    /// Feed one sample. Returns `true` when the phase changed on this sample.
    pub fn update(&mut self, sample: i16) -> bool {
        if !self.started {
            self.started = true;
            self.previous_sample = sample;
            self.previous_level = true;
            return false;
        }

        let diff = sample as i32 - self.previous_sample as i32;
        let level = if diff >= self.voltage_change_threshold {
            true
        } else if diff <= -self.voltage_change_threshold {
            false
        } else {
            self.previous_level
        };
        if level {
            self.continuous_high += 1;
            self.continuous_low = 0;
        } else {
            self.continuous_high = 0;
            self.continuous_low += 1;
        }

        let changed = match self.phase {
            PartitionPhase::Pending if self.continuous_low >= self.change_threshold => {
                self.phase = PartitionPhase::Handshake;
                true
            }
            PartitionPhase::Handshake
                if self.continuous_low <= TOGGLE_RUN_LIMIT && self.continuous_high <= TOGGLE_RUN_LIMIT =>
            {
                self.phase = PartitionPhase::Message;
                true
            }
            PartitionPhase::Message
                if self.continuous_low >= self.change_threshold
                    || self.continuous_high >= self.change_threshold =>
            {
                self.phase = PartitionPhase::Pending;
                self.partition += 1;
                true
            }
            _ => false,
        };
        if changed {
            log::trace!("partition {} -> {:?}", self.partition, self.phase);
        }

        self.previous_sample = sample;
        self.previous_level = level;
        changed
    }
}

/// Accumulates partition boundaries from tracker phase changes.
///
/// Entering a handshake stamps `handshake_start`, entering a message stamps
/// `handshake_end`, and returning to pending stamps the previous
/// partition's `message_end`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BoundaryRecorder {
    boundaries: [PartitionBoundary; MAX_PARTITIONS],
}

impl BoundaryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the transition the tracker just made at capture index `index`.
    pub fn record(&mut self, tracker: &PartitionTracker, index: usize) {
        let partition = tracker.partition();
        match tracker.phase() {
            PartitionPhase::Pending => {
                if partition >= 1 && partition - 1 < MAX_PARTITIONS {
                    self.boundaries[partition - 1].message_end = index;
                } else {
                    log::warn!("partition number out of range: {}", partition);
                }
            }
            PartitionPhase::Handshake => match self.boundaries.get_mut(partition) {
                Some(b) => b.handshake_start = index,
                None => log::warn!("partition number out of range: {}", partition),
            },
            PartitionPhase::Message => match self.boundaries.get_mut(partition) {
                Some(b) => b.handshake_end = index,
                None => log::warn!("partition number out of range: {}", partition),
            },
        }
    }

    pub fn boundary(&self, partition: usize) -> Option<PartitionBoundary> {
        self.boundaries.get(partition).copied()
    }

    pub fn boundaries(&self) -> Vec<PartitionBoundary> {
        self.boundaries.to_vec()
    }

    pub fn reset(&mut self) {
        self.boundaries = [PartitionBoundary::default(); MAX_PARTITIONS];
    }
}

/// Run a whole capture through a fresh tracker and collect the boundaries.
pub fn detect_boundaries(samples: &[i16], voltage_change_threshold: i32, change_threshold: u32) -> Vec<PartitionBoundary> {
    let mut tracker = PartitionTracker::new(voltage_change_threshold, change_threshold);
    let mut recorder = BoundaryRecorder::new();
    for (index, &sample) in samples.iter().enumerate() {
        if tracker.update(sample) {
            recorder.record(&tracker, index);
        }
    }
    recorder.boundaries()
}

#[cfg(test)]
mod tests {
    use super::*;

    const HIGH: i16 = 20000;
    const LOW: i16 = -20000;

    /// Square wave: `(level, length)` runs.
    fn square(runs: &[(bool, usize)]) -> Vec<i16> {
        runs.iter()
            .flat_map(|&(level, len)| std::iter::repeat(if level { HIGH } else { LOW }).take(len))
            .collect()
    }

    #[test]
    fn threshold_scales_with_rate() {
        assert_eq!(partition_threshold(48000), 300);
        assert_eq!(partition_threshold(44100), 275);
        assert_eq!(partition_threshold(4800), 30);
    }

    #[test]
    fn first_sample_only_primes() {
        let mut tracker = PartitionTracker::new(10000, 5);
        assert!(!tracker.update(LOW));
        assert_eq!(tracker.phase(), PartitionPhase::Pending);
        assert!(!tracker.is_active());
    }

    #[test]
    fn long_low_run_opens_handshake() {
        let mut tracker = PartitionTracker::new(10000, 5);
        tracker.update(HIGH);
        let changes: Vec<bool> = (0..6).map(|_| tracker.update(LOW)).collect();
        // The first low sample after priming is the edge; the run reaches 5 on the fifth.
        assert_eq!(changes, vec![false, false, false, false, true, false]);
        assert_eq!(tracker.phase(), PartitionPhase::Handshake);
        assert!(tracker.is_active());
    }

    #[test]
    fn full_partition_cycle() {
        let samples = square(&[(true, 1), (false, 10), (true, 3), (false, 2), (true, 2), (false, 10)]);
        let boundaries = detect_boundaries(&samples, 10000, 6);
        let first = boundaries[0];
        assert_eq!(first.handshake_start, 6);
        assert_eq!(first.handshake_end, 11);
        // Message closes once the trailing low run reaches 6 samples.
        assert_eq!(first.message_end, samples.len() - 10 + 5);
        assert!(first.is_well_formed());
        assert_eq!(boundaries[1].handshake_start, first.message_end + 1);
    }

    #[test]
    fn long_high_run_also_closes_message() {
        let samples = square(&[(true, 1), (false, 8), (true, 8)]);
        let mut tracker = PartitionTracker::new(10000, 6);
        for &s in &samples {
            tracker.update(s);
        }
        assert_eq!(tracker.partition(), 1);
        assert_eq!(tracker.phase(), PartitionPhase::Pending);
    }

    #[test]
    fn recorder_ignores_out_of_range_partitions() {
        let mut recorder = BoundaryRecorder::new();
        let tracker = PartitionTracker::new(10000, 6);
        // Pending with partition 0 has no previous partition to close.
        recorder.record(&tracker, 42);
        assert_eq!(recorder, BoundaryRecorder::new());
        assert_eq!(recorder.boundaries().len(), MAX_PARTITIONS);
    }
}
