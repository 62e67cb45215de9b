//! Sample-level model of the shared audio line.
//!
//! Both devices drive the same wire, so the capture is one composite
//! signal: a lead-in of silence, then alternating frames separated by
//! gaps in which the line holds its last level.

use std::iter;

use digibattle_core::models::config::OutputPolarity;

/// Nearest-neighbour resampling from `from` Hz to `to` Hz.
///
/// Both rates must be non-zero.
pub fn resample<T: Copy>(samples: &[T], from: u32, to: u32) -> Vec<T> {
    if from == to {
        return samples.to_vec();
    }
    let len = (samples.len() as u64 * to as u64 / from as u64) as usize;
    (0..len)
        .map(|i| {
            let source = (i as u64 * from as u64 / to as u64) as usize;
            samples[source.min(samples.len() - 1)]
        })
        .collect()
}

/// What the line sees when we play `samples` through our output stage.
pub fn output_stage(samples: &[i16], polarity: OutputPolarity) -> Vec<i16> {
    match polarity {
        OutputPolarity::Inverted => samples.iter().map(|s| s.saturating_neg()).collect(),
        OutputPolarity::Direct => samples.to_vec(),
    }
}

pub fn samples_for_ms(ms: i64, rate: u32) -> usize {
    (ms.max(0) as u64 * rate as u64 / 1000) as usize
}

fn hold(line: &mut Vec<i16>, count: usize) {
    let last = line.last().copied().unwrap_or(0);
    line.extend(iter::repeat(last).take(count));
}

/// Interleave both sides' frames into one capture.
///
/// `own_first` puts our frame 0 on the line before the peer's. Every frame
/// is followed by `gap` held samples and the line ends with `tail` more.
pub fn compose(own: &[Vec<i16>], peer: &[Vec<i16>], own_first: bool, gap: usize, tail: usize) -> Vec<i16> {
    let (first, second) = if own_first { (own, peer) } else { (peer, own) };
    let mut line = vec![0; gap];
    for slot in 0..first.len().max(second.len()) {
        for frame in [first.get(slot), second.get(slot)].into_iter().flatten() {
            line.extend_from_slice(frame);
            hold(&mut line, gap);
        }
    }
    hold(&mut line, tail);
    line
}
