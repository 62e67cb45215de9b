//! Line coding between logical bit sequences and 16-bit analog samples.
//!
//! A plain square wave does not survive the AC-coupled audio path: the
//! coupling capacitor drains any level held for more than a few
//! milliseconds. Each run therefore starts at `rail × init_ratio` and then
//! ramps toward the full-scale rail by `delta` per sample, which keeps a
//! detectable offset on the line for the duration of a bit slot.
//!
//! Recovery works on sample-to-sample deltas rather than absolute levels,
//! so it is insensitive to the slow drift the coupling introduces.

use crate::models::config::{ModemConfig, OutputPolarity};

#[derive(Debug, Clone, PartialEq)]
pub struct WaveformCodec {
    voltage_change_threshold: i32,
    init_ratio: f32,
    delta: i32,
    polarity: OutputPolarity,
}

impl WaveformCodec {
    pub fn new(config: &ModemConfig) -> Self {
        Self {
            voltage_change_threshold: config.voltage_change_threshold,
            init_ratio: config.analog_init_ratio,
            delta: config.analog_delta,
            polarity: config.polarity,
        }
    }

    pub fn voltage_change_threshold(&self) -> i32 {
        self.voltage_change_threshold
    }

    fn rail(&self, bit: bool) -> i16 {
        match (self.polarity, bit) {
            (OutputPolarity::Inverted, true) | (OutputPolarity::Direct, false) => i16::MIN,
            (OutputPolarity::Inverted, false) | (OutputPolarity::Direct, true) => i16::MAX,
        }
    }

    /// Convert bits to ramped analog samples, one sample per bit.
    pub fn to_analog(&self, bits: &[bool]) -> Vec<i16> {
        let mut samples: Vec<i16> = Vec::with_capacity(bits.len());
        let delta = self.delta;
        for (i, &bit) in bits.iter().enumerate() {
            let rail = self.rail(bit);
            let value = if i == 0 || bits[i - 1] != bit {
                (rail as f32 * self.init_ratio) as i16
            } else {
                let previous = samples[i - 1] as i32;
                if rail == i16::MIN {
                    if previous > i16::MIN as i32 + delta {
                        (previous - delta) as i16
                    } else {
                        previous as i16
                    }
                } else if previous < i16::MAX as i32 - delta {
                    (previous + delta) as i16
                } else {
                    previous as i16
                }
            };
            samples.push(value);
        }
        samples
    }

    /// Convert every partition independently.
    pub fn to_analog_partitions(&self, partitions: &[Vec<bool>]) -> Vec<Vec<i16>> {
        partitions.iter().map(|bits| self.to_analog(bits)).collect()
    }

    /// Recover bits from analog samples, inferring the first bit from its absolute level.
    ///
    /// Returns `None` for an empty capture.
    pub fn to_digital(&self, samples: &[i16]) -> Option<Vec<bool>> {
        let first = *samples.first()?;
        self.to_digital_from(samples, first as i32 > self.voltage_change_threshold)
    }

    /// Recover bits from analog samples with a known first bit.
    pub fn to_digital_from(&self, samples: &[i16], initial: bool) -> Option<Vec<bool>> {
        if samples.is_empty() {
            return None;
        }
        let threshold = self.voltage_change_threshold;
        let mut bits = Vec::with_capacity(samples.len());
        bits.push(initial);
        for pair in samples.windows(2) {
            let diff = pair[1] as i32 - pair[0] as i32;
            let previous = bits[bits.len() - 1];
            bits.push(if diff > threshold {
                true
            } else if diff < -threshold {
                false
            } else {
                previous
            });
        }
        Some(bits)
    }
}

/// Inclusive sub-range `[start, end]` of a sample sequence.
///
/// Empty when `start > end` or when `end` is past the input; never panics.
pub fn slice<T: Copy>(samples: &[T], start: usize, end: usize) -> Vec<T> {
    if start > end || end >= samples.len() {
        return Vec::new();
    }
    samples[start..=end].to_vec()
}
