use super::partition_tracker::{detect_boundaries, partition_threshold};
use super::waveform::{self, WaveformCodec};
use crate::models::error::ModemError;
use crate::models::partition::PartitionBoundary;
use crate::protocol::variant::ProtocolVariant;

/// Payloads recovered from one composite capture.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedCapture {
    /// One payload per boundary, in boundary order.
    pub hex_messages: Vec<String>,
    pub digital_signal: Vec<bool>,
    pub partitions: Vec<PartitionBoundary>,
}

/// Turns a raw capture into per-partition payloads.
#[derive(Debug, Clone)]
pub struct CaptureDecoder {
    variant: ProtocolVariant,
    codec: WaveformCodec,
}

impl CaptureDecoder {
    pub fn new(variant: ProtocolVariant, codec: WaveformCodec) -> Self {
        Self { variant, codec }
    }

    pub fn variant(&self) -> &ProtocolVariant {
        &self.variant
    }

    /// Decode using boundaries reported by the audio engine.
    ///
    /// Boundaries the engine never filled in decode to an all-zero payload.
    pub fn decode_with_boundaries(
        &self,
        samples: &[i16],
        rate: u32,
        partitions: &[PartitionBoundary],
    ) -> Result<DecodedCapture, ModemError> {
        let digital_signal = self.codec.to_digital(samples).ok_or(ModemError::NoSignal)?;
        let mut hex_messages = Vec::with_capacity(partitions.len());
        for (index, boundary) in partitions.iter().enumerate() {
            let captured = waveform::slice(&digital_signal, boundary.handshake_end, boundary.message_end);
            let bits = self.variant.decode(rate, &captured);
            let hex = self.variant.hex_from_bits(&bits)?;
            if boundary.is_well_formed() {
                log::debug!("partition {} [{}..={}]: {}", index, boundary.handshake_end, boundary.message_end, hex);
            }
            hex_messages.push(hex);
        }
        Ok(DecodedCapture {
            hex_messages,
            digital_signal,
            partitions: partitions.to_vec(),
        })
    }

    /// Decode a capture with no engine help, detecting boundaries offline.
    pub fn decode(&self, samples: &[i16], rate: u32) -> Result<DecodedCapture, ModemError> {
        if samples.is_empty() {
            return Err(ModemError::NoSignal);
        }
        let partitions = detect_boundaries(samples, self.codec.voltage_change_threshold(), partition_threshold(rate));
        log::info!(
            "detected {} partitions in {} samples at {} Hz",
            partitions.iter().filter(|p| p.is_well_formed()).count(),
            samples.len(),
            rate
        );
        self.decode_with_boundaries(samples, rate, &partitions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::config::{ModemConfig, OutputPolarity};
    use crate::models::partition::MAX_PARTITIONS;

    fn direct_codec() -> WaveformCodec {
        WaveformCodec::new(&ModemConfig {
            polarity: OutputPolarity::Direct,
            ..Default::default()
        })
    }

    /// Frames back to back at `factor` times the variant rate, preceded by a
    /// short idle high level and followed by a long high tail.
    fn line(variant: &ProtocolVariant, payloads: &[&str], factor: usize) -> Vec<bool> {
        let mut bits = vec![true; 4];
        for payload in payloads {
            bits.extend(variant.encode_frame(payload).unwrap());
        }
        bits.extend(vec![true; variant.handshake_length()]);
        bits.iter()
            .flat_map(|&b| std::iter::repeat(b).take(factor))
            .collect()
    }

    #[test]
    fn offline_decode_finds_every_partition() {
        let variant = ProtocolVariant::original();
        let codec = direct_codec();
        let payloads = ["a3f0", "0001", "8000", "ffff"];
        let analog = codec.to_analog(&line(&variant, &payloads, 10));

        let decoder = CaptureDecoder::new(variant, codec);
        let decoded = decoder.decode(&analog, 48000).unwrap();

        assert_eq!(decoded.partitions.len(), MAX_PARTITIONS);
        assert_eq!(&decoded.hex_messages[..4], &payloads);
        assert!(decoded.partitions[..4].iter().all(|p| p.is_well_formed()));
        assert!(decoded.hex_messages[4..].iter().all(|h| h == "0000"));
        assert_eq!(decoded.digital_signal.len(), analog.len());
    }

    #[test]
    fn engine_boundaries_are_used_verbatim() {
        let variant = ProtocolVariant::original();
        let codec = direct_codec();
        let analog = codec.to_analog(&line(&variant, &["c0de"], 10));
        let decoder = CaptureDecoder::new(variant.clone(), codec);

        // Handshake silence starts after the 4 idle samples; the message starts right after it.
        let handshake_end = (4 + variant.handshake_length()) * 10;
        let message_len = variant.frame_len() - variant.handshake_length();
        let boundary = PartitionBoundary::new(40, handshake_end, handshake_end + message_len * 10);
        let decoded = decoder
            .decode_with_boundaries(&analog, 48000, &[boundary, PartitionBoundary::default()])
            .unwrap();
        assert_eq!(decoded.hex_messages, vec!["c0de", "0000"]);
    }

    #[test]
    fn empty_capture_is_no_signal() {
        let decoder = CaptureDecoder::new(ProtocolVariant::original(), direct_codec());
        assert_eq!(decoder.decode(&[], 48000), Err(ModemError::NoSignal));
        assert_eq!(
            decoder.decode_with_boundaries(&[], 48000, &[PartitionBoundary::default()]),
            Err(ModemError::NoSignal)
        );
    }
}
