use serde::{Deserialize, Serialize};

use crate::models::error::ModemError;

/// Order in which payload bits are laid into bit slots.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BitOrder {
    /// Slot 0 carries the least significant bit.
    #[default]
    LsbFirst,
    /// Slot 0 carries the most significant bit.
    MsbFirst,
}

fn default_payload_bits() -> usize {
    16
}

/// Constant table describing one device generation.
///
/// Bit templates and the start marker are expressed at `rate`; a
/// template's length is the bit slot length in samples.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantTable {
    pub name: String,
    pub rate: u32,
    pub bit0: Vec<bool>,
    pub bit1: Vec<bool>,
    pub start_marker: Vec<bool>,
    pub handshake_length: usize,
    pub marker_offset: usize,
    #[serde(default = "default_payload_bits")]
    pub payload_bits: usize,
    #[serde(default)]
    pub bit_order: BitOrder,
}

impl VariantTable {
    pub fn validate(&self) -> Result<(), String> {
        if self.rate == 0 {
            return Err("rate must be positive".into());
        }
        if self.bit0.is_empty() || self.bit0.len() != self.bit1.len() {
            return Err(format!(
                "bit templates must be non-empty and equally long (bit0: {}, bit1: {})",
                self.bit0.len(),
                self.bit1.len()
            ));
        }
        if self.payload_bits == 0 || self.payload_bits > 32 || self.payload_bits % 4 != 0 {
            return Err(format!("unsupported payload width: {} bits", self.payload_bits));
        }
        Ok(())
    }
}

fn runs(pattern: &[(bool, usize)]) -> Vec<bool> {
    pattern.iter()
        .flat_map(|&(level, len)| std::iter::repeat(level).take(len))
        .collect()
}

/// Framing and bit-slot arithmetic for one device generation.
///
/// A frame is `handshake ++ start_marker ++ payload`, where the handshake
/// is `handshake_length` low samples and the payload is one template per
/// bit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProtocolVariant {
    table: VariantTable,
}

impl ProtocolVariant {
    /// Build a variant from an externally supplied table.
    pub fn from_table(table: VariantTable) -> Result<Self, ModemError> {
        table.validate().map_err(ModemError::InvalidArgument)?;
        Ok(Self { table })
    }

    /// Parse a variant table from JSON.
    pub fn from_json(json: &str) -> Result<Self, ModemError> {
        let table: VariantTable = serde_json::from_str(json)
            .map_err(|e| ModemError::InvalidArgument(format!("failed to parse variant table: {}", e)))?;
        Self::from_table(table)
    }

    /// 20th anniversary "Original" device: 4800 Hz, 20-sample bit slots.
    pub fn original() -> Self {
        Self {
            table: VariantTable {
                name: "original".into(),
                rate: 4800,
                bit0: runs(&[(true, 5), (false, 15)]),
                bit1: runs(&[(true, 13), (false, 7)]),
                start_marker: runs(&[(true, 10), (false, 4)]),
                // about 60ms of silence
                handshake_length: 287,
                marker_offset: 8,
                payload_bits: 16,
                bit_order: BitOrder::LsbFirst,
            },
        }
    }

    pub fn table(&self) -> &VariantTable {
        &self.table
    }

    pub fn name(&self) -> &str {
        &self.table.name
    }

    /// Native sample rate of the templates in Hz.
    pub fn rate(&self) -> u32 {
        self.table.rate
    }

    pub fn one_bit_sample_count(&self) -> usize {
        self.table.bit0.len()
    }

    pub fn payload_bits(&self) -> usize {
        self.table.payload_bits
    }

    /// Hex digits per partition.
    pub fn payload_hex_len(&self) -> usize {
        self.table.payload_bits / 4
    }

    pub fn handshake_length(&self) -> usize {
        self.table.handshake_length
    }

    pub fn handshake(&self) -> Vec<bool> {
        vec![false; self.table.handshake_length]
    }

    pub fn start_marker(&self) -> &[bool] {
        &self.table.start_marker
    }

    pub fn encode_bit(&self, bit: bool) -> &[bool] {
        if bit {
            &self.table.bit1
        } else {
            &self.table.bit0
        }
    }

    /// Parse a hex payload that fits the payload width. Case-insensitive.
    pub fn parse_payload(&self, hex: &str) -> Result<u32, ModemError> {
        if hex.is_empty() || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(ModemError::InvalidArgument(format!("not a hex payload: {:?}", hex)));
        }
        let digits = hex.trim_start_matches('0');
        if digits.len() > self.payload_hex_len() {
            return Err(ModemError::InvalidArgument(format!(
                "payload {:?} wider than {} bits",
                hex,
                self.payload_bits()
            )));
        }
        if digits.is_empty() {
            return Ok(0);
        }
        u32::from_str_radix(digits, 16)
            .map_err(|e| ModemError::InvalidArgument(format!("not a hex payload: {:?} ({})", hex, e)))
    }

    fn slot_bit(&self, value: u32, slot: usize) -> bool {
        let shift = match self.table.bit_order {
            BitOrder::LsbFirst => slot,
            BitOrder::MsbFirst => self.payload_bits() - 1 - slot,
        };
        (value >> shift) & 1 == 1
    }

    /// Encode a hex payload as concatenated bit templates.
    pub fn encode_hex(&self, hex: &str) -> Result<Vec<bool>, ModemError> {
        let value = self.parse_payload(hex)?;
        let mut encoded = Vec::with_capacity(self.payload_bits() * self.one_bit_sample_count());
        for slot in 0..self.payload_bits() {
            encoded.extend_from_slice(self.encode_bit(self.slot_bit(value, slot)));
        }
        Ok(encoded)
    }

    /// Handshake, start marker and payload for one partition.
    pub fn encode_frame(&self, hex: &str) -> Result<Vec<bool>, ModemError> {
        let payload = self.encode_hex(hex)?;
        let mut frame = self.handshake();
        frame.reserve(self.table.start_marker.len() + payload.len());
        frame.extend_from_slice(&self.table.start_marker);
        frame.extend_from_slice(&payload);
        Ok(frame)
    }

    /// Length in samples of every frame this variant produces.
    pub fn frame_len(&self) -> usize {
        self.table.handshake_length + self.table.start_marker.len() + self.payload_bits() * self.one_bit_sample_count()
    }

    /// Sample index of the first bit and the real-valued bit stride at `reception_rate`.
    fn sampling_grid(&self, reception_rate: u32) -> (f64, f64) {
        let rate = self.table.rate as u64;
        let reception = reception_rate as u64;
        let stride = self.one_bit_sample_count() as f64 * reception as f64 / rate as f64;
        let marker = self.table.start_marker.len() as u64 * reception / rate;
        let offset = self.table.marker_offset as u64 * reception / rate;
        ((marker + offset) as f64, stride)
    }

    /// Sample the payload bits out of a partition captured at `reception_rate`.
    ///
    /// `captured` starts at the end of the handshake. Bits whose sampling
    /// point lies past the capture are left `false`.
    pub fn decode(&self, reception_rate: u32, captured: &[bool]) -> Vec<bool> {
        let (mut position, stride) = self.sampling_grid(reception_rate);
        let mut bits = vec![false; self.payload_bits()];
        for bit in bits.iter_mut() {
            if position >= captured.len() as f64 {
                break;
            }
            *bit = captured[position as usize];
            position += stride;
        }
        bits
    }

    /// Render decoded bits as a lowercase, zero-padded hex payload.
    pub fn hex_from_bits(&self, bits: &[bool]) -> Result<String, ModemError> {
        if bits.len() != self.payload_bits() {
            return Err(ModemError::DecodeInvalidLength(bits.len()));
        }
        let value = bits
            .iter()
            .enumerate()
            .filter(|&(_, &bit)| bit)
            .fold(0u32, |acc, (slot, _)| {
                let shift = match self.table.bit_order {
                    BitOrder::LsbFirst => slot,
                    BitOrder::MsbFirst => self.payload_bits() - 1 - slot,
                };
                acc | 1 << shift
            });
        Ok(format!("{:0width$x}", value, width = self.payload_hex_len()))
    }

    /// Sampling positions of each payload bit at `reception_rate`.
    pub fn marker_positions(&self, reception_rate: u32) -> Vec<usize> {
        let (mut position, stride) = self.sampling_grid(reception_rate);
        let mut positions = Vec::with_capacity(self.payload_bits());
        for _ in 0..self.payload_bits() {
            positions.push(position as usize);
            position += stride;
        }
        positions
    }

    /// Duration of start marker plus payload in milliseconds.
    pub fn frame_duration_ms(&self) -> u32 {
        let samples = self.one_bit_sample_count() * self.payload_bits() + self.table.start_marker.len();
        (samples as u64 * 1000 / self.table.rate as u64) as u32
    }
}

/// LSB-first bit string of a 16-bit hex payload, e.g. `"0001"` → `"1000000000000000"`.
///
/// Inputs that do not parse are returned unchanged.
pub fn lsb_bit_string(hex: &str) -> String {
    match u32::from_str_radix(hex, 16) {
        Ok(value) => {
            let msb_first = format!("{:016b}", value);
            msb_first.chars().rev().collect()
        }
        Err(_) => hex.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Byte-oriented test table: 3750 Hz, no start marker, 8-bit payloads.
    fn byte_variant() -> ProtocolVariant {
        ProtocolVariant::from_table(VariantTable {
            name: "byte-test".into(),
            rate: 3750,
            bit0: runs(&[(true, 2), (false, 6)]),
            bit1: runs(&[(true, 6), (false, 2)]),
            start_marker: Vec::new(),
            handshake_length: 234,
            marker_offset: 4,
            payload_bits: 8,
            bit_order: BitOrder::LsbFirst,
        })
        .unwrap()
    }

    fn templates(variant: &ProtocolVariant, bits: &[u8]) -> Vec<bool> {
        bits.iter().flat_map(|&b| variant.encode_bit(b == 1).to_vec()).collect()
    }

    #[test]
    fn original_constants() {
        let v = ProtocolVariant::original();
        assert_eq!(v.rate(), 4800);
        assert_eq!(v.one_bit_sample_count(), 20);
        assert_eq!(v.handshake().len(), 287);
        assert_eq!(v.start_marker().len(), 14);
        assert_eq!(v.encode_bit(true).iter().filter(|&&b| b).count(), 13);
        assert_eq!(v.encode_bit(false).iter().filter(|&&b| b).count(), 5);
    }

    #[test]
    fn encode_hex_is_lsb_first() {
        let v = byte_variant();
        // 0xA3 = 1010_0011, emitted from the LSB up.
        let expected = templates(&v, &[1, 1, 0, 0, 0, 1, 0, 1]);
        assert_eq!(v.encode_hex("A3").unwrap(), expected);
        assert_eq!(v.encode_hex("a3").unwrap(), expected);
    }

    #[test]
    fn msb_first_tables_reverse_slots() {
        let mut table = byte_variant().table().clone();
        table.bit_order = BitOrder::MsbFirst;
        let v = ProtocolVariant::from_table(table).unwrap();
        assert_eq!(v.encode_hex("A3").unwrap(), templates(&v, &[1, 0, 1, 0, 0, 0, 1, 1]));
        let bits = [true, false, true, false, false, false, true, true];
        assert_eq!(v.hex_from_bits(&bits).unwrap(), "a3");
    }

    #[test]
    fn short_payloads_are_zero_extended() {
        let v = ProtocolVariant::original();
        let encoded = v.encode_hex("1").unwrap();
        assert_eq!(encoded.len(), 16 * 20);
        assert_eq!(&encoded[..20], v.encode_bit(true));
        assert_eq!(&encoded[20..40], v.encode_bit(false));
    }

    #[test]
    fn rejects_invalid_payloads() {
        let v = ProtocolVariant::original();
        assert!(matches!(v.encode_hex(""), Err(ModemError::InvalidArgument(_))));
        assert!(matches!(v.encode_hex("12g4"), Err(ModemError::InvalidArgument(_))));
        assert!(matches!(v.encode_hex("12345"), Err(ModemError::InvalidArgument(_))));
        assert!(v.encode_hex("0000ffff").is_ok());
    }

    #[test]
    fn frame_layout_and_length() {
        for v in [ProtocolVariant::original(), byte_variant()] {
            let frame = v.encode_frame("0e").unwrap();
            let expected_len = v.handshake().len() + v.start_marker().len() + v.payload_bits() * v.one_bit_sample_count();
            assert_eq!(frame.len(), expected_len);
            assert_eq!(frame.len(), v.frame_len());
            assert!(frame[..v.handshake_length()].iter().all(|&b| !b));
            let marker_end = v.handshake_length() + v.start_marker().len();
            assert_eq!(&frame[v.handshake_length()..marker_end], v.start_marker());
        }
    }

    #[test]
    fn byte_variant_frame_matches_template_layout() {
        let v = byte_variant();
        let mut expected = vec![false; 234];
        expected.extend(templates(&v, &[1, 1, 0, 0, 0, 1, 0, 1]));
        assert_eq!(v.encode_frame("A3").unwrap(), expected);
    }

    #[test]
    fn decode_at_native_rate_recovers_payload() {
        let v = ProtocolVariant::original();
        let frame = v.encode_frame("a3f0").unwrap();
        let bits = v.decode(v.rate(), &frame[v.handshake_length()..]);
        assert_eq!(v.hex_from_bits(&bits).unwrap(), "a3f0");
    }

    #[test]
    fn decode_at_ten_times_rate() {
        let v = ProtocolVariant::original();
        let frame = v.encode_frame("c0de").unwrap();
        let upsampled: Vec<bool> = frame[v.handshake_length()..]
            .iter()
            .flat_map(|&b| std::iter::repeat(b).take(10))
            .collect();
        let bits = v.decode(48000, &upsampled);
        assert_eq!(v.hex_from_bits(&bits).unwrap(), "c0de");
    }

    #[test]
    fn decode_zero_fills_truncated_capture() {
        let v = ProtocolVariant::original();
        let all_high = vec![true; 14 + 8 + 20 * 3];
        let bits = v.decode(v.rate(), &all_high);
        assert_eq!(bits.len(), 16);
        assert_eq!(bits.iter().filter(|&&b| b).count(), 3);
        assert!(v.decode(v.rate(), &[]).iter().all(|&b| !b));
    }

    #[test]
    fn hex_from_bits_requires_exact_width() {
        let v = ProtocolVariant::original();
        assert_eq!(v.hex_from_bits(&[true; 15]), Err(ModemError::DecodeInvalidLength(15)));
        let mut bits = [false; 16];
        bits[0] = true;
        assert_eq!(v.hex_from_bits(&bits).unwrap(), "0001");
        assert_eq!(v.hex_from_bits(&[true; 16]).unwrap(), "ffff");
        assert_eq!(v.hex_from_bits(&[false; 16]).unwrap(), "0000");
    }

    #[test]
    fn marker_positions_follow_integer_offsets() {
        let v = ProtocolVariant::original();
        let positions = v.marker_positions(48000);
        assert_eq!(positions.len(), 16);
        assert_eq!(positions[0], 220);
        assert_eq!(positions[1], 420);
        assert_eq!(positions[15], 220 + 15 * 200);

        // 14 * 44100 / 4800 = 128, 8 * 44100 / 4800 = 73, stride 183.75
        let positions = v.marker_positions(44100);
        assert_eq!(positions[0], 201);
        assert_eq!(positions[1], 384);
        assert_eq!(positions[4], 936);
    }

    #[test]
    fn sampling_stride_is_real_valued() {
        let v = ProtocolVariant::original();
        let (offset, stride) = v.sampling_grid(44100);
        assert_relative_eq!(offset, 201.0);
        assert_relative_eq!(stride, 183.75);
    }

    #[test]
    fn frame_duration() {
        assert_eq!(ProtocolVariant::original().frame_duration_ms(), 69);
        // (8 * 8 + 0) * 1000 / 3750
        assert_eq!(byte_variant().frame_duration_ms(), 17);
    }

    #[test]
    fn table_loads_from_json_with_defaults() {
        let json = r#"{
            "name": "pendulum",
            "rate": 4800,
            "bit0": [true, false, false, false],
            "bit1": [true, true, true, false],
            "start_marker": [true, true, false],
            "handshake_length": 100,
            "marker_offset": 1
        }"#;
        let v = ProtocolVariant::from_json(json).unwrap();
        assert_eq!(v.name(), "pendulum");
        assert_eq!(v.payload_bits(), 16);
        assert_eq!(v.table().bit_order, BitOrder::LsbFirst);
    }

    #[test]
    fn table_validation() {
        let mut table = ProtocolVariant::original().table().clone();
        table.bit1.pop();
        assert!(ProtocolVariant::from_table(table).is_err());

        let mut table = ProtocolVariant::original().table().clone();
        table.payload_bits = 10;
        assert!(ProtocolVariant::from_table(table).is_err());
    }

    #[test]
    fn lsb_bit_strings() {
        assert_eq!(lsb_bit_string("0001"), "1000000000000000");
        assert_eq!(lsb_bit_string("8000"), "0000000000000001");
        assert_eq!(lsb_bit_string("zz"), "zz");
    }
}
