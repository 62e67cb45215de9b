//! WAV container for raw captures.
//!
//! Captures are mono, 16-bit little-endian PCM behind a standard 44-byte
//! RIFF header.

use crate::models::error::ModemError;

/// Size of the standard WAV RIFF header in bytes.
pub const WAV_HEADER_SIZE: usize = 44;

const CHANNELS: u16 = 1;
const BIT_DEPTH: u16 = 16;
const BLOCK_ALIGN: u16 = CHANNELS * BIT_DEPTH / 8;

/// Generate a 44-byte mono 16-bit PCM header.
///
/// Layout:
/// ```text
/// [0-3]    "RIFF"
/// [4-7]    36 + data_size
/// [8-11]   "WAVE"
/// [12-15]  "fmt "
/// [16-19]  16 (PCM format chunk size)
/// [20-21]  1 (PCM format code)
/// [22-23]  1 channel
/// [24-27]  sample_rate
/// [28-31]  byte_rate = sample_rate * 2
/// [32-33]  block_align = 2
/// [34-35]  16 bits
/// [36-39]  "data"
/// [40-43]  data_size
/// ```
pub fn generate_wav_header(sample_rate: u32, data_size: u32) -> [u8; WAV_HEADER_SIZE] {
    let byte_rate = sample_rate * BLOCK_ALIGN as u32;
    let chunk_size = 36 + data_size;

    let mut header = [0u8; WAV_HEADER_SIZE];

    // RIFF chunk descriptor
    header[0..4].copy_from_slice(b"RIFF");
    header[4..8].copy_from_slice(&chunk_size.to_le_bytes());
    header[8..12].copy_from_slice(b"WAVE");

    // fmt sub-chunk
    header[12..16].copy_from_slice(b"fmt ");
    header[16..20].copy_from_slice(&16u32.to_le_bytes());
    header[20..22].copy_from_slice(&1u16.to_le_bytes());
    header[22..24].copy_from_slice(&CHANNELS.to_le_bytes());
    header[24..28].copy_from_slice(&sample_rate.to_le_bytes());
    header[28..32].copy_from_slice(&byte_rate.to_le_bytes());
    header[32..34].copy_from_slice(&BLOCK_ALIGN.to_le_bytes());
    header[34..36].copy_from_slice(&BIT_DEPTH.to_le_bytes());

    // data sub-chunk
    header[36..40].copy_from_slice(b"data");
    header[40..44].copy_from_slice(&data_size.to_le_bytes());

    header
}

/// Serialize a capture into a complete WAV file image.
pub fn encode_wav(samples: &[i16], sample_rate: u32) -> Vec<u8> {
    let data_size = (samples.len() * BLOCK_ALIGN as usize) as u32;
    let mut bytes = Vec::with_capacity(WAV_HEADER_SIZE + data_size as usize);
    bytes.extend_from_slice(&generate_wav_header(sample_rate, data_size));
    for sample in samples {
        bytes.extend_from_slice(&sample.to_le_bytes());
    }
    bytes
}

fn read_u16(bytes: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
}

fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([bytes[offset], bytes[offset + 1], bytes[offset + 2], bytes[offset + 3]])
}

/// Parse a WAV image written by [`encode_wav`]. Returns the sample rate and samples.
pub fn decode_wav(bytes: &[u8]) -> Result<(u32, Vec<i16>), ModemError> {
    if bytes.len() < WAV_HEADER_SIZE || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return Err(ModemError::StorageError("not a RIFF/WAVE file".into()));
    }
    if read_u16(bytes, 20) != 1 || read_u16(bytes, 22) != CHANNELS || read_u16(bytes, 34) != BIT_DEPTH {
        return Err(ModemError::StorageError("expected mono 16-bit PCM".into()));
    }
    let sample_rate = read_u32(bytes, 24);
    let data_size = read_u32(bytes, 40) as usize;
    let data = bytes
        .get(WAV_HEADER_SIZE..WAV_HEADER_SIZE + data_size)
        .ok_or_else(|| ModemError::StorageError(format!("truncated data chunk ({} bytes declared)", data_size)))?;
    let samples = data
        .chunks_exact(2)
        .map(|pair| i16::from_le_bytes([pair[0], pair[1]]))
        .collect();
    Ok((sample_rate, samples))
}
