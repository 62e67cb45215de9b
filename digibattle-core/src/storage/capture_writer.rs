use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use super::metadata::{self, CaptureRecord};
use crate::models::error::ModemError;
use crate::models::exchange_result::ExchangeResult;
use crate::processing::wav_format;

/// Files produced by [`export_capture`].
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureExport {
    pub wav_path: PathBuf,
    pub metadata_path: PathBuf,
    pub checksum: String,
}

/// A capture read back from disk.
#[derive(Debug, Clone, PartialEq)]
pub struct LoadedCapture {
    pub rate: u32,
    pub samples: Vec<i16>,
    pub record: CaptureRecord,
}

/// Save the raw capture of an exchange as a WAV file plus JSON sidecar.
///
/// ```text
/// {directory}/exchange_{id}.wav
/// {directory}/exchange_{id}.metadata.json
/// ```
pub fn export_capture(result: &ExchangeResult, directory: &Path) -> Result<CaptureExport, ModemError> {
    fs::create_dir_all(directory)
        .map_err(|e| ModemError::StorageError(format!("failed to create directory: {}", e)))?;

    let wav_path = directory.join(format!("exchange_{}.wav", result.metadata.id));
    let bytes = wav_format::encode_wav(&result.analog_signal, result.rate);
    fs::write(&wav_path, &bytes).map_err(|e| ModemError::StorageError(format!("failed to write capture: {}", e)))?;
    let checksum = sha256_file(&wav_path)?;

    let record = CaptureRecord {
        exchange: result.metadata.clone(),
        file_path: wav_path.to_string_lossy().into_owned(),
        checksum: checksum.clone(),
        sample_count: result.analog_signal.len(),
    };
    let metadata_path = metadata::write_metadata(&record, &wav_path)?;
    log::info!(
        "exported {} samples to {} (sha256 {})",
        record.sample_count,
        wav_path.display(),
        checksum
    );

    Ok(CaptureExport {
        wav_path,
        metadata_path,
        checksum,
    })
}

/// Load an exported capture, verifying it against its sidecar checksum.
pub fn load_capture(wav_path: &Path) -> Result<LoadedCapture, ModemError> {
    let record = metadata::read_metadata(wav_path)?;
    let bytes =
        fs::read(wav_path).map_err(|e| ModemError::StorageError(format!("failed to read capture: {}", e)))?;
    let checksum = hex_encode(&Sha256::digest(&bytes));
    if checksum != record.checksum {
        return Err(ModemError::StorageError(format!(
            "checksum mismatch for {}: expected {}, got {}",
            wav_path.display(),
            record.checksum,
            checksum
        )));
    }
    let (rate, samples) = wav_format::decode_wav(&bytes)?;
    Ok(LoadedCapture { rate, samples, record })
}

/// Compute SHA-256 hex digest of a file.
fn sha256_file(path: &Path) -> Result<String, ModemError> {
    let data =
        fs::read(path).map_err(|e| ModemError::StorageError(format!("failed to read file for checksum: {}", e)))?;
    let digest = Sha256::digest(&data);
    Ok(hex_encode(&digest))
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
