use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::models::error::ModemError;
use crate::models::exchange_result::ExchangeMetadata;

/// Sidecar describing an exported capture file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptureRecord {
    #[serde(flatten)]
    pub exchange: ExchangeMetadata,
    pub file_path: String,
    /// SHA-256 of the capture file, lowercase hex.
    pub checksum: String,
    pub sample_count: usize,
}

/// Path of the sidecar for `capture_path`: `{stem}.metadata.json`.
pub fn metadata_path(capture_path: &Path) -> PathBuf {
    capture_path.with_extension("metadata.json")
}

/// Write capture metadata as a JSON sidecar file.
pub fn write_metadata(record: &CaptureRecord, capture_path: &Path) -> Result<PathBuf, ModemError> {
    let path = metadata_path(capture_path);
    let json = serde_json::to_string_pretty(record)
        .map_err(|e| ModemError::StorageError(format!("failed to serialize metadata: {}", e)))?;
    fs::write(&path, json).map_err(|e| ModemError::StorageError(format!("failed to write metadata: {}", e)))?;
    Ok(path)
}

/// Read capture metadata from a JSON sidecar file.
pub fn read_metadata(capture_path: &Path) -> Result<CaptureRecord, ModemError> {
    let json = fs::read_to_string(metadata_path(capture_path))
        .map_err(|e| ModemError::StorageError(format!("failed to read metadata: {}", e)))?;
    let record: CaptureRecord = serde_json::from_str(&json)
        .map_err(|e| ModemError::StorageError(format!("failed to parse metadata: {}", e)))?;
    Ok(record)
}
