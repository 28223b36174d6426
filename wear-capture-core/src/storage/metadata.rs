use std::path::{Path, PathBuf};

use tokio::fs;

use crate::models::error::CaptureError;
use crate::models::recording::Recording;

/// Path of the JSON sidecar for a recording file.
pub fn metadata_path(recording_path: &Path) -> PathBuf {
    recording_path.with_extension("metadata.json")
}

/// Write the recording's metadata as a JSON sidecar next to the WAV file.
///
/// The sidecar makes a capture directory self-describing even when the
/// host application's index is lost.
pub async fn write_metadata(
    recording: &Recording,
    recording_path: &Path,
) -> Result<(), CaptureError> {
    let json = serde_json::to_string_pretty(recording)
        .map_err(|e| CaptureError::PersistenceFailed(format!("failed to serialize metadata: {}", e)))?;
    fs::write(metadata_path(recording_path), json)
        .await
        .map_err(|e| CaptureError::PersistenceFailed(format!("failed to write metadata: {}", e)))?;
    Ok(())
}

/// Read a recording's metadata back from its sidecar.
pub async fn read_metadata(recording_path: &Path) -> Result<Recording, CaptureError> {
    let json = fs::read_to_string(metadata_path(recording_path))
        .await
        .map_err(|e| CaptureError::PersistenceFailed(format!("failed to read metadata: {}", e)))?;
    serde_json::from_str(&json)
        .map_err(|e| CaptureError::PersistenceFailed(format!("failed to parse metadata: {}", e)))
}
