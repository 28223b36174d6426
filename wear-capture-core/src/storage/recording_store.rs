use std::path::{Path, PathBuf};

use log::debug;
use sha2::{Digest, Sha256};
use tokio::fs;
use uuid::Uuid;

use crate::models::error::CaptureError;

/// Where a finished capture landed on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WrittenRecording {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub checksum: String,
}

/// Write a complete WAV image into `dir` under a collision-free name.
///
/// The name embeds a fresh UUID, so concurrent captures into the same
/// directory never clobber each other.
pub async fn write_recording(dir: &Path, wav: &[u8]) -> Result<WrittenRecording, CaptureError> {
    fs::create_dir_all(dir)
        .await
        .map_err(|e| CaptureError::PersistenceFailed(format!("failed to create directory: {}", e)))?;

    let path = dir.join(format!("recording_{}.wav", Uuid::new_v4()));
    fs::write(&path, wav).await.map_err(|e| {
        CaptureError::PersistenceFailed(format!("failed to write {}: {}", path.display(), e))
    })?;

    let checksum = hex_encode(&Sha256::digest(wav));
    debug!("wrote {} ({} bytes)", path.display(), wav.len());
    Ok(WrittenRecording {
        path,
        size_bytes: wav.len() as u64,
        checksum,
    })
}

fn hex_encode(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
