use std::path::Path;

use serde::{Deserialize, Serialize};

use super::button::TapCount;

/// Origin of a recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecordingSource {
    Wearable,
}

/// A finished recording, created at a successful capture stop.
///
/// Immutable once built; edits are an external concern. Serializable for the
/// JSON metadata sidecar and for hand-off to the persistence sink.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recording {
    pub id: String,
    pub file_path: String,
    /// RFC 3339 timestamp of the capture start.
    pub created_at: String,
    pub duration_secs: f64,
    pub size_bytes: u64,
    pub source: RecordingSource,
    pub device_id: String,
    /// Tap count of the button event that closed the capture.
    pub button_tap_count: u8,
    /// SHA-256 hex digest of the written WAV file.
    pub checksum: String,
}

impl Recording {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        file_path: &Path,
        created_at: chrono::DateTime<chrono::Utc>,
        duration_secs: f64,
        size_bytes: u64,
        device_id: &str,
        taps: TapCount,
        checksum: &str,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            file_path: file_path.to_string_lossy().into_owned(),
            created_at: created_at.to_rfc3339(),
            duration_secs,
            size_bytes,
            source: RecordingSource::Wearable,
            device_id: device_id.to_string(),
            button_tap_count: taps.as_u8(),
            checksum: checksum.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_wearable_source() {
        let recording = Recording::new(
            Path::new("/tmp/recording_x.wav"),
            chrono::Utc::now(),
            1.5,
            48_044,
            "AA:BB",
            TapCount::Double,
            "deadbeef",
        );

        let json = serde_json::to_string(&recording).unwrap();
        assert!(json.contains("\"source\":\"wearable\""));
        assert!(json.contains("\"button_tap_count\":2"));

        let back: Recording = serde_json::from_str(&json).unwrap();
        assert_eq!(back, recording);
    }
}
