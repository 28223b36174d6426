use async_trait::async_trait;

use crate::models::recording::Recording;

/// Receives finished recordings after the WAV file hits disk.
///
/// Implementations index the recording wherever the host application keeps
/// its library (database row, sync queue, plain log). The file itself is
/// already written when `persist` runs; a sink failure leaves the file in
/// place and is reported as a capture status event, not a loss of audio.
#[async_trait]
pub trait RecordingSink: Send + Sync {
    async fn persist(&self, recording: &Recording) -> Result<(), String>;
}
