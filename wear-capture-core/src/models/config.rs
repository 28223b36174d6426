use std::path::PathBuf;
use std::sync::Arc;

use crate::traits::decoder::DecoderFactory;

/// Configuration for the capture orchestrator.
#[derive(Clone)]
pub struct CaptureConfig {
    /// Directory where recording files and metadata sidecars are written.
    pub output_directory: PathBuf,

    /// Factory for compressed-codec decoders. Captures on a device that
    /// reports the compressed codec abort with a status message when this
    /// is `None`.
    pub decoder_factory: Option<Arc<dyn DecoderFactory>>,
}

impl CaptureConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.output_directory.as_os_str().is_empty() {
            return Err("output directory must not be empty".into());
        }
        Ok(())
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            output_directory: PathBuf::from("."),
            decoder_factory: None,
        }
    }
}
