use audiopus::coder::Decoder;
use audiopus::{Channels, SampleRate};

use wear_capture_core::traits::decoder::{AudioDecoder, DecoderFactory};

/// Samples in a 120 ms frame at 16 kHz, the longest Opus allows. The
/// scratch buffer is sized for it so any legal frame decodes in one call.
const MAX_FRAME_SAMPLES: usize = 1920;

/// Opus decoder fixed to the wearable's stream format: 16 kHz mono.
pub struct OpusDecoder {
    decoder: Decoder,
    scratch: Vec<i16>,
}

impl OpusDecoder {
    pub fn new() -> Result<Self, String> {
        let decoder = Decoder::new(SampleRate::Hz16000, Channels::Mono)
            .map_err(|e| format!("opus decoder init failed: {:?}", e))?;
        Ok(Self {
            decoder,
            scratch: vec![0i16; MAX_FRAME_SAMPLES],
        })
    }
}

impl AudioDecoder for OpusDecoder {
    fn decode(&mut self, frame: &[u8]) -> Result<Vec<i16>, String> {
        let samples = self
            .decoder
            .decode(Some(frame), &mut self.scratch, false)
            .map_err(|e| format!("opus decode failed: {:?}", e))?;
        Ok(self.scratch[..samples].to_vec())
    }

    fn name(&self) -> &str {
        "opus"
    }
}

/// One fresh decoder per capture session; Opus carries state across frames,
/// so sessions must never share one.
pub struct OpusDecoderFactory;

impl DecoderFactory for OpusDecoderFactory {
    fn create(&self) -> Result<Box<dyn AudioDecoder>, String> {
        Ok(Box::new(OpusDecoder::new()?))
    }
}
