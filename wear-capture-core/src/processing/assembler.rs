use log::warn;

use crate::models::codec::AudioCodec;
use crate::models::error::CaptureError;
use crate::processing::mulaw;
use crate::processing::wav_format;
use crate::protocol::frames::AudioFrame;
use crate::traits::decoder::AudioDecoder;

/// Counters accumulated over one capture session.
///
/// `sequence_gaps` counts discontinuities in the wire sequence numbers;
/// `frames_lost` is the total number of frames those gaps spanned. Both are
/// diagnostics only: the assembler never waits for or reorders frames.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AssemblerStats {
    pub frames_received: u64,
    pub payload_bytes: u64,
    pub malformed_frames: u64,
    pub decode_failures: u64,
    pub sequence_gaps: u64,
    pub frames_lost: u64,
}

/// Accumulates audio frames for one capture session and renders them into a
/// complete in-memory WAV file.
///
/// Frames are appended strictly in arrival order. Notification transports
/// deliver in order on a healthy link, so a gap in sequence numbers means
/// loss, not reordering; the assembler records the gap and moves on rather
/// than buffering for retransmits that will never come.
///
/// PCM is stored in the output domain: compressed and companded codecs are
/// decoded as frames arrive, so `duration_secs` and `build_wav` are cheap at
/// stop time.
pub struct AudioFrameAssembler {
    codec: AudioCodec,
    decoder: Option<Box<dyn AudioDecoder>>,
    pcm: Vec<u8>,
    last_sequence: Option<u16>,
    stats: AssemblerStats,
}

impl std::fmt::Debug for AudioFrameAssembler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AudioFrameAssembler")
            .field("codec", &self.codec)
            .field("has_decoder", &self.decoder.is_some())
            .field("pcm_len", &self.pcm.len())
            .field("last_sequence", &self.last_sequence)
            .field("stats", &self.stats)
            .finish()
    }
}

impl AudioFrameAssembler {
    /// Creates an assembler for `codec`. Compressed codecs require a
    /// decoder; passing `None` for one fails up front so a capture never
    /// starts only to drop every frame.
    pub fn new(
        codec: AudioCodec,
        decoder: Option<Box<dyn AudioDecoder>>,
    ) -> Result<Self, CaptureError> {
        if codec.is_compressed() && decoder.is_none() {
            return Err(CaptureError::DecodeFailed(format!(
                "codec {codec:?} requires a decoder"
            )));
        }
        Ok(Self {
            codec,
            decoder,
            pcm: Vec::new(),
            last_sequence: None,
            stats: AssemblerStats::default(),
        })
    }

    /// Ingests one raw notification packet.
    ///
    /// Never fails: malformed packets and frames the decoder rejects are
    /// counted and skipped so a single bad packet cannot end a capture.
    pub fn push_frame(&mut self, packet: &[u8]) {
        let Some(frame) = AudioFrame::parse(packet) else {
            self.stats.malformed_frames += 1;
            warn!("dropping malformed audio packet ({} bytes)", packet.len());
            return;
        };

        self.track_sequence(frame.sequence);
        self.stats.frames_received += 1;
        self.stats.payload_bytes += frame.payload.len() as u64;

        match self.codec {
            AudioCodec::Pcm8 | AudioCodec::Pcm16 => {
                self.pcm.extend_from_slice(frame.payload);
            }
            AudioCodec::Mulaw8 | AudioCodec::Mulaw16 => {
                self.pcm.extend_from_slice(&mulaw::expand_to_pcm16(frame.payload));
            }
            AudioCodec::Opus => {
                // Checked in `new`.
                let Some(decoder) = self.decoder.as_mut() else {
                    return;
                };
                match decoder.decode(frame.payload) {
                    Ok(samples) => {
                        self.pcm.reserve(samples.len() * 2);
                        for sample in samples {
                            self.pcm.extend_from_slice(&sample.to_le_bytes());
                        }
                    }
                    Err(e) => {
                        self.stats.decode_failures += 1;
                        warn!(
                            "{} decode failed for frame seq={}: {}",
                            decoder.name(),
                            frame.sequence,
                            e
                        );
                    }
                }
            }
        }
    }

    /// Whether at least one well-formed frame arrived.
    pub fn has_frames(&self) -> bool {
        self.stats.frames_received > 0
    }

    /// Duration of the accumulated audio in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.pcm.len() as f64 / f64::from(self.codec.output_byte_rate())
    }

    /// Renders the accumulated PCM into a complete WAV file image.
    pub fn build_wav(&self) -> Vec<u8> {
        let header = wav_format::generate_wav_header(
            crate::models::codec::SAMPLE_RATE_HZ,
            self.codec.output_bit_depth(),
            1,
            self.pcm.len() as u32,
        );
        let mut file = Vec::with_capacity(header.len() + self.pcm.len());
        file.extend_from_slice(&header);
        file.extend_from_slice(&self.pcm);
        file
    }

    pub fn stats(&self) -> AssemblerStats {
        self.stats
    }

    pub fn codec(&self) -> AudioCodec {
        self.codec
    }

    // --- Internal helpers ---

    fn track_sequence(&mut self, sequence: u16) {
        if let Some(prev) = self.last_sequence {
            let expected = prev.wrapping_add(1);
            if sequence != expected {
                self.stats.sequence_gaps += 1;
                self.stats.frames_lost += u64::from(sequence.wrapping_sub(expected));
            }
        }
        self.last_sequence = Some(sequence);
    }
}
