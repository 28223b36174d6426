use serde::{Deserialize, Serialize};

/// Sample rate of every codec the wearable ships, in Hz.
pub const SAMPLE_RATE_HZ: u32 = 16_000;

/// Audio encoding negotiated with the device.
///
/// Read once per connection from the codec characteristic and fixed for the
/// connection's lifetime. All variants are mono at 16 kHz; the variant
/// determines the wire payload format and the output bit depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioCodec {
    /// Raw 8-bit PCM samples.
    Pcm8,
    /// Raw 16-bit little-endian PCM samples.
    Pcm16,
    /// G.711 mu-law companded bytes, expanded to 16-bit on assembly.
    Mulaw8,
    /// G.711 mu-law companded bytes, expanded to 16-bit on assembly.
    Mulaw16,
    /// Opus-compressed frames, decoded to 16-bit on assembly.
    Opus,
}

impl AudioCodec {
    /// Decode the one-byte codec id reported by the codec characteristic.
    pub fn from_wire(id: u8) -> Option<Self> {
        match id {
            1 => Some(Self::Pcm8),
            10 => Some(Self::Pcm16),
            11 => Some(Self::Mulaw8),
            12 => Some(Self::Mulaw16),
            20 => Some(Self::Opus),
            _ => None,
        }
    }

    pub fn wire_id(&self) -> u8 {
        match self {
            Self::Pcm8 => 1,
            Self::Pcm16 => 10,
            Self::Mulaw8 => 11,
            Self::Mulaw16 => 12,
            Self::Opus => 20,
        }
    }

    /// Bit depth of the assembled WAV output.
    ///
    /// Only raw 8-bit PCM stays at 8 bits; mu-law expansion and Opus
    /// decoding both produce 16-bit linear samples.
    pub fn output_bit_depth(&self) -> u16 {
        match self {
            Self::Pcm8 => 8,
            _ => 16,
        }
    }

    /// Bytes per second of assembled output audio.
    pub fn output_byte_rate(&self) -> u32 {
        SAMPLE_RATE_HZ * self.output_bit_depth() as u32 / 8
    }

    /// Whether payloads must go through an external decoder.
    pub fn is_compressed(&self) -> bool {
        matches!(self, Self::Opus)
    }
}
