//! G.711 mu-law expansion to linear 16-bit PCM.

/// Bias added during mu-law companding, per ITU-T G.711.
const BIAS: i16 = 0x84;

/// Expand one companded byte to a linear 16-bit sample.
///
/// Output range is -32124..=32124; the all-ones byte 0xFF decodes to 0.
pub fn expand_sample(byte: u8) -> i16 {
    // Wire bytes are stored complemented.
    let value = !byte;
    let sign = value & 0x80 != 0;
    let exponent = (value >> 4) & 0x07;
    let mantissa = (value & 0x0F) as i16;

    let magnitude = (((mantissa << 3) + BIAS) << exponent) - BIAS;
    if sign {
        -magnitude
    } else {
        magnitude
    }
}

/// Expand a companded payload to little-endian 16-bit PCM bytes.
///
/// Output is always exactly twice the input length.
pub fn expand_to_pcm16(payload: &[u8]) -> Vec<u8> {
    let mut pcm = Vec::with_capacity(payload.len() * 2);
    for &byte in payload {
        pcm.extend_from_slice(&expand_sample(byte).to_le_bytes());
    }
    pcm
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_codewords() {
        // G.711 reference points.
        assert_eq!(expand_sample(0xFF), 0); // positive zero
        assert_eq!(expand_sample(0x7F), 0); // negative zero
        assert_eq!(expand_sample(0x80), 32124); // maximum positive
        assert_eq!(expand_sample(0x00), -32124); // maximum negative
    }

    #[test]
    fn sign_symmetry() {
        // Codewords 0x80..=0xFF are the positive mirror of 0x00..=0x7F.
        for code in 0x00u8..=0x7F {
            assert_eq!(expand_sample(code), -expand_sample(code | 0x80));
        }
    }

    #[test]
    fn monotonic_within_positive_range() {
        // Larger positive codewords (toward 0x80) decode to larger samples.
        let mut previous = expand_sample(0xFF);
        for code in (0x80u8..=0xFE).rev() {
            let sample = expand_sample(code);
            assert!(
                sample > previous,
                "0x{:02X} decoded to {} which is not above {}",
                code,
                sample,
                previous
            );
            previous = sample;
        }
    }

    #[test]
    fn payload_expansion_doubles_length() {
        let payload = [0xFFu8, 0x80, 0x00];
        let pcm = expand_to_pcm16(&payload);
        assert_eq!(pcm.len(), 6);
        assert_eq!(i16::from_le_bytes([pcm[0], pcm[1]]), 0);
        assert_eq!(i16::from_le_bytes([pcm[2], pcm[3]]), 32124);
        assert_eq!(i16::from_le_bytes([pcm[4], pcm[5]]), -32124);
    }

    #[test]
    fn empty_payload_expands_to_nothing() {
        assert!(expand_to_pcm16(&[]).is_empty());
    }
}
