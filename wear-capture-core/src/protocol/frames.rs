//! Parsers for the wearable's notification payloads.

use crate::models::button::{ButtonEvent, TapCount};

/// Bytes preceding the codec payload in every audio notification.
pub const AUDIO_FRAME_HEADER_LEN: usize = 3;

/// One audio notification, split into header fields and codec payload.
///
/// Wire layout:
/// ```text
/// [0]  sequence low byte
/// [1]  sequence high byte
/// [2]  frame id
/// [3+] codec payload
/// ```
///
/// The sequence number is observed for loss accounting only; frames are
/// never reordered by it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AudioFrame<'a> {
    pub sequence: u16,
    pub frame_id: u8,
    pub payload: &'a [u8],
}

impl<'a> AudioFrame<'a> {
    /// Split a notification packet. Returns `None` when the packet is too
    /// short to carry the header.
    pub fn parse(packet: &'a [u8]) -> Option<Self> {
        if packet.len() < AUDIO_FRAME_HEADER_LEN {
            return None;
        }
        Some(Self {
            sequence: u16::from_le_bytes([packet[0], packet[1]]),
            frame_id: packet[2],
            payload: &packet[AUDIO_FRAME_HEADER_LEN..],
        })
    }
}

/// Decode a button notification payload.
///
/// Only the first byte is meaningful; unknown values and empty payloads are
/// ignored as `None`.
pub fn parse_button_payload(payload: &[u8]) -> Option<ButtonEvent> {
    let taps = TapCount::from_wire(*payload.first()?)?;
    Some(ButtonEvent { taps })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_sequence_little_endian() {
        let packet = [0x34, 0x12, 7, 0xAA, 0xBB];
        let frame = AudioFrame::parse(&packet).unwrap();
        assert_eq!(frame.sequence, 0x1234);
        assert_eq!(frame.frame_id, 7);
        assert_eq!(frame.payload, &[0xAA, 0xBB]);
    }

    #[test]
    fn header_only_packet_has_empty_payload() {
        let frame = AudioFrame::parse(&[0, 0, 0]).unwrap();
        assert_eq!(frame.sequence, 0);
        assert!(frame.payload.is_empty());
    }

    #[test]
    fn short_packet_is_rejected() {
        assert_eq!(AudioFrame::parse(&[]), None);
        assert_eq!(AudioFrame::parse(&[1]), None);
        assert_eq!(AudioFrame::parse(&[1, 2]), None);
    }

    #[test]
    fn button_payload_first_byte_wins() {
        let event = parse_button_payload(&[2, 0xFF, 0xFF]).unwrap();
        assert_eq!(event.taps, TapCount::Double);
    }

    #[test]
    fn button_payload_unknown_or_empty_ignored() {
        assert_eq!(parse_button_payload(&[]), None);
        assert_eq!(parse_button_payload(&[0]), None);
        assert_eq!(parse_button_payload(&[9]), None);
    }
}
