//! The wire contract with the wearable: GATT profile ids and payload
//! parsers. Nothing here touches a transport.

pub mod frames;
pub mod uuids;

pub use frames::{parse_button_payload, AudioFrame, AUDIO_FRAME_HEADER_LEN};
