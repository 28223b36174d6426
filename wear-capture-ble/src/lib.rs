//! # wear-capture-ble
//!
//! btleplug transport backend for wear-capture-core.
//!
//! Provides:
//! - `BtleplugCentral` — host adapter access, scanning, transport events
//! - `BtleplugPeripheral` — GATT operations against one device
//! - `OpusDecoder` — decoder for devices that stream compressed audio
//!
//! ## Usage
//! ```ignore
//! use std::sync::Arc;
//! use wear_capture_ble::{BtleplugCentral, OpusDecoderFactory};
//! use wear_capture_core::{CaptureConfig, ConnectionManager};
//!
//! let central = Arc::new(BtleplugCentral::new().await?);
//! let manager = Arc::new(ConnectionManager::new(central));
//! manager.start().await;
//!
//! let config = CaptureConfig {
//!     decoder_factory: Some(Arc::new(OpusDecoderFactory)),
//!     ..CaptureConfig::default()
//! };
//! ```

pub mod central;
pub mod opus;
pub mod peripheral;

pub use central::BtleplugCentral;
pub use opus::{OpusDecoder, OpusDecoderFactory};
pub use peripheral::BtleplugPeripheral;

use wear_capture_core::ConnectionError;

pub(crate) fn transport_error(e: btleplug::Error) -> ConnectionError {
    match e {
        btleplug::Error::NotConnected => ConnectionError::NotConnected,
        other => ConnectionError::Transport(other.to_string()),
    }
}
