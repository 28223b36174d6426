//! # wear-capture-core
//!
//! Platform-agnostic core for button-triggered voice capture from a BLE
//! wearable.
//!
//! Provides the wire protocol, codec expansion, WAV assembly, connection
//! management, and the button-driven capture session. Platform backends
//! implement the `BleCentral` and `BlePeripheral` traits and plug into the
//! generic `ConnectionManager`.
//!
//! ## Architecture
//!
//! ```text
//! wear-capture-core (this crate)
//! ├── traits/       ← BleCentral, BlePeripheral, DeviceConnection, AudioDecoder, RecordingSink
//! ├── models/       ← ConnectionError, CaptureError, AudioCodec, Recording, events, config
//! ├── protocol/     ← GATT UUIDs, audio frame and button payload parsing
//! ├── processing/   ← mu-law expansion, frame assembly, WAV header generation
//! ├── connection/   ← ConnectionManager, WearableConnection
//! ├── session/      ← CaptureOrchestrator (button-driven capture loop)
//! └── storage/      ← WAV file writing, metadata sidecars
//! ```

pub mod connection;
pub mod models;
pub mod processing;
pub mod protocol;
pub mod session;
pub mod storage;
pub mod traits;

#[cfg(test)]
pub(crate) mod mocks;

// Re-export key types at crate root for convenience.
pub use connection::manager::{ConnectionManager, ReconnectPolicy};
pub use connection::wearable::WearableConnection;
pub use models::button::{ButtonEvent, TapCount};
pub use models::codec::{AudioCodec, SAMPLE_RATE_HZ};
pub use models::config::CaptureConfig;
pub use models::device::{DeviceKind, DiscoveredDevice};
pub use models::error::{CaptureError, ConnectionError};
pub use models::events::{CaptureEvent, ConnectionEvent};
pub use models::recording::{Recording, RecordingSource};
pub use models::state::{CaptureState, ConnectionState};
pub use processing::assembler::{AssemblerStats, AudioFrameAssembler};
pub use session::orchestrator::CaptureOrchestrator;
pub use traits::central::{BleCentral, TransportEvent};
pub use traits::decoder::{AudioDecoder, DecoderFactory};
pub use traits::device_connection::DeviceConnection;
pub use traits::peripheral::{BlePeripheral, GattCharacteristic, GattService};
pub use traits::sink::RecordingSink;
