use super::device::DiscoveredDevice;
use super::recording::Recording;
use super::state::{CaptureState, ConnectionState};

/// Events published by the connection manager's broadcast bus.
///
/// Subscribers that fall behind lose the oldest events, never block the
/// publisher.
#[derive(Debug, Clone, PartialEq)]
pub enum ConnectionEvent {
    ScanStarted,
    /// Progressive scan snapshot, sorted by descending RSSI. Emitted on
    /// every new or updated sighting.
    DevicesDiscovered(Vec<DiscoveredDevice>),
    ScanCompleted { device_count: usize },
    StateChanged { device_id: String, state: ConnectionState },
    /// Unexpected transport-level drop of the active link, as opposed to an
    /// explicit disconnect (which only emits `StateChanged`).
    ConnectionLost { device_id: String },
}

/// Events published by the capture orchestrator's broadcast bus.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureEvent {
    StateChanged(CaptureState),
    RecordingSaved(Recording),
    /// Human-readable status line for hosts to surface; every error in the
    /// capture path resolves to one of these plus a state transition.
    Status(String),
}
