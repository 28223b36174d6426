/// Connection state for one physical link.
///
/// State transitions:
/// ```text
/// disconnected → connecting → connected
///       ↑            |            |
///       └────────────┴────────────┘
///   (connect failure, explicit disconnect, transport drop)
/// ```
///
/// A failed connect never leaves the object half-connected: every failure
/// path ends back in `Disconnected`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    pub fn is_disconnected(&self) -> bool {
        matches!(self, Self::Disconnected)
    }

    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

/// Capture state machine driven by button taps.
///
/// State transitions:
/// ```text
/// idle ⇄ capturing
/// ```
///
/// Any tap toggles the state; the tap count is carried only as metadata on
/// the resulting recording. A connection-lost signal forces `Idle` from
/// anywhere.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Capturing,
}

impl CaptureState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_capturing(&self) -> bool {
        matches!(self, Self::Capturing)
    }
}
