use thiserror::Error;

/// Errors raised by the connection layer: scanning, connecting, and
/// per-characteristic operations on a live link.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConnectionError {
    #[error("bluetooth LE is not available on this platform")]
    TransportUnavailable,

    #[error("adapter did not power on within the wait window")]
    AdapterNotReady,

    #[error("already connected")]
    AlreadyConnected,

    #[error("a connect attempt is already in flight")]
    ConnectInFlight,

    #[error("a scan is already active")]
    ScanInProgress,

    #[error("device {0} not found in the last scan results")]
    DeviceNotFound(String),

    #[error("not connected")]
    NotConnected,

    #[error("no GATT services discovered")]
    NoServices,

    #[error("mandatory audio service is missing")]
    AudioServiceMissing,

    #[error("liveness ping failed")]
    PingFailed,

    #[error("characteristic {0} does not support notifications")]
    NotifyUnsupported(String),

    #[error("transport error: {0}")]
    Transport(String),
}

/// Errors raised by the capture layer on top of an established link.
///
/// Every variant resolves to a state transition plus a status event;
/// none of them should ever crash a host.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CaptureError {
    #[error(transparent)]
    Connection(#[from] ConnectionError),

    #[error("subscription failed: {0}")]
    SubscriptionFailed(String),

    #[error("persistence failed: {0}")]
    PersistenceFailed(String),

    #[error("decode failed: {0}")]
    DecodeFailed(String),

    #[error("invalid state: {0}")]
    InvalidState(String),
}
