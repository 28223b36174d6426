use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::models::button::ButtonEvent;
use crate::models::codec::AudioCodec;
use crate::models::error::ConnectionError;
use crate::models::state::ConnectionState;

/// Capability surface of one connected wearable.
///
/// The capture layer depends on this trait rather than on the concrete
/// connection so sessions can run against a mock device in tests.
///
/// Optional capabilities (button, battery) degrade to `Ok(None)` when the
/// device does not expose the service; only the audio path is mandatory and
/// its absence already failed the connect.
#[async_trait]
pub trait DeviceConnection: Send + Sync {
    fn device_id(&self) -> &str;

    fn state(&self) -> ConnectionState;

    async fn connect(&self) -> Result<(), ConnectionError>;

    async fn disconnect(&self) -> Result<(), ConnectionError>;

    /// Round-trip liveness probe against the link.
    async fn ping(&self) -> bool;

    async fn is_connected(&self) -> bool;

    /// UUIDs of the services discovered at connect time.
    async fn services(&self) -> Vec<Uuid>;

    async fn has_service(&self, service: Uuid) -> bool;

    /// Battery percentage 0..=100, or -1 when unavailable.
    async fn battery_level(&self) -> i16;

    /// Stream of battery percentage updates, `Ok(None)` when the device has
    /// no battery service.
    async fn subscribe_battery(&self) -> Result<Option<mpsc::Receiver<u8>>, ConnectionError>;

    /// Stream of raw audio packets from the data characteristic.
    async fn subscribe_audio(&self) -> Result<mpsc::Receiver<Vec<u8>>, ConnectionError>;

    async fn unsubscribe_audio(&self) -> Result<(), ConnectionError>;

    /// Stream of decoded tap events, `Ok(None)` when the device has no
    /// button service.
    async fn subscribe_button(&self) -> Result<Option<mpsc::Receiver<ButtonEvent>>, ConnectionError>;

    async fn unsubscribe_button(&self) -> Result<(), ConnectionError>;

    /// Codec the device streams in, read once and cached for the lifetime
    /// of the connection.
    async fn audio_codec(&self) -> Result<AudioCodec, ConnectionError>;

    async fn model_number(&self) -> Option<String>;

    async fn firmware_revision(&self) -> Option<String>;
}

impl std::fmt::Debug for dyn DeviceConnection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceConnection")
            .field("device_id", &self.device_id())
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
