use async_trait::async_trait;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::models::error::ConnectionError;

/// One characteristic as reported by service discovery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GattCharacteristic {
    pub uuid: Uuid,
    pub readable: bool,
    pub notifiable: bool,
}

/// One GATT service and its characteristics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GattService {
    pub uuid: Uuid,
    pub characteristics: Vec<GattCharacteristic>,
}

impl GattService {
    pub fn characteristic(&self, uuid: Uuid) -> Option<&GattCharacteristic> {
        self.characteristics.iter().find(|c| c.uuid == uuid)
    }
}

/// Raw GATT operations against one peripheral.
///
/// Implementations expose the transport as-is: no state machine, no caching,
/// no interpretation of payloads. [`WearableConnection`] layers the device
/// semantics on top.
///
/// [`WearableConnection`]: crate::connection::wearable::WearableConnection
#[async_trait]
pub trait BlePeripheral: Send + Sync {
    fn device_id(&self) -> &str;

    async fn connect_transport(&self) -> Result<(), ConnectionError>;

    async fn disconnect_transport(&self) -> Result<(), ConnectionError>;

    async fn is_transport_connected(&self) -> bool;

    /// Read the current signal strength. `Ok(None)` means the link is alive
    /// but the backend has no RSSI for it, which some hosts never report.
    async fn read_rssi(&self) -> Result<Option<i16>, ConnectionError>;

    /// Ask the link layer for a larger transfer unit. Backends where the
    /// host stack negotiates this on its own treat the call as a no-op.
    async fn request_transfer_unit(&self, bytes: u16) -> Result<(), ConnectionError>;

    async fn discover_services(&self) -> Result<Vec<GattService>, ConnectionError>;

    async fn read_characteristic(
        &self,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<Vec<u8>, ConnectionError>;

    /// Enable notifications and stream raw values. Dropping the receiver
    /// does not disable notifications; callers pair this with
    /// [`unsubscribe`](Self::unsubscribe).
    async fn subscribe(
        &self,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<mpsc::Receiver<Vec<u8>>, ConnectionError>;

    async fn unsubscribe(&self, service: Uuid, characteristic: Uuid)
        -> Result<(), ConnectionError>;
}
