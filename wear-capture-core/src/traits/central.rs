use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use crate::models::device::DiscoveredDevice;
use crate::models::error::ConnectionError;
use crate::traits::peripheral::BlePeripheral;

/// Transport-level connectivity changes reported by the adapter, independent
/// of any in-flight operation. The manager listens to these to notice link
/// drops that happen outside a connect or disconnect call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    DeviceConnected { device_id: String },
    DeviceDisconnected { device_id: String },
}

/// Host-side BLE adapter.
///
/// One implementation exists per platform backend; tests substitute a mock.
/// The trait models the adapter alone. Per-device operations live on the
/// [`BlePeripheral`] handles it opens.
#[async_trait]
pub trait BleCentral: Send + Sync {
    /// Whether the host exposes a usable adapter at all.
    async fn is_available(&self) -> bool;

    /// Wait until the adapter is powered on, or fail after `timeout`.
    async fn wait_until_ready(&self, timeout: Duration) -> Result<(), ConnectionError>;

    /// Begin scanning for peripherals advertising `service`. Sightings are
    /// streamed on the returned channel; the same device may appear more
    /// than once as its advertisement data updates.
    async fn start_scan(
        &self,
        service: Uuid,
    ) -> Result<mpsc::Receiver<DiscoveredDevice>, ConnectionError>;

    async fn stop_scan(&self) -> Result<(), ConnectionError>;

    /// Obtain a handle for a previously discovered peripheral.
    async fn open(&self, device_id: &str) -> Result<Box<dyn BlePeripheral>, ConnectionError>;

    /// Subscribe to transport-level connect/disconnect notifications.
    fn transport_events(&self) -> broadcast::Receiver<TransportEvent>;
}
