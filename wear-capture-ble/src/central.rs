use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use btleplug::api::{Central, CentralEvent, CentralState, Manager as _, Peripheral as _, ScanFilter};
use btleplug::platform::{Adapter, Manager, PeripheralId};
use futures::StreamExt;
use log::debug;
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use uuid::Uuid;

use wear_capture_core::models::device::{DeviceKind, DiscoveredDevice};
use wear_capture_core::traits::central::{BleCentral, TransportEvent};
use wear_capture_core::traits::peripheral::BlePeripheral;
use wear_capture_core::ConnectionError;

use crate::peripheral::BtleplugPeripheral;
use crate::transport_error;

const ADAPTER_POLL_INTERVAL: Duration = Duration::from_millis(200);
const SIGHTING_BUFFER: usize = 32;
const TRANSPORT_EVENT_CAPACITY: usize = 16;

struct ScanFeed {
    service: Uuid,
    sender: mpsc::Sender<DiscoveredDevice>,
}

/// [`BleCentral`] over the first btleplug adapter on the host.
///
/// A single pump task consumes the adapter's event stream for the lifetime
/// of the central. During a scan it resolves discovery events into
/// [`DiscoveredDevice`] sightings; connect and disconnect events are
/// re-broadcast as [`TransportEvent`]s at all times, which is what lets the
/// connection manager notice link drops nobody asked for.
pub struct BtleplugCentral {
    manager: Manager,
    adapter: Adapter,
    transport_tx: broadcast::Sender<TransportEvent>,
    scan_feed: Arc<Mutex<Option<ScanFeed>>>,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl BtleplugCentral {
    pub async fn new() -> Result<Self, ConnectionError> {
        let manager = Manager::new().await.map_err(transport_error)?;
        let adapters = manager.adapters().await.map_err(transport_error)?;
        let Some(adapter) = adapters.into_iter().next() else {
            return Err(ConnectionError::TransportUnavailable);
        };

        let (transport_tx, _) = broadcast::channel(TRANSPORT_EVENT_CAPACITY);
        let central = Self {
            manager,
            adapter,
            transport_tx,
            scan_feed: Arc::new(Mutex::new(None)),
            pump: Mutex::new(None),
        };
        central.start_pump().await?;
        Ok(central)
    }

    async fn start_pump(&self) -> Result<(), ConnectionError> {
        let mut events = self.adapter.events().await.map_err(transport_error)?;
        let adapter = self.adapter.clone();
        let scan_feed = Arc::clone(&self.scan_feed);
        let transport_tx = self.transport_tx.clone();

        let task = tokio::spawn(async move {
            while let Some(event) = events.next().await {
                match event {
                    CentralEvent::DeviceDiscovered(id) | CentralEvent::DeviceUpdated(id) => {
                        forward_sighting(&adapter, &scan_feed, &id).await;
                    }
                    CentralEvent::DeviceConnected(id) => {
                        let _ = transport_tx.send(TransportEvent::DeviceConnected {
                            device_id: id.to_string(),
                        });
                    }
                    CentralEvent::DeviceDisconnected(id) => {
                        let _ = transport_tx.send(TransportEvent::DeviceDisconnected {
                            device_id: id.to_string(),
                        });
                    }
                    _ => {}
                }
            }
        });
        *self.pump.lock() = Some(task);
        Ok(())
    }
}

impl Drop for BtleplugCentral {
    fn drop(&mut self) {
        if let Some(task) = self.pump.lock().take() {
            task.abort();
        }
    }
}

/// Resolves a discovery event into a sighting for the active scan, if any.
async fn forward_sighting(
    adapter: &Adapter,
    scan_feed: &Mutex<Option<ScanFeed>>,
    id: &PeripheralId,
) {
    let (service, sender) = {
        let feed = scan_feed.lock();
        match feed.as_ref() {
            Some(feed) => (feed.service, feed.sender.clone()),
            None => return,
        }
    };
    let Ok(peripheral) = adapter.peripheral(id).await else {
        return;
    };
    let Ok(Some(props)) = peripheral.properties().await else {
        return;
    };
    // The scan filter is advisory on some hosts, so check the advertised
    // services ourselves.
    if !props.services.contains(&service) {
        return;
    }

    let device = DiscoveredDevice {
        id: id.to_string(),
        name: props.local_name.unwrap_or_else(|| "Unknown".to_string()),
        rssi: props.rssi,
        kind: DeviceKind::Wearable,
    };
    let _ = sender.try_send(device);
}

#[async_trait]
impl BleCentral for BtleplugCentral {
    async fn is_available(&self) -> bool {
        match self.manager.adapters().await {
            Ok(adapters) => !adapters.is_empty(),
            Err(_) => false,
        }
    }

    async fn wait_until_ready(&self, timeout: Duration) -> Result<(), ConnectionError> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            if matches!(self.adapter.adapter_state().await, Ok(CentralState::PoweredOn)) {
                return Ok(());
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(ConnectionError::AdapterNotReady);
            }
            tokio::time::sleep(ADAPTER_POLL_INTERVAL).await;
        }
    }

    async fn start_scan(
        &self,
        service: Uuid,
    ) -> Result<mpsc::Receiver<DiscoveredDevice>, ConnectionError> {
        let (tx, rx) = mpsc::channel(SIGHTING_BUFFER);
        *self.scan_feed.lock() = Some(ScanFeed { service, sender: tx });

        let filter = ScanFilter { services: vec![service] };
        if let Err(e) = self.adapter.start_scan(filter).await {
            *self.scan_feed.lock() = None;
            return Err(transport_error(e));
        }

        // Devices the adapter already knows are reported immediately; new
        // ones arrive through the event pump.
        if let Ok(known) = self.adapter.peripherals().await {
            for peripheral in known {
                forward_sighting(&self.adapter, &self.scan_feed, &peripheral.id()).await;
            }
        }
        Ok(rx)
    }

    async fn stop_scan(&self) -> Result<(), ConnectionError> {
        *self.scan_feed.lock() = None;
        self.adapter.stop_scan().await.map_err(transport_error)
    }

    async fn open(&self, device_id: &str) -> Result<Box<dyn BlePeripheral>, ConnectionError> {
        let peripherals = self.adapter.peripherals().await.map_err(transport_error)?;
        let peripheral = peripherals
            .into_iter()
            .find(|p| p.id().to_string() == device_id)
            .ok_or_else(|| ConnectionError::DeviceNotFound(device_id.to_string()))?;
        debug!("opening peripheral {device_id}");
        Ok(Box::new(BtleplugPeripheral::new(peripheral)))
    }

    fn transport_events(&self) -> broadcast::Receiver<TransportEvent> {
        self.transport_tx.subscribe()
    }
}
