use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use btleplug::api::{CharPropFlags, Characteristic, Peripheral as _};
use btleplug::platform::Peripheral;
use futures::StreamExt;
use log::debug;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use wear_capture_core::traits::peripheral::{BlePeripheral, GattCharacteristic, GattService};
use wear_capture_core::ConnectionError;

use crate::transport_error;

const NOTIFY_BUFFER: usize = 64;

/// [`BlePeripheral`] over one btleplug peripheral.
///
/// btleplug exposes a single notification stream per peripheral; a demux
/// task started on connect routes each value to the subscriber of its
/// characteristic. Routing uses `try_send` so one slow subscriber drops its
/// own values instead of stalling every stream.
pub struct BtleplugPeripheral {
    peripheral: Peripheral,
    device_id: String,
    routes: Arc<Mutex<HashMap<Uuid, mpsc::Sender<Vec<u8>>>>>,
    demux: Mutex<Option<JoinHandle<()>>>,
}

impl BtleplugPeripheral {
    pub fn new(peripheral: Peripheral) -> Self {
        let device_id = peripheral.id().to_string();
        Self {
            peripheral,
            device_id,
            routes: Arc::new(Mutex::new(HashMap::new())),
            demux: Mutex::new(None),
        }
    }

    fn find_characteristic(
        &self,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<Characteristic, ConnectionError> {
        self.peripheral
            .characteristics()
            .into_iter()
            .find(|c| c.service_uuid == service && c.uuid == characteristic)
            .ok_or_else(|| {
                ConnectionError::Transport(format!("characteristic {characteristic} not found"))
            })
    }
}

#[async_trait]
impl BlePeripheral for BtleplugPeripheral {
    fn device_id(&self) -> &str {
        &self.device_id
    }

    async fn connect_transport(&self) -> Result<(), ConnectionError> {
        self.peripheral.connect().await.map_err(transport_error)?;

        // The notification stream ends when the link drops; the task ends
        // with it.
        let mut notifications = self
            .peripheral
            .notifications()
            .await
            .map_err(transport_error)?;
        let routes = Arc::clone(&self.routes);
        let task = tokio::spawn(async move {
            while let Some(notification) = notifications.next().await {
                let sender = routes.lock().get(&notification.uuid).cloned();
                if let Some(sender) = sender {
                    if sender.try_send(notification.value).is_err() {
                        debug!("notification dropped for {}", notification.uuid);
                    }
                }
            }
            routes.lock().clear();
        });
        *self.demux.lock() = Some(task);
        Ok(())
    }

    async fn disconnect_transport(&self) -> Result<(), ConnectionError> {
        if let Some(task) = self.demux.lock().take() {
            task.abort();
        }
        self.routes.lock().clear();
        self.peripheral.disconnect().await.map_err(transport_error)
    }

    async fn is_transport_connected(&self) -> bool {
        self.peripheral.is_connected().await.unwrap_or(false)
    }

    async fn read_rssi(&self) -> Result<Option<i16>, ConnectionError> {
        // A properties read is a real round trip on every supported host,
        // which is exactly what the liveness probe wants.
        let props = self.peripheral.properties().await.map_err(transport_error)?;
        Ok(props.and_then(|p| p.rssi))
    }

    async fn request_transfer_unit(&self, bytes: u16) -> Result<(), ConnectionError> {
        // The host stack negotiates the transfer unit on its own; there is
        // nothing to request here.
        debug!("transfer unit request for {bytes} bytes left to the host stack");
        Ok(())
    }

    async fn discover_services(&self) -> Result<Vec<GattService>, ConnectionError> {
        self.peripheral
            .discover_services()
            .await
            .map_err(transport_error)?;

        let services = self
            .peripheral
            .services()
            .into_iter()
            .map(|service| GattService {
                uuid: service.uuid,
                characteristics: service
                    .characteristics
                    .into_iter()
                    .map(|ch| GattCharacteristic {
                        uuid: ch.uuid,
                        readable: ch.properties.contains(CharPropFlags::READ),
                        notifiable: ch.properties.contains(CharPropFlags::NOTIFY)
                            || ch.properties.contains(CharPropFlags::INDICATE),
                    })
                    .collect(),
            })
            .collect();
        Ok(services)
    }

    async fn read_characteristic(
        &self,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<Vec<u8>, ConnectionError> {
        let target = self.find_characteristic(service, characteristic)?;
        self.peripheral.read(&target).await.map_err(transport_error)
    }

    async fn subscribe(
        &self,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<mpsc::Receiver<Vec<u8>>, ConnectionError> {
        let target = self.find_characteristic(service, characteristic)?;
        let (tx, rx) = mpsc::channel(NOTIFY_BUFFER);
        self.routes.lock().insert(characteristic, tx);

        if let Err(e) = self.peripheral.subscribe(&target).await {
            self.routes.lock().remove(&characteristic);
            return Err(transport_error(e));
        }
        Ok(rx)
    }

    async fn unsubscribe(
        &self,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<(), ConnectionError> {
        let target = self.find_characteristic(service, characteristic)?;
        self.routes.lock().remove(&characteristic);
        self.peripheral
            .unsubscribe(&target)
            .await
            .map_err(transport_error)
    }
}
