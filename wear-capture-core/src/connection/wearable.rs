use async_trait::async_trait;
use log::{debug, warn};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::models::button::ButtonEvent;
use crate::models::codec::AudioCodec;
use crate::models::error::ConnectionError;
use crate::models::state::ConnectionState;
use crate::protocol::frames::parse_button_payload;
use crate::protocol::uuids;
use crate::traits::device_connection::DeviceConnection;
use crate::traits::peripheral::{BlePeripheral, GattService};

/// Requested link-layer transfer unit. Audio packets are ~200 bytes; the
/// default 23-byte unit would fragment every frame.
const PREFERRED_TRANSFER_UNIT: u16 = 512;

const EVENT_CHANNEL_CAPACITY: usize = 16;

/// Connection to one wearable, layered over a raw [`BlePeripheral`].
///
/// Owns the connect sequence (transport, liveness probe, transfer unit,
/// service discovery, audio service check), caches discovery results, and
/// exposes typed access to the device's characteristics. A failed connect
/// always tears the transport back down so no half-open link survives.
pub struct WearableConnection {
    peripheral: Box<dyn BlePeripheral>,
    state: Mutex<ConnectionState>,
    services: Mutex<Vec<GattService>>,
    codec: Mutex<Option<AudioCodec>>,
    button_task: Mutex<Option<JoinHandle<()>>>,
    battery_task: Mutex<Option<JoinHandle<()>>>,
}

impl WearableConnection {
    pub fn new(peripheral: Box<dyn BlePeripheral>) -> Self {
        Self {
            peripheral,
            state: Mutex::new(ConnectionState::Disconnected),
            services: Mutex::new(Vec::new()),
            codec: Mutex::new(None),
            button_task: Mutex::new(None),
            battery_task: Mutex::new(None),
        }
    }

    // --- Internal helpers ---

    fn set_state(&self, next: ConnectionState) {
        let mut state = self.state.lock();
        if *state != next {
            debug!(
                "device {}: {:?} -> {:?}",
                self.peripheral.device_id(),
                *state,
                next
            );
            *state = next;
        }
    }

    /// The connect sequence proper. The caller owns state transitions and
    /// teardown on failure.
    async fn establish(&self) -> Result<(), ConnectionError> {
        self.peripheral.connect_transport().await?;

        // A transport connect can succeed against a stale cache entry while
        // the device itself is gone. One round trip proves the link.
        if self.peripheral.read_rssi().await.is_err() {
            return Err(ConnectionError::PingFailed);
        }

        if let Err(e) = self
            .peripheral
            .request_transfer_unit(PREFERRED_TRANSFER_UNIT)
            .await
        {
            warn!("transfer unit request refused: {e}");
        }

        let services = self.peripheral.discover_services().await?;
        if services.is_empty() {
            return Err(ConnectionError::NoServices);
        }
        let audio_present = services.iter().any(|s| {
            s.uuid == uuids::AUDIO_SERVICE
                && s.characteristic(uuids::AUDIO_DATA_CHARACTERISTIC).is_some()
        });
        if !audio_present {
            return Err(ConnectionError::AudioServiceMissing);
        }

        *self.services.lock() = services;
        Ok(())
    }

    async fn ensure_connected(&self) -> Result<(), ConnectionError> {
        if self.is_connected().await {
            Ok(())
        } else {
            Err(ConnectionError::NotConnected)
        }
    }

    fn cached_service(&self, uuid: Uuid) -> Option<GattService> {
        self.services.lock().iter().find(|s| s.uuid == uuid).cloned()
    }

    fn clear_caches(&self) {
        self.services.lock().clear();
        *self.codec.lock() = None;
    }

    fn stop_forwarders(&self) {
        if let Some(task) = self.button_task.lock().take() {
            task.abort();
        }
        if let Some(task) = self.battery_task.lock().take() {
            task.abort();
        }
    }

    async fn read_info_string(&self, service: Uuid, characteristic: Uuid) -> Option<String> {
        if !self.is_connected().await {
            return None;
        }
        let cached = self.cached_service(service)?;
        if cached.characteristic(characteristic).map(|c| c.readable) != Some(true) {
            return None;
        }
        match self.peripheral.read_characteristic(service, characteristic).await {
            Ok(value) => {
                let text = String::from_utf8_lossy(&value)
                    .trim_end_matches('\0')
                    .trim()
                    .to_string();
                if text.is_empty() {
                    None
                } else {
                    Some(text)
                }
            }
            Err(e) => {
                warn!("device info read failed: {e}");
                None
            }
        }
    }
}

#[async_trait]
impl DeviceConnection for WearableConnection {
    fn device_id(&self) -> &str {
        self.peripheral.device_id()
    }

    fn state(&self) -> ConnectionState {
        *self.state.lock()
    }

    async fn connect(&self) -> Result<(), ConnectionError> {
        {
            let mut state = self.state.lock();
            match *state {
                ConnectionState::Connected => return Err(ConnectionError::AlreadyConnected),
                ConnectionState::Connecting => return Err(ConnectionError::ConnectInFlight),
                ConnectionState::Disconnected => *state = ConnectionState::Connecting,
            }
        }

        match self.establish().await {
            Ok(()) => {
                self.set_state(ConnectionState::Connected);
                Ok(())
            }
            Err(e) => {
                if let Err(teardown) = self.peripheral.disconnect_transport().await {
                    warn!("transport teardown after failed connect: {teardown}");
                }
                self.clear_caches();
                self.set_state(ConnectionState::Disconnected);
                Err(e)
            }
        }
    }

    async fn disconnect(&self) -> Result<(), ConnectionError> {
        self.stop_forwarders();
        let result = self.peripheral.disconnect_transport().await;
        self.clear_caches();
        self.set_state(ConnectionState::Disconnected);
        result
    }

    async fn ping(&self) -> bool {
        if !self.state().is_connected() {
            return false;
        }
        self.peripheral.read_rssi().await.is_ok()
    }

    async fn is_connected(&self) -> bool {
        self.state().is_connected() && self.peripheral.is_transport_connected().await
    }

    async fn services(&self) -> Vec<Uuid> {
        self.services.lock().iter().map(|s| s.uuid).collect()
    }

    async fn has_service(&self, service: Uuid) -> bool {
        self.cached_service(service).is_some()
    }

    async fn battery_level(&self) -> i16 {
        if !self.is_connected().await {
            return -1;
        }
        if self.cached_service(uuids::BATTERY_SERVICE).is_none() {
            return -1;
        }
        match self
            .peripheral
            .read_characteristic(uuids::BATTERY_SERVICE, uuids::BATTERY_LEVEL_CHARACTERISTIC)
            .await
        {
            Ok(value) => value.first().map_or(-1, |&level| i16::from(level)),
            Err(e) => {
                warn!("battery read failed: {e}");
                -1
            }
        }
    }

    async fn subscribe_battery(&self) -> Result<Option<mpsc::Receiver<u8>>, ConnectionError> {
        self.ensure_connected().await?;
        let Some(service) = self.cached_service(uuids::BATTERY_SERVICE) else {
            debug!("device {} has no battery service", self.peripheral.device_id());
            return Ok(None);
        };
        let Some(level) = service.characteristic(uuids::BATTERY_LEVEL_CHARACTERISTIC) else {
            return Ok(None);
        };
        if !level.notifiable {
            return Err(ConnectionError::NotifyUnsupported("battery level".into()));
        }

        let mut raw = self
            .peripheral
            .subscribe(uuids::BATTERY_SERVICE, uuids::BATTERY_LEVEL_CHARACTERISTIC)
            .await?;
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let task = tokio::spawn(async move {
            while let Some(value) = raw.recv().await {
                let Some(&level) = value.first() else { continue };
                if tx.send(level).await.is_err() {
                    break;
                }
            }
        });
        *self.battery_task.lock() = Some(task);
        Ok(Some(rx))
    }

    async fn subscribe_audio(&self) -> Result<mpsc::Receiver<Vec<u8>>, ConnectionError> {
        self.ensure_connected().await?;
        // Presence was verified at connect time.
        let service = self
            .cached_service(uuids::AUDIO_SERVICE)
            .ok_or(ConnectionError::AudioServiceMissing)?;
        let data = service
            .characteristic(uuids::AUDIO_DATA_CHARACTERISTIC)
            .ok_or(ConnectionError::AudioServiceMissing)?;
        if !data.notifiable {
            return Err(ConnectionError::NotifyUnsupported("audio data".into()));
        }
        self.peripheral
            .subscribe(uuids::AUDIO_SERVICE, uuids::AUDIO_DATA_CHARACTERISTIC)
            .await
    }

    async fn unsubscribe_audio(&self) -> Result<(), ConnectionError> {
        if !self.is_connected().await {
            return Ok(());
        }
        self.peripheral
            .unsubscribe(uuids::AUDIO_SERVICE, uuids::AUDIO_DATA_CHARACTERISTIC)
            .await
    }

    async fn subscribe_button(
        &self,
    ) -> Result<Option<mpsc::Receiver<ButtonEvent>>, ConnectionError> {
        self.ensure_connected().await?;
        let Some(service) = self.cached_service(uuids::BUTTON_SERVICE) else {
            debug!("device {} has no button service", self.peripheral.device_id());
            return Ok(None);
        };
        let Some(trigger) = service.characteristic(uuids::BUTTON_TRIGGER_CHARACTERISTIC) else {
            return Ok(None);
        };
        if !trigger.notifiable {
            return Err(ConnectionError::NotifyUnsupported("button trigger".into()));
        }

        let mut raw = self
            .peripheral
            .subscribe(uuids::BUTTON_SERVICE, uuids::BUTTON_TRIGGER_CHARACTERISTIC)
            .await?;
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);
        let task = tokio::spawn(async move {
            while let Some(value) = raw.recv().await {
                // Payloads that decode to no known tap count are ignored.
                let Some(event) = parse_button_payload(&value) else {
                    continue;
                };
                if tx.send(event).await.is_err() {
                    break;
                }
            }
        });
        *self.button_task.lock() = Some(task);
        Ok(Some(rx))
    }

    async fn unsubscribe_button(&self) -> Result<(), ConnectionError> {
        if let Some(task) = self.button_task.lock().take() {
            task.abort();
        }
        if !self.is_connected().await
            || self.cached_service(uuids::BUTTON_SERVICE).is_none()
        {
            return Ok(());
        }
        self.peripheral
            .unsubscribe(uuids::BUTTON_SERVICE, uuids::BUTTON_TRIGGER_CHARACTERISTIC)
            .await
    }

    async fn audio_codec(&self) -> Result<AudioCodec, ConnectionError> {
        let cached = *self.codec.lock();
        if let Some(codec) = cached {
            return Ok(codec);
        }
        self.ensure_connected().await?;

        let codec = match self
            .peripheral
            .read_characteristic(uuids::AUDIO_SERVICE, uuids::AUDIO_CODEC_CHARACTERISTIC)
            .await
        {
            Ok(value) => match value.first().copied().and_then(AudioCodec::from_wire) {
                Some(codec) => codec,
                None => {
                    warn!(
                        "device {} reported unknown codec value {:?}, assuming pcm8",
                        self.peripheral.device_id(),
                        value.first()
                    );
                    AudioCodec::Pcm8
                }
            },
            Err(e) => {
                warn!(
                    "codec read failed for {}: {e}, assuming pcm8",
                    self.peripheral.device_id()
                );
                AudioCodec::Pcm8
            }
        };
        *self.codec.lock() = Some(codec);
        Ok(codec)
    }

    async fn model_number(&self) -> Option<String> {
        self.read_info_string(
            uuids::DEVICE_INFORMATION_SERVICE,
            uuids::MODEL_NUMBER_CHARACTERISTIC,
        )
        .await
    }

    async fn firmware_revision(&self) -> Option<String> {
        self.read_info_string(
            uuids::DEVICE_INFORMATION_SERVICE,
            uuids::FIRMWARE_REVISION_CHARACTERISTIC,
        )
        .await
    }
}
