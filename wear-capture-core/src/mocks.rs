//! Hand-rolled fakes for the transport and persistence seams, shared by the
//! unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::{broadcast, mpsc};
use uuid::Uuid;

use crate::models::device::{DeviceKind, DiscoveredDevice};
use crate::models::error::ConnectionError;
use crate::models::recording::Recording;
use crate::protocol::uuids;
use crate::traits::central::{BleCentral, TransportEvent};
use crate::traits::decoder::{AudioDecoder, DecoderFactory};
use crate::traits::peripheral::{BlePeripheral, GattCharacteristic, GattService};
use crate::traits::sink::RecordingSink;

const NOTIFY_BUFFER: usize = 32;

struct PeripheralInner {
    device_id: String,
    connected: AtomicBool,
    fail_connect: AtomicBool,
    fail_rssi: AtomicBool,
    rssi: Mutex<Option<i16>>,
    services: Mutex<Vec<GattService>>,
    reads: Mutex<HashMap<(Uuid, Uuid), Vec<u8>>>,
    notify_senders: Mutex<HashMap<(Uuid, Uuid), mpsc::Sender<Vec<u8>>>>,
    disconnect_calls: AtomicUsize,
}

/// Scriptable peripheral. Clones share state, so a test can keep a handle
/// while the connection under test owns the boxed copy.
#[derive(Clone)]
pub struct MockPeripheral {
    inner: Arc<PeripheralInner>,
}

impl MockPeripheral {
    pub fn new(device_id: &str) -> Self {
        Self {
            inner: Arc::new(PeripheralInner {
                device_id: device_id.to_string(),
                connected: AtomicBool::new(false),
                fail_connect: AtomicBool::new(false),
                fail_rssi: AtomicBool::new(false),
                rssi: Mutex::new(Some(-50)),
                services: Mutex::new(Vec::new()),
                reads: Mutex::new(HashMap::new()),
                notify_senders: Mutex::new(HashMap::new()),
                disconnect_calls: AtomicUsize::new(0),
            }),
        }
    }

    /// A device exposing the full wearable surface: audio, button, battery
    /// and device information.
    pub fn wearable(device_id: &str) -> Self {
        let mock = Self::new(device_id);
        mock.add_audio_service(&[10]);
        mock.add_button_service();
        mock.add_battery_service(87);
        mock.add_device_info("WB-1", "1.2.0");
        mock
    }

    pub fn audio_only(device_id: &str) -> Self {
        let mock = Self::new(device_id);
        mock.add_audio_service(&[10]);
        mock
    }

    pub fn battery_only(device_id: &str) -> Self {
        let mock = Self::new(device_id);
        mock.add_battery_service(87);
        mock
    }

    fn add_audio_service(&self, codec_value: &[u8]) {
        self.inner.services.lock().push(GattService {
            uuid: uuids::AUDIO_SERVICE,
            characteristics: vec![
                GattCharacteristic {
                    uuid: uuids::AUDIO_DATA_CHARACTERISTIC,
                    readable: false,
                    notifiable: true,
                },
                GattCharacteristic {
                    uuid: uuids::AUDIO_CODEC_CHARACTERISTIC,
                    readable: true,
                    notifiable: false,
                },
            ],
        });
        self.set_codec_value(codec_value);
    }

    fn add_button_service(&self) {
        self.inner.services.lock().push(GattService {
            uuid: uuids::BUTTON_SERVICE,
            characteristics: vec![GattCharacteristic {
                uuid: uuids::BUTTON_TRIGGER_CHARACTERISTIC,
                readable: false,
                notifiable: true,
            }],
        });
    }

    fn add_battery_service(&self, level: u8) {
        self.inner.services.lock().push(GattService {
            uuid: uuids::BATTERY_SERVICE,
            characteristics: vec![GattCharacteristic {
                uuid: uuids::BATTERY_LEVEL_CHARACTERISTIC,
                readable: true,
                notifiable: true,
            }],
        });
        self.inner.reads.lock().insert(
            (uuids::BATTERY_SERVICE, uuids::BATTERY_LEVEL_CHARACTERISTIC),
            vec![level],
        );
    }

    fn add_device_info(&self, model: &str, firmware: &str) {
        self.inner.services.lock().push(GattService {
            uuid: uuids::DEVICE_INFORMATION_SERVICE,
            characteristics: vec![
                GattCharacteristic {
                    uuid: uuids::MODEL_NUMBER_CHARACTERISTIC,
                    readable: true,
                    notifiable: false,
                },
                GattCharacteristic {
                    uuid: uuids::FIRMWARE_REVISION_CHARACTERISTIC,
                    readable: true,
                    notifiable: false,
                },
            ],
        });
        let mut reads = self.inner.reads.lock();
        reads.insert(
            (uuids::DEVICE_INFORMATION_SERVICE, uuids::MODEL_NUMBER_CHARACTERISTIC),
            model.as_bytes().to_vec(),
        );
        reads.insert(
            (uuids::DEVICE_INFORMATION_SERVICE, uuids::FIRMWARE_REVISION_CHARACTERISTIC),
            firmware.as_bytes().to_vec(),
        );
    }

    pub fn set_codec_value(&self, value: &[u8]) {
        self.inner.reads.lock().insert(
            (uuids::AUDIO_SERVICE, uuids::AUDIO_CODEC_CHARACTERISTIC),
            value.to_vec(),
        );
    }

    pub fn fail_connect(&self) {
        self.inner.fail_connect.store(true, Ordering::SeqCst);
    }

    pub fn fail_rssi(&self) {
        self.inner.fail_rssi.store(true, Ordering::SeqCst);
    }

    pub fn disconnect_calls(&self) -> usize {
        self.inner.disconnect_calls.load(Ordering::SeqCst)
    }

    pub fn transport_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    /// Delivers a notification to whoever subscribed to the characteristic.
    /// Dropped silently when nobody is subscribed, like a real transport.
    pub fn push_notification(&self, service: Uuid, characteristic: Uuid, value: Vec<u8>) {
        let senders = self.inner.notify_senders.lock();
        if let Some(sender) = senders.get(&(service, characteristic)) {
            let _ = sender.try_send(value);
        }
    }
}

#[async_trait]
impl BlePeripheral for MockPeripheral {
    fn device_id(&self) -> &str {
        &self.inner.device_id
    }

    async fn connect_transport(&self) -> Result<(), ConnectionError> {
        if self.inner.fail_connect.load(Ordering::SeqCst) {
            return Err(ConnectionError::Transport("mock transport refused".into()));
        }
        self.inner.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect_transport(&self) -> Result<(), ConnectionError> {
        self.inner.connected.store(false, Ordering::SeqCst);
        self.inner.disconnect_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.notify_senders.lock().clear();
        Ok(())
    }

    async fn is_transport_connected(&self) -> bool {
        self.inner.connected.load(Ordering::SeqCst)
    }

    async fn read_rssi(&self) -> Result<Option<i16>, ConnectionError> {
        if self.inner.fail_rssi.load(Ordering::SeqCst) {
            return Err(ConnectionError::Transport("rssi unavailable".into()));
        }
        Ok(*self.inner.rssi.lock())
    }

    async fn request_transfer_unit(&self, _bytes: u16) -> Result<(), ConnectionError> {
        Ok(())
    }

    async fn discover_services(&self) -> Result<Vec<GattService>, ConnectionError> {
        Ok(self.inner.services.lock().clone())
    }

    async fn read_characteristic(
        &self,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<Vec<u8>, ConnectionError> {
        self.inner
            .reads
            .lock()
            .get(&(service, characteristic))
            .cloned()
            .ok_or_else(|| ConnectionError::Transport(format!("no value for {characteristic}")))
    }

    async fn subscribe(
        &self,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<mpsc::Receiver<Vec<u8>>, ConnectionError> {
        let (tx, rx) = mpsc::channel(NOTIFY_BUFFER);
        self.inner.notify_senders.lock().insert((service, characteristic), tx);
        Ok(rx)
    }

    async fn unsubscribe(
        &self,
        service: Uuid,
        characteristic: Uuid,
    ) -> Result<(), ConnectionError> {
        self.inner.notify_senders.lock().remove(&(service, characteristic));
        Ok(())
    }
}

/// Scriptable adapter holding a roster of peripherals.
pub struct MockCentral {
    available: AtomicBool,
    ready: AtomicBool,
    peripherals: Mutex<HashMap<String, MockPeripheral>>,
    advertised: Mutex<Vec<DiscoveredDevice>>,
    scan_feed: Mutex<Option<mpsc::Sender<DiscoveredDevice>>>,
    scan_starts: AtomicUsize,
    transport_tx: broadcast::Sender<TransportEvent>,
}

impl MockCentral {
    pub fn new() -> Self {
        let (transport_tx, _) = broadcast::channel(16);
        Self {
            available: AtomicBool::new(true),
            ready: AtomicBool::new(true),
            peripherals: Mutex::new(HashMap::new()),
            advertised: Mutex::new(Vec::new()),
            scan_feed: Mutex::new(None),
            scan_starts: AtomicUsize::new(0),
            transport_tx,
        }
    }

    /// Registers a peripheral and advertises it on every scan.
    pub fn add_peripheral(&self, peripheral: MockPeripheral, rssi: Option<i16>) {
        let id = peripheral.device_id().to_string();
        self.advertised.lock().push(DiscoveredDevice {
            id: id.clone(),
            name: format!("wearable-{id}"),
            rssi,
            kind: DeviceKind::Wearable,
        });
        self.peripherals.lock().insert(id, peripheral);
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn set_ready(&self, ready: bool) {
        self.ready.store(ready, Ordering::SeqCst);
    }

    /// Injects one sighting into a scan that is currently running.
    pub fn feed_sighting(&self, device: DiscoveredDevice) {
        if let Some(feed) = self.scan_feed.lock().as_ref() {
            let _ = feed.try_send(device);
        }
    }

    pub fn emit_transport_drop(&self, device_id: &str) {
        let _ = self.transport_tx.send(TransportEvent::DeviceDisconnected {
            device_id: device_id.to_string(),
        });
    }

    pub fn scan_starts(&self) -> usize {
        self.scan_starts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BleCentral for MockCentral {
    async fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn wait_until_ready(&self, _timeout: Duration) -> Result<(), ConnectionError> {
        if self.ready.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(ConnectionError::AdapterNotReady)
        }
    }

    async fn start_scan(
        &self,
        _service: Uuid,
    ) -> Result<mpsc::Receiver<DiscoveredDevice>, ConnectionError> {
        self.scan_starts.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel(NOTIFY_BUFFER);
        for device in self.advertised.lock().iter() {
            let _ = tx.try_send(device.clone());
        }
        *self.scan_feed.lock() = Some(tx);
        Ok(rx)
    }

    async fn stop_scan(&self) -> Result<(), ConnectionError> {
        *self.scan_feed.lock() = None;
        Ok(())
    }

    async fn open(&self, device_id: &str) -> Result<Box<dyn BlePeripheral>, ConnectionError> {
        self.peripherals
            .lock()
            .get(device_id)
            .cloned()
            .map(|p| Box::new(p) as Box<dyn BlePeripheral>)
            .ok_or_else(|| ConnectionError::DeviceNotFound(device_id.to_string()))
    }

    fn transport_events(&self) -> broadcast::Receiver<TransportEvent> {
        self.transport_tx.subscribe()
    }
}

/// Records everything persisted; optionally refuses.
#[derive(Default)]
pub struct MockSink {
    saved: Mutex<Vec<Recording>>,
    fail: AtomicBool,
}

impl MockSink {
    pub fn fail(&self) {
        self.fail.store(true, Ordering::SeqCst);
    }

    pub fn saved(&self) -> Vec<Recording> {
        self.saved.lock().clone()
    }
}

#[async_trait]
impl RecordingSink for MockSink {
    async fn persist(&self, recording: &Recording) -> Result<(), String> {
        if self.fail.load(Ordering::SeqCst) {
            return Err("sink offline".into());
        }
        self.saved.lock().push(recording.clone());
        Ok(())
    }
}

pub struct StubDecoderFactory {
    pub samples_per_frame: usize,
}

struct StubDecoder {
    samples_per_frame: usize,
}

impl AudioDecoder for StubDecoder {
    fn decode(&mut self, _frame: &[u8]) -> Result<Vec<i16>, String> {
        Ok(vec![0; self.samples_per_frame])
    }

    fn name(&self) -> &str {
        "stub"
    }
}

impl DecoderFactory for StubDecoderFactory {
    fn create(&self) -> Result<Box<dyn AudioDecoder>, String> {
        Ok(Box::new(StubDecoder {
            samples_per_frame: self.samples_per_frame,
        }))
    }
}
