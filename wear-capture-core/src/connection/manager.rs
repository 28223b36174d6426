use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use log::{info, warn};
use parking_lot::Mutex;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::connection::wearable::WearableConnection;
use crate::models::device::DiscoveredDevice;
use crate::models::error::ConnectionError;
use crate::models::events::ConnectionEvent;
use crate::models::state::ConnectionState;
use crate::protocol::uuids;
use crate::traits::central::{BleCentral, TransportEvent};
use crate::traits::device_connection::DeviceConnection;

/// How long a connect waits for the adapter to power on before giving up.
const ADAPTER_READY_WAIT: Duration = Duration::from_secs(5);

const EVENT_BUS_CAPACITY: usize = 64;

/// Retry schedule for [`ConnectionManager::reconnect_to_device`].
#[derive(Debug, Clone)]
pub struct ReconnectPolicy {
    pub attempts: u32,
    pub scan_timeout: Duration,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            scan_timeout: Duration::from_secs(5),
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(8),
        }
    }
}

struct ActiveLink {
    device_id: String,
    connection: Arc<dyn DeviceConnection>,
}

#[derive(Default)]
struct ManagerInner {
    scanning: bool,
    connecting: bool,
    last_scan: Vec<DiscoveredDevice>,
    active: Option<ActiveLink>,
}

/// Single owner of scanning and the at-most-one active device link.
///
/// All connection activity funnels through the manager: it serializes scans,
/// refuses overlapping connects, swaps out a previous device before bringing
/// up a new one, and watches transport events so a link that dies outside
/// any call still clears the active slot. Observers follow along on a
/// broadcast bus; missing a subscriber never blocks progress.
pub struct ConnectionManager {
    central: Arc<dyn BleCentral>,
    policy: ReconnectPolicy,
    events: broadcast::Sender<ConnectionEvent>,
    inner: Mutex<ManagerInner>,
    watcher: Mutex<Option<JoinHandle<()>>>,
    supported: AtomicBool,
    started: AtomicBool,
}

impl ConnectionManager {
    pub fn new(central: Arc<dyn BleCentral>) -> Self {
        Self::with_policy(central, ReconnectPolicy::default())
    }

    pub fn with_policy(central: Arc<dyn BleCentral>, policy: ReconnectPolicy) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUS_CAPACITY);
        Self {
            central,
            policy,
            events,
            inner: Mutex::new(ManagerInner::default()),
            watcher: Mutex::new(None),
            supported: AtomicBool::new(false),
            started: AtomicBool::new(false),
        }
    }

    /// Probes the adapter and starts the transport watcher. Idempotent; on
    /// hosts without a usable adapter the manager stays up but every
    /// operation reports [`ConnectionError::TransportUnavailable`].
    pub async fn start(self: &Arc<Self>) {
        if self.started.swap(true, Ordering::SeqCst) {
            return;
        }
        let available = self.central.is_available().await;
        self.supported.store(available, Ordering::SeqCst);
        if !available {
            warn!("no usable bluetooth adapter, connection manager disabled");
            return;
        }

        let mut transport = self.central.transport_events();
        let weak = Arc::downgrade(self);
        let task = tokio::spawn(async move {
            loop {
                match transport.recv().await {
                    Ok(TransportEvent::DeviceDisconnected { device_id }) => {
                        let Some(manager) = weak.upgrade() else { break };
                        manager.handle_transport_drop(&device_id);
                    }
                    Ok(TransportEvent::DeviceConnected { .. }) => {}
                    Err(broadcast::error::RecvError::Lagged(missed)) => {
                        warn!("transport event stream lagged by {missed}");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        *self.watcher.lock() = Some(task);
    }

    pub async fn stop(&self) {
        if !self.started.swap(false, Ordering::SeqCst) {
            return;
        }
        if let Some(task) = self.watcher.lock().take() {
            task.abort();
        }
        if let Err(e) = self.disconnect().await {
            warn!("disconnect during manager stop failed: {e}");
        }
    }

    pub fn is_supported(&self) -> bool {
        self.supported.load(Ordering::SeqCst)
    }

    pub fn events(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.events.subscribe()
    }

    pub fn active_connection(&self) -> Option<Arc<dyn DeviceConnection>> {
        self.inner.lock().active.as_ref().map(|l| Arc::clone(&l.connection))
    }

    pub fn active_device_id(&self) -> Option<String> {
        self.inner.lock().active.as_ref().map(|l| l.device_id.clone())
    }

    pub fn last_scan_results(&self) -> Vec<DiscoveredDevice> {
        self.inner.lock().last_scan.clone()
    }

    /// Scans for wearables until `timeout` elapses.
    ///
    /// Sightings are merged by device id, the freshest advertisement wins,
    /// and each update publishes the full list sorted by descending signal
    /// strength so observers can render progressively. The final list is
    /// cached as the candidate set for [`connect_to_device`].
    ///
    /// [`connect_to_device`]: Self::connect_to_device
    pub async fn scan_for_devices(
        &self,
        timeout: Duration,
    ) -> Result<Vec<DiscoveredDevice>, ConnectionError> {
        self.ensure_supported()?;
        {
            let mut inner = self.inner.lock();
            if inner.scanning {
                return Err(ConnectionError::ScanInProgress);
            }
            inner.scanning = true;
        }
        let result = self.run_scan(timeout).await;
        self.inner.lock().scanning = false;
        result
    }

    /// Connects to a device from the last scan. Any currently connected
    /// device is disconnected first; on failure the manager is left with no
    /// active device rather than a half-open one.
    pub async fn connect_to_device(
        &self,
        device_id: &str,
    ) -> Result<Arc<dyn DeviceConnection>, ConnectionError> {
        self.ensure_supported()?;
        let previous = {
            let mut inner = self.inner.lock();
            if inner.connecting {
                return Err(ConnectionError::ConnectInFlight);
            }
            if !inner.last_scan.iter().any(|d| d.id == device_id) {
                return Err(ConnectionError::DeviceNotFound(device_id.to_string()));
            }
            inner.connecting = true;
            inner.active.take()
        };

        if let Some(link) = previous {
            info!("disconnecting {} before connecting {device_id}", link.device_id);
            if let Err(e) = link.connection.disconnect().await {
                warn!("disconnect of previous device failed: {e}");
            }
            self.publish(ConnectionEvent::StateChanged {
                device_id: link.device_id,
                state: ConnectionState::Disconnected,
            });
        }

        let result = self.establish_link(device_id).await;
        self.inner.lock().connecting = false;
        match result {
            Ok(connection) => Ok(connection),
            Err(e) => {
                self.publish(ConnectionEvent::StateChanged {
                    device_id: device_id.to_string(),
                    state: ConnectionState::Disconnected,
                });
                Err(e)
            }
        }
    }

    /// Disconnects the active device, if any, and clears the cached scan
    /// results. The stale candidate set would otherwise allow connects to
    /// devices that may no longer be in range.
    pub async fn disconnect(&self) -> Result<(), ConnectionError> {
        let link = {
            let mut inner = self.inner.lock();
            inner.last_scan.clear();
            inner.active.take()
        };
        let Some(link) = link else {
            return Ok(());
        };
        let result = link.connection.disconnect().await;
        if let Err(e) = &result {
            warn!("disconnect from {} reported {e}", link.device_id);
        }
        self.publish(ConnectionEvent::StateChanged {
            device_id: link.device_id,
            state: ConnectionState::Disconnected,
        });
        result
    }

    /// Rescans and reconnects to a known device, retrying per the
    /// [`ReconnectPolicy`] with doubling backoff between attempts.
    pub async fn reconnect_to_device(
        &self,
        device_id: &str,
    ) -> Result<Arc<dyn DeviceConnection>, ConnectionError> {
        self.ensure_supported()?;
        let mut backoff = self.policy.initial_backoff;
        let mut last_err = ConnectionError::DeviceNotFound(device_id.to_string());

        for attempt in 1..=self.policy.attempts {
            info!(
                "reconnect attempt {attempt}/{} for {device_id}",
                self.policy.attempts
            );
            match self.scan_for_devices(self.policy.scan_timeout).await {
                Ok(devices) if devices.iter().any(|d| d.id == device_id) => {
                    match self.connect_to_device(device_id).await {
                        Ok(connection) => return Ok(connection),
                        Err(e) => last_err = e,
                    }
                }
                Ok(_) => {
                    last_err = ConnectionError::DeviceNotFound(device_id.to_string());
                }
                Err(e) => last_err = e,
            }
            if attempt < self.policy.attempts {
                tokio::time::sleep(backoff).await;
                backoff = (backoff * 2).min(self.policy.max_backoff);
            }
        }
        Err(last_err)
    }

    // --- Internal helpers ---

    fn ensure_supported(&self) -> Result<(), ConnectionError> {
        if !self.started.load(Ordering::SeqCst) || !self.supported.load(Ordering::SeqCst) {
            return Err(ConnectionError::TransportUnavailable);
        }
        Ok(())
    }

    fn publish(&self, event: ConnectionEvent) {
        let _ = self.events.send(event);
    }

    async fn run_scan(&self, timeout: Duration) -> Result<Vec<DiscoveredDevice>, ConnectionError> {
        self.publish(ConnectionEvent::ScanStarted);
        let mut sightings = self.central.start_scan(uuids::AUDIO_SERVICE).await?;

        let mut devices: Vec<DiscoveredDevice> = Vec::new();
        let deadline = tokio::time::sleep(timeout);
        tokio::pin!(deadline);
        loop {
            tokio::select! {
                () = &mut deadline => break,
                sighting = sightings.recv() => {
                    let Some(device) = sighting else { break };
                    match devices.iter_mut().find(|d| d.id == device.id) {
                        Some(existing) => *existing = device,
                        None => devices.push(device),
                    }
                    devices.sort_by(|a, b| b.rssi.cmp(&a.rssi));
                    self.publish(ConnectionEvent::DevicesDiscovered(devices.clone()));
                }
            }
        }

        if let Err(e) = self.central.stop_scan().await {
            warn!("stop scan failed: {e}");
        }
        self.inner.lock().last_scan = devices.clone();
        self.publish(ConnectionEvent::ScanCompleted { device_count: devices.len() });
        Ok(devices)
    }

    async fn establish_link(
        &self,
        device_id: &str,
    ) -> Result<Arc<dyn DeviceConnection>, ConnectionError> {
        self.publish(ConnectionEvent::StateChanged {
            device_id: device_id.to_string(),
            state: ConnectionState::Connecting,
        });
        self.central.wait_until_ready(ADAPTER_READY_WAIT).await?;

        let peripheral = self.central.open(device_id).await?;
        let connection: Arc<dyn DeviceConnection> = Arc::new(WearableConnection::new(peripheral));
        connection.connect().await?;

        self.inner.lock().active = Some(ActiveLink {
            device_id: device_id.to_string(),
            connection: Arc::clone(&connection),
        });
        self.publish(ConnectionEvent::StateChanged {
            device_id: device_id.to_string(),
            state: ConnectionState::Connected,
        });
        info!("connected to {device_id}");
        Ok(connection)
    }

    fn handle_transport_drop(&self, device_id: &str) {
        let dropped = {
            let mut inner = self.inner.lock();
            match &inner.active {
                Some(link) if link.device_id == device_id => inner.active.take(),
                _ => None,
            }
        };
        if dropped.is_some() {
            warn!("transport dropped for active device {device_id}");
            self.publish(ConnectionEvent::StateChanged {
                device_id: device_id.to_string(),
                state: ConnectionState::Disconnected,
            });
            self.publish(ConnectionEvent::ConnectionLost {
                device_id: device_id.to_string(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{MockCentral, MockPeripheral};

    async fn started_manager(central: Arc<MockCentral>) -> Arc<ConnectionManager> {
        let manager = Arc::new(ConnectionManager::with_policy(
            central,
            ReconnectPolicy {
                attempts: 3,
                scan_timeout: Duration::from_millis(50),
                initial_backoff: Duration::from_millis(10),
                max_backoff: Duration::from_millis(40),
            },
        ));
        manager.start().await;
        manager
    }

    async fn expect_event(
        rx: &mut broadcast::Receiver<ConnectionEvent>,
        predicate: impl Fn(&ConnectionEvent) -> bool,
    ) -> ConnectionEvent {
        tokio::time::timeout(Duration::from_secs(1), async {
            loop {
                let event = rx.recv().await.expect("event bus closed");
                if predicate(&event) {
                    return event;
                }
            }
        })
        .await
        .expect("timed out waiting for event")
    }

    #[tokio::test(start_paused = true)]
    async fn scan_merges_sightings_and_sorts_by_signal() {
        let central = Arc::new(MockCentral::new());
        central.add_peripheral(MockPeripheral::wearable("FAR"), Some(-70));
        central.add_peripheral(MockPeripheral::wearable("NEAR"), Some(-40));
        let manager = started_manager(Arc::clone(&central)).await;

        let devices = manager
            .scan_for_devices(Duration::from_millis(100))
            .await
            .unwrap();

        let ids: Vec<_> = devices.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, ["NEAR", "FAR"]);
        assert_eq!(manager.last_scan_results(), devices);
    }

    #[tokio::test(start_paused = true)]
    async fn duplicate_sightings_keep_the_freshest_advertisement() {
        let central = Arc::new(MockCentral::new());
        central.add_peripheral(MockPeripheral::wearable("AA:BB"), Some(-70));
        let manager = started_manager(Arc::clone(&central)).await;
        let mut events = manager.events();

        let scan = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.scan_for_devices(Duration::from_millis(100)).await })
        };
        expect_event(&mut events, |e| matches!(e, ConnectionEvent::ScanStarted)).await;
        central.feed_sighting(DiscoveredDevice {
            id: "AA:BB".into(),
            name: "wearable-AA:BB".into(),
            rssi: Some(-45),
            kind: crate::models::device::DeviceKind::Wearable,
        });

        let devices = scan.await.unwrap().unwrap();
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].rssi, Some(-45));
    }

    #[tokio::test]
    async fn scan_before_start_is_unsupported() {
        let central = Arc::new(MockCentral::new());
        let manager = Arc::new(ConnectionManager::new(central as Arc<dyn BleCentral>));

        assert_eq!(
            manager.scan_for_devices(Duration::from_millis(10)).await,
            Err(ConnectionError::TransportUnavailable)
        );
    }

    #[tokio::test]
    async fn unavailable_adapter_disables_the_manager() {
        let central = Arc::new(MockCentral::new());
        central.set_available(false);
        let manager = started_manager(central).await;

        assert!(!manager.is_supported());
        assert_eq!(
            manager.scan_for_devices(Duration::from_millis(10)).await,
            Err(ConnectionError::TransportUnavailable)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn overlapping_scans_are_refused() {
        let central = Arc::new(MockCentral::new());
        let manager = started_manager(central).await;

        let first = {
            let manager = Arc::clone(&manager);
            tokio::spawn(async move { manager.scan_for_devices(Duration::from_secs(5)).await })
        };
        tokio::task::yield_now().await;

        assert_eq!(
            manager.scan_for_devices(Duration::from_millis(10)).await,
            Err(ConnectionError::ScanInProgress)
        );
        first.await.unwrap().unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn connect_requires_the_device_in_the_last_scan() {
        let central = Arc::new(MockCentral::new());
        central.add_peripheral(MockPeripheral::wearable("AA:BB"), Some(-40));
        let manager = started_manager(central).await;
        manager
            .scan_for_devices(Duration::from_millis(50))
            .await
            .unwrap();

        assert_eq!(
            manager.connect_to_device("CC:DD").await.err(),
            Some(ConnectionError::DeviceNotFound("CC:DD".into()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn connect_publishes_the_state_sequence() {
        let central = Arc::new(MockCentral::new());
        central.add_peripheral(MockPeripheral::wearable("AA:BB"), Some(-40));
        let manager = started_manager(central).await;
        manager
            .scan_for_devices(Duration::from_millis(50))
            .await
            .unwrap();
        let mut events = manager.events();

        let connection = manager.connect_to_device("AA:BB").await.unwrap();

        assert!(connection.is_connected().await);
        assert_eq!(manager.active_device_id().as_deref(), Some("AA:BB"));
        expect_event(&mut events, |e| {
            matches!(
                e,
                ConnectionEvent::StateChanged { state: ConnectionState::Connecting, .. }
            )
        })
        .await;
        expect_event(&mut events, |e| {
            matches!(
                e,
                ConnectionEvent::StateChanged { state: ConnectionState::Connected, .. }
            )
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn connecting_a_second_device_swaps_the_first_out() {
        let central = Arc::new(MockCentral::new());
        let first = MockPeripheral::wearable("AA:BB");
        central.add_peripheral(first.clone(), Some(-40));
        central.add_peripheral(MockPeripheral::wearable("CC:DD"), Some(-50));
        let manager = started_manager(central).await;
        manager
            .scan_for_devices(Duration::from_millis(50))
            .await
            .unwrap();

        manager.connect_to_device("AA:BB").await.unwrap();
        manager.connect_to_device("CC:DD").await.unwrap();

        assert_eq!(manager.active_device_id().as_deref(), Some("CC:DD"));
        assert_eq!(first.disconnect_calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn connect_fails_while_the_adapter_is_powered_off() {
        let central = Arc::new(MockCentral::new());
        central.add_peripheral(MockPeripheral::wearable("AA:BB"), Some(-40));
        let manager = started_manager(Arc::clone(&central)).await;
        manager
            .scan_for_devices(Duration::from_millis(50))
            .await
            .unwrap();
        central.set_ready(false);

        assert_eq!(
            manager.connect_to_device("AA:BB").await.err(),
            Some(ConnectionError::AdapterNotReady)
        );
        assert!(manager.active_connection().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn failed_connect_leaves_no_active_device() {
        let central = Arc::new(MockCentral::new());
        let peripheral = MockPeripheral::wearable("AA:BB");
        peripheral.fail_rssi();
        central.add_peripheral(peripheral, Some(-40));
        let manager = started_manager(central).await;
        manager
            .scan_for_devices(Duration::from_millis(50))
            .await
            .unwrap();
        let mut events = manager.events();

        assert_eq!(
            manager.connect_to_device("AA:BB").await.err(),
            Some(ConnectionError::PingFailed)
        );
        assert!(manager.active_connection().is_none());
        expect_event(&mut events, |e| {
            matches!(
                e,
                ConnectionEvent::StateChanged { state: ConnectionState::Disconnected, .. }
            )
        })
        .await;
    }

    #[tokio::test(start_paused = true)]
    async fn disconnect_clears_the_scan_cache() {
        let central = Arc::new(MockCentral::new());
        central.add_peripheral(MockPeripheral::wearable("AA:BB"), Some(-40));
        let manager = started_manager(central).await;
        manager
            .scan_for_devices(Duration::from_millis(50))
            .await
            .unwrap();
        manager.connect_to_device("AA:BB").await.unwrap();

        manager.disconnect().await.unwrap();

        assert!(manager.active_connection().is_none());
        assert!(manager.last_scan_results().is_empty());
        // A new scan is required before the next connect.
        assert_eq!(
            manager.connect_to_device("AA:BB").await.err(),
            Some(ConnectionError::DeviceNotFound("AA:BB".into()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn transport_drop_clears_the_active_device() {
        let central = Arc::new(MockCentral::new());
        central.add_peripheral(MockPeripheral::wearable("AA:BB"), Some(-40));
        let manager = started_manager(Arc::clone(&central)).await;
        manager
            .scan_for_devices(Duration::from_millis(50))
            .await
            .unwrap();
        manager.connect_to_device("AA:BB").await.unwrap();
        let mut events = manager.events();

        // A drop for some other device must not touch the active link.
        central.emit_transport_drop("CC:DD");
        central.emit_transport_drop("AA:BB");

        let lost = expect_event(&mut events, |e| {
            matches!(e, ConnectionEvent::ConnectionLost { .. })
        })
        .await;
        assert_eq!(
            lost,
            ConnectionEvent::ConnectionLost { device_id: "AA:BB".into() }
        );
        assert!(manager.active_connection().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn reconnect_gives_up_after_the_policy_attempts() {
        let central = Arc::new(MockCentral::new());
        let manager = started_manager(Arc::clone(&central)).await;

        let err = manager.reconnect_to_device("AA:BB").await.unwrap_err();

        assert_eq!(err, ConnectionError::DeviceNotFound("AA:BB".into()));
        assert_eq!(central.scan_starts(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn reconnect_connects_once_the_device_reappears() {
        let central = Arc::new(MockCentral::new());
        central.add_peripheral(MockPeripheral::wearable("AA:BB"), Some(-40));
        let manager = started_manager(Arc::clone(&central)).await;

        let connection = manager.reconnect_to_device("AA:BB").await.unwrap();

        assert!(connection.is_connected().await);
        assert_eq!(central.scan_starts(), 1);
    }
}
