//! Scripted GATT platform for driving the monitor without a radio.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use uuid::Uuid;

use heartrate_le_lib::core::bluetooth::{
    CacheMode, ConnectionStream, GattPlatform, HeartRateMonitor, NotificationStream, UUID_BATTERY_LEVEL,
    UUID_BATTERY_SERVICE, UUID_BODY_SENSOR_LOCATION, UUID_DEVICE_INFORMATION_SERVICE, UUID_DEVICE_NAME,
    UUID_FIRMWARE_REVISION, UUID_GENERIC_ACCESS_SERVICE, UUID_HARDWARE_REVISION, UUID_HEART_RATE_MEASUREMENT,
    UUID_HEART_RATE_SERVICE, UUID_MANUFACTURER_NAME, UUID_MODEL_NUMBER, UUID_SERIAL_NUMBER, receiver_stream,
};
use heartrate_le_lib::{ConnectionStatus, HeartRateReading, PlatformError};

#[derive(Debug, Clone)]
pub struct MockCharacteristic {
    pub uuid: Uuid,
    pub notify: bool,
    pub value: Option<Vec<u8>>,
}

impl MockCharacteristic {
    pub fn readable(uuid: Uuid, value: &[u8]) -> Self {
        Self { uuid, notify: false, value: Some(value.to_vec()) }
    }
}

#[derive(Debug, Clone)]
pub struct MockService {
    pub uuid: Uuid,
    pub characteristics: Vec<MockCharacteristic>,
    pub fail_discovery: bool,
}

impl MockService {
    pub fn new(uuid: Uuid, characteristics: Vec<MockCharacteristic>) -> Self {
        Self { uuid, characteristics, fail_discovery: false }
    }
}

#[derive(Debug, Clone)]
pub struct MockDevice {
    pub name: Option<String>,
    pub paired: bool,
    pub services: Vec<MockService>,
}

/// A paired chest strap exposing heart rate, device information and battery services.
pub fn heart_rate_device(name: &str) -> MockDevice {
    MockDevice {
        name: Some(name.to_string()),
        paired: true,
        services: vec![
            MockService::new(
                UUID_GENERIC_ACCESS_SERVICE,
                vec![MockCharacteristic::readable(UUID_DEVICE_NAME, name.as_bytes())],
            ),
            MockService::new(
                UUID_HEART_RATE_SERVICE,
                vec![
                    MockCharacteristic { uuid: UUID_HEART_RATE_MEASUREMENT, notify: true, value: None },
                    MockCharacteristic::readable(UUID_BODY_SENSOR_LOCATION, &[0x01]),
                ],
            ),
            MockService::new(
                UUID_DEVICE_INFORMATION_SERVICE,
                vec![
                    MockCharacteristic::readable(UUID_MANUFACTURER_NAME, b"Polar Electro Oy"),
                    MockCharacteristic::readable(UUID_MODEL_NUMBER, b"H10\0"),
                    MockCharacteristic::readable(UUID_SERIAL_NUMBER, b"C8F1A2B3"),
                    MockCharacteristic::readable(UUID_HARDWARE_REVISION, b"39044024.10"),
                    MockCharacteristic::readable(UUID_FIRMWARE_REVISION, b"3.1.1"),
                ],
            ),
            MockService::new(UUID_BATTERY_SERVICE, vec![MockCharacteristic::readable(UUID_BATTERY_LEVEL, &[87])]),
        ],
    }
}

/// Failure switches, all off by default
#[derive(Debug, Default)]
pub struct Failures {
    pub service_discovery: bool,
    pub hang_service_discovery: bool,
    pub hang_is_paired: bool,
    pub hang_supports_notify: bool,
    pub descriptor_discovery: bool,
    pub enable_notifications: bool,
    pub disable_notifications: bool,
    pub watch_connection: bool,
}

#[derive(Default)]
pub struct MockPlatform {
    devices: Mutex<HashMap<String, MockDevice>>,
    pub failures: Mutex<Failures>,
    /// Connection status raised on the watchers while services are being discovered
    pub status_during_discovery: Mutex<Option<bool>>,
    link_down: AtomicBool,
    notifications: Mutex<Option<mpsc::UnboundedSender<Vec<u8>>>>,
    watchers: Mutex<Vec<mpsc::UnboundedSender<bool>>>,
    active_subscriptions: AtomicUsize,
    enable_calls: AtomicUsize,
    closed_devices: AtomicUsize,
    watch_registrations: AtomicUsize,
    calls: AtomicUsize,
}

impl MockPlatform {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_device(id: &str, device: MockDevice) -> Arc<Self> {
        let platform = Self::default();
        platform.devices.lock().insert(id.to_string(), device);
        Arc::new(platform)
    }

    pub fn edit_device(&self, id: &str, edit: impl FnOnce(&mut MockDevice)) {
        if let Some(device) = self.devices.lock().get_mut(id) {
            edit(device);
        }
    }

    /// Delivers a value-changed payload on the live subscription.
    pub fn push_notification(&self, value: &[u8]) -> bool {
        match self.notifications.lock().as_ref() {
            Some(tx) => tx.send(value.to_vec()).is_ok(),
            None => false,
        }
    }

    /// Drops the link and tells every connection watcher about it.
    pub fn simulate_connection_lost(&self) {
        self.link_down.store(true, Ordering::SeqCst);
        for watcher in self.watchers.lock().iter() {
            let _ = watcher.send(false);
        }
    }

    /// Signals a reconnect to every connection watcher.
    pub fn simulate_connection_restored(&self) {
        self.link_down.store(false, Ordering::SeqCst);
        for watcher in self.watchers.lock().iter() {
            let _ = watcher.send(true);
        }
    }

    pub fn active_subscriptions(&self) -> usize {
        self.active_subscriptions.load(Ordering::SeqCst)
    }

    pub fn enable_calls(&self) -> usize {
        self.enable_calls.load(Ordering::SeqCst)
    }

    pub fn closed_devices(&self) -> usize {
        self.closed_devices.load(Ordering::SeqCst)
    }

    pub fn watch_registrations(&self) -> usize {
        self.watch_registrations.load(Ordering::SeqCst)
    }

    /// Every platform call made so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn record_call(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }

    fn device(&self, id: &str) -> Option<MockDevice> {
        self.devices.lock().get(id).cloned()
    }
}

#[async_trait]
impl GattPlatform for MockPlatform {
    type Device = String;
    type Service = MockService;
    type Characteristic = MockCharacteristic;

    async fn resolve_device(&self, device_id: &str) -> Option<String> {
        self.record_call();
        self.device(device_id).map(|_| device_id.to_string())
    }

    async fn is_paired(&self, device: &String) -> bool {
        self.record_call();
        let hang = self.failures.lock().hang_is_paired;
        if hang {
            std::future::pending::<()>().await;
        }
        self.device(device).is_some_and(|device| device.paired)
    }

    fn device_name(&self, device: &String) -> Option<String> {
        self.record_call();
        self.device(device).and_then(|device| device.name)
    }

    async fn is_connected(&self, _device: &String) -> bool {
        self.record_call();
        !self.link_down.load(Ordering::SeqCst)
    }

    async fn watch_connection(&self, _device: &String) -> Result<ConnectionStream, PlatformError> {
        self.record_call();
        if self.failures.lock().watch_connection {
            return Err(PlatformError::Bluetooth("watch unavailable".into()));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        self.watchers.lock().push(tx);
        self.watch_registrations.fetch_add(1, Ordering::SeqCst);
        Ok(receiver_stream(rx))
    }

    async fn discover_services(&self, device: &String, _mode: CacheMode) -> Result<Vec<MockService>, PlatformError> {
        self.record_call();
        let hang = self.failures.lock().hang_service_discovery;
        if hang {
            std::future::pending::<()>().await;
        }
        if self.failures.lock().service_discovery {
            return Err(PlatformError::Bluetooth("Unreachable".into()));
        }
        self.link_down.store(false, Ordering::SeqCst);
        let raised = *self.status_during_discovery.lock();
        if let Some(is_connected) = raised {
            self.link_down.store(!is_connected, Ordering::SeqCst);
            for watcher in self.watchers.lock().iter() {
                let _ = watcher.send(is_connected);
            }
        }
        Ok(self.device(device).map(|device| device.services).unwrap_or_default())
    }

    fn service_uuid(&self, service: &MockService) -> Uuid {
        service.uuid
    }

    async fn discover_characteristics(
        &self,
        service: &MockService,
        _mode: CacheMode,
    ) -> Result<Vec<MockCharacteristic>, PlatformError> {
        self.record_call();
        if service.fail_discovery {
            return Err(PlatformError::Bluetooth("AccessDenied".into()));
        }
        Ok(service.characteristics.clone())
    }

    fn characteristic_uuid(&self, characteristic: &MockCharacteristic) -> Uuid {
        characteristic.uuid
    }

    async fn discover_descriptors(
        &self,
        _characteristic: &MockCharacteristic,
        _mode: CacheMode,
    ) -> Result<usize, PlatformError> {
        self.record_call();
        if self.failures.lock().descriptor_discovery {
            return Err(PlatformError::Bluetooth("Unreachable".into()));
        }
        Ok(1)
    }

    async fn supports_notify(&self, characteristic: &MockCharacteristic) -> bool {
        self.record_call();
        let hang = self.failures.lock().hang_supports_notify;
        if hang {
            std::future::pending::<()>().await;
        }
        characteristic.notify
    }

    async fn enable_notifications(
        &self,
        _characteristic: &MockCharacteristic,
    ) -> Result<NotificationStream, PlatformError> {
        self.record_call();
        self.enable_calls.fetch_add(1, Ordering::SeqCst);
        if self.failures.lock().enable_notifications {
            return Err(PlatformError::Bluetooth("ProtocolError".into()));
        }
        let (tx, rx) = mpsc::unbounded_channel();
        *self.notifications.lock() = Some(tx);
        self.active_subscriptions.fetch_add(1, Ordering::SeqCst);
        Ok(receiver_stream(rx))
    }

    async fn disable_notifications(&self, _characteristic: &MockCharacteristic) -> Result<(), PlatformError> {
        self.record_call();
        if self.failures.lock().disable_notifications {
            return Err(PlatformError::Bluetooth("Unreachable".into()));
        }
        *self.notifications.lock() = None;
        self.active_subscriptions.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }

    async fn read_value(&self, characteristic: &MockCharacteristic) -> Result<Vec<u8>, PlatformError> {
        self.record_call();
        characteristic.value.clone().ok_or_else(|| PlatformError::Bluetooth("ReadNotPermitted".into()))
    }

    async fn close_device(&self, _device: &String) -> Result<(), PlatformError> {
        self.record_call();
        self.closed_devices.fetch_add(1, Ordering::SeqCst);
        self.watchers.lock().clear();
        Ok(())
    }
}

/// Everything the monitor reported to its observers, in delivery order
#[derive(Debug, Clone, PartialEq)]
pub enum Observed {
    Status(ConnectionStatus),
    Reading(u16),
}

/// Records status and reading events of a monitor into a single ordered channel.
pub fn record_events(monitor: &HeartRateMonitor<MockPlatform>) -> mpsc::UnboundedReceiver<Observed> {
    let (tx, rx) = mpsc::unbounded_channel();
    let status_tx = tx.clone();
    monitor.status_events().subscribe_fn(move |status: &ConnectionStatus| {
        let _ = status_tx.send(Observed::Status(status.clone()));
    });
    monitor.rate_events().subscribe_fn(move |reading: &HeartRateReading| {
        let _ = tx.send(Observed::Reading(reading.beats_per_minute));
    });
    rx
}

/// Waits for the next recorded event, failing the test after a second.
pub async fn next_event(events: &mut mpsc::UnboundedReceiver<Observed>) -> Observed {
    tokio::time::timeout(Duration::from_secs(1), events.recv())
        .await
        .expect("timed out waiting for an event")
        .expect("event channel closed")
}

/// Polls `condition` until it holds, failing the test after a second.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(1);
    while !condition() {
        assert!(tokio::time::Instant::now() < deadline, "condition not reached in time");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}
