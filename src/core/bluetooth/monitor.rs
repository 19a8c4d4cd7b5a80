//! Heart rate monitor for the connected peripheral
//! This module owns the connection session: device acquisition, service and
//! characteristic discovery, notification setup, and teardown.

use std::sync::{Arc, Weak};
use std::time::Duration;

use futures_util::StreamExt;
use log::{debug, info, warn};
use tokio::sync::{Mutex, watch};
use tokio_util::sync::CancellationToken;

use crate::core::bluetooth::cache::{AttributeDescriptor, GattAttributeCache};
use crate::core::bluetooth::constants::{
    BATTERY_SERVICE, DEVICE_INFORMATION_SERVICE, HEART_RATE_MEASUREMENT, HEART_RATE_SERVICE, UNKNOWN_DEVICE_NAME,
    attribute_name,
};
use crate::core::bluetooth::device_info::DeviceInfoReader;
use crate::core::bluetooth::discovery::discover_characteristic_attributes;
use crate::core::bluetooth::events::EventChannel;
use crate::core::bluetooth::notification::spawn_reading_pump;
use crate::core::bluetooth::platform::{CacheMode, ConnectionStream, GattPlatform, query_with_timeout, with_timeout};
use crate::core::bluetooth::types::{ConnectionResult, ConnectionStatus, DeviceInfo, SessionState};
use crate::core::heart_rate::HeartRateReading;
use crate::error::HeartRateError;

/// Handles held by the active session. Only mutated under the session lock.
struct Session<P: GattPlatform> {
    state: SessionState,
    /// Bumped for every acquired device so stale watchers can be told apart.
    epoch: u64,
    device_id: Option<String>,
    device_name: Option<String>,
    device: Option<P::Device>,
    service: Option<P::Service>,
    characteristic: Option<P::Characteristic>,
    cache: GattAttributeCache<P::Service, P::Characteristic>,
    watcher: Option<CancellationToken>,
    subscription: Option<CancellationToken>,
}

impl<P: GattPlatform> Default for Session<P> {
    fn default() -> Self {
        Self {
            state: SessionState::Idle,
            epoch: 0,
            device_id: None,
            device_name: None,
            device: None,
            service: None,
            characteristic: None,
            cache: GattAttributeCache::new(),
            watcher: None,
            subscription: None,
        }
    }
}

struct MonitorInner<P: GattPlatform> {
    platform: Arc<P>,
    operation_timeout: Option<Duration>,
    session: Mutex<Session<P>>,
    status: watch::Sender<ConnectionStatus>,
    status_events: EventChannel<ConnectionStatus>,
    rate_events: Arc<EventChannel<HeartRateReading>>,
}

/// Manages a single heart rate peripheral.
///
/// Connect and disconnect are serialized; status queries read a snapshot and never block on them.
pub struct HeartRateMonitor<P: GattPlatform> {
    inner: Arc<MonitorInner<P>>,
}

impl<P: GattPlatform> Clone for HeartRateMonitor<P> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<P: GattPlatform> HeartRateMonitor<P> {
    /// Creates a monitor on top of `platform`.
    /// Every platform step is bounded by `operation_timeout` when one is given.
    pub fn new(platform: Arc<P>, operation_timeout: Option<Duration>) -> Self {
        let (status, _) = watch::channel(ConnectionStatus::disconnected());
        Self {
            inner: Arc::new(MonitorInner {
                platform,
                operation_timeout,
                session: Mutex::new(Session::default()),
                status,
                status_events: EventChannel::new(),
                rate_events: Arc::new(EventChannel::new()),
            }),
        }
    }

    /// Connection status events, including unsolicited disconnects
    pub fn status_events(&self) -> &EventChannel<ConnectionStatus> {
        &self.inner.status_events
    }

    /// Decoded heart rate readings
    pub fn rate_events(&self) -> &EventChannel<HeartRateReading> {
        &self.inner.rate_events
    }

    /// Connects to the device with the given ID and subscribes to its heart rate measurements.
    pub async fn connect(&self, device_id: &str) -> ConnectionResult {
        let inner = &self.inner;
        let mut session = inner.session.lock().await;

        if session.state != SessionState::Idle {
            info!("Closing the active session before connecting to {}", device_id);
            inner.teardown(&mut session).await;
        }

        match inner.establish(&mut session, device_id).await {
            Ok(name) => {
                info!("Subscribed to heart rate measurements of {} ({})", name, device_id);
                ConnectionResult::Connected { name }
            }
            Err(e) => {
                warn!("Connecting to {} failed: {}", device_id, e);
                inner.release(&mut session).await;
                let was_connected = inner.status.borrow().is_connected;
                if was_connected {
                    inner.publish_status(ConnectionStatus::disconnected());
                }
                ConnectionResult::Failed(e)
            }
        }
    }

    /// Disconnects from the current device. Does nothing when no session is active.
    pub async fn disconnect(&self) {
        let mut session = self.inner.session.lock().await;
        if session.state == SessionState::Idle {
            debug!("Disconnect requested with no active session");
            return;
        }
        self.inner.teardown(&mut session).await;
    }

    /// Checks if the device is currently connected.
    pub fn is_connected(&self) -> bool {
        self.inner.status.borrow().is_connected
    }

    /// Returns the last published connection status.
    pub fn status(&self) -> ConnectionStatus {
        self.inner.status.borrow().clone()
    }

    /// Returns a receiver that observes every published connection status.
    pub fn status_receiver(&self) -> watch::Receiver<ConnectionStatus> {
        self.inner.status.subscribe()
    }

    pub async fn session_state(&self) -> SessionState {
        self.inner.session.lock().await.state
    }

    /// Names of the attributes discovered for the active session, in discovery order.
    pub async fn cached_attribute_names(&self) -> Vec<String> {
        self.inner.session.lock().await.cache.names()
    }

    /// Reads device information and battery level of the connected device.
    /// Returns an empty [`DeviceInfo`] without touching the device when disconnected.
    pub async fn get_device_info(&self) -> DeviceInfo {
        if !self.is_connected() {
            return DeviceInfo::default();
        }

        let (device_id, name, info_service, battery_service) = {
            let session = self.inner.session.lock().await;
            if session.device.is_none() {
                return DeviceInfo::default();
            }
            (
                session.device_id.clone().unwrap_or_default(),
                session.device_name.clone().unwrap_or_default(),
                session.cache.find_service(DEVICE_INFORMATION_SERVICE).cloned(),
                session.cache.find_service(BATTERY_SERVICE).cloned(),
            )
        };

        let reader = DeviceInfoReader::new(self.inner.platform.as_ref(), self.inner.operation_timeout);
        let info = reader.read(info_service.as_ref(), battery_service.as_ref()).await;

        DeviceInfo { device_id, name, ..info }
    }
}

impl<P: GattPlatform> MonitorInner<P> {
    async fn establish(self: &Arc<Self>, session: &mut Session<P>, device_id: &str) -> Result<String, HeartRateError> {
        let platform = self.platform.as_ref();

        let device = query_with_timeout(self.operation_timeout, platform.resolve_device(device_id))
            .await
            .flatten()
            .ok_or(HeartRateError::DeviceNotFound)?;

        // A pairing state that cannot be read in time counts as not paired.
        let paired = query_with_timeout(self.operation_timeout, platform.is_paired(&device)).await;
        if paired != Some(true) {
            return Err(HeartRateError::NotPaired);
        }

        let name = platform.device_name(&device).unwrap_or_else(|| UNKNOWN_DEVICE_NAME.to_string());
        info!("Device details - ID: {}, Name: {}", device_id, name);

        session.epoch += 1;
        session.device_id = Some(device_id.to_string());
        session.device_name = Some(name.clone());
        session.device = Some(device.clone());
        self.transition(session, SessionState::DeviceAcquired);

        // Registered before any GATT I/O so a drop during discovery is seen.
        self.watch_connection(session, &device, &name).await;

        info!("Discovering services...");
        let services = with_timeout(self.operation_timeout, platform.discover_services(&device, CacheMode::Uncached))
            .await
            .map_err(|e| {
                warn!("Service discovery failed for {}: {}", device_id, e);
                HeartRateError::DeviceUnreachable
            })?;

        session.cache.clear();
        for service in services {
            let uuid = platform.service_uuid(&service);
            session.cache.insert(AttributeDescriptor::service(attribute_name(uuid), uuid, service));
        }
        debug!("Discovered services: {:?}", session.cache.names());
        self.transition(session, SessionState::ServicesDiscovered);

        let service = session
            .cache
            .find_service(HEART_RATE_SERVICE)
            .cloned()
            .ok_or(HeartRateError::ServiceNotFound)?;
        session.service = Some(service.clone());

        for characteristic in discover_characteristic_attributes(platform, &service, self.operation_timeout).await {
            session.cache.insert(characteristic);
        }

        let characteristic = session
            .cache
            .find_characteristic(HEART_RATE_MEASUREMENT)
            .cloned()
            .ok_or(HeartRateError::CharacteristicNotFound)?;
        session.characteristic = Some(characteristic.clone());
        self.transition(session, SessionState::CharacteristicReady);

        let descriptors = with_timeout(
            self.operation_timeout,
            platform.discover_descriptors(&characteristic, CacheMode::Uncached),
        )
        .await
        .map_err(|e| HeartRateError::SubscriptionFailed(e.to_string()))?;
        debug!("Heart rate measurement has {} descriptors", descriptors);

        let notify = query_with_timeout(self.operation_timeout, platform.supports_notify(&characteristic)).await;
        if notify != Some(true) {
            return Err(HeartRateError::NotifyUnsupported);
        }

        info!("Setting up notifications...");
        let notifications = with_timeout(self.operation_timeout, platform.enable_notifications(&characteristic))
            .await
            .map_err(|e| HeartRateError::SubscriptionFailed(e.to_string()))?;
        self.transition(session, SessionState::Subscribed);

        // Observers registered after connect returns still learn the initial state.
        // Published before the pump starts, so it precedes every reading.
        // The subscription write just succeeded, so a link state that cannot be read in time is taken as up.
        let is_connected = query_with_timeout(self.operation_timeout, platform.is_connected(&device))
            .await
            .unwrap_or_else(|| {
                warn!("Connection state of {} did not arrive in time", device_id);
                true
            });
        self.publish_status(ConnectionStatus { is_connected, name: Some(name.clone()) });

        session.subscription = Some(spawn_reading_pump(notifications, self.rate_events.clone()));
        Ok(name)
    }

    /// Registers the connection status watcher for `device`, replacing any previous one.
    async fn watch_connection(self: &Arc<Self>, session: &mut Session<P>, device: &P::Device, name: &str) {
        if let Some(previous) = session.watcher.take() {
            previous.cancel();
        }

        let events = match with_timeout(self.operation_timeout, self.platform.watch_connection(device)).await {
            Ok(events) => events,
            Err(e) => {
                warn!("Connection status of {} cannot be watched: {}", name, e);
                return;
            }
        };

        let token = CancellationToken::new();
        session.watcher = Some(token.clone());
        tokio::spawn(watch_status(Arc::downgrade(self), events, token, session.epoch, name.to_string()));
    }

    /// Unsubscribes, releases every hold and reports the disconnect.
    async fn teardown(&self, session: &mut Session<P>) {
        info!("Disconnecting from {}", session.device_id.as_deref().unwrap_or("device"));

        if let Some(subscription) = session.subscription.take() {
            subscription.cancel();
            if let Some(characteristic) = session.characteristic.as_ref() {
                // TODO: surface a failed unsubscribe to callers once there is a retry policy for it.
                if let Err(e) =
                    with_timeout(self.operation_timeout, self.platform.disable_notifications(characteristic)).await
                {
                    warn!("Failed to disable heart rate notifications, continuing teardown: {}", e);
                }
            }
        }

        self.release(session).await;
        self.publish_status(ConnectionStatus::disconnected());
        info!("Successfully disconnected");
    }

    /// Drops the session handles in reverse dependency order and clears the cache.
    async fn release(&self, session: &mut Session<P>) {
        if let Some(watcher) = session.watcher.take() {
            watcher.cancel();
        }
        if let Some(subscription) = session.subscription.take() {
            subscription.cancel();
        }

        session.characteristic = None;
        session.service = None;
        if let Some(device) = session.device.take() {
            if let Err(e) = with_timeout(self.operation_timeout, self.platform.close_device(&device)).await {
                warn!("Failed to release device: {}", e);
            }
        }

        session.cache.clear();
        session.device_id = None;
        session.device_name = None;
        self.transition(session, SessionState::Idle);
    }

    /// Publishes a platform-reported reconnect, unless the session it belongs to is gone.
    async fn connection_restored(&self, epoch: u64, name: &str) {
        let session = self.session.lock().await;
        if session.epoch != epoch || session.state == SessionState::Idle {
            debug!("Ignoring connection status of a closed session");
            return;
        }
        self.publish_status(ConnectionStatus::connected(name));
    }

    async fn connection_lost(&self, epoch: u64) {
        let mut session = self.session.lock().await;
        if session.epoch != epoch || session.state == SessionState::Idle {
            debug!("Ignoring connection loss of a closed session");
            return;
        }
        self.teardown(&mut session).await;
    }

    fn publish_status(&self, status: ConnectionStatus) {
        debug!("Connection status: {:?}", status);
        self.status.send_replace(status.clone());
        self.status_events.emit(&status);
    }

    fn transition(&self, session: &mut Session<P>, state: SessionState) {
        debug!("Session state {:?} -> {:?}", session.state, state);
        session.state = state;
    }
}

async fn watch_status<P: GattPlatform>(
    monitor: Weak<MonitorInner<P>>,
    mut events: ConnectionStream,
    cancel_token: CancellationToken,
    epoch: u64,
    name: String,
) {
    loop {
        let is_connected = tokio::select! {
            biased;
            _ = cancel_token.cancelled() => break,
            event = events.next() => match event {
                Some(is_connected) => is_connected,
                None => break,
            },
        };
        let Some(inner) = monitor.upgrade() else {
            break;
        };

        if is_connected {
            inner.connection_restored(epoch, &name).await;
        } else {
            info!("Connection to {} lost", name);
            inner.connection_lost(epoch).await;
            break;
        }
    }
    debug!("Connection watcher for {} stopped", name);
}
