//! bluest implementation of the platform primitives
//! This module resolves devices through the default adapter and forwards bluest
//! notification and connection event streams to the heart rate core.

use std::collections::HashMap;
use std::sync::LazyLock;
use std::time::Duration;

use async_trait::async_trait;
use bluest::{Adapter, Characteristic, ConnectionEvent, Device, Service, Uuid};
use futures_util::{StreamExt, pin_mut};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use regex::Regex;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::core::bluetooth::platform::{
    CacheMode, ConnectionStream, GattPlatform, NotificationStream, receiver_stream, spawn_subscribed,
};
use crate::error::PlatformError;

static MAC_ADDRESS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([0-9A-Fa-f]{2}[:-]){5}([0-9A-Fa-f]{2})").expect("valid MAC address pattern"));

/// GATT client backed by the system Bluetooth adapter
pub struct BluestPlatform {
    adapter: Adapter,
    scan_timeout: Duration,
    /// Forwarder tasks of the active notification subscriptions, by characteristic UUID
    subscriptions: Mutex<HashMap<Uuid, CancellationToken>>,
}

impl BluestPlatform {
    /// Opens the default adapter and waits until it is available.
    pub async fn new(scan_timeout: Duration) -> Result<Self, PlatformError> {
        let adapter = Adapter::default().await.ok_or(PlatformError::NoAdapter)?;
        adapter.wait_available().await?;
        info!("Bluetooth adapter is available.");

        Ok(Self {
            adapter,
            scan_timeout,
            subscriptions: Mutex::new(HashMap::new()),
        })
    }

    async fn find_device(&self, device_id: &str) -> Result<Option<Device>, PlatformError> {
        // find connected device first
        for device in self.adapter.connected_devices().await? {
            if Self::matches_id(&device, device_id) {
                return Ok(Some(device));
            }
        }

        info!("Scanning for {} for up to {:?}", device_id, self.scan_timeout);
        let mut scan_stream = self.adapter.scan(&[]).await?;
        let found = tokio::time::timeout(self.scan_timeout, async {
            while let Some(discovered_device) = scan_stream.next().await {
                debug!("Found device - Device: {:?}, RSSI: {:?}", discovered_device.device, discovered_device.rssi);
                if Self::matches_id(&discovered_device.device, device_id) {
                    return Some(discovered_device.device);
                }
            }
            None
        })
        .await
        .unwrap_or(None);

        Ok(found)
    }

    /// A device matches when its platform id is the identifier, or when the MAC address
    /// embedded in the id is.
    fn matches_id(device: &Device, device_id: &str) -> bool {
        let id = device.id().to_string();
        id.eq_ignore_ascii_case(device_id)
            || extract_mac_address(&id).is_some_and(|mac| mac.eq_ignore_ascii_case(device_id))
    }
}

fn extract_mac_address(device_id: &str) -> Option<String> {
    MAC_ADDRESS.find_iter(device_id).last().map(|m| m.as_str().to_uppercase())
}

#[async_trait]
impl GattPlatform for BluestPlatform {
    type Device = Device;
    type Service = Service;
    type Characteristic = Characteristic;

    async fn resolve_device(&self, device_id: &str) -> Option<Device> {
        match self.find_device(device_id).await {
            Ok(device) => device,
            Err(e) => {
                error!("Failed to look up device {}: {}", device_id, e);
                None
            }
        }
    }

    async fn is_paired(&self, device: &Device) -> bool {
        device.is_paired().await.unwrap_or_else(|e| {
            warn!("Failed to read pairing state of {}: {}", device.id(), e);
            false
        })
    }

    fn device_name(&self, device: &Device) -> Option<String> {
        device.name().ok()
    }

    async fn is_connected(&self, device: &Device) -> bool {
        device.is_connected().await
    }

    async fn watch_connection(&self, device: &Device) -> Result<ConnectionStream, PlatformError> {
        let adapter = self.adapter.clone();
        let device = device.clone();
        let (tx, rx) = mpsc::unbounded_channel();

        // Returns only once the event subscription exists, so nothing raised by later I/O is missed.
        spawn_subscribed(|ready| async move {
            let events = match adapter.device_connection_events(&device).await {
                Ok(events) => {
                    let _ = ready.send(Ok(()));
                    events
                }
                Err(e) => {
                    let _ = ready.send(Err(PlatformError::from(e)));
                    return;
                }
            };
            pin_mut!(events);

            loop {
                tokio::select! {
                    _ = tx.closed() => break,
                    event = events.next() => match event {
                        Some(event) => {
                            let is_connected = matches!(event, ConnectionEvent::Connected);
                            if tx.send(is_connected).is_err() {
                                break;
                            }
                        }
                        None => break,
                    },
                }
            }
            debug!("Connection watcher for {} stopped", device.id());
        })
        .await?;

        Ok(receiver_stream(rx))
    }

    async fn discover_services(&self, device: &Device, mode: CacheMode) -> Result<Vec<Service>, PlatformError> {
        if !device.is_connected().await {
            info!("Initiating connection to {}...", device.id());
            self.adapter.connect_device(device).await?;
        }

        let services = match mode {
            CacheMode::Uncached => device.discover_services().await?,
            CacheMode::Cached => device.services().await?,
        };
        Ok(services)
    }

    fn service_uuid(&self, service: &Service) -> Uuid {
        service.uuid()
    }

    async fn discover_characteristics(
        &self,
        service: &Service,
        mode: CacheMode,
    ) -> Result<Vec<Characteristic>, PlatformError> {
        let characteristics = match mode {
            CacheMode::Uncached => service.discover_characteristics().await?,
            CacheMode::Cached => service.characteristics().await?,
        };
        Ok(characteristics)
    }

    fn characteristic_uuid(&self, characteristic: &Characteristic) -> Uuid {
        characteristic.uuid()
    }

    async fn discover_descriptors(
        &self,
        characteristic: &Characteristic,
        mode: CacheMode,
    ) -> Result<usize, PlatformError> {
        let descriptors = match mode {
            CacheMode::Uncached => characteristic.discover_descriptors().await?,
            CacheMode::Cached => characteristic.descriptors().await?,
        };
        Ok(descriptors.len())
    }

    async fn supports_notify(&self, characteristic: &Characteristic) -> bool {
        match characteristic.properties().await {
            Ok(properties) => properties.notify,
            Err(e) => {
                warn!("Failed to read properties of {}: {}", characteristic.uuid(), e);
                false
            }
        }
    }

    async fn enable_notifications(&self, characteristic: &Characteristic) -> Result<NotificationStream, PlatformError> {
        let uuid = characteristic.uuid();
        let characteristic = characteristic.clone();
        let (tx, rx) = mpsc::unbounded_channel();
        let token = CancellationToken::new();
        let task_token = token.clone();

        // bluest keeps the subscription alive for as long as its stream exists.
        spawn_subscribed(|ready| async move {
            let notifications = match characteristic.notify().await {
                Ok(notifications) => {
                    let _ = ready.send(Ok(()));
                    notifications
                }
                Err(e) => {
                    let _ = ready.send(Err(PlatformError::from(e)));
                    return;
                }
            };
            pin_mut!(notifications);

            loop {
                tokio::select! {
                    _ = task_token.cancelled() => break,
                    value = notifications.next() => match value {
                        Some(Ok(value)) => {
                            if tx.send(value).is_err() {
                                break;
                            }
                        }
                        Some(Err(e)) => error!("Error in notification stream: {}", e),
                        None => break,
                    },
                }
            }
            debug!("Notification forwarder for {} stopped", characteristic.uuid());
        })
        .await?;

        if let Some(previous) = self.subscriptions.lock().insert(uuid, token) {
            previous.cancel();
        }
        Ok(receiver_stream(rx))
    }

    async fn disable_notifications(&self, characteristic: &Characteristic) -> Result<(), PlatformError> {
        match self.subscriptions.lock().remove(&characteristic.uuid()) {
            Some(token) => {
                token.cancel();
                Ok(())
            }
            None => Err(PlatformError::Bluetooth(format!(
                "no active notification subscription for {}",
                characteristic.uuid()
            ))),
        }
    }

    async fn read_value(&self, characteristic: &Characteristic) -> Result<Vec<u8>, PlatformError> {
        Ok(characteristic.read().await?)
    }

    async fn close_device(&self, device: &Device) -> Result<(), PlatformError> {
        if device.is_connected().await {
            info!("Disconnecting from device {}", device.id());
            self.adapter.disconnect_device(device).await?;
        } else {
            info!("Device {} not connected", device.id());
        }
        Ok(())
    }
}
