//! Platform BLE primitives consumed by the heart rate core
//! The session drives everything through [`GattPlatform`], so any GATT stack
//! (or a scripted one in tests) can sit underneath it.

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{self, BoxStream, StreamExt};
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use crate::error::PlatformError;

/// Raw value-changed payloads of a subscribed characteristic.
pub type NotificationStream = BoxStream<'static, Vec<u8>>;

/// Connectivity transitions of a device (`true` when connected).
pub type ConnectionStream = BoxStream<'static, bool>;

/// Whether the platform may answer discovery from its attribute cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMode {
    Cached,
    Uncached,
}

/// GATT client primitives supplied by the underlying Bluetooth stack.
#[async_trait]
pub trait GattPlatform: Send + Sync + 'static {
    type Device: Clone + Send + Sync + 'static;
    type Service: Clone + Send + Sync + 'static;
    type Characteristic: Clone + Send + Sync + 'static;

    /// Resolves an opaque device identifier to a peripheral handle.
    async fn resolve_device(&self, device_id: &str) -> Option<Self::Device>;

    async fn is_paired(&self, device: &Self::Device) -> bool;

    fn device_name(&self, device: &Self::Device) -> Option<String>;

    async fn is_connected(&self, device: &Self::Device) -> bool;

    /// Starts delivering connection status changes for `device`.
    async fn watch_connection(&self, device: &Self::Device) -> Result<ConnectionStream, PlatformError>;

    async fn discover_services(
        &self,
        device: &Self::Device,
        mode: CacheMode,
    ) -> Result<Vec<Self::Service>, PlatformError>;

    fn service_uuid(&self, service: &Self::Service) -> Uuid;

    async fn discover_characteristics(
        &self,
        service: &Self::Service,
        mode: CacheMode,
    ) -> Result<Vec<Self::Characteristic>, PlatformError>;

    fn characteristic_uuid(&self, characteristic: &Self::Characteristic) -> Uuid;

    /// Enumerates the descriptors of a characteristic and returns how many were found.
    async fn discover_descriptors(
        &self,
        characteristic: &Self::Characteristic,
        mode: CacheMode,
    ) -> Result<usize, PlatformError>;

    async fn supports_notify(&self, characteristic: &Self::Characteristic) -> bool;

    /// Writes `Notify` to the client characteristic configuration descriptor.
    /// The returned stream yields every value-changed payload until notifications are disabled.
    async fn enable_notifications(
        &self,
        characteristic: &Self::Characteristic,
    ) -> Result<NotificationStream, PlatformError>;

    /// Writes `None` to the client characteristic configuration descriptor.
    async fn disable_notifications(&self, characteristic: &Self::Characteristic) -> Result<(), PlatformError>;

    async fn read_value(&self, characteristic: &Self::Characteristic) -> Result<Vec<u8>, PlatformError>;

    /// Releases the platform's hold on the device.
    async fn close_device(&self, device: &Self::Device) -> Result<(), PlatformError>;
}

/// Runs a suspending platform step, failing with [`PlatformError::Timeout`] once `limit` elapses.
/// No limit means the step is awaited for as long as the platform takes.
pub async fn with_timeout<T, F>(limit: Option<Duration>, step: F) -> Result<T, PlatformError>
where
    F: Future<Output = Result<T, PlatformError>>,
{
    match limit {
        Some(limit) => tokio::time::timeout(limit, step)
            .await
            .map_err(|_| PlatformError::Timeout(limit))?,
        None => step.await,
    }
}

/// Runs a platform query that cannot fail, bounded by `limit`.
/// Returns `None` once `limit` elapses.
pub async fn query_with_timeout<T, F>(limit: Option<Duration>, query: F) -> Option<T>
where
    F: Future<Output = T>,
{
    with_timeout(limit, async { Ok::<_, PlatformError>(query.await) }).await.ok()
}

/// Spawns a forwarding task and waits until it reports, through the given sender,
/// that its platform subscription exists.
///
/// Events the platform raises after this returns reach the task. A task that ends
/// without reporting counts as a failed subscription.
pub async fn spawn_subscribed<F, Fut>(task: F) -> Result<(), PlatformError>
where
    F: FnOnce(oneshot::Sender<Result<(), PlatformError>>) -> Fut,
    Fut: Future<Output = ()> + Send + 'static,
{
    let (ready_tx, ready_rx) = oneshot::channel();
    tokio::spawn(task(ready_tx));

    match ready_rx.await {
        Ok(result) => result,
        Err(_) => Err(PlatformError::Bluetooth("forwarding task ended before subscribing".to_string())),
    }
}

/// Adapts an mpsc receiver into a `'static` stream.
pub fn receiver_stream<T: Send + 'static>(rx: mpsc::UnboundedReceiver<T>) -> BoxStream<'static, T> {
    stream::unfold(rx, |mut rx| async move { rx.recv().await.map(|item| (item, rx)) }).boxed()
}
