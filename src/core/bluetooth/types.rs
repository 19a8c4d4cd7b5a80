//! Defines shared data structures for the Bluetooth module.

use serde::Serialize;

use crate::error::HeartRateError;

/// Connection status delivered to status observers
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConnectionStatus {
    /// Whether the peripheral is currently connected
    pub is_connected: bool,
    /// The name of the device, if known
    pub name: Option<String>,
}

impl ConnectionStatus {
    pub fn connected(name: impl Into<String>) -> Self {
        Self { is_connected: true, name: Some(name.into()) }
    }

    pub fn disconnected() -> Self {
        Self::default()
    }
}

/// Terminal outcome of a connect attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionResult {
    /// Subscribed to heart rate notifications of the named device
    Connected { name: String },
    /// The connect sequence stopped at the given failure
    Failed(HeartRateError),
}

impl ConnectionResult {
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected { .. })
    }

    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Connected { name } => Some(name),
            Self::Failed(_) => None,
        }
    }

    /// Human-readable failure, suitable for showing to the user verbatim
    pub fn error_message(&self) -> Option<String> {
        match self {
            Self::Connected { .. } => None,
            Self::Failed(e) => Some(e.to_string()),
        }
    }

    pub fn into_result(self) -> Result<String, HeartRateError> {
        match self {
            Self::Connected { name } => Ok(name),
            Self::Failed(e) => Err(e),
        }
    }
}

/// Stage reached by the connection session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub enum SessionState {
    #[default]
    Idle,
    DeviceAcquired,
    ServicesDiscovered,
    CharacteristicReady,
    Subscribed,
}

/// Metadata read from the Device Information and Battery services.
/// Fields stay empty (or zero) when the device does not expose them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeviceInfo {
    pub device_id: String,
    pub name: String,
    pub firmware: String,
    pub hardware: String,
    pub manufacturer: String,
    pub serial_number: String,
    pub model_number: String,
    pub battery_percent: u8,
}
