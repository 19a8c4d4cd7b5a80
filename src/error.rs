//! Error types shared by the heart rate core.

use std::time::Duration;

use thiserror::Error;

/// Failures surfaced by the heart rate monitor.
///
/// The connect sequence never raises these across the session boundary; they are
/// captured into a [`ConnectionResult`](crate::core::ConnectionResult) instead.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HeartRateError {
    #[error("Could not find specified heart rate device")]
    DeviceNotFound,

    #[error("Heart rate device is not paired")]
    NotPaired,

    #[error("Heart rate device is unreachable (i.e. out of range or shutoff)")]
    DeviceUnreachable,

    #[error("Cannot find HeartRate service")]
    ServiceNotFound,

    #[error("Cannot find HeartRateMeasurement characteristic")]
    CharacteristicNotFound,

    #[error("HeartRateMeasurement characteristic does not support notify")]
    NotifyUnsupported,

    #[error("Failed to enable heart rate notifications: {0}")]
    SubscriptionFailed(String),

    #[error("invalid heart rate frame (expected at least {expected} bytes, got {actual})")]
    InvalidFrame { expected: usize, actual: usize },
}

/// Transport-level failures reported by a [`GattPlatform`](crate::core::bluetooth::GattPlatform).
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlatformError {
    #[error("No Bluetooth adapter found")]
    NoAdapter,

    #[error("bluetooth error: {0}")]
    Bluetooth(String),

    #[error("operation timed out after {0:?}")]
    Timeout(Duration),
}

impl From<bluest::Error> for PlatformError {
    fn from(e: bluest::Error) -> Self {
        PlatformError::Bluetooth(e.to_string())
    }
}
