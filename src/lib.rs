//! Heart rate monitor library
//! Connects to a Bluetooth LE heart rate sensor, decodes its measurements and reports
//! connection status and readings to observers.

// Module declarations
pub mod commands;
pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod utils;

pub use crate::core::bluetooth::{
    BluestPlatform, ConnectionResult, ConnectionStatus, DeviceInfo, GattPlatform, HeartRateMonitor, SessionState,
};
pub use crate::core::heart_rate::{HeartRateReading, parse_heart_rate_measurement};
pub use crate::error::{HeartRateError, PlatformError};
