//! Core functionality for the heart rate monitor
//! This module contains the measurement decoder and the Bluetooth session that feeds it.

pub mod bluetooth;
pub mod heart_rate;

// Re-export commonly used types
pub use bluetooth::{BluestPlatform, GattPlatform, HeartRateMonitor};
pub use heart_rate::{HeartRateReading, MeasurementFlags, parse_heart_rate_measurement};
