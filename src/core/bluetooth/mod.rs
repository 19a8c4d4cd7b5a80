//! Bluetooth functionality for the heart rate monitor
//! This module handles all bluetooth operations including device lookup,
//! GATT discovery, and receiving measurements from the heart rate sensor.

mod bluest_platform;
mod cache;
mod constants;
mod device_info;
mod discovery;
mod events;
mod monitor;
mod notification;
mod platform;
mod types;

// Re-export types that should be publicly accessible
pub use bluest_platform::BluestPlatform;
pub use cache::{AttributeDescriptor, AttributeKind, GattAttributeCache};
pub use constants::*; // Re-export all constants
pub use device_info::{DeviceInfoReader, decode_string};
pub use discovery::{CharacteristicAttribute, discover_characteristic_attributes};
pub use events::{EventChannel, EventHandler, HandlerId};
pub use monitor::HeartRateMonitor;
pub use notification::spawn_reading_pump;
pub use platform::{CacheMode, ConnectionStream, GattPlatform, NotificationStream, receiver_stream, with_timeout};
pub use types::{ConnectionResult, ConnectionStatus, DeviceInfo, SessionState};
