//! Constants used throughout the Bluetooth core
//! This module contains the standard GATT UUIDs, the names used to index
//! discovered attributes, and default timeouts.

use uuid::Uuid;

/// Name reported for a device that does not expose one
pub const UNKNOWN_DEVICE_NAME: &str = "Unknown";

/// Standard Bluetooth Service UUIDs
pub const UUID_GENERIC_ACCESS_SERVICE: Uuid = Uuid::from_u128(0x00001800_0000_1000_8000_00805f9b34fb);
pub const UUID_GENERIC_ATTRIBUTE_SERVICE: Uuid = Uuid::from_u128(0x00001801_0000_1000_8000_00805f9b34fb);
pub const UUID_DEVICE_INFORMATION_SERVICE: Uuid = Uuid::from_u128(0x0000180a_0000_1000_8000_00805f9b34fb);
pub const UUID_HEART_RATE_SERVICE: Uuid = Uuid::from_u128(0x0000180d_0000_1000_8000_00805f9b34fb);
pub const UUID_BATTERY_SERVICE: Uuid = Uuid::from_u128(0x0000180f_0000_1000_8000_00805f9b34fb);

/// Standard Bluetooth Characteristic UUIDs
pub const UUID_DEVICE_NAME: Uuid = Uuid::from_u128(0x00002a00_0000_1000_8000_00805f9b34fb);
pub const UUID_BATTERY_LEVEL: Uuid = Uuid::from_u128(0x00002a19_0000_1000_8000_00805f9b34fb);
pub const UUID_SYSTEM_ID: Uuid = Uuid::from_u128(0x00002a23_0000_1000_8000_00805f9b34fb);
pub const UUID_MODEL_NUMBER: Uuid = Uuid::from_u128(0x00002a24_0000_1000_8000_00805f9b34fb);
pub const UUID_SERIAL_NUMBER: Uuid = Uuid::from_u128(0x00002a25_0000_1000_8000_00805f9b34fb);
pub const UUID_FIRMWARE_REVISION: Uuid = Uuid::from_u128(0x00002a26_0000_1000_8000_00805f9b34fb);
pub const UUID_HARDWARE_REVISION: Uuid = Uuid::from_u128(0x00002a27_0000_1000_8000_00805f9b34fb);
pub const UUID_SOFTWARE_REVISION: Uuid = Uuid::from_u128(0x00002a28_0000_1000_8000_00805f9b34fb);
pub const UUID_MANUFACTURER_NAME: Uuid = Uuid::from_u128(0x00002a29_0000_1000_8000_00805f9b34fb);
pub const UUID_HEART_RATE_MEASUREMENT: Uuid = Uuid::from_u128(0x00002a37_0000_1000_8000_00805f9b34fb);
pub const UUID_BODY_SENSOR_LOCATION: Uuid = Uuid::from_u128(0x00002a38_0000_1000_8000_00805f9b34fb);
pub const UUID_HEART_RATE_CONTROL_POINT: Uuid = Uuid::from_u128(0x00002a39_0000_1000_8000_00805f9b34fb);

/// Attribute names used as cache keys
pub const HEART_RATE_SERVICE: &str = "HeartRate";
pub const HEART_RATE_MEASUREMENT: &str = "HeartRateMeasurement";
pub const DEVICE_INFORMATION_SERVICE: &str = "DeviceInformation";
pub const BATTERY_SERVICE: &str = "Battery";
pub const BATTERY_LEVEL: &str = "BatteryLevel";
pub const FIRMWARE_REVISION: &str = "FirmwareRevisionString";
pub const HARDWARE_REVISION: &str = "HardwareRevisionString";
pub const MANUFACTURER_NAME: &str = "ManufacturerNameString";
pub const SERIAL_NUMBER: &str = "SerialNumberString";
pub const MODEL_NUMBER: &str = "ModelNumberString";

const KNOWN_ATTRIBUTES: &[(Uuid, &str)] = &[
    (UUID_GENERIC_ACCESS_SERVICE, "GenericAccess"),
    (UUID_GENERIC_ATTRIBUTE_SERVICE, "GenericAttribute"),
    (UUID_DEVICE_INFORMATION_SERVICE, DEVICE_INFORMATION_SERVICE),
    (UUID_HEART_RATE_SERVICE, HEART_RATE_SERVICE),
    (UUID_BATTERY_SERVICE, BATTERY_SERVICE),
    (UUID_DEVICE_NAME, "DeviceName"),
    (UUID_BATTERY_LEVEL, BATTERY_LEVEL),
    (UUID_SYSTEM_ID, "SystemId"),
    (UUID_MODEL_NUMBER, MODEL_NUMBER),
    (UUID_SERIAL_NUMBER, SERIAL_NUMBER),
    (UUID_FIRMWARE_REVISION, FIRMWARE_REVISION),
    (UUID_HARDWARE_REVISION, HARDWARE_REVISION),
    (UUID_SOFTWARE_REVISION, "SoftwareRevisionString"),
    (UUID_MANUFACTURER_NAME, MANUFACTURER_NAME),
    (UUID_HEART_RATE_MEASUREMENT, HEART_RATE_MEASUREMENT),
    (UUID_BODY_SENSOR_LOCATION, "BodySensorLocation"),
    (UUID_HEART_RATE_CONTROL_POINT, "HeartRateControlPoint"),
];

/// Returns the human-readable name of a GATT attribute.
/// Attributes without an assigned name are named by their UUID.
pub fn attribute_name(uuid: Uuid) -> String {
    KNOWN_ATTRIBUTES
        .iter()
        .find(|(known, _)| *known == uuid)
        .map(|(_, name)| name.to_string())
        .unwrap_or_else(|| uuid.to_string())
}

/// Timeout for Bluetooth operations in seconds
pub const BLUETOOTH_OPERATION_TIMEOUT_SECS: u64 = 10;

/// Scan duration used to resolve a device identifier, in seconds
pub const DEFAULT_SCAN_DURATION_SECS: u64 = 5;

/// Maximum number of connection retries
pub const MAX_CONNECT_RETRIES: u32 = 3;

/// Delay between connection retries in milliseconds
pub const CONNECT_RETRY_DELAY_MS: u64 = 1000;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_standard_attributes() {
        assert_eq!(attribute_name(UUID_HEART_RATE_SERVICE), "HeartRate");
        assert_eq!(attribute_name(UUID_HEART_RATE_MEASUREMENT), "HeartRateMeasurement");
        assert_eq!(attribute_name(UUID_BATTERY_LEVEL), "BatteryLevel");
        assert_eq!(attribute_name(UUID_FIRMWARE_REVISION), "FirmwareRevisionString");
    }

    #[test]
    fn names_unknown_attributes_by_uuid() {
        let vendor = Uuid::from_u128(0x4f63756c_7573_2054_6872_65656d6f7465);
        assert_eq!(attribute_name(vendor), "4f63756c-7573-2054-6872-65656d6f7465");
    }
}
