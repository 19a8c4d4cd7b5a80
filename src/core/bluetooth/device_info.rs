//! Best-effort reads of device metadata.

use std::time::Duration;

use log::debug;

use crate::core::bluetooth::constants::{
    BATTERY_LEVEL, FIRMWARE_REVISION, HARDWARE_REVISION, MANUFACTURER_NAME, MODEL_NUMBER, SERIAL_NUMBER,
};
use crate::core::bluetooth::discovery::{CharacteristicAttribute, discover_characteristic_attributes};
use crate::core::bluetooth::platform::{GattPlatform, with_timeout};
use crate::core::bluetooth::types::DeviceInfo;

/// Reads Device Information and Battery characteristics of a connected device.
///
/// Every field is read independently. A missing service, missing characteristic or
/// failed read leaves that one field empty.
pub struct DeviceInfoReader<'a, P: GattPlatform> {
    platform: &'a P,
    timeout: Option<Duration>,
}

impl<'a, P: GattPlatform> DeviceInfoReader<'a, P> {
    pub fn new(platform: &'a P, timeout: Option<Duration>) -> Self {
        Self { platform, timeout }
    }

    pub async fn read(&self, device_information: Option<&P::Service>, battery: Option<&P::Service>) -> DeviceInfo {
        let info = self.characteristics(device_information).await;
        let battery = self.characteristics(battery).await;

        DeviceInfo {
            firmware: self.read_string(&info, FIRMWARE_REVISION).await,
            hardware: self.read_string(&info, HARDWARE_REVISION).await,
            manufacturer: self.read_string(&info, MANUFACTURER_NAME).await,
            serial_number: self.read_string(&info, SERIAL_NUMBER).await,
            model_number: self.read_string(&info, MODEL_NUMBER).await,
            battery_percent: self
                .read_value(&battery, BATTERY_LEVEL)
                .await
                .and_then(|value| value.first().copied())
                .unwrap_or(0),
            ..DeviceInfo::default()
        }
    }

    async fn characteristics(&self, service: Option<&P::Service>) -> Vec<CharacteristicAttribute<P>> {
        match service {
            Some(service) => discover_characteristic_attributes(self.platform, service, self.timeout).await,
            None => Vec::new(),
        }
    }

    async fn read_value(&self, characteristics: &[CharacteristicAttribute<P>], name: &str) -> Option<Vec<u8>> {
        let characteristic = characteristics
            .iter()
            .find(|attribute| attribute.name() == name)
            .and_then(|attribute| attribute.as_characteristic())?;

        match with_timeout(self.timeout, self.platform.read_value(characteristic)).await {
            Ok(value) => Some(value),
            Err(e) => {
                debug!("Failed to read {}: {}", name, e);
                None
            }
        }
    }

    async fn read_string(&self, characteristics: &[CharacteristicAttribute<P>], name: &str) -> String {
        self.read_value(characteristics, name)
            .await
            .map(|value| decode_string(&value))
            .unwrap_or_default()
    }
}

/// Decodes a GATT UTF-8 string value, dropping NUL padding.
pub fn decode_string(value: &[u8]) -> String {
    String::from_utf8_lossy(value).trim_end_matches('\0').trim().to_string()
}
