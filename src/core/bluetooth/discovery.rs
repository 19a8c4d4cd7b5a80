//! Characteristic discovery with local recovery from transport failures.

use std::time::Duration;

use log::{debug, warn};

use crate::core::bluetooth::cache::AttributeDescriptor;
use crate::core::bluetooth::constants::attribute_name;
use crate::core::bluetooth::platform::{CacheMode, GattPlatform, with_timeout};

/// Named characteristic of a platform `P`.
pub type CharacteristicAttribute<P> =
    AttributeDescriptor<<P as GattPlatform>::Service, <P as GattPlatform>::Characteristic>;

/// Enumerates the characteristics of `service` without using the platform cache.
///
/// This is the one place where a discovery failure or timeout becomes an empty list,
/// so callers only ever see "characteristic not found".
pub async fn discover_characteristic_attributes<P: GattPlatform>(
    platform: &P,
    service: &P::Service,
    timeout: Option<Duration>,
) -> Vec<CharacteristicAttribute<P>> {
    let service_uuid = platform.service_uuid(service);
    let characteristics =
        match with_timeout(timeout, platform.discover_characteristics(service, CacheMode::Uncached)).await {
            Ok(characteristics) => characteristics,
            Err(e) => {
                warn!("Characteristic discovery failed for service {}, treating it as empty: {}", service_uuid, e);
                Vec::new()
            }
        };

    debug!("Service {} has {} characteristics", service_uuid, characteristics.len());
    characteristics
        .into_iter()
        .map(|characteristic| {
            let uuid = platform.characteristic_uuid(&characteristic);
            AttributeDescriptor::characteristic(attribute_name(uuid), uuid, characteristic)
        })
        .collect()
}
