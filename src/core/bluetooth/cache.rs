//! In-memory index of the GATT attributes discovered during a connect.

use serde::Serialize;
use uuid::Uuid;

/// What kind of GATT object an attribute is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AttributeKind {
    Service,
    Characteristic,
}

/// The platform handle behind an attribute.
#[derive(Debug, Clone)]
pub enum NativeHandle<S, C> {
    Service(S),
    Characteristic(C),
}

/// One discovered GATT object. Immutable once created.
#[derive(Debug, Clone)]
pub struct AttributeDescriptor<S, C> {
    name: String,
    uuid: Uuid,
    handle: NativeHandle<S, C>,
}

impl<S, C> AttributeDescriptor<S, C> {
    pub fn service(name: impl Into<String>, uuid: Uuid, service: S) -> Self {
        Self { name: name.into(), uuid, handle: NativeHandle::Service(service) }
    }

    pub fn characteristic(name: impl Into<String>, uuid: Uuid, characteristic: C) -> Self {
        Self { name: name.into(), uuid, handle: NativeHandle::Characteristic(characteristic) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    pub fn kind(&self) -> AttributeKind {
        match self.handle {
            NativeHandle::Service(_) => AttributeKind::Service,
            NativeHandle::Characteristic(_) => AttributeKind::Characteristic,
        }
    }

    pub fn as_service(&self) -> Option<&S> {
        match &self.handle {
            NativeHandle::Service(service) => Some(service),
            NativeHandle::Characteristic(_) => None,
        }
    }

    pub fn as_characteristic(&self) -> Option<&C> {
        match &self.handle {
            NativeHandle::Characteristic(characteristic) => Some(characteristic),
            NativeHandle::Service(_) => None,
        }
    }
}

/// Attributes keyed by name, in discovery order.
///
/// Lookup is first-match by exact name. Peripherals can expose duplicate names;
/// the attribute discovered first wins.
#[derive(Debug)]
pub struct GattAttributeCache<S, C> {
    attributes: Vec<AttributeDescriptor<S, C>>,
}

impl<S, C> Default for GattAttributeCache<S, C> {
    fn default() -> Self {
        Self { attributes: Vec::new() }
    }
}

impl<S, C> GattAttributeCache<S, C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, attribute: AttributeDescriptor<S, C>) {
        self.attributes.push(attribute);
    }

    pub fn find_by_name(&self, name: &str) -> Option<&AttributeDescriptor<S, C>> {
        self.attributes.iter().find(|attribute| attribute.name == name)
    }

    /// First service registered under `name`.
    pub fn find_service(&self, name: &str) -> Option<&S> {
        self.find_by_name(name).and_then(AttributeDescriptor::as_service)
    }

    /// First characteristic registered under `name`.
    pub fn find_characteristic(&self, name: &str) -> Option<&C> {
        self.find_by_name(name).and_then(AttributeDescriptor::as_characteristic)
    }

    pub fn clear(&mut self) {
        self.attributes.clear();
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.attributes.iter().map(|attribute| attribute.name.clone()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::bluetooth::constants::{UUID_BATTERY_SERVICE, UUID_HEART_RATE_MEASUREMENT, UUID_HEART_RATE_SERVICE};

    type Cache = GattAttributeCache<&'static str, &'static str>;

    #[test]
    fn finds_by_exact_name() {
        let mut cache = Cache::new();
        cache.insert(AttributeDescriptor::service("HeartRate", UUID_HEART_RATE_SERVICE, "hr"));
        cache.insert(AttributeDescriptor::characteristic(
            "HeartRateMeasurement",
            UUID_HEART_RATE_MEASUREMENT,
            "hrm",
        ));

        let service = cache.find_by_name("HeartRate").unwrap();
        assert_eq!(service.kind(), AttributeKind::Service);
        assert_eq!(service.uuid(), UUID_HEART_RATE_SERVICE);
        assert_eq!(cache.find_characteristic("HeartRateMeasurement"), Some(&"hrm"));

        assert!(cache.find_by_name("heartrate").is_none());
        assert!(cache.find_by_name("HeartRate ").is_none());
    }

    #[test]
    fn typed_lookup_skips_other_kind() {
        let mut cache = Cache::new();
        cache.insert(AttributeDescriptor::characteristic("HeartRate", UUID_HEART_RATE_MEASUREMENT, "odd"));

        assert_eq!(cache.find_service("HeartRate"), None);
        assert_eq!(cache.find_characteristic("HeartRate"), Some(&"odd"));
    }

    #[test]
    fn duplicate_names_resolve_to_first_discovered() {
        let mut cache = Cache::new();
        cache.insert(AttributeDescriptor::service("Battery", UUID_BATTERY_SERVICE, "first"));
        cache.insert(AttributeDescriptor::service("Battery", UUID_BATTERY_SERVICE, "second"));

        assert_eq!(cache.find_service("Battery"), Some(&"first"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn clear_empties_cache() {
        let mut cache = Cache::new();
        cache.insert(AttributeDescriptor::service("HeartRate", UUID_HEART_RATE_SERVICE, "hr"));
        assert!(!cache.is_empty());

        cache.clear();
        assert!(cache.is_empty());
        assert!(cache.find_by_name("HeartRate").is_none());
        assert!(cache.names().is_empty());
    }
}
