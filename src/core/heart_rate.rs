//! Heart rate measurement parsing
//! This module decodes the payload of Heart Rate Measurement (0x2A37) notifications.

use serde::{Deserialize, Serialize};

use crate::error::HeartRateError;

/// Flags byte at the start of every measurement frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeasurementFlags(u8);

impl MeasurementFlags {
    /// Heart rate value is a little-endian u16 instead of a u8.
    pub const VALUE_U16: u8 = 0x01;
    /// Sensor contact is detected.
    pub const SENSOR_CONTACT: u8 = 0x02;
    /// Sensor contact feature is supported.
    pub const SENSOR_CONTACT_SUPPORTED: u8 = 0x04;
    /// Energy expended field is present.
    pub const ENERGY_EXPENDED: u8 = 0x08;
    /// One or more RR-interval fields are present.
    pub const RR_INTERVALS: u8 = 0x10;

    pub fn new(bits: u8) -> Self {
        Self(bits)
    }

    pub fn bits(&self) -> u8 {
        self.0
    }

    pub fn is_u16(&self) -> bool {
        self.0 & Self::VALUE_U16 != 0
    }

    /// Whether the sensor has skin contact, or `None` when it cannot tell.
    pub fn sensor_contact(&self) -> Option<bool> {
        (self.0 & Self::SENSOR_CONTACT_SUPPORTED != 0).then_some(self.0 & Self::SENSOR_CONTACT != 0)
    }

    pub fn has_energy_expended(&self) -> bool {
        self.0 & Self::ENERGY_EXPENDED != 0
    }

    pub fn has_rr_intervals(&self) -> bool {
        self.0 & Self::RR_INTERVALS != 0
    }

    /// Number of bytes the frame needs to carry the heart rate value.
    fn required_len(&self) -> usize {
        if self.is_u16() { 3 } else { 2 }
    }
}

/// A single decoded heart rate reading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartRateReading {
    pub beats_per_minute: u16,
}

/// Decodes a raw Heart Rate Measurement payload.
///
/// Only the heart rate value is extracted. Sensor contact, energy expended and
/// RR-interval fields that follow it are left uninterpreted.
pub fn parse_heart_rate_measurement(data: &[u8]) -> Result<HeartRateReading, HeartRateError> {
    let Some(&flags) = data.first() else {
        return Err(HeartRateError::InvalidFrame { expected: 2, actual: 0 });
    };
    let flags = MeasurementFlags::new(flags);

    let expected = flags.required_len();
    if data.len() < expected {
        return Err(HeartRateError::InvalidFrame { expected, actual: data.len() });
    }

    let beats_per_minute = if flags.is_u16() {
        u16::from_le_bytes([data[1], data[2]])
    } else {
        u16::from(data[1])
    };

    Ok(HeartRateReading { beats_per_minute })
}
