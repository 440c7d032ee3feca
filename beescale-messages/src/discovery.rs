// Copyright (C) 2025 Paul Hampson
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License version 3 as  published by the
// Free Software Foundation.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE.  See the GNU General Public License for more
// details.
//
// You should have received a copy of the GNU General Public License along with
// this program.  If not, see <https://www.gnu.org/licenses/>.

//! Home Assistant MQTT discovery documents, one per report field.

use crate::{MessageError, Topic};
use core::fmt::Write;
use heapless::String;
use serde::Serialize;

pub const DEFAULT_DISCOVERY_PREFIX: &str = "homeassistant";

pub const MAX_DISCOVERY_LEN: usize = 512;

/// The report fields announced as separate sensors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReportField {
    Weight,
    Temperature,
    Humidity,
    Battery,
}

impl ReportField {
    pub const ALL: [ReportField; 4] = [
        ReportField::Weight,
        ReportField::Temperature,
        ReportField::Humidity,
        ReportField::Battery,
    ];

    pub fn key(&self) -> &'static str {
        match self {
            ReportField::Weight => "weight",
            ReportField::Temperature => "temperature",
            ReportField::Humidity => "humidity",
            ReportField::Battery => "battery",
        }
    }

    /// Name of the member in [`crate::HiveReport`] carrying this value
    pub fn json_field(&self) -> &'static str {
        match self {
            ReportField::Weight => "weight_kg",
            ReportField::Temperature => "temperature_c",
            ReportField::Humidity => "humidity_pct",
            ReportField::Battery => "battery_pct",
        }
    }

    pub fn unit(&self) -> &'static str {
        match self {
            ReportField::Weight => "kg",
            ReportField::Temperature => "°C",
            ReportField::Humidity => "%",
            ReportField::Battery => "%",
        }
    }

    fn label(&self) -> &'static str {
        match self {
            ReportField::Weight => "Weight",
            ReportField::Temperature => "Temperature",
            ReportField::Humidity => "Humidity",
            ReportField::Battery => "Battery",
        }
    }
}

#[derive(Serialize)]
struct DeviceBlock<'a> {
    identifiers: [&'a str; 1],
    name: &'a str,
    manufacturer: &'a str,
    model: &'a str,
}

#[derive(Serialize)]
struct SensorDiscovery<'a> {
    name: &'a str,
    unique_id: &'a str,
    state_topic: &'a str,
    unit_of_measurement: &'a str,
    device_class: &'a str,
    state_class: &'a str,
    value_template: &'a str,
    device: DeviceBlock<'a>,
}

/// `<prefix>/sensor/<device_id>/<key>/config`
pub fn discovery_topic(
    prefix: &str,
    device_id: &str,
    field: ReportField,
) -> Result<Topic, MessageError> {
    let mut topic = Topic::new();
    write!(topic, "{}/sensor/{}/{}/config", prefix, device_id, field.key())
        .map_err(|_| MessageError::TopicTooLong)?;
    Ok(topic)
}

/// Write the retained config document announcing `field` of `device_id`.
///
/// `state_topic` must be the topic the node's reports go to, the sensor pulls its value out of
/// the report with a template on the field name.
pub fn encode_discovery(
    field: ReportField,
    device_id: &str,
    device_name: &str,
    state_topic: &str,
    buffer: &mut [u8],
) -> Result<usize, MessageError> {
    let mut unique_id: String<64> = String::new();
    write!(unique_id, "{}_{}", device_id, field.key()).map_err(|_| MessageError::EncodingError)?;

    let mut template: String<48> = String::new();
    write!(template, "{{{{ value_json.{} }}}}", field.json_field())
        .map_err(|_| MessageError::EncodingError)?;

    let document = SensorDiscovery {
        name: field.label(),
        unique_id: unique_id.as_str(),
        state_topic,
        unit_of_measurement: field.unit(),
        device_class: field.key(),
        state_class: "measurement",
        value_template: template.as_str(),
        device: DeviceBlock {
            identifiers: [device_id],
            name: device_name,
            manufacturer: "Beescale",
            model: "Hive scale",
        },
    };

    serde_json_core::to_slice(&document, buffer).map_err(|e| match e {
        serde_json_core::ser::Error::BufferFull => MessageError::BufferTooSmall,
        #[allow(unreachable_patterns)]
        _ => MessageError::EncodingError,
    })
}
