#![cfg_attr(not(test), no_std)]
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

//! Records a scale node puts on the wire.
//!
//! The field names and units of [`HiveReport`] are the external contract with the collector.
//! Any change to them must come with a bump of [`PAYLOAD_VERSION`].

use core::fmt::Write;
use heapless::String;
use serde::{Deserialize, Serialize};

pub mod discovery;

/// Version marker carried in every report as `v`.
pub const PAYLOAD_VERSION: u8 = 1;

/// Topic root the collector subscribes under (`beehive/#`).
pub const DEFAULT_TOPIC_ROOT: &str = "beehive";

pub const MAX_TOPIC_LEN: usize = 96;

/// Holds a report with a 32 character device id and every value present.
pub const MAX_REPORT_LEN: usize = 256;

pub type Topic = String<MAX_TOPIC_LEN>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum MessageError {
    /// The output buffer cannot hold the encoded record
    BufferTooSmall,
    /// The record could not be serialised
    EncodingError,
    DecodingError,
    /// The record carries a payload version this build does not understand
    UnsupportedVersion(u8),
    TopicTooLong,
}

impl core::fmt::Display for MessageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            MessageError::BufferTooSmall => write!(f, "buffer too small for record"),
            MessageError::EncodingError => write!(f, "record encoding failed"),
            MessageError::DecodingError => write!(f, "record decoding failed"),
            MessageError::UnsupportedVersion(v) => write!(f, "unsupported payload version {}", v),
            MessageError::TopicTooLong => write!(f, "topic exceeds {} bytes", MAX_TOPIC_LEN),
        }
    }
}

/// One reading from one hive. `None` values were unavailable on the node and encode as `null`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HiveReport<'a> {
    pub v: u8,
    pub device_id: &'a str,
    pub weight_kg: f32,
    pub temperature_c: Option<f32>,
    pub humidity_pct: Option<f32>,
    pub battery_pct: Option<f32>,
}

impl<'a> HiveReport<'a> {
    pub fn new(
        device_id: &'a str,
        weight_kg: f32,
        temperature_c: Option<f32>,
        humidity_pct: Option<f32>,
        battery_pct: Option<f32>,
    ) -> Self {
        Self {
            v: PAYLOAD_VERSION,
            device_id,
            weight_kg,
            temperature_c,
            humidity_pct,
            battery_pct,
        }
    }
}

/// Serialise a report as a JSON object into `buffer`.
///
/// Returns the number of bytes written.
pub fn encode_report(report: &HiveReport<'_>, buffer: &mut [u8]) -> Result<usize, MessageError> {
    serde_json_core::to_slice(report, buffer).map_err(|e| match e {
        serde_json_core::ser::Error::BufferFull => MessageError::BufferTooSmall,
        #[allow(unreachable_patterns)]
        _ => MessageError::EncodingError,
    })
}

/// Parse a report previously produced by [`encode_report`].
///
/// # Errors
///
/// - `DecodingError`: the bytes are not a report object
/// - `UnsupportedVersion`: the report was written by a newer or older contract
pub fn decode_report(bytes: &[u8]) -> Result<HiveReport<'_>, MessageError> {
    let (report, _consumed): (HiveReport<'_>, usize) =
        serde_json_core::from_slice(bytes).map_err(|_| MessageError::DecodingError)?;

    if report.v != PAYLOAD_VERSION {
        return Err(MessageError::UnsupportedVersion(report.v));
    }
    Ok(report)
}

/// Topic a node publishes its reports on: `<root>/<device_id>`.
pub fn state_topic(root: &str, device_id: &str) -> Result<Topic, MessageError> {
    let mut topic = Topic::new();
    write!(topic, "{}/{}", root, device_id).map_err(|_| MessageError::TopicTooLong)?;
    Ok(topic)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn report_survives_the_wire() {
        let report = HiveReport::new("hive01", 42.375, Some(21.5), Some(63.2), Some(55.0));
        let mut buffer = [0u8; MAX_REPORT_LEN];

        let len = encode_report(&report, &mut buffer).unwrap();
        let decoded = decode_report(&buffer[..len]).unwrap();

        assert_eq!(decoded.device_id, "hive01");
        assert_eq!(decoded.v, PAYLOAD_VERSION);
        assert!(close(decoded.weight_kg, 42.375));
        assert!(close(decoded.temperature_c.unwrap(), 21.5));
        assert!(close(decoded.humidity_pct.unwrap(), 63.2));
        assert!(close(decoded.battery_pct.unwrap(), 55.0));
    }

    #[test]
    fn unavailable_values_are_null() {
        let report = HiveReport::new("hive01", 1.0, None, None, Some(80.0));
        let mut buffer = [0u8; MAX_REPORT_LEN];

        let len = encode_report(&report, &mut buffer).unwrap();
        let text = core::str::from_utf8(&buffer[..len]).unwrap();

        assert!(text.contains("\"temperature_c\":null"));
        assert!(text.contains("\"humidity_pct\":null"));
        assert!(text.contains("\"device_id\":\"hive01\""));

        let decoded = decode_report(&buffer[..len]).unwrap();
        assert_eq!(decoded.temperature_c, None);
        assert_eq!(decoded.humidity_pct, None);
    }

    #[test]
    fn small_buffer_is_reported() {
        let report = HiveReport::new("hive01", 1.0, None, None, None);
        let mut buffer = [0u8; 8];
        assert_eq!(
            encode_report(&report, &mut buffer),
            Err(MessageError::BufferTooSmall)
        );
    }

    #[test]
    fn other_versions_are_rejected() {
        let json = br#"{"v":2,"device_id":"hive01","weight_kg":1.0,"temperature_c":null,"humidity_pct":null,"battery_pct":null}"#;
        assert_eq!(decode_report(json), Err(MessageError::UnsupportedVersion(2)));
    }

    #[test]
    fn garbage_does_not_decode() {
        assert_eq!(decode_report(b"weight=12"), Err(MessageError::DecodingError));
    }

    #[test]
    fn state_topic_is_rooted_per_device() {
        let topic = state_topic(DEFAULT_TOPIC_ROOT, "hive-001").unwrap();
        assert_eq!(topic.as_str(), "beehive/hive-001");
    }

    #[test]
    fn overlong_topic_is_refused() {
        let long_id = "x".repeat(MAX_TOPIC_LEN);
        assert_eq!(
            state_topic(DEFAULT_TOPIC_ROOT, &long_id),
            Err(MessageError::TopicTooLong)
        );
    }
}
