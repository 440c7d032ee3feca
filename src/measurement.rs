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

use crate::calibration::{to_battery_level, to_weight, CalibrationProfile};
use beescale_messages::HiveReport;
use chrono::NaiveDateTime;

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ClimateReading {
    pub temperature_c: f32,
    pub humidity_pct: f32,
}

/// What the sensors returned during one wake. `None` marks a sensor that was unavailable.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RawSample {
    /// Rounded mean of the valid load cell readings
    pub load_cell_raw: i32,
    pub adc_battery_raw: Option<u16>,
    pub climate: Option<ClimateReading>,
    pub sample_count: usize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BatteryLevel {
    pub voltage: f32,
    pub percent: f32,
}

/// Physical values for one wake cycle. Built once, read by the display and the publisher,
/// dropped before sleep.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    pub weight_kg: f32,
    pub temperature_c: Option<f32>,
    pub humidity_pct: Option<f32>,
    pub battery: Option<BatteryLevel>,
    pub timestamp: Option<NaiveDateTime>,
}

impl Measurement {
    pub fn battery_voltage(&self) -> Option<f32> {
        self.battery.map(|b| b.voltage)
    }

    pub fn battery_percent(&self) -> Option<f32> {
        self.battery.map(|b| b.percent)
    }

    pub fn to_report<'a>(&self, device_id: &'a str) -> HiveReport<'a> {
        HiveReport::new(
            device_id,
            self.weight_kg,
            self.temperature_c,
            self.humidity_pct,
            self.battery_percent(),
        )
    }
}

pub fn build_measurement(
    raw: &RawSample,
    profile: &CalibrationProfile,
    timestamp: Option<NaiveDateTime>,
) -> Measurement {
    Measurement {
        weight_kg: to_weight(raw.load_cell_raw, profile),
        temperature_c: raw.climate.map(|c| c.temperature_c),
        humidity_pct: raw.climate.map(|c| c.humidity_pct),
        battery: raw
            .adc_battery_raw
            .map(|adc| to_battery_level(adc, profile)),
        timestamp,
    }
}
