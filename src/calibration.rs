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

//! Raw to physical unit conversion for the load cell and the battery divider.
//!
//! All functions here are pure. A [`CalibrationProfile`] can only be built through its
//! validating constructors, so the conversions never see a zero scale factor.

use crate::config::ConfigurationError;
use crate::measurement::BatteryLevel;

pub const DEFAULT_ADC_FULL_SCALE: u16 = 4095;
pub const DEFAULT_ADC_REFERENCE_VOLTS: f32 = 3.3;
pub const DEFAULT_SCALE_FACTOR: f32 = -21500.0;
pub const DEFAULT_BATTERY_DIVIDER_RATIO: f32 = 2.0;

/// Single cell Li-ion discharge curve, (volts, percent), ascending.
const BATTERY_CURVE: [(f32, f32); 11] = [
    (3.20, 0.0),
    (3.30, 5.0),
    (3.40, 12.0),
    (3.50, 25.0),
    (3.60, 40.0),
    (3.70, 55.0),
    (3.80, 64.0),
    (3.90, 72.0),
    (4.00, 80.0),
    (4.10, 90.0),
    (4.20, 100.0),
];

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct CalibrationProfile {
    scale_factor: f32,
    scale_offset: i32,
    battery_divider_ratio: f32,
    battery_offset: f32,
    adc_full_scale: u16,
    adc_reference_volts: f32,
}

impl CalibrationProfile {
    /// Build a profile for the default 12 bit, 3.3 V battery ADC.
    ///
    /// # Errors
    ///
    /// - `InvalidScaleFactor`: `scale_factor` is zero or not finite
    /// - `InvalidDividerRatio`: `battery_divider_ratio` is not a positive finite number
    /// - `InvalidBatteryOffset`: `battery_offset` is not finite
    pub fn new(
        scale_factor: f32,
        scale_offset: i32,
        battery_divider_ratio: f32,
        battery_offset: f32,
    ) -> Result<Self, ConfigurationError> {
        let profile = Self {
            scale_factor,
            scale_offset,
            battery_divider_ratio,
            battery_offset,
            adc_full_scale: DEFAULT_ADC_FULL_SCALE,
            adc_reference_volts: DEFAULT_ADC_REFERENCE_VOLTS,
        };
        profile.validate()?;
        Ok(profile)
    }

    /// Replace the battery ADC characteristics.
    pub fn with_adc(
        self,
        adc_full_scale: u16,
        adc_reference_volts: f32,
    ) -> Result<Self, ConfigurationError> {
        let profile = Self {
            adc_full_scale,
            adc_reference_volts,
            ..self
        };
        profile.validate()?;
        Ok(profile)
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.scale_factor == 0.0 || !self.scale_factor.is_finite() {
            return Err(ConfigurationError::InvalidScaleFactor);
        }
        if !(self.battery_divider_ratio > 0.0) || !self.battery_divider_ratio.is_finite() {
            return Err(ConfigurationError::InvalidDividerRatio);
        }
        if !self.battery_offset.is_finite() {
            return Err(ConfigurationError::InvalidBatteryOffset);
        }
        if self.adc_full_scale == 0
            || !(self.adc_reference_volts > 0.0)
            || !self.adc_reference_volts.is_finite()
        {
            return Err(ConfigurationError::InvalidAdcScale);
        }
        Ok(())
    }

    pub fn scale_factor(&self) -> f32 {
        self.scale_factor
    }

    pub fn scale_offset(&self) -> i32 {
        self.scale_offset
    }

    pub fn battery_divider_ratio(&self) -> f32 {
        self.battery_divider_ratio
    }

    pub fn battery_offset(&self) -> f32 {
        self.battery_offset
    }

    pub fn adc_full_scale(&self) -> u16 {
        self.adc_full_scale
    }

    pub fn adc_reference_volts(&self) -> f32 {
        self.adc_reference_volts
    }
}

impl Default for CalibrationProfile {
    fn default() -> Self {
        Self {
            scale_factor: DEFAULT_SCALE_FACTOR,
            scale_offset: 0,
            battery_divider_ratio: DEFAULT_BATTERY_DIVIDER_RATIO,
            battery_offset: 0.0,
            adc_full_scale: DEFAULT_ADC_FULL_SCALE,
            adc_reference_volts: DEFAULT_ADC_REFERENCE_VOLTS,
        }
    }
}

/// `(raw - offset) / scale_factor`, in kilograms.
pub fn to_weight(raw: i32, profile: &CalibrationProfile) -> f32 {
    // f64 keeps the subtraction exact for offsets near the top of the 24 bit range
    ((raw as f64 - profile.scale_offset as f64) / profile.scale_factor as f64) as f32
}

/// Voltage at the battery terminals, undoing the divider in front of the ADC.
pub fn to_battery_voltage(adc_raw: u16, profile: &CalibrationProfile) -> f32 {
    let adc_volts =
        adc_raw as f32 / profile.adc_full_scale as f32 * profile.adc_reference_volts;
    adc_volts * profile.battery_divider_ratio + profile.battery_offset
}

/// State of charge for a terminal voltage. Saturates at both ends of the curve.
pub fn battery_percent(volts: f32) -> f32 {
    let (first_volts, first_percent) = BATTERY_CURVE[0];
    let (last_volts, last_percent) = BATTERY_CURVE[BATTERY_CURVE.len() - 1];

    if !(volts > first_volts) {
        return first_percent;
    }
    if volts >= last_volts {
        return last_percent;
    }

    for pair in BATTERY_CURVE.windows(2) {
        let (lower_volts, lower_percent) = pair[0];
        let (upper_volts, upper_percent) = pair[1];
        if volts <= upper_volts {
            let fraction = (volts - lower_volts) / (upper_volts - lower_volts);
            return lower_percent + fraction * (upper_percent - lower_percent);
        }
    }
    last_percent
}

pub fn to_battery_level(adc_raw: u16, profile: &CalibrationProfile) -> BatteryLevel {
    let voltage = to_battery_voltage(adc_raw, profile);
    BatteryLevel {
        voltage,
        percent: battery_percent(voltage),
    }
}
