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

//! Sensor capabilities consumed by the acquisition service.

use crate::measurement::ClimateReading;

pub mod acquisition;

pub use acquisition::{AcquisitionService, AcquisitionTimeouts};

/// Strain gauge ADC behind the scale platform.
pub trait LoadCell {
    type Error;

    /// Initialise the gauge and make it ready for taking readings. Leaves it powered up.
    async fn initialize(&mut self) -> Result<(), Self::Error>;

    /// Gets next reading from the gauge. A powered down gauge is expected to power itself up.
    async fn get_next_reading(&mut self) -> Result<i32, Self::Error>;

    async fn power_down(&mut self) -> Result<(), Self::Error>;

    async fn power_up(&mut self) -> Result<(), Self::Error>;

    /// Return the number of bits supported by the ADC
    fn get_adc_bit_count(&self) -> usize;
}

/// Combined temperature and humidity sensor.
pub trait ClimateSensor {
    type Error;

    async fn read(&mut self) -> Result<ClimateReading, Self::Error>;
}

pub trait BatteryAdc {
    type Error;

    /// Raw count at the divider tap
    async fn read_raw(&mut self) -> Result<u16, Self::Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Sensor {
    LoadCell,
    Climate,
    Battery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AcquisitionError {
    /// The sensor did not answer within its time budget
    Timeout(Sensor),
    /// The driver failed or returned a value outside the sensor's range
    InvalidReading(Sensor),
    /// Requested sample count is zero or beyond the averaging buffer
    InvalidSampleCount(usize),
}

impl core::fmt::Display for AcquisitionError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            AcquisitionError::Timeout(sensor) => write!(f, "{:?} timed out", sensor),
            AcquisitionError::InvalidReading(sensor) => write!(f, "{:?} reading invalid", sensor),
            AcquisitionError::InvalidSampleCount(samples) => {
                write!(f, "cannot average {} load cell samples", samples)
            }
        }
    }
}
