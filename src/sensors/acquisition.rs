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

use crate::config::{DeviceConfig, MAX_LOAD_CELL_SAMPLES};
use crate::measurement::{ClimateReading, RawSample};
use crate::sensors::{AcquisitionError, BatteryAdc, ClimateSensor, LoadCell, Sensor};
use embassy_time::{with_deadline, with_timeout, Duration, Instant};
use heapless::Vec;
use micromath::statistics::StdDev;

const LOAD_CELL_POSITIVE_SATURATION: i32 = 0x7F_FFFF;
const LOAD_CELL_NEGATIVE_SATURATION: i32 = -0x80_0000;

const TEMPERATURE_RANGE_C: core::ops::RangeInclusive<f32> = -40.0..=85.0;
const HUMIDITY_RANGE_PCT: core::ops::RangeInclusive<f32> = 0.0..=100.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AcquisitionTimeouts {
    /// Budget for collecting every load cell sample of one acquisition
    pub load_cell: Duration,
    pub climate: Duration,
    pub battery: Duration,
}

impl AcquisitionTimeouts {
    pub fn from_config(config: &DeviceConfig) -> Self {
        Self {
            load_cell: config.load_cell_timeout,
            climate: config.climate_timeout,
            battery: config.battery_timeout,
        }
    }
}

pub struct AcquisitionService<LC, CS, BA> {
    load_cell: LC,
    climate: CS,
    battery: BA,
    timeouts: AcquisitionTimeouts,
    load_cell_ready: bool,
}

impl<LC, CS, BA> AcquisitionService<LC, CS, BA>
where
    LC: LoadCell,
    CS: ClimateSensor,
    BA: BatteryAdc,
{
    pub fn new(load_cell: LC, climate: CS, battery: BA, timeouts: AcquisitionTimeouts) -> Self {
        Self {
            load_cell,
            climate,
            battery,
            timeouts,
            load_cell_ready: false,
        }
    }

    /// Average `samples` load cell readings and take one climate and one battery reading.
    ///
    /// Only the load cell can fail the acquisition. An unavailable climate sensor or battery
    /// ADC shows up as `None` in the returned sample.
    pub async fn acquire(&mut self, samples: usize) -> Result<RawSample, AcquisitionError> {
        if samples == 0 || samples > MAX_LOAD_CELL_SAMPLES {
            return Err(AcquisitionError::InvalidSampleCount(samples));
        }

        let deadline = Instant::now() + self.timeouts.load_cell;
        let load_cell_raw =
            match with_deadline(deadline, self.average_load_cell(samples, deadline)).await {
                Ok(Ok(Some(raw))) => raw,
                Ok(Err(e)) => return Err(e),
                Ok(Ok(None)) | Err(_) => {
                    warn!("Load cell did not deliver {} samples in time", samples);
                    return Err(AcquisitionError::Timeout(Sensor::LoadCell));
                }
            };

        let climate = self.read_climate().await;
        let adc_battery_raw = self.read_battery().await;

        Ok(RawSample {
            load_cell_raw,
            adc_battery_raw,
            climate,
            sample_count: samples,
        })
    }

    /// Put the sensors into their lowest power state ahead of sleep.
    pub async fn power_down(&mut self) {
        if self.load_cell.power_down().await.is_err() {
            warn!("Load cell power down failed");
        }
        self.load_cell_ready = false;
    }

    /// Collect `samples` valid readings and return their rounded mean.
    ///
    /// Invalid readings are skipped for as long as `deadline` allows. `None` once it has passed.
    async fn average_load_cell(
        &mut self,
        samples: usize,
        deadline: Instant,
    ) -> Result<Option<i32>, AcquisitionError> {
        if !self.load_cell_ready {
            self.load_cell
                .initialize()
                .await
                .map_err(|_| AcquisitionError::InvalidReading(Sensor::LoadCell))?;
            self.load_cell_ready = true;
        }

        let mut readings = Vec::<i32, MAX_LOAD_CELL_SAMPLES>::new();
        let mut rejected: u32 = 0;

        while readings.len() < samples {
            match self.load_cell.get_next_reading().await {
                Ok(reading) if is_saturated(reading) => {
                    trace!("Load cell saturated at {}", reading);
                    rejected += 1;
                }
                Ok(reading) => {
                    let _ = readings.push(reading);
                }
                Err(_) => {
                    trace!("Load cell read error");
                    rejected += 1;
                }
            }

            // also catches a driver that fails without ever yielding
            if readings.len() < samples && Instant::now() >= deadline {
                warn!(
                    "Load cell gave {} of {} samples, {} rejected",
                    readings.len(),
                    samples,
                    rejected
                );
                return Ok(None);
            }
        }

        let mean = rounded_mean(&readings);
        let spread: Vec<f32, MAX_LOAD_CELL_SAMPLES> = readings
            .iter()
            .map(|r| (i64::from(*r) - i64::from(mean)) as f32)
            .collect();
        debug!(
            "Load cell mean {} over {} samples, stddev {}, {} rejected",
            mean,
            readings.len(),
            spread.as_slice().stddev(),
            rejected
        );
        Ok(Some(mean))
    }

    async fn read_climate(&mut self) -> Option<ClimateReading> {
        let result = match with_timeout(self.timeouts.climate, self.climate.read()).await {
            Ok(Ok(reading)) if is_plausible(&reading) => Ok(reading),
            Ok(_) => Err(AcquisitionError::InvalidReading(Sensor::Climate)),
            Err(_) => Err(AcquisitionError::Timeout(Sensor::Climate)),
        };

        match result {
            Ok(reading) => {
                trace!(
                    "Climate {} C {} %",
                    reading.temperature_c,
                    reading.humidity_pct
                );
                Some(reading)
            }
            Err(e) => {
                warn!("Climate sensor unavailable: {:?}", e);
                None
            }
        }
    }

    async fn read_battery(&mut self) -> Option<u16> {
        match with_timeout(self.timeouts.battery, self.battery.read_raw()).await {
            Ok(Ok(raw)) => Some(raw),
            Ok(Err(_)) => {
                warn!(
                    "Battery ADC unavailable: {:?}",
                    AcquisitionError::InvalidReading(Sensor::Battery)
                );
                None
            }
            Err(_) => {
                warn!(
                    "Battery ADC unavailable: {:?}",
                    AcquisitionError::Timeout(Sensor::Battery)
                );
                None
            }
        }
    }
}

/// Mean of the readings rounded half up, exact for any `i32` input.
fn rounded_mean(readings: &[i32]) -> i32 {
    let count = readings.len().max(1) as i64;
    let sum: i64 = readings.iter().map(|r| i64::from(*r)).sum();
    let mean = (2 * sum + count).div_euclid(2 * count);
    i32::try_from(mean).unwrap_or(if mean < 0 { i32::MIN } else { i32::MAX })
}

fn is_saturated(reading: i32) -> bool {
    reading == LOAD_CELL_POSITIVE_SATURATION || reading == LOAD_CELL_NEGATIVE_SATURATION
}

fn is_plausible(reading: &ClimateReading) -> bool {
    TEMPERATURE_RANGE_C.contains(&reading.temperature_c)
        && HUMIDITY_RANGE_PCT.contains(&reading.humidity_pct)
}
