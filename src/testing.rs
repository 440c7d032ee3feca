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

//! In-memory stand-ins for the board. Each fake hands out a `probe` sharing its record so a
//! test can look inside after the fake has been moved into the code under test.

#![allow(dead_code)]

use crate::application::{PowerManager, SleepPlan, WakeCause};
use crate::config::{SettingValue, SettingsAccessor, SettingsAccessorId};
use crate::connectivity::{Credentials, Endpoint, Publication, Transport};
use crate::hmi::{ButtonLatch, DisplayPanel};
use crate::measurement::ClimateReading;
use crate::sensors::{BatteryAdc, ClimateSensor, LoadCell};
use embassy_time::Duration;
use embedded_graphics::geometry::{OriginDimensions, Size};
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::prelude::DrawTarget;
use embedded_graphics::Pixel;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

pub type Probe<T> = Rc<RefCell<T>>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FakeError;

/// How a fake answers one call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Behaviour<T> {
    Value(T),
    Fail,
    /// Never completes, only a timeout gets the caller out
    Hang,
}

impl<T: Clone> Behaviour<T> {
    pub async fn resolve(&self) -> Result<T, FakeError> {
        match self {
            Behaviour::Value(v) => Ok(v.clone()),
            Behaviour::Fail => Err(FakeError),
            Behaviour::Hang => core::future::pending().await,
        }
    }
}

#[derive(Debug, Default)]
pub struct LoadCellRecord {
    pub initialisations: usize,
    pub power_downs: usize,
    pub reads: usize,
    pub powered_up: bool,
}

/// Plays back a script of readings, then repeats the steady result or stalls.
pub struct FakeLoadCell {
    script: VecDeque<Result<i32, ()>>,
    steady: Option<Result<i32, ()>>,
    pub fail_initialise: bool,
    record: Probe<LoadCellRecord>,
}

impl FakeLoadCell {
    pub fn steady(value: i32) -> Self {
        Self {
            script: VecDeque::new(),
            steady: Some(Ok(value)),
            fail_initialise: false,
            record: Probe::default(),
        }
    }

    /// Every read fails straight away, without ever waiting.
    pub fn broken() -> Self {
        Self {
            script: VecDeque::new(),
            steady: Some(Err(())),
            fail_initialise: false,
            record: Probe::default(),
        }
    }

    pub fn scripted(readings: &[i32]) -> Self {
        Self::from_results(&readings.iter().map(|r| Ok(*r)).collect::<Vec<_>>())
    }

    pub fn from_results(readings: &[Result<i32, ()>]) -> Self {
        Self {
            script: readings.iter().copied().collect(),
            steady: None,
            fail_initialise: false,
            record: Probe::default(),
        }
    }

    pub fn probe(&self) -> Probe<LoadCellRecord> {
        self.record.clone()
    }
}

impl LoadCell for FakeLoadCell {
    type Error = FakeError;

    async fn initialize(&mut self) -> Result<(), Self::Error> {
        let mut record = self.record.borrow_mut();
        record.initialisations += 1;
        if self.fail_initialise {
            return Err(FakeError);
        }
        record.powered_up = true;
        Ok(())
    }

    async fn get_next_reading(&mut self) -> Result<i32, Self::Error> {
        {
            let mut record = self.record.borrow_mut();
            record.reads += 1;
            record.powered_up = true;
        }
        match self.script.pop_front().or(self.steady) {
            Some(Ok(reading)) => Ok(reading),
            Some(Err(())) => Err(FakeError),
            None => core::future::pending().await,
        }
    }

    async fn power_down(&mut self) -> Result<(), Self::Error> {
        let mut record = self.record.borrow_mut();
        record.power_downs += 1;
        record.powered_up = false;
        Ok(())
    }

    async fn power_up(&mut self) -> Result<(), Self::Error> {
        self.record.borrow_mut().powered_up = true;
        Ok(())
    }

    fn get_adc_bit_count(&self) -> usize {
        24
    }
}

pub struct FakeClimate {
    behaviour: Behaviour<ClimateReading>,
}

impl FakeClimate {
    pub fn new(behaviour: Behaviour<ClimateReading>) -> Self {
        Self { behaviour }
    }
}

impl ClimateSensor for FakeClimate {
    type Error = FakeError;

    async fn read(&mut self) -> Result<ClimateReading, Self::Error> {
        self.behaviour.resolve().await
    }
}

pub struct FakeBattery {
    behaviour: Behaviour<u16>,
}

impl FakeBattery {
    pub fn new(behaviour: Behaviour<u16>) -> Self {
        Self { behaviour }
    }
}

impl BatteryAdc for FakeBattery {
    type Error = FakeError;

    async fn read_raw(&mut self) -> Result<u16, Self::Error> {
        self.behaviour.resolve().await
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PanelEvent {
    PowerOn,
    /// A frame reached the glass
    Flush { lit_pixels: usize },
    PowerOff,
}

#[derive(Debug, Default)]
pub struct PanelRecord {
    pub events: Vec<PanelEvent>,
    pub flush_attempts: usize,
    pub power_offs: usize,
    lit_pixels: usize,
}

/// 128x64 monochrome panel counting the pixels of each flushed frame.
#[derive(Clone, Default)]
pub struct FakePanel {
    pub fail_flush: bool,
    record: Probe<PanelRecord>,
}

impl FakePanel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn probe(&self) -> Probe<PanelRecord> {
        self.record.clone()
    }
}

impl OriginDimensions for FakePanel {
    fn size(&self) -> Size {
        Size::new(128, 64)
    }
}

impl DrawTarget for FakePanel {
    type Color = BinaryColor;
    type Error = FakeError;

    fn draw_iter<I>(&mut self, pixels: I) -> Result<(), Self::Error>
    where
        I: IntoIterator<Item = Pixel<Self::Color>>,
    {
        let lit = pixels
            .into_iter()
            .filter(|pixel| pixel.1 == BinaryColor::On)
            .count();
        self.record.borrow_mut().lit_pixels += lit;
        Ok(())
    }
}

impl DisplayPanel for FakePanel {
    async fn power_on(&mut self) -> Result<(), Self::Error> {
        self.record.borrow_mut().events.push(PanelEvent::PowerOn);
        Ok(())
    }

    async fn flush(&mut self) -> Result<(), Self::Error> {
        let mut record = self.record.borrow_mut();
        record.flush_attempts += 1;
        let lit_pixels = core::mem::take(&mut record.lit_pixels);
        if self.fail_flush {
            return Err(FakeError);
        }
        record.events.push(PanelEvent::Flush { lit_pixels });
        Ok(())
    }

    async fn power_off(&mut self) -> Result<(), Self::Error> {
        let mut record = self.record.borrow_mut();
        record.power_offs += 1;
        record.events.push(PanelEvent::PowerOff);
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SentPublication {
    pub target: String,
    pub body: Vec<u8>,
    pub content_type: &'static str,
    pub retain: bool,
}

#[derive(Debug, Default)]
pub struct TransportRecord {
    pub connects: usize,
    pub connect_timeouts: Vec<Duration>,
    /// Publications the endpoint accepted
    pub sent: Vec<SentPublication>,
    pub closes: usize,
}

/// Connects and sends succeed unless a scripted behaviour says otherwise.
#[derive(Default)]
pub struct ScriptedTransport {
    pub connect_script: VecDeque<Behaviour<()>>,
    pub send_script: VecDeque<Behaviour<()>>,
    /// Simulates the button interrupt firing while the radio is busy
    pub press_on_connect: Option<&'static ButtonLatch>,
    record: Probe<TransportRecord>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn probe(&self) -> Probe<TransportRecord> {
        self.record.clone()
    }
}

impl Transport for ScriptedTransport {
    type Handle = usize;
    type Error = FakeError;

    async fn connect(
        &mut self,
        _endpoint: &Endpoint,
        _credentials: &Credentials,
        timeout: Duration,
    ) -> Result<Self::Handle, Self::Error> {
        let attempt = {
            let mut record = self.record.borrow_mut();
            record.connects += 1;
            record.connect_timeouts.push(timeout);
            record.connects
        };
        if let Some(button) = self.press_on_connect {
            button.latch();
        }
        let behaviour = self
            .connect_script
            .pop_front()
            .unwrap_or(Behaviour::Value(()));
        behaviour.resolve().await?;
        Ok(attempt)
    }

    async fn send(
        &mut self,
        _handle: &mut Self::Handle,
        publication: &Publication<'_>,
    ) -> Result<(), Self::Error> {
        let behaviour = self.send_script.pop_front().unwrap_or(Behaviour::Value(()));
        behaviour.resolve().await?;
        self.record.borrow_mut().sent.push(SentPublication {
            target: publication.target.to_string(),
            body: publication.body.to_vec(),
            content_type: publication.content_type,
            retain: publication.retain,
        });
        Ok(())
    }

    async fn close(&mut self, _handle: Self::Handle) -> Result<(), Self::Error> {
        self.record.borrow_mut().closes += 1;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct PowerRecord {
    pub suspends: Vec<SleepPlan>,
}

#[derive(Clone)]
pub struct FakePower {
    cause: WakeCause,
    record: Probe<PowerRecord>,
}

impl FakePower {
    pub fn new(cause: WakeCause) -> Self {
        Self {
            cause,
            record: Probe::default(),
        }
    }

    pub fn probe(&self) -> Probe<PowerRecord> {
        self.record.clone()
    }
}

impl PowerManager for FakePower {
    fn wake_cause(&mut self) -> WakeCause {
        self.cause
    }

    async fn suspend(&mut self, plan: &SleepPlan) {
        self.record.borrow_mut().suspends.push(*plan);
    }
}

#[derive(Default)]
pub struct MemorySettings {
    values: Vec<(SettingsAccessorId, SettingValue)>,
}

impl MemorySettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, id: SettingsAccessorId, value: SettingValue) -> Self {
        self.values.retain(|(existing, _)| *existing != id);
        self.values.push((id, value));
        self
    }

    pub fn with_text(self, id: SettingsAccessorId, text: &str) -> Self {
        let value = heapless::String::try_from(text).expect("setting text too long");
        self.with(id, SettingValue::Text(value))
    }
}

impl SettingsAccessor for MemorySettings {
    async fn get_setting(&self, id: SettingsAccessorId) -> Option<SettingValue> {
        self.values
            .iter()
            .find(|(existing, _)| *existing == id)
            .map(|(_, value)| value.clone())
    }
}
