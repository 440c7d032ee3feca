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

use crate::hmi::{draw_message_screen, DisplayError, DisplayPanel, UiDrawer};
use crate::measurement::Measurement;
use core::fmt::Write;
use embassy_time::{Duration, Timer};
use embedded_graphics::draw_target::DrawTarget;
use embedded_graphics::geometry::Point;
use embedded_graphics::mono_font::ascii::{FONT_10X20, FONT_6X10};
use embedded_graphics::mono_font::{MonoTextStyle, MonoTextStyleBuilder};
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::text::{Alignment, Baseline, Text, TextStyleBuilder};
use embedded_graphics::Drawable;
use heapless::{String, Vec};
use strum::{EnumCount, EnumIter, IntoEnumIterator};

/// Shown in place of a value the sensors could not supply.
pub const UNAVAILABLE: &str = "--";

const TITLE_STYLE: MonoTextStyle<BinaryColor> = MonoTextStyleBuilder::new()
    .font(&FONT_6X10)
    .text_color(BinaryColor::On)
    .build();

const VALUE_STYLE: MonoTextStyle<BinaryColor> = MonoTextStyleBuilder::new()
    .font(&FONT_10X20)
    .text_color(BinaryColor::On)
    .build();

/// Screens in the order they are shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, EnumIter, EnumCount)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ScreenKind {
    Temperature,
    Humidity,
    Weight,
    Battery,
}

impl ScreenKind {
    pub fn title(&self) -> &'static str {
        match self {
            ScreenKind::Temperature => "Temperature",
            ScreenKind::Humidity => "Humidity",
            ScreenKind::Weight => "Weight",
            ScreenKind::Battery => "Battery",
        }
    }
}

pub type ScreenValue = String<16>;

#[derive(Debug, Clone, PartialEq)]
pub struct Screen {
    pub kind: ScreenKind,
    pub value: ScreenValue,
}

impl Screen {
    fn new(kind: ScreenKind, measurement: &Measurement) -> Self {
        let mut value = ScreenValue::new();
        let written = match kind {
            ScreenKind::Temperature => measurement
                .temperature_c
                .map(|t| write!(value, "{:.1} C", t)),
            ScreenKind::Humidity => measurement
                .humidity_pct
                .map(|h| write!(value, "{:.1} %", h)),
            ScreenKind::Weight => Some(write!(value, "{:.2} kg", measurement.weight_kg)),
            ScreenKind::Battery => measurement
                .battery
                .map(|b| write!(value, "{:.0}% {:.2}V", b.percent, b.voltage)),
        };

        // absent, or too wide for the panel
        if !matches!(written, Some(Ok(()))) {
            value.clear();
            let _ = value.push_str(UNAVAILABLE);
        }
        Self { kind, value }
    }
}

impl UiDrawer for Screen {
    fn draw<D>(&self, display: &mut D) -> Result<(), D::Error>
    where
        D: DrawTarget<Color = BinaryColor>,
    {
        let centred = TextStyleBuilder::new()
            .alignment(Alignment::Center)
            .baseline(Baseline::Middle)
            .build();
        let size = display.bounding_box().size;
        let x_pos = size.width as i32 / 2;

        Text::with_text_style(
            self.kind.title(),
            Point::new(x_pos, size.height as i32 / 4),
            TITLE_STYLE,
            centred,
        )
        .draw(display)?;
        Text::with_text_style(
            &self.value,
            Point::new(x_pos, size.height as i32 * 5 / 8),
            VALUE_STYLE,
            centred,
        )
        .draw(display)?;
        Ok(())
    }
}

/// The screens for one measurement, always one per [`ScreenKind`].
pub fn screens_for(measurement: &Measurement) -> Vec<Screen, { ScreenKind::COUNT }> {
    let mut screens = Vec::new();
    for kind in ScreenKind::iter() {
        let _ = screens.push(Screen::new(kind, measurement));
    }
    screens
}

pub struct DisplayPresenter;

impl DisplayPresenter {
    /// Show every screen for `dwell`, then switch the panel off.
    ///
    /// Takes `ScreenKind::COUNT * dwell` whatever the panel does. A panel error does not stop the
    /// sequence; the first one is returned once the panel has been switched off.
    pub async fn present<P: DisplayPanel>(
        panel: &mut P,
        measurement: &Measurement,
        dwell: Duration,
    ) -> Result<(), DisplayError> {
        let mut first_error = None;

        if panel.power_on().await.is_err() {
            first_error.get_or_insert(DisplayError::PowerOn);
        }

        for screen in screens_for(measurement) {
            debug!("Showing {:?} screen", screen.kind);
            if let Err(e) = show(panel, &screen).await {
                first_error.get_or_insert(e);
            }
            Timer::after(dwell).await;
        }

        if panel.power_off().await.is_err() {
            first_error.get_or_insert(DisplayError::PowerOff);
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Show a single notice for `dwell`, used when there is no measurement to show.
    pub async fn present_fault<P: DisplayPanel>(
        panel: &mut P,
        message: &str,
        dwell: Duration,
    ) -> Result<(), DisplayError> {
        let mut first_error = None;

        if panel.power_on().await.is_err() {
            first_error.get_or_insert(DisplayError::PowerOn);
        }
        if let Err(e) = show(panel, &Notice(message)).await {
            first_error.get_or_insert(e);
        }
        Timer::after(dwell).await;
        if panel.power_off().await.is_err() {
            first_error.get_or_insert(DisplayError::PowerOff);
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

struct Notice<'a>(&'a str);

impl UiDrawer for Notice<'_> {
    fn draw<D>(&self, display: &mut D) -> Result<(), D::Error>
    where
        D: DrawTarget<Color = BinaryColor>,
    {
        draw_message_screen(display, self.0)
    }
}

async fn show<P: DisplayPanel>(panel: &mut P, drawer: &impl UiDrawer) -> Result<(), DisplayError> {
    panel
        .clear(BinaryColor::Off)
        .map_err(|_| DisplayError::Draw)?;
    drawer.draw(&mut *panel).map_err(|_| DisplayError::Draw)?;
    panel.flush().await.map_err(|_| DisplayError::Flush)
}
