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

//! Local panel: the screens shown on a button peek and the wake button latch.

use embedded_graphics::draw_target::DrawTarget;
use embedded_graphics::geometry::Point;
use embedded_graphics::mono_font::ascii::FONT_6X10;
use embedded_graphics::mono_font::{MonoTextStyle, MonoTextStyleBuilder};
use embedded_graphics::pixelcolor::BinaryColor;
use embedded_graphics::text::renderer::TextRenderer;
use embedded_graphics::text::{Alignment, Baseline, Text, TextStyleBuilder};
use embedded_graphics::Drawable;

pub mod button;
pub mod presenter;

pub use button::ButtonLatch;
pub use presenter::DisplayPresenter;

/// A monochrome panel that can be switched off between wakes.
///
/// Drawing goes to a frame buffer, `flush` pushes it to the glass.
pub trait DisplayPanel: DrawTarget<Color = BinaryColor> {
    async fn power_on(&mut self) -> Result<(), Self::Error>;
    async fn flush(&mut self) -> Result<(), Self::Error>;
    async fn power_off(&mut self) -> Result<(), Self::Error>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DisplayError {
    PowerOn,
    Draw,
    Flush,
    PowerOff,
}

impl core::fmt::Display for DisplayError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            DisplayError::PowerOn => write!(f, "panel failed to power on"),
            DisplayError::Draw => write!(f, "panel draw failed"),
            DisplayError::Flush => write!(f, "panel flush failed"),
            DisplayError::PowerOff => write!(f, "panel failed to power off"),
        }
    }
}

pub trait UiDrawer {
    fn draw<D>(&self, display: &mut D) -> Result<(), D::Error>
    where
        D: DrawTarget<Color = BinaryColor>;
}

const DEFAULT_TEXT_STYLE: MonoTextStyle<BinaryColor> = MonoTextStyleBuilder::new()
    .font(&FONT_6X10)
    .text_color(BinaryColor::On)
    .build();

/// Draw each line of `message` centred on the panel.
pub fn draw_message_screen<D: DrawTarget<Color = BinaryColor>>(
    display: &mut D,
    message: &str,
) -> Result<(), D::Error> {
    let centred_text_style = TextStyleBuilder::new()
        .alignment(Alignment::Center)
        .baseline(Baseline::Middle)
        .build();

    let line_count = message.lines().count().max(1) as i32;
    let line_offset_pixels = (line_count - 1) * DEFAULT_TEXT_STYLE.line_height() as i32 / 2;
    let x_pos = display.bounding_box().size.width as i32 / 2;
    let y_pos = display.bounding_box().size.height as i32 / 2 - line_offset_pixels;
    Text::with_text_style(
        message,
        Point::new(x_pos, y_pos),
        DEFAULT_TEXT_STYLE,
        centred_text_style,
    )
    .draw(display)?;
    Ok(())
}
