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

use chrono::NaiveDateTime;
use embassy_time::Duration;

use crate::application::WakeCause;

pub const REASON_BUTTON_PEEK: &str = "button peek";
pub const REASON_DELIVERED: &str = "reading delivered";
pub const REASON_DELIVERY_FAILED: &str = "delivery failed";
pub const REASON_ACQUISITION_FAILED: &str = "acquisition failed";
pub const REASON_DISPLAY_ONLY: &str = "display only";
pub const REASON_DEFERRED_BUTTON: &str = "deferred button press";

/// How long to sleep and why, handed to the power layer at the end of every cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct SleepPlan {
    pub duration: Duration,
    pub reason: &'static str,
}

/// Deep sleep entry and wake classification for the board.
pub trait PowerManager {
    fn wake_cause(&mut self) -> WakeCause;

    /// Wall clock, when the board has one it trusts.
    fn now(&self) -> Option<NaiveDateTime> {
        None
    }

    /// Enter deep sleep. On hardware this does not return, the next wake restarts the cycle.
    async fn suspend(&mut self, plan: &SleepPlan);
}
