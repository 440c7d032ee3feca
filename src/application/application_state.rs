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

/// Steps of one wake cycle. `Displaying` followed by `Transmitting` is the combined branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ControllerState {
    WakingUp,
    Acquiring,
    Displaying,
    Transmitting,
    Sleeping,
}

/// What the power layer saw end the last sleep.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WakeCause {
    Timer,
    Button,
    /// Cold boot or reset
    PowerOn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WakeReason {
    TimerExpired,
    ButtonPressed,
    PowerOn,
}

impl WakeReason {
    /// A press latched while the previous cycle was running turns a timer wake into a peek.
    pub fn classify(cause: WakeCause, button_latched: bool) -> Self {
        match (cause, button_latched) {
            (WakeCause::PowerOn, _) => WakeReason::PowerOn,
            (WakeCause::Button, _) | (WakeCause::Timer, true) => WakeReason::ButtonPressed,
            (WakeCause::Timer, false) => WakeReason::TimerExpired,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn latched_press_wins_over_timer() {
        assert_eq!(
            WakeReason::classify(WakeCause::Timer, false),
            WakeReason::TimerExpired
        );
        assert_eq!(
            WakeReason::classify(WakeCause::Timer, true),
            WakeReason::ButtonPressed
        );
        assert_eq!(
            WakeReason::classify(WakeCause::Button, false),
            WakeReason::ButtonPressed
        );
    }

    #[test]
    fn power_on_is_never_reclassified() {
        assert_eq!(
            WakeReason::classify(WakeCause::PowerOn, true),
            WakeReason::PowerOn
        );
    }
}
