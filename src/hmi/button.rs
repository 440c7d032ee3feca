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

use portable_atomic::{AtomicBool, Ordering};

/// Records a button press until the controller picks it up.
///
/// `latch` is safe to call from the button interrupt. The controller only looks at the flag
/// between steps, so a press never interrupts a sensor read or a publish.
pub struct ButtonLatch {
    pressed: AtomicBool,
}

impl ButtonLatch {
    pub const fn new() -> Self {
        Self {
            pressed: AtomicBool::new(false),
        }
    }

    pub fn latch(&self) {
        self.pressed.store(true, Ordering::Release);
    }

    /// Read and clear.
    pub fn take(&self) -> bool {
        self.pressed.swap(false, Ordering::AcqRel)
    }

    pub fn is_pending(&self) -> bool {
        self.pressed.load(Ordering::Acquire)
    }
}

impl Default for ButtonLatch {
    fn default() -> Self {
        Self::new()
    }
}
