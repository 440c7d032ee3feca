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

//! Duty-cycle core of a battery powered beehive scale.
//!
//! Every wake the node acquires weight, climate and battery readings, shows them on the local
//! panel and/or publishes them, then hands a [`application::power::SleepPlan`] back to the power
//! layer. Peripherals are reached through the capability traits in [`sensors`], [`hmi`],
//! [`connectivity`] and [`application::power`], so the core runs unchanged against real drivers
//! or the fakes used in tests.

#![cfg_attr(not(test), no_std)]
#![allow(async_fn_in_trait)]

#[macro_use]
mod fmt;

pub mod application;
pub mod calibration;
pub mod config;
pub mod connectivity;
pub mod hmi;
pub mod measurement;
pub mod sensors;

#[cfg(test)]
pub(crate) mod testing;
