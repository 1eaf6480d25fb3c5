// Copyright (C) 2017 Hove and/or its affiliates.
//
// This program is free software: you can redistribute it and/or modify it
// under the terms of the GNU Affero General Public License as published by the
// Free Software Foundation, version 3.

// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU Affero General Public License for more
// details.

// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>

//! The `lintim_core` crate solves the integrated public transport planning
//! problem on top of [LinTim](https://www.lintim.net/) datasets.
//!
//! Given a Public Transportation Network ([`ptn::Ptn`]), a pool of candidate
//! lines ([`lines::LinePool`]) and an origin-destination matrix
//! ([`od::OdMatrix`]), it builds a periodic Event-Activity Network
//! ([`ean::PeriodicEan`]) and jointly decides, through mixed-integer programs
//! ([`models`]), which lines to operate, a periodic timetable, passenger routes
//! and a vehicle schedule. Periodic solutions are then unrolled into an
//! aperiodic network and a fleet schedule ([`aperiodic`]).

#![deny(missing_docs)]

pub mod aperiodic;
pub mod config;
pub mod cycle_base;
pub mod ean;
pub mod error;
pub mod graph;
pub mod lines;
pub mod lintim_csv;
pub mod models;
pub mod od;
pub mod preprocessing;
pub mod ptn;
pub mod solver;
pub mod statistic;
#[doc(hidden)]
pub mod test_utils;
pub mod timetable;
pub mod turnaround;
pub mod vehicle_schedule;

/// The error type used by the crate.
pub type Error = anyhow::Error;

/// The corresponding result type used by the crate.
pub type Result<T, E = Error> = std::result::Result<T, E>;

pub use crate::config::{Config, Parameters};
pub use crate::error::LinTimError;
