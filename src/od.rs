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

//! Origin-destination demand.

use std::collections::BTreeMap;

/// One origin-destination pair with its demand in one time slice.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OdPair {
    /// Origin stop.
    pub origin: i32,
    /// Destination stop.
    pub destination: i32,
    /// Time slice, from 1 to the number of slices.
    pub time_slice: u32,
    /// Number of passengers.
    pub passengers: f64,
}

/// Demand keyed by `(origin, destination, time slice)`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OdMatrix {
    demand: BTreeMap<(i32, i32, u32), f64>,
}

impl OdMatrix {
    /// Creates an empty matrix.
    pub fn new() -> Self {
        OdMatrix::default()
    }

    /// Sets the demand of a pair in a time slice. Negative values are
    /// clamped to zero.
    pub fn set(&mut self, origin: i32, destination: i32, time_slice: u32, passengers: f64) {
        self.demand
            .insert((origin, destination, time_slice), passengers.max(0.0));
    }

    /// Demand of a pair in a time slice.
    pub fn get(&self, origin: i32, destination: i32, time_slice: u32) -> f64 {
        self.demand
            .get(&(origin, destination, time_slice))
            .copied()
            .unwrap_or(0.0)
    }

    /// Demand of a pair over every time slice.
    pub fn total(&self, origin: i32, destination: i32) -> f64 {
        self.demand
            .range((origin, destination, 0)..=(origin, destination, u32::MAX))
            .map(|(_, &p)| p)
            .sum()
    }

    /// Every entry with positive demand, in key order.
    pub fn pairs(&self) -> impl Iterator<Item = OdPair> + '_ {
        self.demand
            .iter()
            .filter(|(_, &p)| p > 0.0)
            .map(|(&(origin, destination, time_slice), &passengers)| OdPair {
                origin,
                destination,
                time_slice,
                passengers,
            })
    }

    /// Distinct `(origin, destination)` with positive demand and
    /// `origin != destination`, with their total demand.
    pub fn od_totals(&self) -> BTreeMap<(i32, i32), f64> {
        let mut totals = BTreeMap::new();
        for pair in self.pairs().filter(|p| p.origin != p.destination) {
            *totals.entry((pair.origin, pair.destination)).or_insert(0.0) += pair.passengers;
        }
        totals
    }

    /// Total number of passengers.
    pub fn passenger_count(&self) -> f64 {
        self.demand.values().sum()
    }

    /// Splits the active from the inactive `(origin, destination)` pairs.
    /// The `limit` pairs with the largest demand are active (ties broken by
    /// key); a negative limit makes every pair active.
    pub fn active_pairs(&self, limit: i32) -> (Vec<(i32, i32)>, Vec<(i32, i32)>) {
        let totals = self.od_totals();
        let mut ranked: Vec<((i32, i32), f64)> = totals.into_iter().collect();
        if limit < 0 || limit as usize >= ranked.len() {
            return (ranked.into_iter().map(|(k, _)| k).collect(), Vec::new());
        }
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
        let inactive = ranked.split_off(limit as usize);
        let mut active: Vec<(i32, i32)> = ranked.into_iter().map(|(k, _)| k).collect();
        let mut inactive: Vec<(i32, i32)> = inactive.into_iter().map(|(k, _)| k).collect();
        active.sort();
        inactive.sort();
        (active, inactive)
    }

    /// Spreads the demand of each pair evenly over `slices` time slices.
    pub fn split_time_slices(&self, slices: u32) -> OdMatrix {
        let slices = slices.max(1);
        let mut split = OdMatrix::new();
        for ((origin, destination), total) in self.od_totals() {
            for t in 1..=slices {
                split.set(origin, destination, t, total / f64::from(slices));
            }
        }
        split
    }
}
