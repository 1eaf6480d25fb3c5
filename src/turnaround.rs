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

//! Minimal turnaround times and distances between the end of a trip and
//! the start of the next one of the same vehicle.

use crate::{
    graph::Dijkstra,
    ptn::{Link, Ptn},
    Parameters, Result,
};
use std::collections::{BTreeMap, HashMap};
use tracing::info;

/// Turnaround times are in time units, distances in kilometres. Values are
/// non-negative, `+∞` when the move is impossible. No triangle inequality is
/// assumed.
pub trait TurnaroundLookup {
    /// Time needed between arriving at `from` and departing at `to`.
    fn min_turnaround_time(&self, from: i32, to: i32) -> f64;
    /// Distance of the empty trip from `from` to `to`.
    fn min_turnaround_distance(&self, from: i32, to: i32) -> f64;
    /// Time needed to reach `stop` from the depot.
    fn min_from_depot_time(&self, stop: i32) -> f64;
    /// Time needed to reach the depot from `stop`.
    fn min_to_depot_time(&self, stop: i32) -> f64;
    /// Distance from the depot to `stop`.
    fn min_from_depot_distance(&self, stop: i32) -> f64;
    /// Distance from `stop` to the depot.
    fn min_to_depot_distance(&self, stop: i32) -> f64;
}

/// Turnarounds following shortest PTN paths: link lower bounds for times,
/// link lengths for distances. `vs_turn_over_time` is added to every
/// turnaround time. Without depot (`vs_depot_index < 0`) pulling in and out
/// is free.
#[derive(Debug, Clone, PartialEq)]
pub struct PtnTurnarounds {
    times: HashMap<(i32, i32), f64>,
    distances: HashMap<(i32, i32), f64>,
    turn_over_time: f64,
    depot: Option<i32>,
}

impl PtnTurnarounds {
    /// Computes the shortest paths between every two stops of `ptn`.
    pub fn new(ptn: &Ptn, parameters: &Parameters) -> Result<Self> {
        info!("Computing turnarounds between {} stops", ptn.node_count());
        let mut times = HashMap::new();
        let mut distances = HashMap::new();
        let stops: Vec<i32> = ptn.nodes().map(|s| s.id).collect();
        let mut by_time = Dijkstra::new(ptn, |l: &Link| f64::from(l.lower_bound));
        let mut by_length = Dijkstra::new(ptn, |l: &Link| l.length);
        for &from in &stops {
            by_time.compute(from)?;
            by_length.compute(from)?;
            for &to in &stops {
                times.insert((from, to), by_time.distance(to)?);
                distances.insert((from, to), by_length.distance(to)?);
            }
        }
        let depot = if parameters.vs_depot_index >= 0 {
            Some(parameters.vs_depot_index)
        } else {
            None
        };
        Ok(PtnTurnarounds {
            times,
            distances,
            turn_over_time: f64::from(parameters.vs_turn_over_time),
            depot,
        })
    }

    fn time(&self, from: i32, to: i32) -> f64 {
        self.times.get(&(from, to)).copied().unwrap_or(f64::INFINITY)
    }

    fn distance(&self, from: i32, to: i32) -> f64 {
        self.distances
            .get(&(from, to))
            .copied()
            .unwrap_or(f64::INFINITY)
    }
}

impl TurnaroundLookup for PtnTurnarounds {
    fn min_turnaround_time(&self, from: i32, to: i32) -> f64 {
        self.time(from, to) + self.turn_over_time
    }

    fn min_turnaround_distance(&self, from: i32, to: i32) -> f64 {
        self.distance(from, to)
    }

    fn min_from_depot_time(&self, stop: i32) -> f64 {
        self.depot.map_or(0.0, |depot| self.time(depot, stop))
    }

    fn min_to_depot_time(&self, stop: i32) -> f64 {
        self.depot.map_or(0.0, |depot| self.time(stop, depot))
    }

    fn min_from_depot_distance(&self, stop: i32) -> f64 {
        self.depot.map_or(0.0, |depot| self.distance(depot, stop))
    }

    fn min_to_depot_distance(&self, stop: i32) -> f64 {
        self.depot.map_or(0.0, |depot| self.distance(stop, depot))
    }
}

/// Explicit turnaround tables. Missing pairs are impossible moves, missing
/// depot entries are free.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FixedTurnarounds {
    /// `(from, to) -> (time, distance)`.
    pub turnarounds: BTreeMap<(i32, i32), (f64, f64)>,
    /// `stop -> (time, distance)` from the depot.
    pub from_depot: BTreeMap<i32, (f64, f64)>,
    /// `stop -> (time, distance)` to the depot.
    pub to_depot: BTreeMap<i32, (f64, f64)>,
}

impl FixedTurnarounds {
    /// Sets the same time and distance in both directions.
    pub fn set_symmetric(&mut self, a: i32, b: i32, time: f64, distance: f64) {
        self.turnarounds.insert((a, b), (time, distance));
        self.turnarounds.insert((b, a), (time, distance));
    }
}

impl TurnaroundLookup for FixedTurnarounds {
    fn min_turnaround_time(&self, from: i32, to: i32) -> f64 {
        self.turnarounds
            .get(&(from, to))
            .map_or(f64::INFINITY, |t| t.0)
    }

    fn min_turnaround_distance(&self, from: i32, to: i32) -> f64 {
        self.turnarounds
            .get(&(from, to))
            .map_or(f64::INFINITY, |t| t.1)
    }

    fn min_from_depot_time(&self, stop: i32) -> f64 {
        self.from_depot.get(&stop).map_or(0.0, |t| t.0)
    }

    fn min_to_depot_time(&self, stop: i32) -> f64 {
        self.to_depot.get(&stop).map_or(0.0, |t| t.0)
    }

    fn min_from_depot_distance(&self, stop: i32) -> f64 {
        self.from_depot.get(&stop).map_or(0.0, |t| t.1)
    }

    fn min_to_depot_distance(&self, stop: i32) -> f64 {
        self.to_depot.get(&stop).map_or(0.0, |t| t.1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::line_ptn;
    use pretty_assertions::assert_eq;

    #[test]
    fn ptn_turnarounds() {
        let ptn = line_ptn(false);
        let parameters = Parameters {
            vs_turn_over_time: 1,
            vs_depot_index: 2,
            ..Default::default()
        };
        let turnarounds = PtnTurnarounds::new(&ptn, &parameters).unwrap();
        assert_eq!(1.0, turnarounds.min_turnaround_time(3, 3));
        assert_eq!(5.0, turnarounds.min_turnaround_time(3, 1));
        assert_eq!(2.0, turnarounds.min_turnaround_distance(1, 3));
        assert_eq!(2.0, turnarounds.min_from_depot_time(3));
        assert_eq!(1.0, turnarounds.min_to_depot_distance(1));
    }

    #[test]
    fn directed_ptn_cannot_turn_back() {
        let ptn = line_ptn(true);
        let turnarounds = PtnTurnarounds::new(&ptn, &Parameters::default()).unwrap();
        assert_eq!(f64::INFINITY, turnarounds.min_turnaround_time(3, 1));
        assert_eq!(0.0, turnarounds.min_from_depot_time(3));
    }

    #[test]
    fn fixed_turnarounds() {
        let mut turnarounds = FixedTurnarounds::default();
        turnarounds.set_symmetric(1, 2, 5.0, 0.0);
        assert_eq!(5.0, turnarounds.min_turnaround_time(2, 1));
        assert_eq!(f64::INFINITY, turnarounds.min_turnaround_time(1, 1));
        assert_eq!(0.0, turnarounds.min_to_depot_time(1));
    }
}
