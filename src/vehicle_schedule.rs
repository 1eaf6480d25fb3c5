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

//! Vehicle schedules: circulations of vehicle tours made of trips.

use crate::{error::LinTimError, lines::LineKey, Result};
use anyhow::bail;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

/// Revenue or empty trip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TripType {
    /// A line run carrying passengers.
    Trip,
    /// A deadhead between two line runs.
    Empty,
}

impl fmt::Display for TripType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TripType::Trip => write!(f, "TRIP"),
            TripType::Empty => write!(f, "EMPTY"),
        }
    }
}

impl FromStr for TripType {
    type Err = LinTimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "TRIP" => Ok(TripType::Trip),
            "EMPTY" => Ok(TripType::Empty),
            _ => Err(LinTimError::DataInconsistent(format!(
                "illegal trip type {s:?}"
            ))),
        }
    }
}

/// A run of a line in one period, `(period, line)` with periods counted
/// from 1.
pub type TripKey = (i32, LineKey);

/// Which line runs one vehicle serves in a row, as decided by the vehicle
/// scheduling models.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VehicleConnections {
    /// Every operated run.
    pub trips: BTreeSet<TripKey>,
    /// Runs served by a vehicle leaving the depot.
    pub pull_outs: BTreeSet<TripKey>,
    /// The run a vehicle serves after a given run, absent before a pull-in.
    pub next: BTreeMap<TripKey, TripKey>,
}

impl VehicleConnections {
    /// Runs of each vehicle in service order, one chain per pull-out.
    pub fn chains(&self) -> Result<Vec<Vec<TripKey>>> {
        let mut chains = Vec::new();
        for &start in &self.pull_outs {
            let mut chain = vec![start];
            let mut current = start;
            while let Some(&following) = self.next.get(&current) {
                if chain.len() > self.trips.len() {
                    bail!(LinTimError::DataInconsistent(format!(
                        "vehicle starting with line {} in period {} never returns to the depot",
                        start.1, start.0
                    )));
                }
                chain.push(following);
                current = following;
            }
            chains.push(chain);
        }
        let served: usize = chains.iter().map(Vec::len).sum();
        if served != self.trips.len() {
            bail!(LinTimError::DataInconsistent(format!(
                "{} runs are operated but vehicles serve {}",
                self.trips.len(),
                served
            )));
        }
        Ok(chains)
    }
}

/// One trip of a vehicle. Times are in seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct Trip {
    /// Revenue or empty.
    pub trip_type: TripType,
    /// First aperiodic event.
    pub start_aperiodic_event: i32,
    /// Periodic parent of the first event.
    pub start_periodic_event: i32,
    /// Stop the trip starts at.
    pub start_stop: i32,
    /// Departure time.
    pub start_time: i64,
    /// Last aperiodic event.
    pub end_aperiodic_event: i32,
    /// Periodic parent of the last event.
    pub end_periodic_event: i32,
    /// Stop the trip ends at.
    pub end_stop: i32,
    /// Arrival time.
    pub end_time: i64,
    /// Line of a revenue trip, -1 for empty trips.
    pub line: i32,
}

impl Trip {
    /// The empty trip joining the end of `from` to the start of `to`.
    pub fn empty_between(from: &Trip, to: &Trip) -> Self {
        Trip {
            trip_type: TripType::Empty,
            start_aperiodic_event: from.end_aperiodic_event,
            start_periodic_event: from.end_periodic_event,
            start_stop: from.end_stop,
            start_time: from.end_time,
            end_aperiodic_event: to.start_aperiodic_event,
            end_periodic_event: to.start_periodic_event,
            end_stop: to.start_stop,
            end_time: to.start_time,
            line: -1,
        }
    }
}

/// The trips of one vehicle, numbered consecutively.
#[derive(Debug, Clone, PartialEq)]
pub struct VehicleTour {
    vehicle_id: i32,
    trips: BTreeMap<i32, Trip>,
}

impl VehicleTour {
    /// An empty tour.
    pub fn new(vehicle_id: i32) -> Self {
        VehicleTour {
            vehicle_id,
            trips: BTreeMap::new(),
        }
    }

    /// The vehicle driving the tour.
    pub fn vehicle_id(&self) -> i32 {
        self.vehicle_id
    }

    /// Appends a trip with the next trip number.
    pub fn push(&mut self, trip: Trip) {
        let number = self.trips.keys().next_back().map_or(1, |n| n + 1);
        self.trips.insert(number, trip);
    }

    /// Inserts a trip with an explicit number.
    pub fn insert(&mut self, number: i32, trip: Trip) -> Result<()> {
        if self.trips.insert(number, trip).is_some() {
            bail!(LinTimError::DataInconsistent(format!(
                "trip {} of vehicle {} is defined twice",
                number, self.vehicle_id
            )));
        }
        Ok(())
    }

    /// `(trip number, trip)` in order.
    pub fn trips(&self) -> impl Iterator<Item = (i32, &Trip)> {
        self.trips.iter().map(|(&n, t)| (n, t))
    }

    /// Number of trips.
    pub fn len(&self) -> usize {
        self.trips.len()
    }

    /// Whether the tour has no trip.
    pub fn is_empty(&self) -> bool {
        self.trips.is_empty()
    }
}

/// A set of vehicle tours, at most one per vehicle.
#[derive(Debug, Clone, PartialEq)]
pub struct Circulation {
    id: i32,
    tours: BTreeMap<i32, VehicleTour>,
}

impl Circulation {
    /// An empty circulation.
    pub fn new(id: i32) -> Self {
        Circulation {
            id,
            tours: BTreeMap::new(),
        }
    }

    /// Id of the circulation.
    pub fn id(&self) -> i32 {
        self.id
    }

    /// Adds a tour, failing if its vehicle already has one.
    pub fn add_tour(&mut self, tour: VehicleTour) -> Result<()> {
        if self.tours.contains_key(&tour.vehicle_id) {
            bail!(LinTimError::DataInconsistent(format!(
                "vehicle {} appears twice in circulation {}",
                tour.vehicle_id, self.id
            )));
        }
        self.tours.insert(tour.vehicle_id, tour);
        Ok(())
    }

    /// Tour of a vehicle, created empty if needed.
    pub fn tour_mut(&mut self, vehicle_id: i32) -> &mut VehicleTour {
        self.tours
            .entry(vehicle_id)
            .or_insert_with(|| VehicleTour::new(vehicle_id))
    }

    /// Tours in vehicle order.
    pub fn tours(&self) -> impl Iterator<Item = &VehicleTour> {
        self.tours.values()
    }
}

/// Circulations in id order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct VehicleSchedule {
    circulations: BTreeMap<i32, Circulation>,
}

impl VehicleSchedule {
    /// An empty schedule.
    pub fn new() -> Self {
        VehicleSchedule::default()
    }

    /// Adds a circulation, failing if its id is used.
    pub fn add_circulation(&mut self, circulation: Circulation) -> Result<()> {
        if self.circulations.contains_key(&circulation.id) {
            bail!(LinTimError::DataInconsistent(format!(
                "circulation {} is defined twice",
                circulation.id
            )));
        }
        self.circulations.insert(circulation.id, circulation);
        Ok(())
    }

    /// Circulation with this id, created empty if needed.
    pub fn circulation_mut(&mut self, id: i32) -> &mut Circulation {
        self.circulations
            .entry(id)
            .or_insert_with(|| Circulation::new(id))
    }

    /// Circulations in id order.
    pub fn circulations(&self) -> impl Iterator<Item = &Circulation> {
        self.circulations.values()
    }

    /// Number of tours over every circulation.
    pub fn vehicle_count(&self) -> usize {
        self.circulations.values().map(|c| c.tours.len()).sum()
    }

    /// Checks that consecutive trips of every tour share their connecting
    /// event and that empty trips have no line.
    pub fn check_consistency(&self) -> Result<()> {
        for circulation in self.circulations() {
            for tour in circulation.tours() {
                let mut previous: Option<&Trip> = None;
                for (number, trip) in tour.trips() {
                    if trip.trip_type == TripType::Empty && trip.line != -1 {
                        bail!(LinTimError::DataInconsistent(format!(
                            "empty trip {} of vehicle {} has line {}",
                            number,
                            tour.vehicle_id(),
                            trip.line
                        )));
                    }
                    if let Some(previous) = previous {
                        if previous.end_aperiodic_event != trip.start_aperiodic_event {
                            bail!(LinTimError::DataInconsistent(format!(
                                "trip {} of vehicle {} does not start where the previous one ends",
                                number,
                                tour.vehicle_id()
                            )));
                        }
                    }
                    previous = Some(trip);
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn trip(start: i32, end: i32, line: i32) -> Trip {
        Trip {
            trip_type: TripType::Trip,
            start_aperiodic_event: start,
            start_periodic_event: start,
            start_stop: 1,
            start_time: 0,
            end_aperiodic_event: end,
            end_periodic_event: end,
            end_stop: 2,
            end_time: 60,
            line,
        }
    }

    #[test]
    fn consistent_tour() {
        let mut schedule = VehicleSchedule::new();
        let first = trip(1, 2, 1);
        let second = trip(3, 4, 2);
        let tour = schedule.circulation_mut(1).tour_mut(7);
        tour.push(first.clone());
        tour.push(Trip::empty_between(&first, &second));
        tour.push(second);
        assert_eq!(1, schedule.vehicle_count());
        schedule.check_consistency().unwrap();
        let numbers: Vec<i32> = schedule
            .circulations()
            .flat_map(|c| c.tours())
            .flat_map(|t| t.trips().map(|(n, _)| n).collect::<Vec<_>>())
            .collect();
        assert_eq!(vec![1, 2, 3], numbers);
    }

    #[test]
    fn connection_chains() {
        use crate::lines::LineDirection;
        let first = (1, LineKey::new(1, LineDirection::Forward, 1));
        let second = (1, LineKey::new(2, LineDirection::Forward, 1));
        let third = (2, LineKey::new(1, LineDirection::Forward, 1));
        let connections = VehicleConnections {
            trips: BTreeSet::from([first, second, third]),
            pull_outs: BTreeSet::from([first, third]),
            next: BTreeMap::from([(first, second)]),
        };
        assert_eq!(
            vec![vec![first, second], vec![third]],
            connections.chains().unwrap()
        );
        let orphan = VehicleConnections {
            pull_outs: BTreeSet::from([first]),
            ..connections
        };
        assert!(orphan.chains().is_err());
    }

    #[test]
    fn broken_tour_and_duplicates() {
        let mut schedule = VehicleSchedule::new();
        let tour = schedule.circulation_mut(1).tour_mut(7);
        tour.push(trip(1, 2, 1));
        tour.push(trip(3, 4, 2));
        assert!(schedule.check_consistency().is_err());
        assert!(schedule
            .circulation_mut(1)
            .add_tour(VehicleTour::new(7))
            .is_err());
        assert!(schedule.add_circulation(Circulation::new(1)).is_err());
        assert_eq!(TripType::Empty, "empty".parse().unwrap());
    }
}
