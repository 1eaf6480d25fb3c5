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

//! Expansion of a periodic timetable over `p_max` periods and the vehicle
//! schedule of the expanded line runs.
//!
//! Every run of a line is unrolled once per period: its first event takes
//! place at `(p - 1) * T + π(first)` and every following event after the
//! durations of the drive and wait activities before it, so runs crossing
//! the end of a period keep their events in order. Every network activity
//! is then unrolled between each two event instances whose time difference
//! lies within its bounds. Times and bounds of the expansion are in seconds,
//! shifted by `ean_earliest_time`.

use crate::{
    ean::{line_event_sequences, ActivityType, EventType, PeriodicEan, UNBOUNDED},
    error::LinTimError,
    graph::{Edge, Graph, Identifiable, Node},
    lines::LineKey,
    timetable::{AperiodicTimetable, PeriodicTimetable},
    vehicle_schedule::{Trip, TripType, VehicleConnections, VehicleSchedule, VehicleTour},
    Parameters, Result,
};
use anyhow::bail;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

/// An event of the aperiodic EAN.
#[derive(Debug, Clone, PartialEq)]
pub struct AperiodicEvent {
    /// Unique id.
    pub id: i32,
    /// Periodic event it is an instance of.
    pub periodic_id: i32,
    /// Arrival or departure.
    pub event_type: EventType,
    /// Time in seconds.
    pub time: i64,
    /// Passengers using the event.
    pub passengers: f64,
    /// Stop served.
    pub stop: i32,
}

impl Identifiable for AperiodicEvent {
    fn id(&self) -> i32 {
        self.id
    }
    fn set_id(&mut self, id: i32) {
        self.id = id
    }
}

impl Node for AperiodicEvent {}

/// An activity of the aperiodic EAN. Bounds are in seconds.
#[derive(Debug, Clone, PartialEq)]
pub struct AperiodicActivity {
    /// Unique id.
    pub id: i32,
    /// Periodic activity it is an instance of.
    pub periodic_id: i32,
    /// Kind.
    pub activity_type: ActivityType,
    /// Tail event.
    pub tail: i32,
    /// Head event.
    pub head: i32,
    /// Minimal duration.
    pub lower_bound: i32,
    /// Maximal duration, [`UNBOUNDED`] if none.
    pub upper_bound: i32,
    /// Passengers using the activity.
    pub passengers: f64,
    /// On a headway kept against the orientation of its periodic activity,
    /// the id of that periodic headway.
    pub corresponding_headway_id: Option<i32>,
}

impl Identifiable for AperiodicActivity {
    fn id(&self) -> i32 {
        self.id
    }
    fn set_id(&mut self, id: i32) {
        self.id = id
    }
}

impl Edge for AperiodicActivity {
    fn left_node(&self) -> i32 {
        self.tail
    }
    fn right_node(&self) -> i32 {
        self.head
    }
    fn set_nodes(&mut self, left: i32, right: i32) {
        self.tail = left;
        self.head = right;
    }
}

/// The aperiodic EAN graph.
pub type AperiodicEan = Graph<AperiodicEvent, AperiodicActivity>;

/// The unrolled network, its timetable and the instance of every periodic
/// event in every period.
#[derive(Debug, Clone)]
pub struct AperiodicExpansion {
    /// Unrolled events and activities.
    pub ean: AperiodicEan,
    /// Event times in seconds.
    pub timetable: AperiodicTimetable,
    instances: BTreeMap<(i32, i32), i32>,
    runs: BTreeMap<LineKey, Vec<i32>>,
}

fn bound_in_seconds(bound: i32, parameters: &Parameters) -> i32 {
    if bound == UNBOUNDED {
        return UNBOUNDED;
    }
    i32::try_from(parameters.to_seconds(i64::from(bound))).unwrap_or(UNBOUNDED)
}

/// Unrolls `ean` over `parameters.p_max` periods using `timetable`.
pub fn expand(ean: &PeriodicEan, timetable: &PeriodicTimetable, parameters: &Parameters) -> Result<AperiodicExpansion> {
    let period = i64::from(parameters.period_length);
    let periods = parameters.p_max.max(1);
    let runs = line_event_sequences(ean)?;
    let internal: HashMap<(i32, i32), i64> = ean
        .edges()
        .filter(|a| a.activity_type.is_line_internal())
        .map(|a| Ok(((a.tail, a.head), timetable.duration(a)?)))
        .collect::<Result<_>>()?;

    // time of every network event relative to period 1, in time units
    let mut offsets: BTreeMap<i32, i64> = BTreeMap::new();
    for events in runs.values() {
        let mut time = i64::from(timetable.time(events[0])?);
        offsets.insert(events[0], time);
        for pair in events.windows(2) {
            time += internal[&(pair[0], pair[1])];
            offsets.insert(pair[1], time);
        }
    }
    for event in ean.nodes().filter(|e| e.is_network()) {
        if !offsets.contains_key(&event.id) {
            offsets.insert(event.id, i64::from(timetable.time(event.id)?));
        }
    }

    let earliest = parameters.to_seconds(i64::from(parameters.ean_earliest_time));
    let mut expanded = AperiodicEan::new(true);
    let mut expanded_timetable = AperiodicTimetable::new();
    let mut instances = BTreeMap::new();
    let mut units: HashMap<i32, i64> = HashMap::new();
    let mut next_id = 1;
    for (&periodic_id, &offset) in &offsets {
        let event = ean.get_node(periodic_id)?;
        let (stop, event_type) = match (event.stop(), event.event_type()) {
            (Some(stop), Some(event_type)) => (stop, event_type),
            _ => continue,
        };
        for p in 1..=periods {
            let time = offset + i64::from(p - 1) * period;
            let seconds = earliest + parameters.to_seconds(time);
            expanded.add_node(AperiodicEvent {
                id: next_id,
                periodic_id,
                event_type,
                time: seconds,
                passengers: event.passengers,
                stop,
            })?;
            expanded_timetable.set(next_id, seconds);
            instances.insert((periodic_id, p), next_id);
            units.insert(next_id, time);
            next_id += 1;
        }
    }

    let mut next_id = 1;
    for activity in ean.edges().filter(|a| a.activity_type.is_network()) {
        let tails: Vec<i32> = (1..=periods)
            .filter_map(|p| instances.get(&(activity.tail, p)).copied())
            .collect();
        let heads: Vec<i32> = (1..=periods)
            .filter_map(|p| instances.get(&(activity.head, p)).copied())
            .collect();
        for &tail in &tails {
            for &head in &heads {
                let difference = units[&head] - units[&tail];
                let (tail, head, corresponding_headway_id) = if activity.accepts(difference) {
                    (tail, head, None)
                } else if activity.activity_type == ActivityType::Headway && activity.accepts(-difference) {
                    (head, tail, Some(activity.id))
                } else {
                    continue;
                };
                expanded.add_edge(AperiodicActivity {
                    id: next_id,
                    periodic_id: activity.id,
                    activity_type: activity.activity_type,
                    tail,
                    head,
                    lower_bound: bound_in_seconds(activity.lower_bound, parameters),
                    upper_bound: bound_in_seconds(activity.upper_bound, parameters),
                    passengers: activity.passengers,
                    corresponding_headway_id,
                })?;
                next_id += 1;
            }
        }
    }
    info!(
        "Aperiodic EAN built with {} events and {} activities over {} periods",
        expanded.node_count(),
        expanded.edge_count(),
        periods
    );
    Ok(AperiodicExpansion {
        ean: expanded,
        timetable: expanded_timetable,
        instances,
        runs,
    })
}

impl AperiodicExpansion {
    /// Instance of a periodic event in period `period`.
    pub fn instance(&self, periodic_event: i32, period: i32) -> Option<i32> {
        self.instances.get(&(periodic_event, period)).copied()
    }

    fn revenue_trip(&self, period: i32, line: LineKey) -> Result<Trip> {
        let events = match self.runs.get(&line) {
            Some(events) => events,
            None => bail!(LinTimError::DataIndexNotFound {
                kind: "line",
                index: line.directed_id(),
            }),
        };
        let first = events[0];
        let last = events[events.len() - 1];
        let instance = |event: i32| {
            self.instance(event, period).ok_or(LinTimError::DataIndexNotFound {
                kind: "aperiodic event",
                index: event,
            })
        };
        let start = self.ean.get_node(instance(first)?)?;
        let end = self.ean.get_node(instance(last)?)?;
        Ok(Trip {
            trip_type: TripType::Trip,
            start_aperiodic_event: start.id,
            start_periodic_event: first,
            start_stop: start.stop,
            start_time: start.time,
            end_aperiodic_event: end.id,
            end_periodic_event: last,
            end_stop: end.stop,
            end_time: end.time,
            line: line.id,
        })
    }

    /// One circulation per vehicle, numbered from 1 in pull-out order. Each
    /// tour alternates the revenue trips of the vehicle with the empty trips
    /// between them.
    pub fn vehicle_schedule(&self, connections: &VehicleConnections) -> Result<VehicleSchedule> {
        let mut schedule = VehicleSchedule::new();
        for (vehicle, chain) in (1..).zip(connections.chains()?) {
            let mut tour = VehicleTour::new(vehicle);
            let mut previous: Option<Trip> = None;
            for (period, line) in chain {
                let trip = self.revenue_trip(period, line)?;
                if let Some(previous) = &previous {
                    tour.push(Trip::empty_between(previous, &trip));
                }
                tour.push(trip.clone());
                previous = Some(trip);
            }
            debug!("Vehicle {} serves {} trips", vehicle, tour.len());
            schedule.circulation_mut(vehicle).add_tour(tour)?;
        }
        schedule.check_consistency()?;
        info!("Vehicle schedule with {} vehicles", schedule.vehicle_count());
        Ok(schedule)
    }
}
