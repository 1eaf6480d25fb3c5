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

//! The periodic Event-Activity Network.
//!
//! Network events are bound to a stop and a line; OD events form the
//! routing super-structure used by the passenger-routing models. Activities
//! are the directed arcs between events, each with integer `[lower, upper]`
//! bounds on its periodic duration.

mod builder;

pub use builder::build_periodic_ean;

use crate::{
    error::LinTimError,
    graph::{Edge, Graph, Identifiable, Node},
    lines::LineKey,
    Result,
};
use anyhow::bail;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::str::FromStr;

/// Upper bound of activities without a maximal duration.
pub const UNBOUNDED: i32 = i32::MAX;

/// Arrival or departure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EventType {
    /// A vehicle arrives at the stop.
    Arrival,
    /// A vehicle departs from the stop.
    Departure,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventType::Arrival => write!(f, "arrival"),
            EventType::Departure => write!(f, "departure"),
        }
    }
}

impl FromStr for EventType {
    type Err = LinTimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "arrival" | "arr" => Ok(EventType::Arrival),
            "departure" | "dep" => Ok(EventType::Departure),
            _ => Err(LinTimError::DataIllegalEventType(s.to_string())),
        }
    }
}

/// What an event stands for.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EventKind {
    /// Arrival or departure of a line at a stop.
    Network {
        /// Stop served.
        stop: i32,
        /// Line (direction and repetition included).
        line: LineKey,
        /// Arrival or departure.
        event_type: EventType,
    },
    /// Where the passengers of an OD pair wishing to travel in a time slice
    /// enter the network.
    SourceOd {
        /// Origin stop.
        origin: i32,
        /// Destination stop.
        destination: i32,
        /// Desired time slice.
        time_slice: u32,
    },
    /// Where the passengers of an OD pair leave the network.
    TargetOd {
        /// Origin stop.
        origin: i32,
        /// Destination stop.
        destination: i32,
    },
}

/// A node of the periodic EAN.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodicEvent {
    /// Unique id.
    pub id: i32,
    /// Network or OD event.
    pub kind: EventKind,
    /// Passengers using the event.
    pub passengers: f64,
}

impl PeriodicEvent {
    /// A network event.
    pub fn network(id: i32, stop: i32, line: LineKey, event_type: EventType) -> Self {
        PeriodicEvent {
            id,
            kind: EventKind::Network {
                stop,
                line,
                event_type,
            },
            passengers: 0.0,
        }
    }

    /// Stop of a network event.
    pub fn stop(&self) -> Option<i32> {
        match self.kind {
            EventKind::Network { stop, .. } => Some(stop),
            _ => None,
        }
    }

    /// Line of a network event.
    pub fn line(&self) -> Option<LineKey> {
        match self.kind {
            EventKind::Network { line, .. } => Some(line),
            _ => None,
        }
    }

    /// Type of a network event.
    pub fn event_type(&self) -> Option<EventType> {
        match self.kind {
            EventKind::Network { event_type, .. } => Some(event_type),
            _ => None,
        }
    }

    /// Whether this is a network event.
    pub fn is_network(&self) -> bool {
        matches!(self.kind, EventKind::Network { .. })
    }
}

impl Identifiable for PeriodicEvent {
    fn id(&self) -> i32 {
        self.id
    }
    fn set_id(&mut self, id: i32) {
        self.id = id
    }
}

impl Node for PeriodicEvent {}

/// Kind of an activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum ActivityType {
    /// Travel of a line between two consecutive stops.
    Drive,
    /// Dwell of a line at a stop.
    Wait,
    /// Transfer between two lines at a stop.
    Change,
    /// Safety distance between two departures on a link.
    Headway,
    /// Turnaround of a vehicle between two lines.
    Turnaround,
    /// Synchronisation between consecutive repetitions of a line.
    Sync,
    /// From a source-OD event to a departure at the origin.
    To,
    /// From an arrival at the destination to a target-OD event.
    From,
    /// Between two source-OD events of the same pair, switching time slice.
    Time,
}

impl ActivityType {
    /// Activities between network events, constrained by the timetable.
    pub fn is_network(self) -> bool {
        matches!(
            self,
            ActivityType::Drive
                | ActivityType::Wait
                | ActivityType::Change
                | ActivityType::Headway
                | ActivityType::Turnaround
                | ActivityType::Sync
        )
    }

    /// Activities passengers can travel along.
    pub fn is_routing(self) -> bool {
        matches!(
            self,
            ActivityType::Drive
                | ActivityType::Wait
                | ActivityType::Change
                | ActivityType::To
                | ActivityType::From
                | ActivityType::Time
        )
    }

    /// Activities internal to a line run.
    pub fn is_line_internal(self) -> bool {
        matches!(self, ActivityType::Drive | ActivityType::Wait)
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActivityType::Drive => "drive",
            ActivityType::Wait => "wait",
            ActivityType::Change => "change",
            ActivityType::Headway => "headway",
            ActivityType::Turnaround => "turnaround",
            ActivityType::Sync => "sync",
            ActivityType::To => "to",
            ActivityType::From => "from",
            ActivityType::Time => "time",
        };
        write!(f, "{name}")
    }
}

impl FromStr for ActivityType {
    type Err = LinTimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "drive" => Ok(ActivityType::Drive),
            "wait" => Ok(ActivityType::Wait),
            "change" => Ok(ActivityType::Change),
            "headway" => Ok(ActivityType::Headway),
            "turnaround" => Ok(ActivityType::Turnaround),
            "sync" => Ok(ActivityType::Sync),
            "to" => Ok(ActivityType::To),
            "from" => Ok(ActivityType::From),
            "time" => Ok(ActivityType::Time),
            _ => Err(LinTimError::DataIllegalActivityType(s.to_string())),
        }
    }
}

/// An arc of the periodic EAN.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodicActivity {
    /// Unique id.
    pub id: i32,
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
}

impl PeriodicActivity {
    /// Creates an activity without passengers.
    pub fn new(
        id: i32,
        activity_type: ActivityType,
        tail: i32,
        head: i32,
        lower_bound: i32,
        upper_bound: i32,
    ) -> Self {
        PeriodicActivity {
            id,
            activity_type,
            tail,
            head,
            lower_bound,
            upper_bound,
            passengers: 0.0,
        }
    }

    /// `upper - lower`, the freedom of the activity.
    pub fn span(&self) -> i64 {
        i64::from(self.upper_bound) - i64::from(self.lower_bound)
    }

    /// Whether `duration` lies within the bounds.
    pub fn accepts(&self, duration: i64) -> bool {
        duration >= i64::from(self.lower_bound) && duration <= i64::from(self.upper_bound)
    }
}

impl Identifiable for PeriodicActivity {
    fn id(&self) -> i32 {
        self.id
    }
    fn set_id(&mut self, id: i32) {
        self.id = id
    }
}

impl Edge for PeriodicActivity {
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

/// The periodic EAN graph.
pub type PeriodicEan = Graph<PeriodicEvent, PeriodicActivity>;

/// The events of every line run, in running order.
///
/// A run starts at the departure without incoming drive or wait activity
/// and follows the line-internal activities.
pub fn line_event_sequences(ean: &PeriodicEan) -> Result<BTreeMap<LineKey, Vec<i32>>> {
    let mut next: HashMap<i32, i32> = HashMap::new();
    let mut has_previous: HashSet<i32> = HashSet::new();
    for activity in ean.edges().filter(|a| a.activity_type.is_line_internal()) {
        if next.insert(activity.tail, activity.head).is_some() {
            bail!(LinTimError::DataInconsistent(format!(
                "event {} has several line-internal successors",
                activity.tail
            )));
        }
        has_previous.insert(activity.head);
    }
    let mut sequences: BTreeMap<LineKey, Vec<i32>> = BTreeMap::new();
    for event in ean.nodes() {
        let line = match event.line() {
            Some(line) => line,
            None => continue,
        };
        if has_previous.contains(&event.id) {
            continue;
        }
        if sequences.contains_key(&line) {
            bail!(LinTimError::DataInconsistent(format!(
                "line {line} has several first events"
            )));
        }
        let mut sequence = vec![event.id];
        let mut current = event.id;
        while let Some(&following) = next.get(&current) {
            if sequence.len() > ean.node_count() {
                bail!(LinTimError::DataInconsistent(format!(
                    "line {line} runs in a cycle"
                )));
            }
            sequence.push(following);
            current = following;
        }
        sequences.insert(line, sequence);
    }
    Ok(sequences)
}

/// Network events grouped by stop and type, in id order.
pub fn events_by_stop(ean: &PeriodicEan) -> BTreeMap<(i32, EventType), Vec<i32>> {
    let mut index: BTreeMap<(i32, EventType), Vec<i32>> = BTreeMap::new();
    for event in ean.nodes() {
        if let EventKind::Network {
            stop, event_type, ..
        } = event.kind
        {
            index.entry((stop, event_type)).or_default().push(event.id);
        }
    }
    for ids in index.values_mut() {
        ids.sort_unstable();
    }
    index
}

/// Smallest positive representative of `value` modulo `period`.
pub fn modulo(value: i64, period: i64) -> i64 {
    value.rem_euclid(period)
}
