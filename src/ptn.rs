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

//! The Public Transportation Network: stops and the links between them.

use crate::{
    graph::{Edge, Graph, Identifiable, Node},
    Result,
};
use anyhow::ensure;

/// A stop of the PTN.
#[derive(Debug, Clone, PartialEq)]
pub struct Stop {
    /// Unique id.
    pub id: i32,
    /// Short name.
    pub short_name: String,
    /// Long name.
    pub long_name: String,
    /// Planar x coordinate.
    pub x: f64,
    /// Planar y coordinate.
    pub y: f64,
    station: bool,
}

impl Stop {
    /// Creates a stop which is a station.
    pub fn new(id: i32, short_name: &str, long_name: &str, x: f64, y: f64) -> Self {
        Stop {
            id,
            short_name: short_name.to_string(),
            long_name: long_name.to_string(),
            x,
            y,
            station: true,
        }
    }

    /// Whether passengers may board and alight here. Read-only once the stop
    /// is built.
    pub fn is_station(&self) -> bool {
        self.station
    }
}

impl Identifiable for Stop {
    fn id(&self) -> i32 {
        self.id
    }
    fn set_id(&mut self, id: i32) {
        self.id = id
    }
}

impl Node for Stop {}

/// A link of the PTN between two stops.
#[derive(Debug, Clone, PartialEq)]
pub struct Link {
    /// Unique id.
    pub id: i32,
    /// First stop (tail for directed networks).
    pub left_stop: i32,
    /// Second stop (head for directed networks).
    pub right_stop: i32,
    /// Length in kilometres.
    pub length: f64,
    /// Minimal traversal time in time units.
    pub lower_bound: i32,
    /// Maximal traversal time in time units.
    pub upper_bound: i32,
    /// Minimal time between two departures on this link, 0 if none.
    pub headway: i32,
    /// Passenger load, if known.
    pub load: f64,
    /// Lower frequency bound, if known.
    pub lower_frequency: Option<i32>,
    /// Upper frequency bound, if known.
    pub upper_frequency: Option<i32>,
}

impl Link {
    /// Creates a link, checking `lower_bound <= upper_bound`.
    pub fn new(
        id: i32,
        left_stop: i32,
        right_stop: i32,
        length: f64,
        lower_bound: i32,
        upper_bound: i32,
    ) -> Result<Self> {
        ensure!(
            lower_bound <= upper_bound,
            "link {}: lower bound {} exceeds upper bound {}",
            id,
            lower_bound,
            upper_bound
        );
        Ok(Link {
            id,
            left_stop,
            right_stop,
            length,
            lower_bound,
            upper_bound,
            headway: 0,
            load: 0.0,
            lower_frequency: None,
            upper_frequency: None,
        })
    }

    /// The other end of the link when standing at `stop`.
    pub fn other_stop(&self, stop: i32) -> i32 {
        if self.left_stop == stop {
            self.right_stop
        } else {
            self.left_stop
        }
    }
}

impl Identifiable for Link {
    fn id(&self) -> i32 {
        self.id
    }
    fn set_id(&mut self, id: i32) {
        self.id = id
    }
}

impl Edge for Link {
    fn left_node(&self) -> i32 {
        self.left_stop
    }
    fn right_node(&self) -> i32 {
        self.right_stop
    }
    fn set_nodes(&mut self, left: i32, right: i32) {
        self.left_stop = left;
        self.right_stop = right;
    }
}

/// The PTN graph.
pub type Ptn = Graph<Stop, Link>;

/// A walking connection between two stops.
#[derive(Debug, Clone, PartialEq)]
pub struct WalkingEdge {
    /// Stop the walk starts at.
    pub from_stop: i32,
    /// Stop the walk ends at.
    pub to_stop: i32,
    /// Length in kilometres.
    pub length: f64,
    /// Walking time in time units.
    pub time: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn link_bounds_are_checked() {
        assert!(Link::new(1, 1, 2, 1.0, 3, 2).is_err());
        let link = Link::new(1, 1, 2, 1.0, 2, 2).unwrap();
        assert_eq!(2, link.other_stop(1));
        assert_eq!(1, link.other_stop(2));
        assert_eq!(0, link.headway);
    }

    #[test]
    fn stops_are_stations() {
        assert!(Stop::new(1, "A", "Alpha", 0.0, 0.0).is_station());
    }
}
