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

//! Shortest path pruning and fixed passenger weights on the PTN.

use crate::{
    ean::{ActivityType, PeriodicEan},
    graph::Dijkstra,
    lines::LinePool,
    od::OdMatrix,
    ptn::{Link, Ptn},
    Result,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info, warn};

const EPSILON: f64 = 1e-9;

/// Shortest path bounds of an OD pair and the links that may lie on one of
/// its optimal paths.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PtnBounds {
    /// Shortest travel time with link lower bounds.
    pub lower: f64,
    /// Shortest travel time with link upper bounds.
    pub upper: f64,
    /// Links `(u, v)` with `d_low(s, u) + l(u, v) + d_low(v, t) <= d_up(s, t)`
    /// in at least one traversable direction.
    pub candidate_links: BTreeSet<i32>,
}

fn lower(link: &Link) -> f64 {
    f64::from(link.lower_bound)
}

fn upper(link: &Link) -> f64 {
    f64::from(link.upper_bound)
}

/// Bounds and candidate links of every OD pair. Pairs that cannot be
/// connected get infinite bounds and no candidate.
pub fn od_candidates(ptn: &Ptn, od_pairs: &[(i32, i32)]) -> Result<BTreeMap<(i32, i32), PtnBounds>> {
    info!("Computing candidate links for {} OD pairs", od_pairs.len());
    let mut from_origin: HashMap<i32, HashMap<i32, f64>> = HashMap::new();
    let mut to_destination: HashMap<i32, HashMap<i32, f64>> = HashMap::new();
    let stops: Vec<i32> = ptn.nodes().map(|s| s.id).collect();
    let mut result = BTreeMap::new();
    for &(origin, destination) in od_pairs {
        if !from_origin.contains_key(&origin) {
            let mut dijkstra = Dijkstra::new(ptn, lower);
            dijkstra.compute(origin)?;
            let distances = stops
                .iter()
                .map(|&s| Ok((s, dijkstra.distance(s)?)))
                .collect::<Result<HashMap<_, _>>>()?;
            from_origin.insert(origin, distances);
        }
        if !to_destination.contains_key(&destination) {
            let mut dijkstra = Dijkstra::new(ptn, lower).backward();
            dijkstra.compute(destination)?;
            let distances = stops
                .iter()
                .map(|&s| Ok((s, dijkstra.distance(s)?)))
                .collect::<Result<HashMap<_, _>>>()?;
            to_destination.insert(destination, distances);
        }
        let mut by_upper = Dijkstra::new(ptn, upper);
        by_upper.compute(origin)?;
        let bound = by_upper.distance(destination)?;
        let low_from = &from_origin[&origin];
        let low_to = &to_destination[&destination];
        let mut bounds = PtnBounds {
            lower: low_from[&destination],
            upper: bound,
            candidate_links: BTreeSet::new(),
        };
        if bound.is_infinite() {
            warn!("No path from stop {} to stop {}", origin, destination);
            result.insert((origin, destination), bounds);
            continue;
        }
        for link in ptn.edges() {
            let mut directions = vec![(link.left_stop, link.right_stop)];
            if !ptn.is_directed() {
                directions.push((link.right_stop, link.left_stop));
            }
            if directions
                .into_iter()
                .any(|(u, v)| low_from[&u] + lower(link) + low_to[&v] <= bound + EPSILON)
            {
                bounds.candidate_links.insert(link.id);
            }
        }
        debug!(
            "OD pair ({}, {}): bounds [{}, {}], {} candidate links",
            origin,
            destination,
            bounds.lower,
            bounds.upper,
            bounds.candidate_links.len()
        );
        result.insert((origin, destination), bounds);
    }
    Ok(result)
}

/// Passengers of non-routed OD pairs, fixed on their lower bound shortest
/// PTN path. Keys are stop sequences: `(from, to)` for drives,
/// `(previous, stop, next)` for waits and transfers. A stop between two
/// path links is a wait when some line serves the three stops in a row, a
/// transfer otherwise.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FixedPassengerWeights {
    /// Passengers driving from a stop to the next.
    pub drive: BTreeMap<(i32, i32), f64>,
    /// Passengers staying in their line at a stop.
    pub wait: BTreeMap<(i32, i32, i32), f64>,
    /// Passengers changing line at a stop.
    pub transfer: BTreeMap<(i32, i32, i32), f64>,
}

impl FixedPassengerWeights {
    /// Routes the whole demand of every pair of `od_pairs`.
    pub fn compute(ptn: &Ptn, lines: &LinePool, od: &OdMatrix, od_pairs: &[(i32, i32)]) -> Result<Self> {
        info!("Fixing the paths of {} OD pairs on the PTN", od_pairs.len());
        let mut weights = FixedPassengerWeights::default();
        let mut by_origin: BTreeMap<i32, Vec<i32>> = BTreeMap::new();
        for &(origin, destination) in od_pairs {
            by_origin.entry(origin).or_default().push(destination);
        }
        for (origin, destinations) in by_origin {
            let mut dijkstra = Dijkstra::new(ptn, lower);
            dijkstra.compute(origin)?;
            for destination in destinations {
                let passengers = od.total(origin, destination);
                if passengers <= 0.0 || origin == destination {
                    continue;
                }
                let path = match dijkstra.path(destination)? {
                    Some(path) => path,
                    None => {
                        warn!(
                            "{} passengers from stop {} to stop {} cannot be routed",
                            passengers, origin, destination
                        );
                        continue;
                    }
                };
                for pair in path.nodes.windows(2) {
                    *weights.drive.entry((pair[0], pair[1])).or_insert(0.0) += passengers;
                }
                for triple in path.nodes.windows(3) {
                    let key = (triple[0], triple[1], triple[2]);
                    let same_line = lines
                        .lines()
                        .any(|l| l.stops().windows(3).any(|w| w == triple));
                    let map = if same_line {
                        &mut weights.wait
                    } else {
                        &mut weights.transfer
                    };
                    *map.entry(key).or_insert(0.0) += passengers;
                }
            }
        }
        Ok(weights)
    }

    /// Whether no passenger is fixed.
    pub fn is_empty(&self) -> bool {
        self.drive.is_empty() && self.wait.is_empty() && self.transfer.is_empty()
    }

    /// Matches the weights with the activities of `ean` able to carry them:
    /// drives between the two stops, waits at the middle stop of lines
    /// coming from and going to the outer stops, changes from such an
    /// arriving line to such a departing line. The passengers of a weight
    /// ride exactly one of its alternatives.
    pub fn activity_alternatives(&self, ean: &PeriodicEan, lines: &LinePool) -> Result<Vec<FixedLoad>> {
        let mut drives: BTreeMap<(i32, i32), Vec<i32>> = BTreeMap::new();
        let mut waits: BTreeMap<(i32, i32, i32), Vec<i32>> = BTreeMap::new();
        let mut transfers: BTreeMap<(i32, i32, i32), Vec<i32>> = BTreeMap::new();
        let neighbour = |event: i32, offset: isize| -> Result<Option<(i32, i32)>> {
            let event = ean.get_node(event)?;
            let (stop, key) = match (event.stop(), event.line()) {
                (Some(stop), Some(key)) => (stop, key),
                _ => return Ok(None),
            };
            let line = lines.get_line(&key)?;
            let position = line.stops().iter().position(|&s| s == stop);
            Ok(position
                .and_then(|p| p.checked_add_signed(offset))
                .and_then(|p| line.stops().get(p))
                .map(|&other| (stop, other)))
        };
        for activity in ean.edges() {
            match activity.activity_type {
                ActivityType::Drive => {
                    let tail = ean.get_node(activity.tail)?.stop();
                    let head = ean.get_node(activity.head)?.stop();
                    if let (Some(tail), Some(head)) = (tail, head) {
                        drives.entry((tail, head)).or_default().push(activity.id);
                    }
                }
                ActivityType::Wait | ActivityType::Change => {
                    let before = neighbour(activity.tail, -1)?;
                    let after = neighbour(activity.head, 1)?;
                    if let (Some((stop, previous)), Some((_, next))) = (before, after) {
                        let map = if activity.activity_type == ActivityType::Wait {
                            &mut waits
                        } else {
                            &mut transfers
                        };
                        map.entry((previous, stop, next)).or_default().push(activity.id);
                    }
                }
                _ => {}
            }
        }
        let mut loads = Vec::new();
        alternatives(&self.drive, &mut drives, &mut loads, "drive");
        alternatives(&self.wait, &mut waits, &mut loads, "wait");
        alternatives(&self.transfer, &mut transfers, &mut loads, "transfer");
        Ok(loads)
    }
}

/// Passengers fixed on one activity among several alternatives.
#[derive(Debug, Clone, PartialEq)]
pub struct FixedLoad {
    /// Number of passengers, all riding the same activity.
    pub passengers: f64,
    /// Activities of the same type and stops, one per line able to carry
    /// the passengers.
    pub activities: Vec<i32>,
}

impl FixedLoad {
    /// Passengers bound to a single activity.
    pub fn on(activity: i32, passengers: f64) -> Self {
        FixedLoad {
            passengers,
            activities: vec![activity],
        }
    }
}

fn alternatives<K: Ord + std::fmt::Debug>(
    weights: &BTreeMap<K, f64>,
    activities: &mut BTreeMap<K, Vec<i32>>,
    loads: &mut Vec<FixedLoad>,
    kind: &str,
) {
    for (key, &passengers) in weights {
        match activities.remove(key) {
            Some(ids) if !ids.is_empty() => loads.push(FixedLoad {
                passengers,
                activities: ids,
            }),
            _ => warn!("No {} activity for fixed passengers at {:?}", kind, key),
        }
    }
}
