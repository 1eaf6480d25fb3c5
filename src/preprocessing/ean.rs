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

//! Shortest path pruning and fixed passenger loads on the periodic EAN.
//!
//! Activities are weighted with the perceived time of the passengers:
//! `factor_drive_time`, `factor_wait_time` and `factor_transfer_time` times
//! the duration bound, plus `transfer_penalty` on changes. To and from
//! activities are free, time activities cost the time slice penalty.

use crate::{
    ean::{ActivityType, EventKind, EventType, PeriodicActivity, PeriodicEan},
    graph::{Dijkstra, Graph},
    od::OdMatrix,
    Parameters, Result,
};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info, warn};

const EPSILON: f64 = 1e-9;

/// Penalty, in time units, for travelling in time slice `to` instead of the
/// wished time slice `from`.
pub fn time_slice_penalty(from: u32, to: u32, parameters: &Parameters) -> f64 {
    f64::from(from.abs_diff(to)) * f64::from(parameters.time_slice_length())
}

/// Perceived time of `activity` when it lasts `duration`, or `None` when
/// passengers cannot use it.
pub fn perceived_time(activity: &PeriodicActivity, duration: f64, ean: &PeriodicEan, parameters: &Parameters) -> Option<f64> {
    match activity.activity_type {
        ActivityType::Drive => Some(parameters.factor_drive_time * duration),
        ActivityType::Wait => Some(parameters.factor_wait_time * duration),
        ActivityType::Change => {
            Some(parameters.factor_transfer_time * duration + parameters.transfer_penalty)
        }
        ActivityType::To | ActivityType::From => Some(0.0),
        ActivityType::Time => {
            let slice = |event: i32| match ean.node(event).map(|e| e.kind) {
                Some(EventKind::SourceOd { time_slice, .. }) => Some(time_slice),
                _ => None,
            };
            match (slice(activity.tail), slice(activity.head)) {
                (Some(from), Some(to)) => Some(
                    parameters.factor_penalty_time_slice * time_slice_penalty(from, to, parameters),
                ),
                _ => None,
            }
        }
        _ => None,
    }
}

/// The EAN restricted to the activities passengers can use, weighted with
/// their perceived lower and upper durations.
struct RoutingNetwork {
    graph: PeriodicEan,
    lower: HashMap<i32, f64>,
    upper: HashMap<i32, f64>,
}

impl RoutingNetwork {
    fn new(ean: &PeriodicEan, parameters: &Parameters, with_od: bool) -> Result<Self> {
        let mut graph = Graph::new(true);
        for event in ean.nodes() {
            if with_od || event.is_network() {
                graph.add_node(event.clone())?;
            }
        }
        let mut lower = HashMap::new();
        let mut upper = HashMap::new();
        for activity in ean.edges() {
            if !with_od && !activity.activity_type.is_line_internal() && activity.activity_type != ActivityType::Change {
                continue;
            }
            let low = perceived_time(activity, f64::from(activity.lower_bound), ean, parameters);
            let high = match activity.activity_type {
                ActivityType::To | ActivityType::From | ActivityType::Time => low,
                _ => perceived_time(activity, f64::from(activity.upper_bound), ean, parameters),
            };
            if let (Some(low), Some(high)) = (low, high) {
                graph.add_edge(activity.clone())?;
                lower.insert(activity.id, low);
                upper.insert(activity.id, high);
            }
        }
        Ok(RoutingNetwork {
            graph,
            lower,
            upper,
        })
    }

    fn distances(&self, sources: &[i32], upper: bool, backward: bool) -> Result<HashMap<i32, f64>> {
        let weights = if upper { &self.upper } else { &self.lower };
        let mut dijkstra = Dijkstra::new(&self.graph, |a: &PeriodicActivity| weights[&a.id]);
        if backward {
            dijkstra = dijkstra.backward();
        }
        dijkstra.compute_from(sources)?;
        self.graph
            .nodes()
            .map(|e| Ok((e.id, dijkstra.distance(e.id)?)))
            .collect()
    }
}

/// Events and activities that may lie on an optimal path of one OD pair in
/// one time slice.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct EanCandidates {
    /// Perceived time of the best path with lower bound durations.
    pub lower: f64,
    /// Perceived time of the best path with upper bound durations.
    pub upper: f64,
    /// Events usable by the pair.
    pub events: BTreeSet<i32>,
    /// Activities usable by the pair.
    pub activities: BTreeSet<i32>,
}

/// Candidates of every `(origin, destination, time slice)` having OD events
/// in `ean`.
pub fn ean_candidates(ean: &PeriodicEan, parameters: &Parameters) -> Result<BTreeMap<(i32, i32, u32), EanCandidates>> {
    let network = RoutingNetwork::new(ean, parameters, true)?;
    let mut targets = HashMap::new();
    let mut sources = Vec::new();
    for event in ean.nodes() {
        match event.kind {
            EventKind::SourceOd {
                origin,
                destination,
                time_slice,
            } => sources.push((origin, destination, time_slice, event.id)),
            EventKind::TargetOd {
                origin,
                destination,
            } => {
                targets.insert((origin, destination), event.id);
            }
            EventKind::Network { .. } => {}
        }
    }
    sources.sort_unstable();
    info!("Computing EAN candidates of {} commodities", sources.len());
    let mut backward_distances: HashMap<i32, HashMap<i32, f64>> = HashMap::new();
    let mut result = BTreeMap::new();
    for (origin, destination, time_slice, source) in sources {
        let target = match targets.get(&(origin, destination)) {
            Some(&target) => target,
            None => continue,
        };
        if !backward_distances.contains_key(&target) {
            backward_distances.insert(target, network.distances(&[target], false, true)?);
        }
        let low_to = &backward_distances[&target];
        let low_from = network.distances(&[source], false, false)?;
        let bound = network.distances(&[source], true, false)?[&target];
        let mut candidates = EanCandidates {
            lower: low_from[&target],
            upper: bound,
            ..Default::default()
        };
        if bound.is_infinite() {
            warn!(
                "OD pair ({}, {}) in time slice {} cannot reach its destination",
                origin, destination, time_slice
            );
        } else {
            for event in network.graph.nodes() {
                if low_from[&event.id] + low_to[&event.id] <= bound + EPSILON {
                    candidates.events.insert(event.id);
                }
            }
            for activity in network.graph.edges() {
                let through =
                    low_from[&activity.tail] + network.lower[&activity.id] + low_to[&activity.head];
                if through <= bound + EPSILON {
                    candidates.activities.insert(activity.id);
                }
            }
        }
        debug!(
            "Commodity ({}, {}, {}): {} candidate activities",
            origin,
            destination,
            time_slice,
            candidates.activities.len()
        );
        result.insert((origin, destination, time_slice), candidates);
    }
    Ok(result)
}

/// Passengers of non-routed OD pairs fixed on their shortest perceived path
/// through the network activities.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct FixedLoads {
    /// Passengers per activity.
    pub loads: BTreeMap<i32, f64>,
    /// Sum over the fixed passengers of their lower bound perceived time.
    pub lower_bound: f64,
}

/// Routes the whole demand of every pair of `od_pairs` from the departures
/// at its origin to the closest arrival at its destination.
pub fn fixed_loads(ean: &PeriodicEan, od: &OdMatrix, od_pairs: &[(i32, i32)], parameters: &Parameters) -> Result<FixedLoads> {
    info!("Fixing the paths of {} OD pairs in the EAN", od_pairs.len());
    let network = RoutingNetwork::new(ean, parameters, false)?;
    let mut departures: BTreeMap<i32, Vec<i32>> = BTreeMap::new();
    let mut arrivals: BTreeMap<i32, Vec<i32>> = BTreeMap::new();
    for event in network.graph.nodes() {
        if let EventKind::Network {
            stop, event_type, ..
        } = event.kind
        {
            match event_type {
                EventType::Departure => departures.entry(stop).or_default().push(event.id),
                EventType::Arrival => arrivals.entry(stop).or_default().push(event.id),
            }
        }
    }
    let mut result = FixedLoads::default();
    for &(origin, destination) in od_pairs {
        let passengers = od.total(origin, destination);
        if passengers <= 0.0 || origin == destination {
            continue;
        }
        let starts = departures.get(&origin).cloned().unwrap_or_default();
        let ends = arrivals.get(&destination).cloned().unwrap_or_default();
        if starts.is_empty() || ends.is_empty() {
            warn!("OD pair ({}, {}) is not served", origin, destination);
            continue;
        }
        let mut dijkstra = Dijkstra::new(&network.graph, |a: &PeriodicActivity| network.lower[&a.id]);
        dijkstra.compute_from(&starts)?;
        let mut best: Option<(f64, i32)> = None;
        for &end in &ends {
            let distance = dijkstra.distance(end)?;
            if distance.is_finite() && best.map_or(true, |(d, _)| distance < d - EPSILON) {
                best = Some((distance, end));
            }
        }
        let (distance, end) = match best {
            Some(best) => best,
            None => {
                warn!("OD pair ({}, {}) cannot be routed", origin, destination);
                continue;
            }
        };
        if let Some(path) = dijkstra.path(end)? {
            for activity in path.edges {
                *result.loads.entry(activity).or_insert(0.0) += passengers;
            }
        }
        result.lower_bound += passengers * distance;
    }
    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ean::build_periodic_ean,
        lines::{LineCostModel, LinePool},
        test_utils::{line_ptn, od_matrix, scenario_a_parameters, single_line_pool},
    };
    use pretty_assertions::assert_eq;

    #[test]
    fn penalties() {
        let parameters = Parameters {
            period_length: 60,
            number_of_time_slices: 4,
            ..Default::default()
        };
        assert_eq!(30.0, time_slice_penalty(1, 3, &parameters));
        assert_eq!(15.0, time_slice_penalty(4, 3, &parameters));
    }

    #[test]
    fn single_line_candidates() {
        let ptn = line_ptn(true);
        let lines = single_line_pool(&ptn);
        let ean = build_periodic_ean(&ptn, &lines, &[(1, 3)], None, &scenario_a_parameters()).unwrap();
        let candidates = ean_candidates(&ean, &scenario_a_parameters()).unwrap();
        let commodity = &candidates[&(1, 3, 1)];
        // drive 2 + wait 1 + drive 2 against drive 3 + wait 2 + drive 3
        assert_eq!(5.0, commodity.lower);
        assert_eq!(8.0, commodity.upper);
        // to, drive, wait, drive, from
        assert_eq!(5, commodity.activities.len());
        assert_eq!(6, commodity.events.len());
    }

    #[test]
    fn slower_line_is_pruned() {
        let ptn = line_ptn(true);
        let mut lines = LinePool::new(false);
        lines
            .add_line(&ptn, 1, &[1, 2], 1, None, &LineCostModel::default())
            .unwrap();
        lines
            .add_line(&ptn, 2, &[1], 1, None, &LineCostModel::default())
            .unwrap();
        let parameters = Parameters {
            transfer_penalty: 100.0,
            ..scenario_a_parameters()
        };
        let ean = build_periodic_ean(&ptn, &lines, &[(1, 3)], None, &parameters).unwrap();
        let commodity = &ean_candidates(&ean, &parameters).unwrap()[&(1, 3, 1)];
        let change = ean
            .edges()
            .find(|a| a.activity_type == ActivityType::Change)
            .unwrap();
        assert!(!commodity.activities.contains(&change.id));
    }

    #[test]
    fn fixed_loads_follow_the_line() {
        let ptn = line_ptn(true);
        let lines = single_line_pool(&ptn);
        let parameters = scenario_a_parameters();
        let ean = build_periodic_ean(&ptn, &lines, &[], None, &parameters).unwrap();
        let od = od_matrix(&[(1, 3, 7.0), (3, 1, 2.0)]);
        let fixed = fixed_loads(&ean, &od, &[(1, 3), (3, 1)], &parameters).unwrap();
        assert_eq!(3, fixed.loads.len());
        assert!(fixed.loads.values().all(|&l| l == 7.0));
        assert_eq!(7.0 * 5.0, fixed.lower_bound);
    }
}
