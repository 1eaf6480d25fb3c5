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

//! Construction of the periodic EAN from a PTN, lines and OD pairs.

use super::{ActivityType, EventKind, EventType, PeriodicActivity, PeriodicEan, PeriodicEvent, UNBOUNDED};
use crate::{
    lines::{LineKey, LinePool},
    ptn::Ptn,
    Parameters, Result,
};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{info, warn};

struct Drive {
    link: i32,
    from_stop: i32,
    line: LineKey,
    departure: i32,
}

struct EanAssembly {
    ean: PeriodicEan,
    next_event: i32,
    next_activity: i32,
}

impl EanAssembly {
    fn event(&mut self, kind: EventKind) -> Result<i32> {
        let id = self.next_event;
        self.next_event += 1;
        self.ean.add_node(PeriodicEvent {
            id,
            kind,
            passengers: 0.0,
        })?;
        Ok(id)
    }

    fn activity(&mut self, activity_type: ActivityType, tail: i32, head: i32, lower: i32, upper: i32) -> Result<i32> {
        let id = self.next_activity;
        self.next_activity += 1;
        self.ean
            .add_edge(PeriodicActivity::new(id, activity_type, tail, head, lower, upper))?;
        Ok(id)
    }
}

/// Builds the periodic EAN.
///
/// - every line gets a departure and an arrival event per link, joined by a
///   drive activity with the link bounds, and a wait activity
///   `[min_wait_time, max_wait_time]` at every interior stop;
/// - every stop gets change activities `[min_trans_time, max_trans_time]`
///   from each arrival to each departure of another line route, restricted
///   to `transfer_stations` when given;
/// - links with a headway `h` get headway activities `[h, T - h]` between
///   the departures of every two lines running over them in the same
///   direction;
/// - consecutive repetitions of a line with frequency `f >= 2` are tied by
///   sync activities of duration exactly `T / f` at every event;
/// - every pair in `od_pairs` gets one source-OD event per time slice with
///   to activities towards all departures at the origin, pairwise time
///   activities between its source-OD events, and one target-OD event
///   reached by from activities from all arrivals at the destination.
pub fn build_periodic_ean(
    ptn: &Ptn,
    lines: &LinePool,
    od_pairs: &[(i32, i32)],
    transfer_stations: Option<&BTreeSet<i32>>,
    parameters: &Parameters,
) -> Result<PeriodicEan> {
    info!("Building the periodic EAN...");
    let period = parameters.period_length;
    let mut assembly = EanAssembly {
        ean: PeriodicEan::new(true),
        next_event: 1,
        next_activity: 1,
    };
    let mut line_events: BTreeMap<LineKey, Vec<i32>> = BTreeMap::new();
    let mut drives = Vec::new();
    let mut arrivals: BTreeMap<i32, Vec<(i32, LineKey)>> = BTreeMap::new();
    let mut departures: BTreeMap<i32, Vec<(i32, LineKey)>> = BTreeMap::new();

    for line in lines.lines() {
        let key = line.key();
        let mut events = Vec::with_capacity(2 * line.links().len());
        let mut previous_arrival = None;
        for (position, &link_id) in line.links().iter().enumerate() {
            let link = ptn.get_edge(link_id)?;
            let (from, to) = (line.stops()[position], line.stops()[position + 1]);
            let departure = assembly.event(EventKind::Network {
                stop: from,
                line: key,
                event_type: EventType::Departure,
            })?;
            if let Some(arrival) = previous_arrival {
                assembly.activity(
                    ActivityType::Wait,
                    arrival,
                    departure,
                    parameters.min_wait_time,
                    parameters.max_wait_time,
                )?;
            }
            let arrival = assembly.event(EventKind::Network {
                stop: to,
                line: key,
                event_type: EventType::Arrival,
            })?;
            assembly.activity(
                ActivityType::Drive,
                departure,
                arrival,
                link.lower_bound,
                link.upper_bound,
            )?;
            drives.push(Drive {
                link: link_id,
                from_stop: from,
                line: key,
                departure,
            });
            departures.entry(from).or_default().push((departure, key));
            arrivals.entry(to).or_default().push((arrival, key));
            events.push(departure);
            events.push(arrival);
            previous_arrival = Some(arrival);
        }
        line_events.insert(key, events);
    }

    for (stop, stop_arrivals) in &arrivals {
        if let Some(stations) = transfer_stations {
            if !stations.contains(stop) {
                continue;
            }
        }
        if !ptn.node(*stop).map_or(true, |s| s.is_station()) {
            continue;
        }
        let stop_departures = match departures.get(stop) {
            Some(d) => d,
            None => continue,
        };
        for &(arrival, from_line) in stop_arrivals {
            for &(departure, to_line) in stop_departures {
                if from_line.id == to_line.id && from_line.direction == to_line.direction {
                    continue;
                }
                assembly.activity(
                    ActivityType::Change,
                    arrival,
                    departure,
                    parameters.min_trans_time,
                    parameters.max_trans_time,
                )?;
            }
        }
    }

    for link in ptn.edges().filter(|l| l.headway > 0) {
        let headway = link.headway;
        if 2 * headway > period {
            warn!(
                "Headway {} of link {} does not fit twice in the period, ignored",
                headway, link.id
            );
            continue;
        }
        let on_link: Vec<&Drive> = drives.iter().filter(|d| d.link == link.id).collect();
        for (i, first) in on_link.iter().enumerate() {
            for second in &on_link[i + 1..] {
                if first.from_stop != second.from_stop || first.line == second.line {
                    continue;
                }
                assembly.activity(
                    ActivityType::Headway,
                    first.departure,
                    second.departure,
                    headway,
                    period - headway,
                )?;
            }
        }
    }

    for line in lines.lines().filter(|l| l.frequency() >= 2) {
        let key = line.key();
        if key.repetition >= line.frequency() {
            continue;
        }
        let next_key = LineKey::new(key.id, key.direction, key.repetition + 1);
        let (current, next) = match (line_events.get(&key), line_events.get(&next_key)) {
            (Some(current), Some(next)) => (current, next),
            _ => continue,
        };
        let duration = period / line.frequency() as i32;
        for (&tail, &head) in current.iter().zip(next) {
            assembly.activity(ActivityType::Sync, tail, head, duration, duration)?;
        }
    }

    for &(origin, destination) in od_pairs {
        let starts = departures.get(&origin).cloned().unwrap_or_default();
        let ends = arrivals.get(&destination).cloned().unwrap_or_default();
        if starts.is_empty() || ends.is_empty() {
            warn!(
                "OD pair ({}, {}) cannot be served by the lines",
                origin, destination
            );
        }
        let mut sources = Vec::new();
        for time_slice in 1..=parameters.number_of_time_slices {
            let source = assembly.event(EventKind::SourceOd {
                origin,
                destination,
                time_slice,
            })?;
            for &(departure, _) in &starts {
                assembly.activity(ActivityType::To, source, departure, 0, UNBOUNDED)?;
            }
            sources.push(source);
        }
        for &tail in &sources {
            for &head in &sources {
                if tail != head {
                    assembly.activity(ActivityType::Time, tail, head, 0, UNBOUNDED)?;
                }
            }
        }
        let target = assembly.event(EventKind::TargetOd {
            origin,
            destination,
        })?;
        for &(arrival, _) in &ends {
            assembly.activity(ActivityType::From, arrival, target, 0, UNBOUNDED)?;
        }
    }

    info!(
        "EAN built with {} events and {} activities",
        assembly.ean.node_count(),
        assembly.ean.edge_count()
    );
    Ok(assembly.ean)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ean::line_event_sequences,
        lines::{LineCostModel, LineDirection},
        test_utils::{line_ptn, scenario_a_parameters},
    };
    use pretty_assertions::assert_eq;

    fn count(ean: &PeriodicEan, activity_type: ActivityType) -> usize {
        ean.edges().filter(|a| a.activity_type == activity_type).count()
    }

    #[test]
    fn scenario_a_structure() {
        let ptn = line_ptn(true);
        let mut lines = LinePool::new(false);
        lines
            .add_line(&ptn, 1, &[1, 2], 1, None, &LineCostModel::default())
            .unwrap();
        let ean = build_periodic_ean(&ptn, &lines, &[], None, &scenario_a_parameters()).unwrap();
        assert_eq!(4, ean.node_count());
        assert_eq!(2, count(&ean, ActivityType::Drive));
        assert_eq!(1, count(&ean, ActivityType::Wait));
        assert_eq!(3, ean.edge_count());
        let wait = ean
            .edges()
            .find(|a| a.activity_type == ActivityType::Wait)
            .unwrap();
        assert_eq!((1, 2), (wait.lower_bound, wait.upper_bound));
    }

    #[test]
    fn changes_syncs_and_od_structure() {
        let ptn = line_ptn(false);
        let mut lines = LinePool::new(true);
        lines
            .add_line(&ptn, 1, &[1, 2], 2, None, &LineCostModel::default())
            .unwrap();
        let mut parameters = scenario_a_parameters();
        parameters.number_of_time_slices = 2;
        let ean = build_periodic_ean(&ptn, &lines, &[(1, 3)], None, &parameters).unwrap();
        // 4 runs of 2 links
        assert_eq!(4 * 4 + 2 + 1, ean.node_count());
        // terminal stops: 2 arrivals of one direction times 2 departures of
        // the other, interior stop 2: both ways
        assert_eq!(4 + 8 + 4, count(&ean, ActivityType::Change));
        // one sync per event for each direction
        assert_eq!(2 * 4, count(&ean, ActivityType::Sync));
        let sync = ean
            .edges()
            .find(|a| a.activity_type == ActivityType::Sync)
            .unwrap();
        assert_eq!((5, 5), (sync.lower_bound, sync.upper_bound));
        // departures at stop 1: two forward repetitions
        assert_eq!(2 * 2, count(&ean, ActivityType::To));
        assert_eq!(2, count(&ean, ActivityType::Time));
        assert_eq!(2, count(&ean, ActivityType::From));
        let sequences = line_event_sequences(&ean).unwrap();
        assert_eq!(4, sequences.len());
        let backward = &sequences[&LineKey::new(1, LineDirection::Backward, 2)];
        assert_eq!(4, backward.len());
        assert_eq!(Some(3), ean.node(backward[0]).unwrap().stop());
    }

    #[test]
    fn transfer_stations_and_headways() {
        let mut ptn = line_ptn(false);
        ptn.edge_mut(1).unwrap().headway = 2;
        let mut lines = LinePool::new(false);
        lines
            .add_line(&ptn, 1, &[1, 2], 1, None, &LineCostModel::default())
            .unwrap();
        lines
            .add_line(&ptn, 2, &[1], 1, None, &LineCostModel::default())
            .unwrap();
        let parameters = scenario_a_parameters();
        let everywhere = build_periodic_ean(&ptn, &lines, &[], None, &parameters).unwrap();
        // stop 2: line 2 arrives, line 1 departs
        assert_eq!(1, count(&everywhere, ActivityType::Change));
        assert_eq!(1, count(&everywhere, ActivityType::Headway));
        let headway = everywhere
            .edges()
            .find(|a| a.activity_type == ActivityType::Headway)
            .unwrap();
        assert_eq!((2, 8), (headway.lower_bound, headway.upper_bound));
        let stations = BTreeSet::from([1]);
        let restricted = build_periodic_ean(&ptn, &lines, &[], Some(&stations), &parameters).unwrap();
        assert_eq!(0, count(&restricted, ActivityType::Change));
    }
}
