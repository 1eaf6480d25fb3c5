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

//! Vehicle scheduling over `p_max` periods.
//!
//! A trip is the run of a line in one period. It starts at
//! `(p - 1) T + π_first` and lasts the sum of the tensions of the drive and
//! wait activities of the line. Every operated trip is reached by exactly
//! one vehicle, either through a connection from an earlier trip or by
//! leaving the depot, and left the same way.

use super::{
    line_planning::{key_name, LinePlanning},
    timetabling::{effective_upper, Timetabling},
    ModelInput, Objectives,
};
use crate::{
    ean::{line_event_sequences, PeriodicActivity},
    error::LinTimError,
    lines::LineKey,
    solver::{ConstraintSense, LinearExpression, Model, Variable, VariableType},
    statistic::ObjectiveComponent,
    vehicle_schedule::{TripKey, VehicleConnections},
    Result,
};
use anyhow::bail;
use std::collections::{BTreeMap, HashMap};
use tracing::info;

/// A line run and where its trips start.
struct Run {
    first_event: Variable,
    first_stop: i32,
    last_stop: i32,
    duration: LinearExpression,
    min_duration: i64,
    max_duration: i64,
}

fn trip_name((period, line): TripKey) -> String {
    format!("{}_{}", period, key_name(line))
}

pub(super) struct Vehicles {
    pull_outs: BTreeMap<TripKey, Variable>,
    pull_ins: BTreeMap<TripKey, Variable>,
    connections: BTreeMap<(TripKey, TripKey), Variable>,
}

impl Vehicles {
    pub(super) fn build(
        model: &mut Model,
        input: &ModelInput,
        timetable: &Timetabling,
        lines: Option<&LinePlanning>,
        objectives: &mut Objectives,
    ) -> Result<Self> {
        let parameters = input.parameters;
        let turnarounds = super::require_turnarounds(input)?;
        let period = i64::from(timetable.period());
        let periods = parameters.p_max.max(1);

        let internal: HashMap<(i32, i32), &PeriodicActivity> = input
            .ean
            .edges()
            .filter(|a| a.activity_type.is_line_internal())
            .map(|a| ((a.tail, a.head), a))
            .collect();
        let mut runs: BTreeMap<LineKey, Run> = BTreeMap::new();
        for (key, events) in line_event_sequences(input.ean)? {
            let line = input.lines.get_line(&key)?;
            let first_event = match timetable.time(events[0]) {
                Some(time) => time,
                None => bail!(LinTimError::UnsupportedFeature(
                    "vehicle scheduling without event times".to_string()
                )),
            };
            let mut duration = LinearExpression::new();
            let (mut min_duration, mut max_duration) = (0, 0);
            for pair in events.windows(2) {
                if let Some(activity) = internal.get(&(pair[0], pair[1])) {
                    duration.multi_add(1.0, timetable.tension(activity.id)?);
                    min_duration += i64::from(activity.lower_bound);
                    max_duration += effective_upper(activity, timetable.period());
                }
            }
            runs.insert(
                key,
                Run {
                    first_event,
                    first_stop: line.first_stop(),
                    last_stop: line.last_stop(),
                    duration,
                    min_duration,
                    max_duration,
                },
            );
        }
        let longest = runs.values().map(|r| r.max_duration).max().unwrap_or(0);
        let big_m = (i64::from(periods) * period + longest) as f64;

        let start = |(p, key): TripKey| {
            let mut start = LinearExpression::from(runs[&key].first_event);
            start.add_constant((i64::from(p - 1) * period) as f64);
            start
        };
        let end = |trip: TripKey| {
            let mut end = start(trip);
            end.multi_add(1.0, &runs[&trip.1].duration);
            end
        };

        let trips: Vec<TripKey> = (1..=periods)
            .flat_map(|p| runs.keys().map(move |&key| (p, key)))
            .collect();
        let mut arriving: BTreeMap<TripKey, LinearExpression> = BTreeMap::new();
        let mut leaving: BTreeMap<TripKey, LinearExpression> = BTreeMap::new();
        let mut connections = BTreeMap::new();
        for &from in &trips {
            for &to in &trips {
                if from == to {
                    continue;
                }
                let (last, first) = (runs[&from.1].last_stop, runs[&to.1].first_stop);
                if !parameters.vs_allow_empty_trips && last != first {
                    continue;
                }
                let turn = turnarounds.min_turnaround_time(last, first);
                if !turn.is_finite() {
                    continue;
                }
                let latest_start = i64::from(to.0) * period - 1;
                let earliest_end = i64::from(from.0 - 1) * period + runs[&from.1].min_duration;
                if ((latest_start - earliest_end) as f64) < turn {
                    continue;
                }
                let name = format!("{}_{}", trip_name(from), trip_name(to));
                let x = model.add_variable(0.0, 1.0, VariableType::Binary, 0.0, &format!("x_{}", name));
                let mut gap = start(to);
                gap.multi_add(-1.0, &end(from));
                let mut turnaround = gap.clone();
                turnaround.add_term(-(turn + big_m), x);
                model.add_constraint(
                    &turnaround,
                    ConstraintSense::GreaterEqual,
                    -big_m,
                    &format!("turnaround_{}", name),
                );
                if parameters.factor_turn_around_time != 0.0 {
                    let waiting = model.add_variable(
                        0.0,
                        big_m,
                        VariableType::Continuous,
                        0.0,
                        &format!("tc_{}", name),
                    );
                    let mut linearised = LinearExpression::from(waiting);
                    linearised.multi_add(-1.0, &gap).add_term(-big_m, x);
                    model.add_constraint(
                        &linearised,
                        ConstraintSense::GreaterEqual,
                        -big_m,
                        &format!("turnaround_time_{}", name),
                    );
                    objectives
                        .component(ObjectiveComponent::TurnaroundTime)
                        .add_term(parameters.factor_turn_around_time, waiting);
                }
                let distance = turnarounds.min_turnaround_distance(last, first);
                if distance.is_finite() {
                    objectives
                        .component(ObjectiveComponent::TurnaroundDistance)
                        .add_term(parameters.factor_turn_around_distance * distance, x);
                }
                leaving.entry(from).or_default().add_term(1.0, x);
                arriving.entry(to).or_default().add_term(1.0, x);
                connections.insert((from, to), x);
            }
        }

        let mut pull_outs = BTreeMap::new();
        let mut pull_ins = BTreeMap::new();
        for &trip in &trips {
            let run = &runs[&trip.1];
            let name = trip_name(trip);
            let pull_out =
                model.add_variable(0.0, 1.0, VariableType::Binary, 0.0, &format!("pull_out_{}", name));
            let pull_in =
                model.add_variable(0.0, 1.0, VariableType::Binary, 0.0, &format!("pull_in_{}", name));
            let operated = lines.and_then(|l| l.frequency(&trip.1));
            for (flow, depot, kind) in [
                (arriving.remove(&trip), pull_out, "in"),
                (leaving.remove(&trip), pull_in, "out"),
            ] {
                let mut flow = flow.unwrap_or_default();
                flow.add_term(1.0, depot);
                let rhs = match operated {
                    Some(f) => {
                        flow.add_term(-1.0, f);
                        0.0
                    }
                    None => 1.0,
                };
                model.add_constraint(
                    &flow,
                    ConstraintSense::Equal,
                    rhs,
                    &format!("flow_{}_{}", kind, name),
                );
            }
            objectives
                .component(ObjectiveComponent::Vehicles)
                .add_term(parameters.factor_vehicles, pull_out);
            objectives
                .component(ObjectiveComponent::TurnaroundDistance)
                .add_term(
                    parameters.factor_turn_around_distance * turnarounds.min_from_depot_distance(run.first_stop),
                    pull_out,
                )
                .add_term(
                    parameters.factor_turn_around_distance * turnarounds.min_to_depot_distance(run.last_stop),
                    pull_in,
                );
            pull_outs.insert(trip, pull_out);
            pull_ins.insert(trip, pull_in);
        }

        if parameters.factor_drive_time_unweighted != 0.0 {
            for (key, run) in &runs {
                match lines.and_then(|l| l.frequency(key)) {
                    None => {
                        objectives
                            .component(ObjectiveComponent::DriveTimeUnweighted)
                            .multi_add(parameters.factor_drive_time_unweighted, &run.duration);
                    }
                    Some(operated) => {
                        let bound = run.max_duration as f64;
                        let drive_time = model.add_variable(
                            0.0,
                            bound,
                            VariableType::Continuous,
                            0.0,
                            &format!("drive_time_{}", key_name(*key)),
                        );
                        let mut linearised = LinearExpression::from(drive_time);
                        linearised
                            .multi_add(-1.0, &run.duration)
                            .add_term(-bound, operated);
                        model.add_constraint(
                            &linearised,
                            ConstraintSense::GreaterEqual,
                            -bound,
                            &format!("drive_time_{}", key_name(*key)),
                        );
                        objectives
                            .component(ObjectiveComponent::DriveTimeUnweighted)
                            .add_term(parameters.factor_drive_time_unweighted, drive_time);
                    }
                }
            }
        }
        info!(
            "{} trips and {} possible connections",
            trips.len(),
            connections.len()
        );
        Ok(Vehicles {
            pull_outs,
            pull_ins,
            connections,
        })
    }

    /// The operated trips and the connections between them.
    pub(super) fn extract(&self, model: &Model) -> Result<VehicleConnections> {
        let mut connections = VehicleConnections::default();
        for (&trip, &pull_out) in &self.pull_outs {
            if model.value(pull_out)? > 0.5 {
                connections.pull_outs.insert(trip);
                connections.trips.insert(trip);
            }
        }
        for (&trip, &pull_in) in &self.pull_ins {
            if model.value(pull_in)? > 0.5 {
                connections.trips.insert(trip);
            }
        }
        for (&(from, to), &x) in &self.connections {
            if model.value(x)? > 0.5 {
                connections.next.insert(from, to);
                connections.trips.insert(from);
                connections.trips.insert(to);
            }
        }
        Ok(connections)
    }
}
