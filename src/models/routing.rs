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

//! Passenger routing through the periodic EAN.
//!
//! Each `(origin, destination, time slice)` with OD events in the EAN is a
//! commodity sending its whole demand on one path from its source-OD event
//! to the target-OD event of the pair. The perceived travel time of a path
//! is linearised with one variable `d` per used activity.

use super::{
    line_planning::LinePlanning,
    timetabling::{effective_upper, Timetabling},
    ModelInput, Objectives,
};
use crate::{
    ean::{ActivityType, EventKind, PeriodicActivity, PeriodicEan},
    preprocessing::{ean_candidates, ean::time_slice_penalty, EanCandidates, FixedLoad},
    solver::{ConstraintSense, LinearExpression, Model, Variable, VariableType},
    statistic::ObjectiveComponent,
    Parameters, Result,
};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info, warn};

/// Objective component and factor of the time spent in an activity.
fn perceived_component(activity_type: ActivityType, parameters: &Parameters) -> Option<(ObjectiveComponent, f64)> {
    match activity_type {
        ActivityType::Drive => Some((ObjectiveComponent::Drive, parameters.factor_drive_time)),
        ActivityType::Wait => Some((ObjectiveComponent::Wait, parameters.factor_wait_time)),
        ActivityType::Change => Some((ObjectiveComponent::Transfer, parameters.factor_transfer_time)),
        _ => None,
    }
}

struct Commodity {
    origin: i32,
    destination: i32,
    time_slice: u32,
    source: i32,
    demand: f64,
    /// `p` of every usable activity.
    paths: BTreeMap<i32, Variable>,
}

pub(super) struct Routing {
    commodities: Vec<Commodity>,
}

/// Whether a commodity starting at `source` and ending at `target` may use
/// `activity`.
fn usable(activity: &PeriodicActivity, source: i32, target: i32, input: &ModelInput, pair: (i32, i32)) -> bool {
    match activity.activity_type {
        ActivityType::Drive | ActivityType::Wait | ActivityType::Change => true,
        ActivityType::To => matches!(
            input.ean.node(activity.tail).map(|e| e.kind),
            Some(EventKind::SourceOd { origin, destination, .. }) if (origin, destination) == pair
        ),
        ActivityType::Time => activity.tail == source,
        ActivityType::From => activity.head == target,
        _ => false,
    }
}

impl Routing {
    pub(super) fn build(
        model: &mut Model,
        input: &ModelInput,
        timetable: &Timetabling,
        lines: Option<&LinePlanning>,
        objectives: &mut Objectives,
    ) -> Result<Self> {
        let parameters = input.parameters;
        let ean = input.ean;
        let period = f64::from(timetable.period());
        let mut targets = BTreeMap::new();
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
        let candidates: Option<BTreeMap<(i32, i32, u32), EanCandidates>> = if parameters.use_preprocessing {
            Some(ean_candidates(ean, parameters)?)
        } else {
            None
        };
        let slices = |event: i32| match ean.node(event).map(|e| e.kind) {
            Some(EventKind::SourceOd { time_slice, .. }) => time_slice,
            _ => 0,
        };

        let mut commodities = Vec::new();
        for (origin, destination, time_slice, source) in sources {
            let demand = input.od.get(origin, destination, time_slice);
            if demand <= 0.0 {
                continue;
            }
            let target = match targets.get(&(origin, destination)) {
                Some(&target) => target,
                None => {
                    warn!("OD pair ({}, {}) has no target event", origin, destination);
                    continue;
                }
            };
            let allowed = candidates
                .as_ref()
                .map(|c| c.get(&(origin, destination, time_slice)).map(|c| &c.activities));
            let arcs: Vec<&PeriodicActivity> = ean
                .edges()
                .filter(|a| usable(a, source, target, input, (origin, destination)))
                .filter(|a| match allowed {
                    None => true,
                    Some(Some(allowed)) => allowed.contains(&a.id),
                    Some(None) => false,
                })
                .collect();
            if !arcs.iter().any(|a| a.tail == source) || !arcs.iter().any(|a| a.head == target) {
                warn!(
                    "OD pair ({}, {}) in time slice {} cannot be routed",
                    origin, destination, time_slice
                );
                continue;
            }
            let suffix = format!("{}_{}_{}", origin, destination, time_slice);
            let mut paths = BTreeMap::new();
            let mut balance: BTreeMap<i32, LinearExpression> = BTreeMap::new();
            for activity in &arcs {
                let p = model.add_variable(
                    0.0,
                    1.0,
                    VariableType::Binary,
                    0.0,
                    &format!("p_{}_{}", activity.id, suffix),
                );
                paths.insert(activity.id, p);
                balance.entry(activity.tail).or_default().add_term(1.0, p);
                balance.entry(activity.head).or_default().add_term(-1.0, p);
            }
            balance.entry(target).or_default();
            for (&event, flow) in &balance {
                let supply = if event == source {
                    1.0
                } else if event == target {
                    -1.0
                } else {
                    0.0
                };
                model.add_constraint(
                    flow,
                    ConstraintSense::Equal,
                    supply,
                    &format!("flow_{}_{}", event, suffix),
                );
            }

            for activity in &arcs {
                let p = paths[&activity.id];
                if let Some(lines) = lines {
                    let line = match activity.activity_type {
                        ActivityType::To => ean.get_node(activity.head)?.line(),
                        _ => ean.get_node(activity.tail)?.line(),
                    };
                    let gate = match activity.activity_type {
                        ActivityType::Time => None,
                        _ => lines.gate(activity, line),
                    };
                    if let Some(gate) = gate {
                        let mut on_line = LinearExpression::from(p);
                        on_line.add_term(-1.0, gate);
                        model.add_constraint(
                            &on_line,
                            ConstraintSense::LessEqual,
                            0.0,
                            &format!("operated_{}_{}", activity.id, suffix),
                        );
                    }
                }
                match activity.activity_type {
                    ActivityType::Drive | ActivityType::Wait | ActivityType::Change => {
                        let d = add_travel_time(
                            model,
                            activity,
                            p,
                            timetable,
                            lines.and_then(|l| l.established(activity.id)).is_some(),
                            &suffix,
                        )?;
                        if let Some((component, factor)) =
                            perceived_component(activity.activity_type, parameters)
                        {
                            objectives
                                .component(component)
                                .add_term(parameters.factor_travel_time * factor * demand, d);
                        }
                        if activity.activity_type == ActivityType::Change {
                            objectives.component(ObjectiveComponent::TransferPenalty).add_term(
                                parameters.factor_travel_time * parameters.transfer_penalty * demand,
                                p,
                            );
                        }
                    }
                    ActivityType::Time => {
                        let penalty =
                            time_slice_penalty(slices(activity.tail), slices(activity.head), parameters);
                        objectives
                            .component(ObjectiveComponent::TimeSlice)
                            .add_term(parameters.factor_penalty_time_slice * demand * penalty, p);
                    }
                    ActivityType::To if parameters.number_of_time_slices > 1 => {
                        if let Some(time) = timetable.time(activity.head) {
                            let slice = i64::from(slices(activity.tail));
                            let length = i64::from(parameters.time_slice_length());
                            let mut after = LinearExpression::from(time);
                            after.add_term(-period, p);
                            model.add_constraint(
                                &after,
                                ConstraintSense::GreaterEqual,
                                ((slice - 1) * length) as f64 - period,
                                &format!("slice_start_{}_{}", activity.id, suffix),
                            );
                            let mut before = LinearExpression::from(time);
                            before.add_term(period, p);
                            model.add_constraint(
                                &before,
                                ConstraintSense::LessEqual,
                                (slice * length - 1) as f64 + period,
                                &format!("slice_end_{}_{}", activity.id, suffix),
                            );
                        }
                    }
                    _ => {}
                }
            }
            commodities.push(Commodity {
                origin,
                destination,
                time_slice,
                source,
                demand,
                paths,
            });
        }
        info!("{} commodities routed", commodities.len());
        Ok(Routing { commodities })
    }

    /// Passengers per network activity and the path of every commodity.
    #[allow(clippy::type_complexity)]
    pub(super) fn extract(
        &self,
        model: &Model,
        ean: &PeriodicEan,
    ) -> Result<(BTreeMap<i32, f64>, BTreeMap<(i32, i32, u32), Vec<i32>>)> {
        let mut loads = BTreeMap::new();
        let mut routes = BTreeMap::new();
        for commodity in &self.commodities {
            let mut next: BTreeMap<i32, i32> = BTreeMap::new();
            for (&activity, &p) in &commodity.paths {
                if model.value(p)? < 0.5 {
                    continue;
                }
                let activity = ean.get_edge(activity)?;
                next.insert(activity.tail, activity.id);
                if activity.activity_type.is_network() {
                    *loads.entry(activity.id).or_insert(0.0) += commodity.demand;
                }
            }
            let mut route = Vec::new();
            let mut visited = BTreeSet::new();
            let mut current = commodity.source;
            while let Some(&activity) = next.get(&current) {
                if !visited.insert(activity) {
                    break;
                }
                route.push(activity);
                current = ean.get_edge(activity)?.head;
            }
            debug!(
                "OD pair ({}, {}) in time slice {} uses {} activities",
                commodity.origin,
                commodity.destination,
                commodity.time_slice,
                route.len()
            );
            routes.insert(
                (commodity.origin, commodity.destination, commodity.time_slice),
                route,
            );
        }
        Ok((loads, routes))
    }

    #[cfg(test)]
    pub(super) fn path_variables(&self) -> impl Iterator<Item = ((i32, i32, u32), i32, Variable)> + '_ {
        self.commodities.iter().flat_map(|c| {
            c.paths
                .iter()
                .map(move |(&a, &p)| ((c.origin, c.destination, c.time_slice), a, p))
        })
    }
}

/// Adds `d`, equal to the tension of `activity` when `p` is set and 0
/// otherwise.
fn add_travel_time(
    model: &mut Model,
    activity: &PeriodicActivity,
    p: Variable,
    timetable: &Timetabling,
    established: bool,
    suffix: &str,
) -> Result<Variable> {
    let lower = f64::from(activity.lower_bound);
    let upper = effective_upper(activity, timetable.period()) as f64;
    let d = model.add_variable(
        0.0,
        upper,
        VariableType::Integer,
        0.0,
        &format!("d_{}_{}", activity.id, suffix),
    );
    if lower == upper {
        let mut fixed = LinearExpression::from(d);
        fixed.add_term(-lower, p);
        model.add_constraint(
            &fixed,
            ConstraintSense::Equal,
            0.0,
            &format!("duration_{}_{}", activity.id, suffix),
        );
        return Ok(d);
    }
    let big_m = upper + if established { f64::from(timetable.period()) } else { 0.0 };
    let tension = timetable.tension(activity.id)?;
    let mut at_least = LinearExpression::from(d);
    at_least.multi_add(-1.0, tension).add_term(-big_m, p);
    model.add_constraint(
        &at_least,
        ConstraintSense::GreaterEqual,
        -big_m,
        &format!("duration_min_{}_{}", activity.id, suffix),
    );
    let mut when_used = LinearExpression::from(d);
    when_used.add_term(-upper, p);
    model.add_constraint(
        &when_used,
        ConstraintSense::LessEqual,
        0.0,
        &format!("duration_used_{}_{}", activity.id, suffix),
    );
    let mut at_most = LinearExpression::from(d);
    at_most.multi_add(-1.0, tension).add_term(big_m, p);
    model.add_constraint(
        &at_most,
        ConstraintSense::LessEqual,
        big_m,
        &format!("duration_max_{}_{}", activity.id, suffix),
    );
    Ok(d)
}

/// Passengers fixed on activities and, where lines may close, the choice
/// of the alternative carrying them.
#[derive(Default)]
pub(super) struct FixedPassengers {
    loads: Vec<(FixedLoad, Option<Vec<Variable>>)>,
}

impl FixedPassengers {
    /// Passengers per activity. Loads without a choice are spread evenly
    /// over their alternatives.
    pub(super) fn extract(&self, model: &Model) -> Result<BTreeMap<i32, f64>> {
        let mut loads = BTreeMap::new();
        for (load, choices) in &self.loads {
            match choices {
                Some(choices) => {
                    for (&activity, &z) in load.activities.iter().zip(choices) {
                        if model.value(z)? > 0.5 {
                            *loads.entry(activity).or_insert(0.0) += load.passengers;
                        }
                    }
                }
                None => {
                    let share = load.passengers / load.activities.len() as f64;
                    for &activity in &load.activities {
                        *loads.entry(activity).or_insert(0.0) += share;
                    }
                }
            }
        }
        Ok(loads)
    }
}

/// Adds the perceived time of passengers fixed on activities. When one of
/// the alternatives of a load belongs to a line which may not be
/// operated, the passengers ride exactly one operated alternative and
/// their whole demand is charged on a duration `w` bounded below by the
/// tension of the chosen activity.
pub(super) fn add_fixed_loads(
    model: &mut Model,
    input: &ModelInput,
    loads: Vec<FixedLoad>,
    timetable: &Timetabling,
    lines: Option<&LinePlanning>,
    objectives: &mut Objectives,
) -> Result<FixedPassengers> {
    let parameters = input.parameters;
    let period = timetable.period();
    let mut fixed = FixedPassengers::default();
    for (index, load) in loads.into_iter().enumerate() {
        if load.passengers <= 0.0 || load.activities.is_empty() {
            continue;
        }
        let first = input.ean.get_edge(load.activities[0])?;
        let (component, factor) = match perceived_component(first.activity_type, parameters) {
            Some(perceived) => perceived,
            None => continue,
        };
        let weight = parameters.factor_travel_time * factor * load.passengers;
        if first.activity_type == ActivityType::Change {
            objectives
                .component(ObjectiveComponent::TransferPenalty)
                .add_constant(parameters.factor_travel_time * parameters.transfer_penalty * load.passengers);
        }
        let mut gates = Vec::with_capacity(load.activities.len());
        for &id in &load.activities {
            let activity = input.ean.get_edge(id)?;
            let line = input.ean.get_node(activity.tail)?.line();
            gates.push(lines.and_then(|l| l.gate(activity, line)));
        }
        if gates.iter().all(Option::is_none) {
            let share = weight / load.activities.len() as f64;
            for &id in &load.activities {
                objectives
                    .component(component)
                    .multi_add(share, timetable.tension(id)?);
            }
            fixed.loads.push((load, None));
            continue;
        }
        let mut upper: i64 = 0;
        for &id in &load.activities {
            upper = upper.max(effective_upper(input.ean.get_edge(id)?, period));
        }
        let big_m = (upper + i64::from(period)) as f64;
        let w = model.add_variable(
            0.0,
            upper as f64,
            VariableType::Integer,
            0.0,
            &format!("w_fixed_{}", index),
        );
        let mut one_choice = LinearExpression::new();
        let mut choices = Vec::with_capacity(load.activities.len());
        for (&id, gate) in load.activities.iter().zip(gates) {
            let z = model.add_variable(0.0, 1.0, VariableType::Binary, 0.0, &format!("z_fixed_{}_{}", index, id));
            one_choice.add_term(1.0, z);
            if let Some(gate) = gate {
                let mut operated = LinearExpression::from(z);
                operated.add_term(-1.0, gate);
                model.add_constraint(
                    &operated,
                    ConstraintSense::LessEqual,
                    0.0,
                    &format!("fixed_operated_{}_{}", index, id),
                );
            }
            let mut at_least = LinearExpression::from(w);
            at_least
                .multi_add(-1.0, timetable.tension(id)?)
                .add_term(-big_m, z);
            model.add_constraint(
                &at_least,
                ConstraintSense::GreaterEqual,
                -big_m,
                &format!("fixed_duration_{}_{}", index, id),
            );
            choices.push(z);
        }
        model.add_constraint(
            &one_choice,
            ConstraintSense::Equal,
            1.0,
            &format!("fixed_choice_{}", index),
        );
        objectives.component(component).add_term(weight, w);
        fixed.loads.push((load, Some(choices)));
    }
    debug!("{} fixed passenger loads", fixed.loads.len());
    Ok(fixed)
}
