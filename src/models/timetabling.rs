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

//! Periodic timetabling.
//!
//! In the event formulation every network event gets a time `π` in
//! `[0, T - 1]` and every network activity a modulo counter `z`, its
//! tension being `π_head - π_tail + T z`. In the cycle-base formulation the
//! tensions are the variables and the fundamental cycles sum up to
//! multiples of `T`.

use super::{line_planning::LinePlanning, ModelInput};
use crate::{
    cycle_base::CycleBase,
    ean::{PeriodicActivity, PeriodicEan},
    error::LinTimError,
    solver::{ConstraintSense, LinearExpression, Model, Variable, VariableType},
    timetable::PeriodicTimetable,
    Parameters, Result,
};
use anyhow::bail;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

/// Upper bound of `activity` clipped to one period above its lower bound.
pub(super) fn effective_upper(activity: &PeriodicActivity, period: i32) -> i64 {
    i64::from(activity.upper_bound).min(i64::from(activity.lower_bound) + i64::from(period) - 1)
}

fn div_floor(a: i64, b: i64) -> i64 {
    a.div_euclid(b)
}

fn div_ceil(a: i64, b: i64) -> i64 {
    -(-a).div_euclid(b)
}

fn checked_bounds(activity: &PeriodicActivity, period: i32) -> Result<(i64, i64)> {
    let lower = i64::from(activity.lower_bound);
    let upper = effective_upper(activity, period);
    if upper < lower {
        bail!(LinTimError::DataInconsistent(format!(
            "activity {} has bounds [{}, {}]",
            activity.id, activity.lower_bound, activity.upper_bound
        )));
    }
    Ok((lower, upper))
}

struct CycleFormulation {
    network: PeriodicEan,
    base: CycleBase,
    tensions: BTreeMap<i32, Variable>,
}

pub(super) struct Timetabling {
    period: i32,
    times: BTreeMap<i32, Variable>,
    tensions: BTreeMap<i32, LinearExpression>,
    cycle: Option<CycleFormulation>,
}

impl Timetabling {
    pub(super) fn build(
        model: &mut Model,
        input: &ModelInput,
        lines: Option<&LinePlanning>,
        cycle_base: bool,
    ) -> Result<Self> {
        if cycle_base {
            Self::build_cycle_base(model, input)
        } else {
            Self::build_events(model, input, lines)
        }
    }

    fn build_events(model: &mut Model, input: &ModelInput, lines: Option<&LinePlanning>) -> Result<Self> {
        let period = input.parameters.period_length;
        let t = i64::from(period);
        let mut times = BTreeMap::new();
        for event in input.ean.nodes().filter(|e| e.is_network()) {
            let time = model.add_variable(
                0.0,
                (t - 1) as f64,
                VariableType::Integer,
                0.0,
                &format!("pi_{}", event.id),
            );
            times.insert(event.id, time);
        }
        let time_of = |event: i32| {
            times.get(&event).copied().ok_or(LinTimError::DataIndexNotFound {
                kind: "network event",
                index: event,
            })
        };

        let mut tensions = BTreeMap::new();
        for activity in input.ean.edges().filter(|a| a.activity_type.is_network()) {
            let (lower, upper) = checked_bounds(activity, period)?;
            let established = lines.and_then(|l| l.established(activity.id));
            let relaxation = if established.is_some() { t } else { 0 };
            // π_head - π_tail lies in [-(T - 1), T - 1]
            let z_min = div_ceil(lower - relaxation - (t - 1), t);
            let z_max = div_floor(upper + relaxation + (t - 1), t);
            let z = model.add_variable(
                z_min as f64,
                z_max as f64,
                VariableType::Integer,
                0.0,
                &format!("z_{}", activity.id),
            );
            let mut tension = LinearExpression::new();
            tension
                .add_term(1.0, time_of(activity.head)?)
                .add_term(-1.0, time_of(activity.tail)?)
                .add_term(t as f64, z);
            match established {
                None => {
                    model.add_constraint(
                        &tension,
                        ConstraintSense::GreaterEqual,
                        lower as f64,
                        &format!("lower_{}", activity.id),
                    );
                    model.add_constraint(
                        &tension,
                        ConstraintSense::LessEqual,
                        upper as f64,
                        &format!("upper_{}", activity.id),
                    );
                }
                Some(y) => {
                    // bounds only hold when both lines are operated
                    let mut bound = tension.clone();
                    bound.add_term(-(t as f64), y);
                    model.add_constraint(
                        &bound,
                        ConstraintSense::GreaterEqual,
                        (lower - t) as f64,
                        &format!("lower_{}", activity.id),
                    );
                    let mut bound = tension.clone();
                    bound.add_term(t as f64, y);
                    model.add_constraint(
                        &bound,
                        ConstraintSense::LessEqual,
                        (upper + t) as f64,
                        &format!("upper_{}", activity.id),
                    );
                }
            }
            tensions.insert(activity.id, tension);
        }
        Ok(Timetabling {
            period,
            times,
            tensions,
            cycle: None,
        })
    }

    fn build_cycle_base(model: &mut Model, input: &ModelInput) -> Result<Self> {
        let period = input.parameters.period_length;
        let t = i64::from(period);
        let mut network = PeriodicEan::new(true);
        for event in input.ean.nodes().filter(|e| e.is_network()) {
            network.add_node(event.clone())?;
        }
        for activity in input.ean.edges().filter(|a| a.activity_type.is_network()) {
            network.add_edge(activity.clone())?;
        }
        let base = CycleBase::compute(
            &network,
            input.parameters.cycle_base_spanning_tree,
            PeriodicActivity::span,
        )?;

        let mut variables = BTreeMap::new();
        let mut bounds = BTreeMap::new();
        for activity in network.edges() {
            let (lower, upper) = checked_bounds(activity, period)?;
            let x = model.add_variable(
                lower as f64,
                upper as f64,
                VariableType::Integer,
                0.0,
                &format!("x_{}", activity.id),
            );
            variables.insert(activity.id, x);
            bounds.insert(activity.id, (lower, upper));
        }
        for (&arc, cycle) in base.cycles() {
            let (lower, upper) = bounds[&arc];
            let mut sum = LinearExpression::from(variables[&arc]);
            let (mut low, mut high) = (lower, upper);
            for &(member, orientation) in cycle {
                let (lower, upper) = bounds[&member];
                if orientation > 0 {
                    sum.add_term(1.0, variables[&member]);
                    low += lower;
                    high += upper;
                } else {
                    sum.add_term(-1.0, variables[&member]);
                    low -= upper;
                    high -= lower;
                }
            }
            let k = model.add_variable(
                div_ceil(low, t) as f64,
                div_floor(high, t) as f64,
                VariableType::Integer,
                0.0,
                &format!("k_{}", arc),
            );
            sum.add_term(-(t as f64), k);
            model.add_constraint(&sum, ConstraintSense::Equal, 0.0, &format!("cycle_{}", arc));
        }
        debug!(
            "Cycle base formulation with {} tensions and {} cycles",
            variables.len(),
            base.len()
        );
        Ok(Timetabling {
            period,
            times: BTreeMap::new(),
            tensions: variables
                .iter()
                .map(|(&id, &x)| (id, LinearExpression::from(x)))
                .collect(),
            cycle: Some(CycleFormulation {
                network,
                base,
                tensions: variables,
            }),
        })
    }

    /// Time variable of a network event, `None` in the cycle-base
    /// formulation.
    pub(super) fn time(&self, event: i32) -> Option<Variable> {
        self.times.get(&event).copied()
    }

    pub(super) fn tension(&self, activity: i32) -> Result<&LinearExpression> {
        self.tensions.get(&activity).ok_or_else(|| {
            LinTimError::DataIndexNotFound {
                kind: "network activity",
                index: activity,
            }
            .into()
        })
    }

    pub(super) fn period(&self) -> i32 {
        self.period
    }

    /// Reads the event times, rebuilt from the tensions along the spanning
    /// tree in the cycle-base formulation.
    pub(super) fn extract(&self, model: &Model, parameters: &Parameters) -> Result<PeriodicTimetable> {
        let mut timetable = PeriodicTimetable::new(self.period, parameters.time_units_per_minute);
        match &self.cycle {
            None => {
                for (&event, &time) in &self.times {
                    timetable.set(event, model.integer_value(time)?);
                }
            }
            Some(cycle) => {
                let mut tensions = HashMap::new();
                for (&activity, &x) in &cycle.tensions {
                    tensions.insert(activity, model.integer_value(x)?);
                }
                let potentials =
                    cycle
                        .base
                        .potentials(&cycle.network, &tensions, i64::from(self.period))?;
                for (event, time) in potentials {
                    timetable.set(event, time);
                }
            }
        }
        Ok(timetable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ean::ActivityType;
    use pretty_assertions::assert_eq;

    #[test]
    fn upper_bound_clipped_to_the_period() {
        let wait = PeriodicActivity::new(1, ActivityType::Wait, 1, 2, 1, 60);
        assert_eq!(10, effective_upper(&wait, 10));
        let drive = PeriodicActivity::new(2, ActivityType::Drive, 1, 2, 2, 3);
        assert_eq!(3, effective_upper(&drive, 10));
    }

    #[test]
    fn rounding() {
        assert_eq!((-2, -1), (div_floor(-3, 2), div_ceil(-3, 2)));
        assert_eq!((1, 2), (div_floor(3, 2), div_ceil(3, 2)));
        assert_eq!((2, 2), (div_floor(4, 2), div_ceil(4, 2)));
    }
}
