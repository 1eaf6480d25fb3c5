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

//! Line planning: which repetitions of the lines of the pool are operated.
//!
//! One binary `f` per line key. Repetitions of a line are activated in
//! order (or all together with `use_system_frequency`), both directions of
//! an undirected line share their decision and the number of lines on a
//! link may be bounded by its frequency envelope.

use super::{ModelInput, Objectives};
use crate::{
    ean::PeriodicActivity,
    lines::{LineDirection, LineKey, LinePool},
    solver::{ConstraintSense, LinearExpression, Model, Variable, VariableType},
    statistic::ObjectiveComponent,
    Result,
};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

pub(super) fn key_name(key: LineKey) -> String {
    let direction = match key.direction {
        LineDirection::Forward => "f",
        LineDirection::Backward => "b",
    };
    format!("{}_{}_{}", key.id, direction, key.repetition)
}

pub(super) struct LinePlanning {
    frequencies: BTreeMap<LineKey, Variable>,
    /// `y_a`, set when both lines of the activity `a` are operated.
    established: BTreeMap<i32, Variable>,
}

impl LinePlanning {
    pub(super) fn build(model: &mut Model, input: &ModelInput, objectives: &mut Objectives) -> Result<Self> {
        let parameters = input.parameters;
        let mut frequencies = BTreeMap::new();
        for line in input.lines.lines() {
            let variable = model.add_variable(
                0.0,
                1.0,
                VariableType::Binary,
                0.0,
                &format!("f_{}", key_name(line.key())),
            );
            frequencies.insert(line.key(), variable);
        }

        let sense = if parameters.use_system_frequency {
            ConstraintSense::Equal
        } else {
            ConstraintSense::GreaterEqual
        };
        for (&key, &operated) in &frequencies {
            let next = LineKey::new(key.id, key.direction, key.repetition + 1);
            if let Some(&next_operated) = frequencies.get(&next) {
                let mut order = LinearExpression::from(operated);
                order.add_term(-1.0, next_operated);
                model.add_constraint(&order, sense, 0.0, &format!("repetition_{}", key_name(key)));
            }
            if input.lines.is_undirected() && key.direction == LineDirection::Forward {
                if let Some(&backward) = frequencies.get(&key.reversed()) {
                    let mut both = LinearExpression::from(operated);
                    both.add_term(-1.0, backward);
                    model.add_constraint(
                        &both,
                        ConstraintSense::Equal,
                        0.0,
                        &format!("direction_{}", key_name(key)),
                    );
                }
            }
        }

        for link in input.ptn.edges() {
            let mut served = LinearExpression::new();
            for line in input.lines.forward_lines_on_link(link.id) {
                served.add_term(1.0, frequencies[&line.key()]);
            }
            if parameters.check_lower_frequencies {
                if let Some(lower) = link.lower_frequency {
                    model.add_constraint(
                        &served,
                        ConstraintSense::GreaterEqual,
                        f64::from(lower),
                        &format!("lower_frequency_{}", link.id),
                    );
                }
            }
            if parameters.check_upper_frequencies {
                if let Some(upper) = link.upper_frequency {
                    model.add_constraint(
                        &served,
                        ConstraintSense::LessEqual,
                        f64::from(upper),
                        &format!("upper_frequency_{}", link.id),
                    );
                }
            }
        }

        let mut established = BTreeMap::new();
        for activity in input.ean.edges().filter(|a| a.activity_type.is_network()) {
            let tail = input.ean.get_node(activity.tail)?.line();
            let head = input.ean.get_node(activity.head)?.line();
            let (tail, head) = match (tail, head) {
                (Some(tail), Some(head)) if tail != head => (tail, head),
                _ => continue,
            };
            let (f_tail, f_head) = match (frequencies.get(&tail), frequencies.get(&head)) {
                (Some(&f_tail), Some(&f_head)) => (f_tail, f_head),
                _ => continue,
            };
            let y = model.add_variable(
                0.0,
                1.0,
                VariableType::Binary,
                0.0,
                &format!("y_{}", activity.id),
            );
            for (side, f) in [("tail", f_tail), ("head", f_head)] {
                let mut below = LinearExpression::from(y);
                below.add_term(-1.0, f);
                model.add_constraint(
                    &below,
                    ConstraintSense::LessEqual,
                    0.0,
                    &format!("established_{}_{}", side, activity.id),
                );
            }
            let mut both = LinearExpression::from(y);
            both.add_term(-1.0, f_tail).add_term(-1.0, f_head);
            model.add_constraint(
                &both,
                ConstraintSense::GreaterEqual,
                -1.0,
                &format!("established_{}", activity.id),
            );
            established.insert(activity.id, y);
        }
        debug!(
            "{} line variables, {} established activities",
            frequencies.len(),
            established.len()
        );

        for line in input.lines.lines() {
            if line.direction() != LineDirection::Forward {
                continue;
            }
            let operated = frequencies[&line.key()];
            objectives
                .component(ObjectiveComponent::LineLength)
                .add_term(parameters.factor_line_length * line.length(), operated);
            objectives
                .component(ObjectiveComponent::LineCost)
                .add_term(parameters.factor_line_cost * line.cost(), operated);
        }
        Ok(LinePlanning {
            frequencies,
            established,
        })
    }

    /// Whether `line` is operated.
    pub(super) fn frequency(&self, line: &LineKey) -> Option<Variable> {
        self.frequencies.get(line).copied()
    }

    /// The `y` of an activity between two different lines.
    pub(super) fn established(&self, activity: i32) -> Option<Variable> {
        self.established.get(&activity).copied()
    }

    /// What has to be operated for `activity` to be usable: its `y` when it
    /// joins two lines, the frequency of its line otherwise.
    pub(super) fn gate(&self, activity: &PeriodicActivity, line: Option<LineKey>) -> Option<Variable> {
        self.established(activity.id)
            .or_else(|| line.and_then(|l| self.frequency(&l)))
    }

    pub(super) fn used_lines(&self, model: &Model) -> Result<BTreeSet<LineKey>> {
        let mut used = BTreeSet::new();
        for (&key, &operated) in &self.frequencies {
            if model.value(operated)? > 0.5 {
                used.insert(key);
            }
        }
        Ok(used)
    }

    /// Number of operated forward repetitions of every line id.
    pub(super) fn line_concept(&self, pool: &LinePool, used: &BTreeSet<LineKey>) -> BTreeMap<i32, u32> {
        let mut concept: BTreeMap<i32, u32> = pool.ids().into_iter().map(|id| (id, 0)).collect();
        for key in used.iter().filter(|k| k.direction == LineDirection::Forward) {
            *concept.entry(key.id).or_insert(0) += 1;
        }
        concept
    }
}
