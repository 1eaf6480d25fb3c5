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

//! Line planning, periodic timetabling and passenger routing in one model.

use super::{check_line_events, Features, ModelInput};
use crate::{
    preprocessing::{FixedLoad, FixedPassengerWeights},
    Result,
};
use tracing::info;

pub(super) const FEATURES: Features = Features {
    line_planning: true,
    routing: true,
    vehicles: false,
    cycle_base: false,
};

pub(super) fn validate(input: &ModelInput) -> Result<()> {
    check_line_events(input)
}

/// With `add_fix_passenger_paths`, the pairs without OD events follow their
/// shortest PTN path on one of the operated lines serving it.
pub(super) fn fixed_loads(input: &ModelInput) -> Result<Vec<FixedLoad>> {
    if !input.parameters.add_fix_passenger_paths {
        return Ok(Vec::new());
    }
    let inactive = input.inactive_pairs();
    if inactive.is_empty() {
        return Ok(Vec::new());
    }
    let weights = FixedPassengerWeights::compute(input.ptn, input.lines, input.od, &inactive)?;
    let loads = weights.activity_alternatives(input.ean, input.lines)?;
    info!(
        "Passengers of {} OD pairs fixed on {} PTN path segments",
        inactive.len(),
        loads.len()
    );
    Ok(loads)
}

#[cfg(test)]
mod tests {
    use super::super::{ModelSolution, ModelType, PlanningModel};
    use super::*;
    use crate::{
        ean::{build_periodic_ean, ActivityType, PeriodicEan},
        lines::{LineCostModel, LineDirection, LineKey, LinePool},
        od::OdMatrix,
        ptn::Ptn,
        solver::{Status, Variable},
        statistic::ObjectiveComponent,
        test_utils::{line_ptn, od_matrix, scenario_a_parameters, shared_link_network},
        Parameters,
    };
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;
    use std::collections::BTreeMap;

    fn line(id: i32) -> LineKey {
        LineKey::new(id, LineDirection::Forward, 1)
    }

    fn with_envelope() -> Parameters {
        Parameters {
            check_lower_frequencies: true,
            check_upper_frequencies: true,
            ..scenario_a_parameters()
        }
    }

    fn shared_link_ean(parameters: &Parameters, routed: &[(i32, i32)]) -> (Ptn, LinePool, PeriodicEan) {
        let (ptn, pool) = shared_link_network();
        let ean = build_periodic_ean(&ptn, &pool, routed, None, parameters).unwrap();
        (ptn, pool, ean)
    }

    /// Solves the model and checks that activities between two lines are
    /// established exactly when both lines run and that passengers only
    /// use operated activities.
    fn solve(parameters: &Parameters, od: &OdMatrix, routed: &[(i32, i32)]) -> ModelSolution {
        let (ptn, pool, ean) = shared_link_ean(parameters, routed);
        let input = ModelInput::new(&ptn, &pool, &ean, od, parameters);
        let mut model = PlanningModel::new(ModelType::LinTimPass, input).unwrap();
        assert_eq!(Status::Optimal, model.solve().unwrap());

        let lines = model.lines.as_ref().unwrap();
        let is_set = |v: Variable| model.model.value(v).unwrap() > 0.5;
        for activity in ean.edges().filter(|a| a.activity_type.is_network()) {
            if let Some(y) = lines.established(activity.id) {
                let tail = ean.get_node(activity.tail).unwrap().line().unwrap();
                let head = ean.get_node(activity.head).unwrap().line().unwrap();
                let both = is_set(lines.frequency(&tail).unwrap()) && is_set(lines.frequency(&head).unwrap());
                assert_eq!(both, is_set(y), "activity {}", activity.id);
            }
        }
        for (_, activity, p) in model.routing.as_ref().unwrap().path_variables() {
            if !is_set(p) {
                continue;
            }
            let activity = ean.get_edge(activity).unwrap();
            let line = match activity.activity_type {
                ActivityType::Time => continue,
                ActivityType::To => ean.get_node(activity.head).unwrap().line(),
                _ => ean.get_node(activity.tail).unwrap().line(),
            };
            if let Some(gate) = lines.gate(activity, line) {
                assert!(is_set(gate), "activity {} used but not operated", activity.id);
            }
        }
        model.solution().unwrap().clone()
    }

    #[test]
    fn frequency_envelope_forces_both_lines() {
        let solution = solve(&with_envelope(), &OdMatrix::new(), &[]);
        assert_relative_eq!(3.0, solution.objective, epsilon = 1e-6);
        assert_eq!(
            Some(BTreeMap::from([(1, 1), (2, 1)])),
            solution.line_concept
        );
        assert_eq!(2, solution.used_lines.len());
    }

    #[test]
    fn passengers_ride_the_long_line() {
        let solution = solve(&with_envelope(), &od_matrix(&[(1, 3, 7.0)]), &[(1, 3)]);
        assert_relative_eq!(38.0, solution.objective, epsilon = 1e-6);
        assert_relative_eq!(3.0, solution.objectives.get(ObjectiveComponent::LineCost), epsilon = 1e-6);
        assert_relative_eq!(0.0, solution.objectives.get(ObjectiveComponent::Transfer), epsilon = 1e-6);
    }

    #[test]
    fn unneeded_line_is_not_operated() {
        let parameters = scenario_a_parameters();
        let solution = solve(&parameters, &od_matrix(&[(1, 3, 7.0)]), &[(1, 3)]);
        assert_relative_eq!(37.0, solution.objective, epsilon = 1e-6);
        assert_eq!(vec![line(1)], solution.used_lines.iter().copied().collect::<Vec<_>>());
        assert_eq!(
            Some(BTreeMap::from([(1, 1), (2, 0)])),
            solution.line_concept
        );
        let (_, _, ean) = shared_link_ean(&parameters, &[(1, 3)]);
        let operated = solution.operated_ean(&ean).unwrap();
        assert_eq!(4, operated.node_count());
        assert_eq!(3, operated.edge_count());
    }

    #[test]
    fn fixed_passengers_ride_an_operated_line() {
        let parameters = Parameters {
            add_fix_passenger_paths: true,
            ..scenario_a_parameters()
        };
        let od = od_matrix(&[(1, 3, 7.0), (2, 3, 4.0)]);
        let solution = solve(&parameters, &od, &[(1, 3)]);
        // line 2 closes, its fixed passengers move to line 1
        assert_eq!(
            Some(BTreeMap::from([(1, 1), (2, 0)])),
            solution.line_concept
        );
        assert_relative_eq!(45.0, solution.objective, epsilon = 1e-6);
        let fixed: f64 = ean_drive_loads(&parameters, &solution).iter().sum();
        assert_relative_eq!(7.0 + 4.0, fixed, epsilon = 1e-9);
        let drive = solution.objectives.get(ObjectiveComponent::Drive);
        assert_relative_eq!(36.0, drive, epsilon = 1e-6);

        let both_lines = Parameters {
            check_lower_frequencies: true,
            check_upper_frequencies: true,
            ..parameters
        };
        let solution = solve(&both_lines, &od, &[(1, 3)]);
        assert_eq!(2, solution.used_lines.len());
        assert_relative_eq!(46.0, solution.objective, epsilon = 1e-6);
        assert_relative_eq!(
            drive,
            solution.objectives.get(ObjectiveComponent::Drive),
            epsilon = 1e-6
        );
        let fixed: f64 = ean_drive_loads(&both_lines, &solution).iter().sum();
        assert_relative_eq!(7.0 + 4.0, fixed, epsilon = 1e-9);
    }

    fn ean_drive_loads(parameters: &Parameters, solution: &ModelSolution) -> Vec<f64> {
        let (ptn, _, ean) = shared_link_ean(parameters, &[(1, 3)]);
        let link = ptn.get_edge(2).unwrap();
        ean.edges()
            .filter(|a| a.activity_type == ActivityType::Drive)
            .filter(|a| ean.get_node(a.tail).unwrap().stop() == Some(link.left_stop))
            .map(|a| solution.activity_loads.get(&a.id).copied().unwrap_or(0.0))
            .collect()
    }

    #[test]
    fn passengers_without_od_events_keep_their_line_open() {
        let ptn = line_ptn(true);
        let mut pool = LinePool::new(false);
        pool.add_line(&ptn, 1, &[1, 2], 1, Some((2.0, 4.0)), &LineCostModel::default())
            .unwrap();
        let parameters = Parameters {
            add_fix_passenger_paths: true,
            factor_line_cost: 1.0,
            ..scenario_a_parameters()
        };
        let ean = build_periodic_ean(&ptn, &pool, &[], None, &parameters).unwrap();
        let od = od_matrix(&[(1, 3, 7.0)]);
        let input = ModelInput::new(&ptn, &pool, &ean, &od, &parameters);
        let mut model = PlanningModel::new(ModelType::LinTimPass, input).unwrap();
        assert_eq!(Status::Optimal, model.solve().unwrap());
        let solution = model.solution().unwrap();
        assert_eq!(Some(BTreeMap::from([(1, 1)])), solution.line_concept);
        assert_eq!(vec![line(1)], solution.used_lines.iter().copied().collect::<Vec<_>>());
        // line cost, then 7 passengers driving 2 + 2 and waiting 1
        assert_relative_eq!(39.0, solution.objective, epsilon = 1e-6);
        for activity in ean.edges().filter(|a| a.activity_type.is_line_internal()) {
            assert_relative_eq!(7.0, solution.activity_loads[&activity.id], epsilon = 1e-9);
        }
    }
}
