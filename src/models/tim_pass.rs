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

//! Periodic timetabling with integrated passenger routing on a fixed line
//! concept.

use super::{Features, ModelInput};
use crate::{
    error::LinTimError,
    preprocessing::{self, FixedLoad},
    Result,
};
use anyhow::bail;

pub(super) const FEATURES: Features = Features {
    line_planning: false,
    routing: true,
    vehicles: false,
    cycle_base: false,
};

pub(super) fn validate(input: &ModelInput) -> Result<()> {
    if !input.ean.nodes().any(|e| e.is_network()) {
        bail!(LinTimError::DataInconsistent(
            "the EAN has no network event".to_string()
        ));
    }
    Ok(())
}

/// With `tim_pass_fix_passengers`, the pairs without OD events travel on
/// their shortest path through the network activities.
pub(super) fn fixed_loads(input: &ModelInput) -> Result<Vec<FixedLoad>> {
    if !input.parameters.tim_pass_fix_passengers {
        return Ok(Vec::new());
    }
    let inactive = input.inactive_pairs();
    if inactive.is_empty() {
        return Ok(Vec::new());
    }
    let fixed = preprocessing::fixed_loads(input.ean, input.od, &inactive, input.parameters)?;
    Ok(fixed
        .loads
        .into_iter()
        .map(|(activity, passengers)| FixedLoad::on(activity, passengers))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::super::{ModelType, PlanningModel};
    use super::*;
    use crate::{
        ean::{build_periodic_ean, ActivityType},
        lintim_csv::Dataset,
        solver::Status,
        statistic::ObjectiveComponent,
        test_utils::{line_ptn, od_matrix, scenario_a_parameters, single_line_pool, test_in_tmp_dir},
        Parameters,
    };
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;

    fn solve_line(parameters: &Parameters, demand: &[(i32, i32, f64)], routed: &[(i32, i32)]) -> super::super::ModelSolution {
        let ptn = line_ptn(true);
        let pool = single_line_pool(&ptn);
        let mut od = od_matrix(demand);
        if parameters.number_of_time_slices > 1 {
            od = od.split_time_slices(parameters.number_of_time_slices);
        }
        let ean = build_periodic_ean(&ptn, &pool, routed, None, parameters).unwrap();
        let input = ModelInput::new(&ptn, &pool, &ean, &od, parameters);
        let mut model = PlanningModel::new(ModelType::TimPass, input).unwrap();
        assert_eq!(Status::Optimal, model.solve().unwrap());
        model.solution().unwrap().clone()
    }

    #[test]
    fn single_pair_on_a_single_line() {
        let solution = solve_line(&scenario_a_parameters(), &[(1, 3, 7.0)], &[(1, 3)]);
        assert_relative_eq!(35.0, solution.objective, epsilon = 1e-6);
        assert_relative_eq!(28.0, solution.objectives.get(ObjectiveComponent::Drive), epsilon = 1e-6);
        assert_relative_eq!(7.0, solution.objectives.get(ObjectiveComponent::Wait), epsilon = 1e-6);
        assert_eq!(
            vec![(1, 7.0), (2, 7.0), (3, 7.0)],
            solution.activity_loads.into_iter().collect::<Vec<_>>()
        );
        assert_eq!(None, solution.line_concept);
        assert_eq!(1, solution.used_lines.len());
    }

    #[test]
    fn route_is_a_path_through_the_timetable() {
        let parameters = scenario_a_parameters();
        let ptn = line_ptn(true);
        let pool = single_line_pool(&ptn);
        let od = od_matrix(&[(1, 3, 7.0)]);
        let ean = build_periodic_ean(&ptn, &pool, &[(1, 3)], None, &parameters).unwrap();
        let input = ModelInput::new(&ptn, &pool, &ean, &od, &parameters);
        let mut model = PlanningModel::new(ModelType::TimPass, input).unwrap();
        model.solve().unwrap();
        let solution = model.solution().unwrap();
        solution.timetable.check_feasibility(&ean).unwrap();

        let route = &solution.routes[&(1, 3, 1)];
        let activities: Vec<_> = route.iter().map(|&a| ean.get_edge(a).unwrap()).collect();
        assert_eq!(ActivityType::To, activities[0].activity_type);
        assert_eq!(ActivityType::From, activities[activities.len() - 1].activity_type);
        for pair in activities.windows(2) {
            assert_eq!(pair[0].head, pair[1].tail);
        }
        let travel: i64 = activities
            .iter()
            .filter(|a| a.activity_type.is_network())
            .map(|a| solution.timetable.duration(a).unwrap())
            .sum();
        assert_relative_eq!(7.0 * travel as f64, solution.objective, epsilon = 1e-6);

        let durations: Vec<i64> = solution.durations.values().copied().collect();
        assert_eq!(vec![travel], durations);
    }

    #[test]
    fn same_optimum_with_preprocessing() {
        let parameters = Parameters {
            use_preprocessing: true,
            ..scenario_a_parameters()
        };
        let solution = solve_line(&parameters, &[(1, 3, 7.0), (2, 3, 1.0)], &[(1, 3), (2, 3)]);
        assert_relative_eq!(37.0, solution.objective, epsilon = 1e-6);
    }

    #[test]
    fn passengers_switch_time_slice() {
        let parameters = Parameters {
            number_of_time_slices: 2,
            ..scenario_a_parameters()
        };
        let solution = solve_line(&parameters, &[(1, 3, 7.0)], &[(1, 3)]);
        // one departure per period serves a single slice of length 5
        assert_relative_eq!(17.5, solution.objectives.get(ObjectiveComponent::TimeSlice), epsilon = 1e-6);
        assert_relative_eq!(52.5, solution.objective, epsilon = 1e-6);
        assert_eq!(2, solution.routes.len());
    }

    #[test]
    fn fixed_passengers_of_inactive_pairs() {
        let parameters = Parameters {
            tim_pass_fix_passengers: true,
            ..scenario_a_parameters()
        };
        let solution = solve_line(&parameters, &[(1, 3, 7.0), (1, 2, 4.0)], &[(1, 3)]);
        assert_relative_eq!(43.0, solution.objective, epsilon = 1e-6);
        assert_relative_eq!(11.0, solution.activity_loads[&1], epsilon = 1e-9);

        let without = Parameters {
            tim_pass_fix_passengers: false,
            ..scenario_a_parameters()
        };
        let solution = solve_line(&without, &[(1, 3, 7.0), (1, 2, 4.0)], &[(1, 3)]);
        assert_relative_eq!(35.0, solution.objective, epsilon = 1e-6);
    }

    #[test]
    fn output_files() {
        test_in_tmp_dir(|path| {
            let parameters = scenario_a_parameters();
            let ptn = line_ptn(true);
            let pool = single_line_pool(&ptn);
            let od = od_matrix(&[(1, 3, 7.0)]);
            let ean = build_periodic_ean(&ptn, &pool, &[(1, 3)], None, &parameters).unwrap();
            let input = ModelInput::new(&ptn, &pool, &ean, &od, &parameters);
            let mut model = PlanningModel::new(ModelType::TimPass, input).unwrap();
            model.solve().unwrap();
            let dataset = Dataset::new(path, parameters.clone());
            model.write_output(&dataset).unwrap();

            let written = dataset.read_periodic_ean().unwrap();
            assert_eq!(4, written.node_count());
            assert_eq!(3, written.edge_count());
            assert_eq!(7.0, written.get_edge(2).unwrap().passengers);
            let timetable = dataset.read_periodic_timetable().unwrap();
            timetable.check_feasibility(&written).unwrap();
            let aperiodic = dataset.read_aperiodic_ean().unwrap();
            assert_eq!(4, aperiodic.node_count());
            assert!(aperiodic.is_acyclic());
            assert!(!dataset.path(&parameters.files.vehicle_schedule).exists());
            assert!(dataset.path(&parameters.files.solver_statistic).exists());
        });
    }
}
