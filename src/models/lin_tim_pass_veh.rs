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

//! The fully integrated model: line planning, periodic timetabling,
//! passenger routing and vehicle scheduling.

use super::{check_line_events, require_turnarounds, Features, ModelInput};
use crate::Result;

pub(super) const FEATURES: Features = Features {
    line_planning: true,
    routing: true,
    vehicles: true,
    cycle_base: false,
};

pub(super) fn validate(input: &ModelInput) -> Result<()> {
    require_turnarounds(input)?;
    check_line_events(input)
}

#[cfg(test)]
mod tests {
    use super::super::{ModelSolution, ModelType, PlanningModel};
    use super::*;
    use crate::{
        ean::{build_periodic_ean, ActivityType},
        lines::{LineDirection, LineKey},
        od::OdMatrix,
        solver::Status,
        statistic::ObjectiveComponent,
        test_utils::{od_matrix, scenario_a_parameters, shared_link_network, shuttle_network},
        turnaround::FixedTurnarounds,
        Parameters,
    };
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;

    fn parameters() -> Parameters {
        Parameters {
            period_length: 60,
            ptn_is_undirected: false,
            check_lower_frequencies: true,
            ..Default::default()
        }
    }

    /// Shuttle with 20 minute drives where the links in `required` must be
    /// served.
    fn solve(parameters: &Parameters, required: &[i32]) -> ModelSolution {
        let (mut ptn, pool) = shuttle_network(20);
        for &link in required {
            ptn.edge_mut(link).unwrap().lower_frequency = Some(1);
        }
        let ean = build_periodic_ean(&ptn, &pool, &[], None, parameters).unwrap();
        let od = OdMatrix::new();
        let mut turnarounds = FixedTurnarounds::default();
        turnarounds.set_symmetric(1, 2, 5.0, 1.0);
        turnarounds.set_symmetric(2, 2, 5.0, 0.0);
        turnarounds.set_symmetric(1, 1, 5.0, 0.0);
        let input = ModelInput::new(&ptn, &pool, &ean, &od, parameters).with_turnarounds(&turnarounds);
        let mut model = PlanningModel::new(ModelType::LinTimPassVeh, input).unwrap();
        assert_eq!(Status::Optimal, model.solve().unwrap());
        model.solution().unwrap().clone()
    }

    #[test]
    fn both_lines_share_a_vehicle() {
        let solution = solve(&parameters(), &[1, 2]);
        assert_relative_eq!(1.0, solution.objective, epsilon = 1e-6);
        let connections = solution.vehicle_connections.unwrap();
        assert_eq!(2, connections.trips.len());
        assert_eq!(1, connections.next.len());
    }

    #[test]
    fn only_operated_lines_get_vehicles() {
        let parameters = Parameters {
            factor_drive_time_unweighted: 1.0,
            ..parameters()
        };
        let solution = solve(&parameters, &[1]);
        let line = LineKey::new(1, LineDirection::Forward, 1);
        assert_eq!(vec![line], solution.used_lines.iter().copied().collect::<Vec<_>>());
        let connections = solution.vehicle_connections.unwrap();
        assert_eq!(vec![(1, line)], connections.trips.iter().copied().collect::<Vec<_>>());
        assert!(connections.next.is_empty());
        assert_relative_eq!(
            20.0,
            solution.objectives.get(ObjectiveComponent::DriveTimeUnweighted),
            epsilon = 1e-6
        );
        assert_relative_eq!(21.0, solution.objective, epsilon = 1e-6);
    }

    #[test]
    fn routed_passengers_with_a_closed_line() {
        let parameters = Parameters {
            p_max: 1,
            ..scenario_a_parameters()
        };
        let (ptn, pool) = shared_link_network();
        let ean = build_periodic_ean(&ptn, &pool, &[(1, 3)], None, &parameters).unwrap();
        let od = od_matrix(&[(1, 3, 7.0)]);
        let turnarounds = FixedTurnarounds::default();
        let input = ModelInput::new(&ptn, &pool, &ean, &od, &parameters).with_turnarounds(&turnarounds);
        let mut model = PlanningModel::new(ModelType::LinTimPassVeh, input).unwrap();
        assert_eq!(Status::Optimal, model.solve().unwrap());
        let solution = model.solution().unwrap();

        let closed = LineKey::new(2, LineDirection::Forward, 1);
        assert!(ean.nodes().any(|e| e.line() == Some(closed)));
        assert!(!solution.used_lines.contains(&closed));
        let connections = solution.vehicle_connections.as_ref().unwrap();
        assert!(connections.trips.iter().all(|&(_, line)| line != closed));
        assert_eq!(1, connections.trips.len());
        assert_eq!(1, connections.chains().unwrap().len());

        // every activity of the route is charged at least its duration
        let route = &solution.routes[&(1, 3, 1)];
        let mut travel_time = 0;
        for &id in route {
            let activity = ean.get_edge(id).unwrap();
            if matches!(
                activity.activity_type,
                ActivityType::Drive | ActivityType::Wait | ActivityType::Change
            ) {
                travel_time += solution.timetable.duration(activity).unwrap();
            }
        }
        assert_eq!(5, travel_time);
        let perceived = [
            ObjectiveComponent::Drive,
            ObjectiveComponent::Wait,
            ObjectiveComponent::Transfer,
        ]
        .iter()
        .map(|&c| solution.objectives.get(c))
        .sum::<f64>();
        assert!(perceived >= 7.0 * travel_time as f64 - 1e-6);
        assert_relative_eq!(2.0 + 35.0 + 1.0, solution.objective, epsilon = 1e-6);
    }
}
