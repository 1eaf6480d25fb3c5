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

use approx::assert_relative_eq;
use lintim_core::{
    ean::{build_periodic_ean, ActivityType},
    lintim_csv::Dataset,
    models::{ModelInput, ModelType, PlanningModel},
    solver::Status,
    Config, Parameters,
};
use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const FIXTURE: &str = "tests/fixtures/shared_link";

fn copy_dataset(from: &Path, to: &Path) {
    for entry in fs::read_dir(from).unwrap() {
        let entry = entry.unwrap();
        let target = to.join(entry.file_name());
        if entry.file_type().unwrap().is_dir() {
            fs::create_dir_all(&target).unwrap();
            copy_dataset(&entry.path(), &target);
        } else {
            fs::copy(entry.path(), target).unwrap();
        }
    }
}

fn parameters(root: &Path) -> Parameters {
    let config = Config::from_file(root.join("basis/Config.cnf")).unwrap();
    Parameters::from_config(&config).unwrap()
}

#[test]
fn read_fixture_dataset() {
    let parameters = parameters(Path::new(FIXTURE));
    assert_eq!(10, parameters.period_length);
    assert!(!parameters.ptn_is_undirected);
    let dataset = Dataset::new(FIXTURE, parameters.clone());
    let ptn = dataset.read_ptn().unwrap();
    assert_eq!(3, ptn.node_count());
    assert_eq!(2, ptn.edge_count());
    assert_eq!(Some(2), ptn.edge(2).unwrap().lower_frequency);

    let pool = dataset.read_line_pool(&ptn).unwrap();
    assert_eq!(2, pool.len());
    let (concept_pool, concept) = dataset.read_line_concept(&ptn).unwrap();
    assert_eq!(2, concept_pool.len());
    assert_eq!(vec![(1, 1), (2, 1)], concept.into_iter().collect::<Vec<_>>());

    let od = dataset.read_od().unwrap();
    assert_relative_eq!(7.0, od.total(1, 3));

    let ean = build_periodic_ean(&ptn, &pool, &[], None, &parameters).unwrap();
    let count = |t: ActivityType| ean.edges().filter(|a| a.activity_type == t).count();
    assert_eq!(3, count(ActivityType::Drive));
    assert_eq!(1, count(ActivityType::Wait));
}

#[test]
fn line_planning_on_the_fixture() {
    let dir = TempDir::new().unwrap();
    copy_dataset(Path::new(FIXTURE), dir.path());
    let parameters = parameters(dir.path());
    let dataset = Dataset::new(dir.path(), parameters.clone());
    let ptn = dataset.read_ptn().unwrap();
    let pool = dataset.read_line_pool(&ptn).unwrap();
    let od = dataset.read_od().unwrap();
    let (routed, _) = od.active_pairs(parameters.routed_od_pairs);
    let ean = build_periodic_ean(&ptn, &pool, &routed, None, &parameters).unwrap();

    let input = ModelInput::new(&ptn, &pool, &ean, &od, &parameters);
    let mut model = PlanningModel::new(ModelType::LinTimPass, input).unwrap();
    assert_eq!(Status::Optimal, model.solve().unwrap());
    let solution = model.solution().unwrap();
    // link 2 needs both lines, passengers ride line 1 without transfer
    assert_relative_eq!(38.0, solution.objective, epsilon = 1e-6);
    model.write_output(&dataset).unwrap();

    let written = dataset.read_periodic_ean().unwrap();
    let timetable = dataset.read_periodic_timetable().unwrap();
    timetable.check_feasibility(&written).unwrap();
    let aperiodic = dataset.read_aperiodic_ean().unwrap();
    assert!(aperiodic.node_count() > 0);
    assert!(aperiodic.is_acyclic());
    let (_, concept) = dataset.read_line_concept(&ptn).unwrap();
    assert_eq!(vec![(1, 1), (2, 1)], concept.into_iter().collect::<Vec<_>>());
}

#[test]
fn timetabling_on_the_fixture_concept() {
    let parameters = parameters(Path::new(FIXTURE));
    let dataset = Dataset::new(FIXTURE, parameters.clone());
    let ptn = dataset.read_ptn().unwrap();
    let (pool, concept) = dataset.read_line_concept(&ptn).unwrap();
    let lines = pool.with_frequencies(&concept).unwrap();
    let od = dataset.read_od().unwrap();
    let (routed, _) = od.active_pairs(parameters.routed_od_pairs);
    let ean = build_periodic_ean(&ptn, &lines, &routed, None, &parameters).unwrap();

    for model_type in [ModelType::TimPass, ModelType::TimPassCycle] {
        let input = ModelInput::new(&ptn, &lines, &ean, &od, &parameters);
        let mut model = PlanningModel::new(model_type, input).unwrap();
        assert_eq!(Status::Optimal, model.solve().unwrap());
        let solution = model.solution().unwrap();
        // two drives of 2 and a wait of 1 for 7 passengers
        assert_relative_eq!(35.0, solution.objective, epsilon = 1e-6);
        solution.timetable.check_feasibility(&ean).unwrap();
    }
}
