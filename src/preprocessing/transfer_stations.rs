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

//! Selection of a minimal set of transfer stations covering every pair of
//! overlapping line routes.

use crate::{
    error::LinTimError,
    lines::LinePool,
    solver::{ConstraintSense, LinearExpression, Model, Status, VariableType},
    Parameters, Result,
};
use anyhow::bail;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::{debug, info};

/// How a common sublist of two routes is travelled by the second route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Overlap {
    /// A single common stop.
    Single,
    /// Both routes run the same way.
    Parallel,
    /// The routes run in opposite directions.
    Antiparallel,
}

/// Maximal runs of stops of `first` which are consecutive in `second`, in
/// the order of `first`.
pub fn common_sublists(first: &[i32], second: &[i32]) -> Vec<(Vec<i32>, Overlap)> {
    let positions: HashMap<i32, usize> = second.iter().enumerate().map(|(i, &s)| (s, i)).collect();
    let mut sublists = Vec::new();
    let mut current: Vec<i32> = Vec::new();
    let mut overlap = Overlap::Single;
    for &stop in first {
        let position = match positions.get(&stop) {
            Some(&p) => p,
            None => {
                if !current.is_empty() {
                    sublists.push((std::mem::take(&mut current), overlap));
                }
                continue;
            }
        };
        if let Some(&last) = current.last() {
            let previous = positions[&last];
            let step = match (position == previous + 1, previous == position + 1) {
                (true, _) => Some(Overlap::Parallel),
                (_, true) => Some(Overlap::Antiparallel),
                _ => None,
            };
            match step {
                Some(step) if overlap == Overlap::Single || overlap == step => {
                    overlap = step;
                    current.push(stop);
                    continue;
                }
                _ => sublists.push((std::mem::take(&mut current), overlap)),
            }
        }
        overlap = Overlap::Single;
        current.push(stop);
    }
    if !current.is_empty() {
        sublists.push((current, overlap));
    }
    sublists
}

/// Covering constraints of two routes sharing at least two stops: one
/// single-stop constraint at the entry of every antiparallel overlap or,
/// without antiparallel overlap, at least one of the common stops.
pub fn transfer_constraints(first: &[i32], second: &[i32]) -> Vec<BTreeSet<i32>> {
    let sublists = common_sublists(first, second);
    let common: BTreeSet<i32> = sublists.iter().flat_map(|(s, _)| s.iter().copied()).collect();
    if common.len() < 2 {
        return Vec::new();
    }
    let antiparallel: Vec<BTreeSet<i32>> = sublists
        .iter()
        .filter(|(_, overlap)| *overlap == Overlap::Antiparallel)
        .map(|(stops, _)| BTreeSet::from([stops[0]]))
        .collect();
    if antiparallel.is_empty() {
        vec![common]
    } else {
        antiparallel
    }
}

/// Solves the covering problem over every pair of routes of `lines` and
/// returns the selected stops.
pub fn potential_transfer_stations(lines: &LinePool, parameters: &Parameters) -> Result<BTreeSet<i32>> {
    let routes: Vec<_> = lines.routes().collect();
    let mut constraints = Vec::new();
    for (i, first) in routes.iter().enumerate() {
        for second in &routes[i + 1..] {
            for stops in transfer_constraints(first.stops(), second.stops()) {
                debug!(
                    "Lines {} and {} need a transfer station in {:?}",
                    first.id(),
                    second.id(),
                    stops
                );
                constraints.push(stops);
            }
        }
    }
    info!(
        "Selecting transfer stations for {} covering constraints",
        constraints.len()
    );
    if constraints.is_empty() {
        return Ok(BTreeSet::new());
    }
    let mut model = Model::new("transfer_stations");
    crate::solver::apply_parameters(&mut model, parameters);
    let mut variables = BTreeMap::new();
    for stop in constraints.iter().flatten() {
        if !variables.contains_key(stop) {
            let variable = model.add_variable(0.0, 1.0, VariableType::Binary, 1.0, &format!("t_{stop}"));
            variables.insert(*stop, variable);
        }
    }
    for (index, stops) in constraints.iter().enumerate() {
        let mut cover = LinearExpression::new();
        for stop in stops {
            cover.add_term(1.0, variables[stop]);
        }
        model.add_constraint(&cover, ConstraintSense::GreaterEqual, 1.0, &format!("cover_{index}"));
    }
    let status = model.solve()?;
    if !status.has_solution() {
        bail!(LinTimError::StoppingCriterion(format!(
            "transfer station selection ended with status {}",
            status
        )));
    }
    if status != Status::Optimal {
        debug!("Transfer stations are not proven minimal");
    }
    let mut stations = BTreeSet::new();
    for (&stop, &variable) in &variables {
        if model.integer_value(variable)? == 1 {
            stations.insert(stop);
        }
    }
    info!("{} transfer stations selected", stations.len());
    Ok(stations)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        lines::LineCostModel,
        ptn::{Link, Ptn, Stop},
    };
    use pretty_assertions::assert_eq;

    #[test]
    fn sublists_keep_their_orientation() {
        let sublists = common_sublists(&[1, 2, 3, 4, 5], &[9, 4, 3, 2, 8, 5]);
        assert_eq!(
            vec![
                (vec![2, 3, 4], Overlap::Antiparallel),
                (vec![5], Overlap::Single)
            ],
            sublists
        );
        let sublists = common_sublists(&[1, 2, 3], &[2, 3, 7, 1]);
        assert_eq!(
            vec![(vec![1], Overlap::Single), (vec![2, 3], Overlap::Parallel)],
            sublists
        );
    }

    #[test]
    fn antiparallel_overlap_gives_a_single_stop() {
        assert_eq!(
            vec![BTreeSet::from([2])],
            transfer_constraints(&[1, 2, 3, 4], &[4, 3, 2, 7])
        );
        assert_eq!(
            vec![BTreeSet::from([2, 3])],
            transfer_constraints(&[1, 2, 3, 4], &[5, 2, 3, 6])
        );
        assert!(transfer_constraints(&[1, 2], &[2, 5]).is_empty());
    }

    fn star_pool() -> LinePool {
        // 1 - 2 - 3 - 4 with branches 5 - 2, 3 - 6 and 2 - 7
        let mut ptn = Ptn::new(true);
        for id in 1..=7 {
            ptn.add_node(Stop::new(id, &id.to_string(), &id.to_string(), 0.0, 0.0))
                .unwrap();
        }
        let links = [
            (1, 1, 2),
            (2, 2, 3),
            (3, 3, 4),
            (4, 5, 2),
            (5, 3, 6),
            (6, 4, 3),
            (7, 3, 2),
            (8, 2, 7),
        ];
        for (id, from, to) in links {
            ptn.add_edge(Link::new(id, from, to, 1.0, 1, 2).unwrap())
                .unwrap();
        }
        let mut pool = LinePool::new(false);
        let costs = LineCostModel::default();
        pool.add_line(&ptn, 1, &[1, 2, 3], 1, None, &costs).unwrap();
        pool.add_line(&ptn, 2, &[4, 2, 5], 1, None, &costs).unwrap();
        pool.add_line(&ptn, 3, &[6, 7, 8], 1, None, &costs).unwrap();
        pool
    }

    #[test]
    fn minimal_cover() {
        let stations = potential_transfer_stations(&star_pool(), &Parameters::default()).unwrap();
        assert_eq!(BTreeSet::from([2]), stations);
    }
}
