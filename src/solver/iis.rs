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

//! Irreducible infeasible subsystems by deletion filtering.

use super::{Backend, LinearExpression, Problem, Status};
use crate::{error::LinTimError, Result};
use anyhow::bail;
use tracing::debug;

fn is_feasible(problem: &Problem, backend: &mut dyn Backend) -> Result<bool> {
    let status = backend.solve(problem)?.status;
    Ok(!matches!(status, Status::Infeasible))
}

/// Removes constraints one by one, keeping a constraint only when the
/// problem becomes feasible without it. The result keeps every variable
/// bound and is infeasible, while dropping any of its constraints makes it
/// feasible.
pub(super) fn deletion_filter(problem: &Problem, backend: &mut dyn Backend) -> Result<Problem> {
    let mut candidate = Problem {
        objective: LinearExpression::new(),
        ..problem.clone()
    };
    if is_feasible(&candidate, backend)? {
        bail!(LinTimError::StoppingCriterion(format!(
            "model {} is feasible, no IIS to compute",
            problem.name
        )));
    }
    let mut position = 0;
    while position < candidate.constraints.len() {
        let removed = candidate.constraints.remove(position);
        if is_feasible(&candidate, backend)? {
            candidate.constraints.insert(position, removed);
            position += 1;
        } else {
            debug!("Constraint {} is not part of the IIS", removed.name);
        }
    }
    candidate.name = format!("{}_iis", problem.name);
    Ok(candidate)
}

#[cfg(test)]
mod tests {
    use super::super::{ConstraintSense, Model, VariableType};
    use super::*;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn conflicting_pair_is_isolated() {
        let mut model = Model::new("conflict");
        let x = model.add_variable(0.0, 10.0, VariableType::Integer, 1.0, "x");
        let y = model.add_variable(0.0, 10.0, VariableType::Integer, 1.0, "y");
        let expression = LinearExpression::from(x);
        model.add_constraint(&expression, ConstraintSense::GreaterEqual, 6.0, "x_low");
        model.add_constraint(&LinearExpression::from(y), ConstraintSense::LessEqual, 3.0, "y_up");
        model.add_constraint(&expression, ConstraintSense::LessEqual, 4.0, "x_up");
        assert_eq!(Status::Infeasible, model.solve().unwrap());
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("model.ilp");
        let names = model.compute_iis(&path).unwrap();
        assert_eq!(vec!["x_low".to_string(), "x_up".to_string()], names);
        let content = std::fs::read_to_string(path).unwrap();
        assert!(content.contains("x_low: 1 x >= 6"));
        assert!(!content.contains("y_up"));
    }

    #[test]
    fn feasible_model_has_no_iis() {
        let mut model = Model::new("fine");
        model.add_variable(0.0, 1.0, VariableType::Binary, 1.0, "x");
        let dir = TempDir::new().unwrap();
        assert!(model.compute_iis(dir.path().join("model.ilp")).is_err());
    }
}
