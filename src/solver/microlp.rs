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

//! [`Backend`] on top of `good_lp` and its pure Rust `microlp` solver.

use super::{
    Backend, BackendSolution, ConstraintSense, DoubleParam, IntParam, LinearExpression,
    ObjectiveSense, Problem, Status, VariableType,
};
use crate::{error::LinTimError, Result};
use anyhow::{anyhow, bail};
use good_lp::{
    constraint, microlp, variable, Expression, ProblemVariables, ResolutionError, Solution,
    SolverModel,
};
use tracing::debug;

/// Branch and bound of `microlp`. Solves to optimality; time limits, gaps
/// and thread counts are not supported.
#[derive(Debug, Default, Clone)]
pub struct MicroLpBackend {}

fn to_expression(expression: &LinearExpression, variables: &[good_lp::Variable]) -> Expression {
    let mut result = Expression::from_other_affine(expression.constant());
    for (variable, coefficient) in expression.terms() {
        result += coefficient * variables[variable.index()];
    }
    result
}

impl Backend for MicroLpBackend {
    fn name(&self) -> &'static str {
        "microlp"
    }

    fn set_double_param(&mut self, param: DoubleParam, _value: f64) -> Result<()> {
        bail!(LinTimError::ParamNotImplemented(format!(
            "{:?} for the microlp backend",
            param
        )))
    }

    fn set_int_param(&mut self, param: IntParam, _value: i32) -> Result<()> {
        match param {
            // progress is reported through the model logs
            IntParam::OutputLevel => Ok(()),
            _ => bail!(LinTimError::ParamNotImplemented(format!(
                "{:?} for the microlp backend",
                param
            ))),
        }
    }

    fn solve(&mut self, problem: &Problem) -> Result<BackendSolution> {
        for definition in &problem.variables {
            if definition.lower_bound > definition.upper_bound {
                debug!("Variable {} has empty bounds", definition.name);
                return Ok(BackendSolution {
                    status: Status::Infeasible,
                    values: Vec::new(),
                    gap: f64::NAN,
                });
            }
        }
        let mut variables = ProblemVariables::new();
        let handles: Vec<good_lp::Variable> = problem
            .variables
            .iter()
            .map(|definition| {
                let mut declaration = variable().name(definition.name.clone());
                match definition.variable_type {
                    VariableType::Binary => declaration = declaration.binary(),
                    VariableType::Integer => declaration = declaration.integer(),
                    VariableType::Continuous => {}
                }
                if definition.lower_bound.is_finite() {
                    declaration = declaration.min(definition.lower_bound);
                }
                if definition.upper_bound.is_finite() {
                    declaration = declaration.max(definition.upper_bound);
                }
                variables.add(declaration)
            })
            .collect();
        let objective = to_expression(&problem.objective, &handles);
        let unsolved = match problem.sense {
            ObjectiveSense::Minimize => variables.minimise(objective),
            ObjectiveSense::Maximize => variables.maximise(objective),
        };
        let mut model = unsolved.using(microlp);
        for c in &problem.constraints {
            let lhs = to_expression(&c.expression, &handles);
            let rhs = c.rhs;
            model.add_constraint(match c.sense {
                ConstraintSense::GreaterEqual => constraint::geq(lhs, rhs),
                ConstraintSense::LessEqual => constraint::leq(lhs, rhs),
                ConstraintSense::Equal => constraint::eq(lhs, rhs),
            });
        }
        match model.solve() {
            Ok(solution) => Ok(BackendSolution {
                status: Status::Optimal,
                values: handles.iter().map(|&h| solution.value(h)).collect(),
                gap: 0.0,
            }),
            Err(ResolutionError::Infeasible) => Ok(BackendSolution {
                status: Status::Infeasible,
                values: Vec::new(),
                gap: f64::NAN,
            }),
            Err(ResolutionError::Unbounded) => Ok(BackendSolution {
                status: Status::Unbounded,
                values: Vec::new(),
                gap: f64::NAN,
            }),
            Err(err) => Err(anyhow!(err).context(format!("microlp failed on {}", problem.name))),
        }
    }
}
