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

//! Backend independent MIP modelling layer.
//!
//! A [`Model`] owns its variables, constraints and objective. Models are
//! solved by a pluggable [`Backend`]; the only shipped one is
//! [`MicroLpBackend`]. Since the model keeps its own representation, LP
//! export and IIS computation do not depend on the backend.

mod expression;
mod iis;
mod lp;
mod microlp;

pub use self::expression::{LinearExpression, Variable};
pub use self::microlp::MicroLpBackend;

use crate::{error::LinTimError, Result};
use anyhow::{bail, Context};
use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Domain of a variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariableType {
    /// Real valued.
    Continuous,
    /// Integer valued.
    Integer,
    /// 0 or 1.
    Binary,
}

/// A variable as declared in the model.
#[derive(Debug, Clone, PartialEq)]
pub struct VariableDefinition {
    /// Name in the LP output.
    pub name: String,
    /// Lower bound.
    pub lower_bound: f64,
    /// Upper bound.
    pub upper_bound: f64,
    /// Domain.
    pub variable_type: VariableType,
}

/// Comparison of a constraint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintSense {
    /// `>=`
    GreaterEqual,
    /// `<=`
    LessEqual,
    /// `=`
    Equal,
}

impl fmt::Display for ConstraintSense {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConstraintSense::GreaterEqual => write!(f, ">="),
            ConstraintSense::LessEqual => write!(f, "<="),
            ConstraintSense::Equal => write!(f, "="),
        }
    }
}

/// `expression sense rhs`, the constant of the expression folded into `rhs`.
#[derive(Debug, Clone, PartialEq)]
pub struct Constraint {
    /// Name in the LP output.
    pub name: String,
    /// Left hand side, without constant.
    pub expression: LinearExpression,
    /// Comparison.
    pub sense: ConstraintSense,
    /// Right hand side.
    pub rhs: f64,
}

impl Constraint {
    /// Whether `values` satisfy the constraint up to `tolerance`.
    pub fn is_satisfied(&self, values: &[f64], tolerance: f64) -> bool {
        let lhs = self.expression.evaluate(values);
        match self.sense {
            ConstraintSense::GreaterEqual => lhs >= self.rhs - tolerance,
            ConstraintSense::LessEqual => lhs <= self.rhs + tolerance,
            ConstraintSense::Equal => (lhs - self.rhs).abs() <= tolerance,
        }
    }
}

/// Direction of the optimisation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectiveSense {
    /// Smallest objective.
    Minimize,
    /// Largest objective.
    Maximize,
}

/// Outcome of a solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// An optimal solution was found.
    Optimal,
    /// A solution is known but optimality was not proven.
    Feasible,
    /// No solution exists.
    Infeasible,
    /// The objective is not bounded.
    Unbounded,
    /// Stopped, e.g. by a time limit, before finding any solution.
    NoSolution,
}

impl Status {
    /// Whether primal values are available.
    pub fn has_solution(self) -> bool {
        matches!(self, Status::Optimal | Status::Feasible)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Status::Optimal => "optimal",
            Status::Feasible => "feasible",
            Status::Infeasible => "infeasible",
            Status::Unbounded => "unbounded",
            Status::NoSolution => "no solution",
        };
        write!(f, "{}", name)
    }
}

/// Real valued solver parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DoubleParam {
    /// Relative gap at which to stop.
    MipGap,
}

/// Integer solver parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum IntParam {
    /// Seconds.
    TimeLimit,
    /// Number of threads.
    Threads,
    /// Verbosity, 0 for silent.
    OutputLevel,
}

/// Real valued results of a solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DoubleAttribute {
    /// Wall-clock seconds of the last solve.
    Runtime,
    /// Objective value of the solution.
    ObjectiveValue,
    /// Relative MIP gap of the solution.
    MipGap,
}

/// Integer results about the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntAttribute {
    /// Number of variables.
    NumVariables,
    /// Number of constraints.
    NumConstraints,
    /// 1 when a solution is known, 0 otherwise.
    NumSolutions,
}

/// The data a backend solves: variables, constraints and objective.
#[derive(Debug, Clone, PartialEq)]
pub struct Problem {
    /// Model name.
    pub name: String,
    /// Variables, indexed by [`Variable`].
    pub variables: Vec<VariableDefinition>,
    /// Constraints.
    pub constraints: Vec<Constraint>,
    /// Objective.
    pub objective: LinearExpression,
    /// Direction of the objective.
    pub sense: ObjectiveSense,
}

/// What a backend reports back.
#[derive(Debug, Clone, PartialEq)]
pub struct BackendSolution {
    /// Outcome.
    pub status: Status,
    /// One value per variable, empty without solution.
    pub values: Vec<f64>,
    /// Relative MIP gap.
    pub gap: f64,
}

/// A MIP solver able to solve a [`Problem`].
pub trait Backend {
    /// Name in the logs.
    fn name(&self) -> &'static str;
    /// Fails with [`LinTimError::ParamNotImplemented`] for unsupported
    /// parameters.
    fn set_double_param(&mut self, param: DoubleParam, value: f64) -> Result<()>;
    /// Fails with [`LinTimError::ParamNotImplemented`] for unsupported
    /// parameters.
    fn set_int_param(&mut self, param: IntParam, value: i32) -> Result<()>;
    /// Solves `problem`.
    fn solve(&mut self, problem: &Problem) -> Result<BackendSolution>;
}

struct SolveResult {
    status: Status,
    values: Vec<f64>,
    objective: f64,
    gap: f64,
    runtime: f64,
}

/// A MIP under construction or solved.
pub struct Model {
    problem: Problem,
    backend: Box<dyn Backend>,
    output_level: i32,
    result: Option<SolveResult>,
}

impl fmt::Debug for Model {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Model")
            .field("name", &self.problem.name)
            .field("backend", &self.backend.name())
            .field("variables", &self.problem.variables.len())
            .field("constraints", &self.problem.constraints.len())
            .finish()
    }
}

impl Model {
    /// Creates an empty minimisation model solved by [`MicroLpBackend`].
    pub fn new(name: &str) -> Self {
        Model::with_backend(name, Box::<MicroLpBackend>::default())
    }

    /// Creates an empty minimisation model solved by `backend`.
    pub fn with_backend(name: &str, backend: Box<dyn Backend>) -> Self {
        Model {
            problem: Problem {
                name: name.to_string(),
                variables: Vec::new(),
                constraints: Vec::new(),
                objective: LinearExpression::new(),
                sense: ObjectiveSense::Minimize,
            },
            backend,
            output_level: 1,
            result: None,
        }
    }

    /// Variables, constraints and objective of the model.
    pub fn problem(&self) -> &Problem {
        &self.problem
    }

    /// Adds a variable; `objective` is its coefficient in the objective.
    pub fn add_variable(
        &mut self,
        lower_bound: f64,
        upper_bound: f64,
        variable_type: VariableType,
        objective: f64,
        name: &str,
    ) -> Variable {
        let (lower_bound, upper_bound) = match variable_type {
            VariableType::Binary => (lower_bound.max(0.0), upper_bound.min(1.0)),
            _ => (lower_bound, upper_bound),
        };
        let variable = Variable(self.problem.variables.len());
        self.problem.variables.push(VariableDefinition {
            name: name.to_string(),
            lower_bound,
            upper_bound,
            variable_type,
        });
        if objective != 0.0 {
            self.problem.objective.add_term(objective, variable);
        }
        self.result = None;
        variable
    }

    /// Definition of `variable`.
    pub fn variable(&self, variable: Variable) -> Option<&VariableDefinition> {
        self.problem.variables.get(variable.0)
    }

    /// Adds `expression sense rhs`.
    pub fn add_constraint(
        &mut self,
        expression: &LinearExpression,
        sense: ConstraintSense,
        rhs: f64,
        name: &str,
    ) {
        let mut expression = expression.clone();
        let rhs = rhs - expression.constant();
        expression.add_constant(-expression.constant());
        self.problem.constraints.push(Constraint {
            name: name.to_string(),
            expression,
            sense,
            rhs,
        });
        self.result = None;
    }

    /// Replaces the objective. Coefficients given to [`Model::add_variable`]
    /// are discarded.
    pub fn set_objective(&mut self, expression: LinearExpression, sense: ObjectiveSense) {
        self.problem.objective = expression;
        self.problem.sense = sense;
        self.result = None;
    }

    /// Adds `expression` to the current objective.
    pub fn add_to_objective(&mut self, expression: &LinearExpression) {
        self.problem.objective.multi_add(1.0, expression);
        self.result = None;
    }

    /// The objective.
    pub fn objective(&self) -> &LinearExpression {
        &self.problem.objective
    }

    /// Fails when the backend does not support `param`.
    pub fn set_double_param(&mut self, param: DoubleParam, value: f64) -> Result<()> {
        self.backend.set_double_param(param, value)
    }

    /// Fails when the backend does not support `param`.
    pub fn set_int_param(&mut self, param: IntParam, value: i32) -> Result<()> {
        if param == IntParam::OutputLevel {
            self.output_level = value;
        }
        self.backend.set_int_param(param, value)
    }

    /// Solves the model. Infeasibility is reported through the status, not
    /// as an error.
    pub fn solve(&mut self) -> Result<Status> {
        if self.output_level > 0 {
            info!(
                "Solving {} with {} variables and {} constraints using {}",
                self.problem.name,
                self.problem.variables.len(),
                self.problem.constraints.len(),
                self.backend.name()
            );
        }
        let start = Instant::now();
        let solution = self.backend.solve(&self.problem)?;
        let runtime = start.elapsed().as_secs_f64();
        let objective = if solution.status.has_solution() {
            self.problem.objective.evaluate(&solution.values)
        } else {
            f64::NAN
        };
        if self.output_level > 0 {
            info!(
                "{} solved in {:.3}s: {}, objective {}",
                self.problem.name, runtime, solution.status, objective
            );
        }
        let status = solution.status;
        self.result = Some(SolveResult {
            status,
            values: solution.values,
            objective,
            gap: solution.gap,
            runtime,
        });
        Ok(status)
    }

    /// Status of the last solve, [`Status::NoSolution`] before solving.
    pub fn status(&self) -> Status {
        self.result.as_ref().map_or(Status::NoSolution, |r| r.status)
    }

    fn solved(&self) -> Result<&SolveResult> {
        match &self.result {
            Some(result) if result.status.has_solution() => Ok(result),
            Some(result) => bail!(LinTimError::StoppingCriterion(format!(
                "model {} has no solution, status {}",
                self.problem.name, result.status
            ))),
            None => bail!(LinTimError::StoppingCriterion(format!(
                "model {} was not solved",
                self.problem.name
            ))),
        }
    }

    /// Value of `variable` in the solution.
    pub fn value(&self, variable: Variable) -> Result<f64> {
        let result = self.solved()?;
        result
            .values
            .get(variable.0)
            .copied()
            .ok_or_else(|| {
                LinTimError::DataIndexNotFound {
                    kind: "variable",
                    index: variable.0 as i32,
                }
                .into()
            })
    }

    /// Value of `variable` rounded to the closest integer.
    pub fn integer_value(&self, variable: Variable) -> Result<i64> {
        Ok(self.value(variable)?.round() as i64)
    }

    /// Value of `expression` in the solution.
    pub fn evaluate(&self, expression: &LinearExpression) -> Result<f64> {
        Ok(expression.evaluate(&self.solved()?.values))
    }

    /// Fails before a solve, or without solution for the objective and gap.
    pub fn get_double_attribute(&self, attribute: DoubleAttribute) -> Result<f64> {
        match attribute {
            DoubleAttribute::Runtime => match &self.result {
                Some(result) => Ok(result.runtime),
                None => bail!(LinTimError::AttributeNotImplemented(
                    "runtime before solving".to_string()
                )),
            },
            DoubleAttribute::ObjectiveValue => Ok(self.solved()?.objective),
            DoubleAttribute::MipGap => Ok(self.solved()?.gap),
        }
    }

    /// Size of the model and number of known solutions.
    pub fn get_int_attribute(&self, attribute: IntAttribute) -> Result<i32> {
        Ok(match attribute {
            IntAttribute::NumVariables => self.problem.variables.len() as i32,
            IntAttribute::NumConstraints => self.problem.constraints.len() as i32,
            IntAttribute::NumSolutions => i32::from(self.status().has_solution()),
        })
    }

    /// Writes the model in CPLEX LP format.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        info!("Writing model {:?}", path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("Error creating {:?}", parent))?;
        }
        let content = lp::to_lp_string(&self.problem);
        fs::write(path, content).with_context(|| format!("Error writing {:?}", path))?;
        Ok(())
    }

    /// Computes an irreducible infeasible subsystem and writes it to `path`
    /// in LP format. Returns the names of its constraints.
    pub fn compute_iis<P: AsRef<Path>>(&mut self, path: P) -> Result<Vec<String>> {
        let path = path.as_ref();
        let subsystem = iis::deletion_filter(&self.problem, self.backend.as_mut())?;
        let names = subsystem
            .constraints
            .iter()
            .map(|c| c.name.clone())
            .collect::<Vec<_>>();
        debug!("IIS of {}: {:?}", self.problem.name, names);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).with_context(|| format!("Error creating {:?}", parent))?;
        }
        fs::write(path, lp::to_lp_string(&subsystem))
            .with_context(|| format!("Error writing {:?}", path))?;
        info!(
            "IIS with {} constraints written to {:?}",
            names.len(),
            path
        );
        Ok(names)
    }
}

/// Sets the parameters configured in `parameters` on `model`. Unsupported
/// parameters are logged and ignored.
pub fn apply_parameters(model: &mut Model, parameters: &crate::Parameters) {
    let mut requests: BTreeMap<&str, Result<()>> = BTreeMap::new();
    if parameters.mip_gap > 0.0 {
        requests.insert(
            "mip_gap",
            model.set_double_param(DoubleParam::MipGap, parameters.mip_gap),
        );
    }
    if parameters.time_limit > 0 {
        requests.insert(
            "time_limit",
            model.set_int_param(IntParam::TimeLimit, parameters.time_limit),
        );
    }
    if parameters.n_threads > 0 {
        requests.insert(
            "n_threads",
            model.set_int_param(IntParam::Threads, parameters.n_threads),
        );
    }
    requests.insert(
        "solver_output_level",
        model.set_int_param(IntParam::OutputLevel, parameters.solver_output_level),
    );
    for (key, result) in requests {
        if let Err(err) = result {
            warn!("Ignoring {}: {}", key, err);
        }
    }
}
