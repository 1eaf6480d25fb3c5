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

//! CPLEX LP format export.

use super::{LinearExpression, ObjectiveSense, Problem, VariableType};
use std::fmt::Write;

fn number(value: f64) -> String {
    if value == f64::INFINITY {
        "+inf".to_string()
    } else if value == f64::NEG_INFINITY {
        "-inf".to_string()
    } else {
        format!("{}", value)
    }
}

fn write_expression(out: &mut String, problem: &Problem, expression: &LinearExpression) {
    let mut first = true;
    for (variable, coefficient) in expression.terms() {
        let name = &problem.variables[variable.index()].name;
        let sign = if coefficient < 0.0 { "-" } else { "+" };
        if first && coefficient >= 0.0 {
            let _ = write!(out, " {} {}", number(coefficient), name);
        } else {
            let _ = write!(out, " {} {} {}", sign, number(coefficient.abs()), name);
        }
        first = false;
    }
    if expression.is_constant() {
        let _ = write!(out, " 0");
    }
}

/// LP representation of `problem`. The objective constant is written as a
/// comment since the format has no room for it.
pub(super) fn to_lp_string(problem: &Problem) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "\\ Model {}", problem.name);
    if problem.objective.constant() != 0.0 {
        let _ = writeln!(out, "\\ Objective constant {}", number(problem.objective.constant()));
    }
    let _ = writeln!(
        out,
        "{}",
        match problem.sense {
            ObjectiveSense::Minimize => "Minimize",
            ObjectiveSense::Maximize => "Maximize",
        }
    );
    out.push_str(" obj:");
    write_expression(&mut out, problem, &problem.objective);
    out.push('\n');
    out.push_str("Subject To\n");
    for constraint in &problem.constraints {
        let _ = write!(out, " {}:", constraint.name);
        write_expression(&mut out, problem, &constraint.expression);
        let _ = writeln!(out, " {} {}", constraint.sense, number(constraint.rhs));
    }
    out.push_str("Bounds\n");
    for variable in &problem.variables {
        if variable.variable_type == VariableType::Binary {
            continue;
        }
        if variable.lower_bound == f64::NEG_INFINITY && variable.upper_bound == f64::INFINITY {
            let _ = writeln!(out, " {} free", variable.name);
        } else {
            let _ = writeln!(
                out,
                " {} <= {} <= {}",
                number(variable.lower_bound),
                variable.name,
                number(variable.upper_bound)
            );
        }
    }
    for (section, variable_type) in [
        ("Generals", VariableType::Integer),
        ("Binaries", VariableType::Binary),
    ] {
        let names: Vec<&str> = problem
            .variables
            .iter()
            .filter(|v| v.variable_type == variable_type)
            .map(|v| v.name.as_str())
            .collect();
        if !names.is_empty() {
            let _ = writeln!(out, "{}", section);
            for name in names {
                let _ = writeln!(out, " {}", name);
            }
        }
    }
    out.push_str("End\n");
    out
}

#[cfg(test)]
mod tests {
    use super::super::{ConstraintSense, Model, VariableType};
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn lp_layout() {
        let mut model = Model::new("tiny");
        let x = model.add_variable(0.0, 5.0, VariableType::Integer, 2.0, "x");
        let y = model.add_variable(0.0, 1.0, VariableType::Binary, -1.0, "y");
        let z = model.add_variable(f64::NEG_INFINITY, f64::INFINITY, VariableType::Continuous, 0.0, "z");
        let mut expression = LinearExpression::new();
        expression.add_term(1.0, x).add_term(-3.0, y).add_term(1.0, z);
        model.add_constraint(&expression, ConstraintSense::GreaterEqual, 1.0, "c1");
        let expected = "\\ Model tiny\n\
                        Minimize\n \
                        obj: 2 x - 1 y\n\
                        Subject To\n \
                        c1: 1 x - 3 y + 1 z >= 1\n\
                        Bounds\n \
                        0 <= x <= 5\n \
                        z free\n\
                        Generals\n \
                        x\n\
                        Binaries\n \
                        y\n\
                        End\n";
        assert_eq!(expected, to_lp_string(model.problem()));
    }
}
