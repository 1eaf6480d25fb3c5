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

use std::collections::BTreeMap;

/// Opaque handle on a variable of a [`super::Model`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Variable(pub(crate) usize);

impl Variable {
    /// Position of the variable in its model.
    pub fn index(self) -> usize {
        self.0
    }
}

/// `Σ coefficient · variable + constant`. Terms on the same variable are
/// merged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinearExpression {
    terms: BTreeMap<Variable, f64>,
    constant: f64,
}

impl LinearExpression {
    /// The zero expression.
    pub fn new() -> Self {
        LinearExpression::default()
    }

    /// Adds `coefficient * variable`.
    pub fn add_term(&mut self, coefficient: f64, variable: Variable) -> &mut Self {
        if coefficient != 0.0 {
            let entry = self.terms.entry(variable).or_insert(0.0);
            *entry += coefficient;
            if *entry == 0.0 {
                self.terms.remove(&variable);
            }
        }
        self
    }

    /// Adds `factor · other`, constant included.
    pub fn multi_add(&mut self, factor: f64, other: &LinearExpression) -> &mut Self {
        for (&variable, &coefficient) in &other.terms {
            self.add_term(factor * coefficient, variable);
        }
        self.constant += factor * other.constant;
        self
    }

    /// Adds a constant.
    pub fn add_constant(&mut self, constant: f64) -> &mut Self {
        self.constant += constant;
        self
    }

    /// Resets to zero.
    pub fn clear(&mut self) {
        self.terms.clear();
        self.constant = 0.0;
    }

    /// The constant term.
    pub fn constant(&self) -> f64 {
        self.constant
    }

    /// Non-zero terms.
    pub fn terms(&self) -> impl Iterator<Item = (Variable, f64)> + '_ {
        self.terms.iter().map(|(&v, &c)| (v, c))
    }

    /// Coefficient of `variable`, 0 when absent.
    pub fn coefficient(&self, variable: Variable) -> f64 {
        self.terms.get(&variable).copied().unwrap_or(0.0)
    }

    /// Whether there is no variable term.
    pub fn is_constant(&self) -> bool {
        self.terms.is_empty()
    }

    /// Value for the given variable values, indexed by variable.
    pub fn evaluate(&self, values: &[f64]) -> f64 {
        self.terms
            .iter()
            .map(|(v, c)| c * values.get(v.0).copied().unwrap_or(0.0))
            .sum::<f64>()
            + self.constant
    }
}

impl From<Variable> for LinearExpression {
    fn from(variable: Variable) -> Self {
        let mut expression = LinearExpression::new();
        expression.add_term(1.0, variable);
        expression
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn terms_are_merged() {
        let (x, y) = (Variable(0), Variable(1));
        let mut expression = LinearExpression::new();
        expression.add_term(2.0, x).add_term(1.0, y).add_term(-2.0, x);
        assert_eq!(vec![(y, 1.0)], expression.terms().collect::<Vec<_>>());
        let mut other = LinearExpression::from(x);
        other.add_constant(4.0);
        expression.multi_add(-0.5, &other);
        assert_eq!(-0.5, expression.coefficient(x));
        assert_eq!(-2.0, expression.constant());
        assert_eq!(1.0 * 3.0 - 0.5 * 2.0 - 2.0, expression.evaluate(&[2.0, 3.0]));
        expression.clear();
        assert!(expression.is_constant());
        assert_eq!(0.0, expression.constant());
    }
}
