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

//! Typed errors raised by the library.
//!
//! Every function of the crate returns [`crate::Result`], an
//! [`anyhow::Error`] carrying context. When a caller needs to react to a
//! specific failure, the typed [`LinTimError`] can be recovered with
//! [`anyhow::Error::downcast_ref`].

use std::path::PathBuf;
use thiserror::Error;

/// Failures of the LinTim core, grouped as input, data, algorithmic,
/// solver and configuration errors.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LinTimError {
    /// A row does not have the expected number of columns.
    #[error("{file:?}, line {line}: expected {expected} columns but found {found}")]
    InputFormat {
        /// File being read.
        file: PathBuf,
        /// 1-based line number in the file.
        line: u64,
        /// Number of columns required by the format.
        expected: usize,
        /// Number of columns found.
        found: usize,
    },
    /// A cell could not be parsed into the type of its column.
    #[error("{file:?}, line {line}, column {column}: cannot read {value:?} as {expected}")]
    InputTypeInconsistency {
        /// File being read.
        file: PathBuf,
        /// 1-based line number in the file.
        line: u64,
        /// 1-based column number.
        column: usize,
        /// Raw content of the cell.
        value: String,
        /// Name of the expected type.
        expected: &'static str,
    },
    /// A node id is used twice in a graph.
    #[error("node id {0} is already assigned")]
    GraphNodeIdMultiplyAssigned(i32),
    /// An edge id is used twice in a graph.
    #[error("edge id {0} is already assigned")]
    GraphEdgeIdMultiplyAssigned(i32),
    /// An edge references a node which is not part of the graph.
    #[error("edge {edge} references node {node} which is not in the graph")]
    GraphIncidentNodeNotFound {
        /// The edge being added.
        edge: i32,
        /// The missing endpoint.
        node: i32,
    },
    /// Lookup of an unknown node.
    #[error("node {0} not found")]
    GraphNodeNotFound(i32),
    /// Lookup of an unknown edge.
    #[error("edge {0} not found")]
    GraphEdgeNotFound(i32),
    /// A reference to an object which does not exist.
    #[error("{kind} with index {index} not found")]
    DataIndexNotFound {
        /// Kind of the referenced object (stop, link, line, event...).
        kind: &'static str,
        /// The missing index.
        index: i32,
    },
    /// An event type literal other than `arrival`/`departure`.
    #[error("illegal event type {0:?}")]
    DataIllegalEventType(String),
    /// An activity type literal which is not known.
    #[error("illegal activity type {0:?}")]
    DataIllegalActivityType(String),
    /// A line direction literal other than `>`/`<`.
    #[error("illegal line direction {0:?}")]
    DataIllegalLineDirection(String),
    /// The line cost file and the line pool disagree.
    #[error("line pool and line cost are inconsistent: {0}")]
    DataLinePoolCostInconsistency(String),
    /// Any other inconsistency between input objects.
    #[error("inconsistent data: {0}")]
    DataInconsistent(String),
    /// Dijkstra was given an edge with a negative length.
    #[error("edge {edge} has negative length {length}")]
    NegativeEdgeLength {
        /// The offending edge.
        edge: i32,
        /// Its length.
        length: f64,
    },
    /// A path was queried before running the computation.
    #[error("path queried before the shortest paths were computed")]
    QueryPathBeforeComputation,
    /// A distance was queried before running the computation.
    #[error("distance queried before the shortest paths were computed")]
    QueryDistanceBeforeComputation,
    /// A shortest path query for a node which is not in the graph.
    #[error("unknown node {0}")]
    UnknownNode(i32),
    /// The solver stopped without a primal solution.
    #[error("stopping criterion: {0}")]
    StoppingCriterion(String),
    /// The solver backend cannot report this attribute.
    #[error("attribute {0} is not implemented by the solver backend")]
    AttributeNotImplemented(String),
    /// The solver backend cannot honour this parameter.
    #[error("parameter {0} is not implemented by the solver backend")]
    ParamNotImplemented(String),
    /// A config file name is missing.
    #[error("no config file name given")]
    ConfigNoFileName,
    /// A config key is not defined.
    #[error("config key {0:?} not found")]
    ConfigKeyNotFound(String),
    /// A config value has the wrong type.
    #[error("config key {key:?} has value {value:?} which is not a {expected}")]
    ConfigTypeMismatch {
        /// The config key.
        key: String,
        /// Its raw value.
        value: String,
        /// Name of the expected type.
        expected: &'static str,
    },
    /// The requested combination of features is not supported.
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn downcast_from_anyhow() {
        let err: crate::Error = LinTimError::GraphNodeNotFound(4).into();
        let err = err.context("while reading stops");
        assert_eq!(
            Some(&LinTimError::GraphNodeNotFound(4)),
            err.downcast_ref::<LinTimError>()
        );
        assert_eq!("while reading stops", err.to_string());
    }

    #[test]
    fn messages_carry_position() {
        let err = LinTimError::InputFormat {
            file: PathBuf::from("basis/Stop.giv"),
            line: 3,
            expected: 5,
            found: 4,
        };
        assert_eq!(
            "\"basis/Stop.giv\", line 3: expected 5 columns but found 4",
            err.to_string()
        );
    }
}
