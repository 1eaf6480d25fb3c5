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

//! Single or multi source shortest paths with deterministic tie-breaking.

use super::{Edge, Graph, Node};
use crate::{error::LinTimError, Result};
use ordered_float::OrderedFloat;
use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap, HashSet};

const EPSILON: f64 = 1e-9;

/// A path as the sequence of its nodes and of the edges joining them.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Path {
    /// Visited node ids, from the source to the target.
    pub nodes: Vec<i32>,
    /// Traversed edge ids, `nodes.len() - 1` of them.
    pub edges: Vec<i32>,
}

/// Dijkstra over a [`Graph`] with a per-edge length function.
///
/// The priority queue is keyed by `(distance, node id)` so that equal
/// distances are always settled in the same order. Every predecessor edge
/// realising the shortest distance is kept, which allows the enumeration of
/// all shortest paths with [`Dijkstra::paths`].
pub struct Dijkstra<'g, N, E, F> {
    graph: &'g Graph<N, E>,
    length: F,
    backward: bool,
    computed: bool,
    distances: HashMap<i32, f64>,
    predecessors: HashMap<i32, Vec<i32>>,
}

impl<'g, N, E, F> Dijkstra<'g, N, E, F>
where
    N: Node,
    E: Edge,
    F: Fn(&E) -> f64,
{
    /// Prepares a shortest path computation on `graph`.
    pub fn new(graph: &'g Graph<N, E>, length: F) -> Self {
        Dijkstra {
            graph,
            length,
            backward: false,
            computed: false,
            distances: HashMap::new(),
            predecessors: HashMap::new(),
        }
    }

    /// Traverse directed edges against their direction, so that the computed
    /// distance of a node is its distance *to* the sources.
    pub fn backward(mut self) -> Self {
        self.backward = true;
        self
    }

    /// Computes the shortest paths from `source`.
    pub fn compute(&mut self, source: i32) -> Result<()> {
        self.compute_from(&[source])
    }

    /// Computes the shortest paths from the closest of `sources`.
    pub fn compute_from(&mut self, sources: &[i32]) -> Result<()> {
        self.distances.clear();
        self.predecessors.clear();
        let mut heap = BinaryHeap::new();
        for &source in sources {
            if self.graph.node(source).is_none() {
                return Err(LinTimError::UnknownNode(source).into());
            }
            self.distances.insert(source, 0.0);
            heap.push(Reverse((OrderedFloat(0.0), source)));
        }
        let mut settled = HashSet::new();
        while let Some(Reverse((OrderedFloat(distance), node))) = heap.pop() {
            if !settled.insert(node) {
                continue;
            }
            let edges = if self.backward {
                self.graph.incoming_edges(node)?
            } else {
                self.graph.outgoing_edges(node)?
            };
            for edge in edges {
                let length = (self.length)(edge);
                if length < 0.0 {
                    return Err(LinTimError::NegativeEdgeLength {
                        edge: edge.id(),
                        length,
                    }
                    .into());
                }
                let next = Graph::<N, E>::opposite(edge, node);
                if settled.contains(&next) {
                    continue;
                }
                let candidate = distance + length;
                match self.distances.get(&next) {
                    Some(&known) if candidate > known + EPSILON => {}
                    Some(&known) if candidate >= known - EPSILON => {
                        self.predecessors.entry(next).or_default().push(edge.id());
                    }
                    _ => {
                        self.distances.insert(next, candidate);
                        self.predecessors.insert(next, vec![edge.id()]);
                        heap.push(Reverse((OrderedFloat(candidate), next)));
                    }
                }
            }
        }
        for predecessors in self.predecessors.values_mut() {
            predecessors.sort_unstable();
            predecessors.dedup();
        }
        self.computed = true;
        Ok(())
    }

    fn check_target(&self, target: i32) -> Result<()> {
        if self.graph.node(target).is_none() {
            return Err(LinTimError::UnknownNode(target).into());
        }
        Ok(())
    }

    /// Shortest distance to `target`, `+∞` if it cannot be reached.
    pub fn distance(&self, target: i32) -> Result<f64> {
        if !self.computed {
            return Err(LinTimError::QueryDistanceBeforeComputation.into());
        }
        self.check_target(target)?;
        Ok(self
            .distances
            .get(&target)
            .copied()
            .unwrap_or(f64::INFINITY))
    }

    fn predecessor_node(&self, edge: i32, node: i32) -> Result<i32> {
        let edge = self.graph.get_edge(edge)?;
        Ok(Graph::<N, E>::opposite(edge, node))
    }

    /// One shortest path to `target`, following the predecessor with the
    /// smallest edge id. `None` if `target` cannot be reached.
    pub fn path(&self, target: i32) -> Result<Option<Path>> {
        if !self.computed {
            return Err(LinTimError::QueryPathBeforeComputation.into());
        }
        self.check_target(target)?;
        if !self.distances.contains_key(&target) {
            return Ok(None);
        }
        let mut path = Path {
            nodes: vec![target],
            edges: Vec::new(),
        };
        let mut node = target;
        while let Some(&edge) = self.predecessors.get(&node).and_then(|p| p.first()) {
            node = self.predecessor_node(edge, node)?;
            path.edges.push(edge);
            path.nodes.push(node);
        }
        path.nodes.reverse();
        path.edges.reverse();
        Ok(Some(path))
    }

    /// Every shortest path to `target`, in the order of the predecessor
    /// edge ids. Empty if `target` cannot be reached.
    pub fn paths(&self, target: i32) -> Result<Vec<Path>> {
        if !self.computed {
            return Err(LinTimError::QueryPathBeforeComputation.into());
        }
        self.check_target(target)?;
        if !self.distances.contains_key(&target) {
            return Ok(Vec::new());
        }
        let mut paths = Vec::new();
        let mut partial = Path {
            nodes: vec![target],
            edges: Vec::new(),
        };
        self.collect_paths(target, &mut partial, &mut paths)?;
        Ok(paths)
    }

    fn collect_paths(&self, node: i32, partial: &mut Path, paths: &mut Vec<Path>) -> Result<()> {
        let predecessors = match self.predecessors.get(&node) {
            Some(p) if !p.is_empty() => p,
            _ => {
                let mut path = partial.clone();
                path.nodes.reverse();
                path.edges.reverse();
                paths.push(path);
                return Ok(());
            }
        };
        for &edge in predecessors {
            let previous = self.predecessor_node(edge, node)?;
            partial.edges.push(edge);
            partial.nodes.push(previous);
            self.collect_paths(previous, partial, paths)?;
            partial.edges.pop();
            partial.nodes.pop();
        }
        Ok(())
    }
}
