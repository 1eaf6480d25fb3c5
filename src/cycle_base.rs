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

//! Spanning trees and fundamental cycles of an EAN.
//!
//! Every non-tree arc `a*` closes exactly one cycle with the tree. Along
//! such a cycle the signed tensions of any feasible periodic timetable sum
//! up to a multiple of the period, which is what the cycle-base
//! formulation of the timetabling models relies on.

use crate::{
    error::LinTimError,
    graph::{Edge, Graph, Node},
    Result,
};
use anyhow::bail;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use std::str::FromStr;
use tracing::debug;

/// How the spanning tree is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SpanningTreeStrategy {
    /// Breadth first search from the smallest node id.
    #[default]
    Bfs,
    /// Maximum weight spanning tree, the weight of an arc being its span
    /// `upper - lower`.
    MaximumSpan,
}

impl FromStr for SpanningTreeStrategy {
    type Err = LinTimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "bfs" => Ok(SpanningTreeStrategy::Bfs),
            "maximum_span" | "max_span" => Ok(SpanningTreeStrategy::MaximumSpan),
            _ => Err(LinTimError::UnsupportedFeature(format!(
                "spanning tree strategy {s:?}"
            ))),
        }
    }
}

/// Orientation of a tree arc when walking around a fundamental cycle in the
/// direction of its non-tree arc.
pub type Orientation = i8;

/// A spanning forest and the fundamental cycles of the non-tree arcs.
#[derive(Debug, Clone, PartialEq)]
pub struct CycleBase {
    parents: HashMap<i32, (i32, i32)>,
    order: Vec<i32>,
    roots: Vec<i32>,
    tree_arcs: BTreeSet<i32>,
    cycles: BTreeMap<i32, Vec<(i32, Orientation)>>,
}

struct UnionFind {
    parent: HashMap<i32, i32>,
}

impl UnionFind {
    fn find(&mut self, x: i32) -> i32 {
        let p = *self.parent.get(&x).unwrap_or(&x);
        if p == x {
            return x;
        }
        let root = self.find(p);
        self.parent.insert(x, root);
        root
    }

    fn union(&mut self, a: i32, b: i32) -> bool {
        let (ra, rb) = (self.find(a), self.find(b));
        if ra == rb {
            return false;
        }
        self.parent.insert(ra.max(rb), ra.min(rb));
        true
    }
}

impl CycleBase {
    /// Computes a spanning forest of `graph`, ignoring arc directions, and
    /// the fundamental cycle of every other arc. `span` is only used by
    /// [`SpanningTreeStrategy::MaximumSpan`].
    pub fn compute<N, E, F>(graph: &Graph<N, E>, strategy: SpanningTreeStrategy, span: F) -> Result<Self>
    where
        N: Node,
        E: Edge,
        F: Fn(&E) -> i64,
    {
        let mut node_ids: Vec<i32> = graph.nodes().map(|n| n.id()).collect();
        node_ids.sort_unstable();
        let mut adjacency: HashMap<i32, Vec<(i32, i32)>> = HashMap::new();
        let tree_arcs: BTreeSet<i32> = match strategy {
            SpanningTreeStrategy::Bfs => {
                for edge in graph.edges() {
                    adjacency
                        .entry(edge.left_node())
                        .or_default()
                        .push((edge.id(), edge.right_node()));
                    adjacency
                        .entry(edge.right_node())
                        .or_default()
                        .push((edge.id(), edge.left_node()));
                }
                for neighbours in adjacency.values_mut() {
                    neighbours.sort_unstable();
                }
                BTreeSet::new()
            }
            SpanningTreeStrategy::MaximumSpan => {
                let mut edges: Vec<&E> = graph.edges().collect();
                edges.sort_by(|a, b| span(b).cmp(&span(a)).then(a.id().cmp(&b.id())));
                let mut union_find = UnionFind {
                    parent: HashMap::new(),
                };
                let mut chosen = BTreeSet::new();
                for edge in edges {
                    if union_find.union(edge.left_node(), edge.right_node()) {
                        chosen.insert(edge.id());
                        adjacency
                            .entry(edge.left_node())
                            .or_default()
                            .push((edge.id(), edge.right_node()));
                        adjacency
                            .entry(edge.right_node())
                            .or_default()
                            .push((edge.id(), edge.left_node()));
                    }
                }
                for neighbours in adjacency.values_mut() {
                    neighbours.sort_unstable();
                }
                chosen
            }
        };

        let mut parents: HashMap<i32, (i32, i32)> = HashMap::new();
        let mut depth: HashMap<i32, usize> = HashMap::new();
        let mut order = Vec::with_capacity(node_ids.len());
        let mut roots = Vec::new();
        let mut used_arcs = BTreeSet::new();
        for &root in &node_ids {
            if depth.contains_key(&root) {
                continue;
            }
            roots.push(root);
            depth.insert(root, 0);
            let mut queue = VecDeque::from([root]);
            while let Some(node) = queue.pop_front() {
                order.push(node);
                let node_depth = depth[&node];
                for &(arc, next) in adjacency.get(&node).map(Vec::as_slice).unwrap_or(&[]) {
                    if depth.contains_key(&next) {
                        continue;
                    }
                    depth.insert(next, node_depth + 1);
                    parents.insert(next, (node, arc));
                    used_arcs.insert(arc);
                    queue.push_back(next);
                }
            }
        }
        if strategy == SpanningTreeStrategy::MaximumSpan && used_arcs != tree_arcs {
            bail!(LinTimError::DataInconsistent(
                "maximum span forest is not a forest".to_string()
            ));
        }

        let mut base = CycleBase {
            parents,
            order,
            roots,
            tree_arcs: used_arcs,
            cycles: BTreeMap::new(),
        };
        for edge in graph.edges() {
            if base.tree_arcs.contains(&edge.id()) {
                continue;
            }
            let cycle = base.fundamental_cycle(graph, &depth, edge)?;
            base.cycles.insert(edge.id(), cycle);
        }
        debug!(
            "Cycle base with {} tree arcs and {} cycles",
            base.tree_arcs.len(),
            base.cycles.len()
        );
        Ok(base)
    }

    fn fundamental_cycle<N: Node, E: Edge>(
        &self,
        graph: &Graph<N, E>,
        depth: &HashMap<i32, usize>,
        non_tree: &E,
    ) -> Result<Vec<(i32, Orientation)>> {
        // walk from the head of the non-tree arc back to its tail
        let (mut up, mut down) = (non_tree.right_node(), non_tree.left_node());
        let mut ascending = Vec::new();
        let mut descending = Vec::new();
        while up != down {
            if depth[&up] >= depth[&down] {
                let (parent, arc) = self.parents[&up];
                let tree_arc = graph.get_edge(arc)?;
                let orientation = if tree_arc.left_node() == up { 1 } else { -1 };
                ascending.push((arc, orientation));
                up = parent;
            } else {
                let (parent, arc) = self.parents[&down];
                let tree_arc = graph.get_edge(arc)?;
                let orientation = if tree_arc.left_node() == parent { 1 } else { -1 };
                descending.push((arc, orientation));
                down = parent;
            }
        }
        descending.reverse();
        ascending.extend(descending);
        Ok(ascending)
    }

    /// Number of fundamental cycles, `m - n + c` for `c` components.
    pub fn len(&self) -> usize {
        self.cycles.len()
    }

    /// Whether there is no cycle.
    pub fn is_empty(&self) -> bool {
        self.cycles.is_empty()
    }

    /// Arcs of the spanning forest.
    pub fn tree_arcs(&self) -> &BTreeSet<i32> {
        &self.tree_arcs
    }

    /// One root per connected component.
    pub fn roots(&self) -> &[i32] {
        &self.roots
    }

    /// Non-tree arc to its fundamental cycle, as tree arcs with their
    /// orientation. The non-tree arc itself is not listed and has
    /// orientation `+1`.
    pub fn cycles(&self) -> &BTreeMap<i32, Vec<(i32, Orientation)>> {
        &self.cycles
    }

    /// Node potentials (periodic times) from arc tensions: roots get 0 and
    /// every other node the potential of its parent plus or minus the
    /// tension of the tree arc joining them, modulo `period`.
    pub fn potentials<N, E>(
        &self,
        graph: &Graph<N, E>,
        tensions: &HashMap<i32, i64>,
        period: i64,
    ) -> Result<BTreeMap<i32, i64>>
    where
        N: Node,
        E: Edge,
    {
        let mut potentials: BTreeMap<i32, i64> = BTreeMap::new();
        for &node in &self.order {
            let potential: i64 = match self.parents.get(&node) {
                None => 0,
                Some(&(parent, arc)) => {
                    let tension = *tensions.get(&arc).ok_or(LinTimError::DataIndexNotFound {
                        kind: "tension of activity",
                        index: arc,
                    })?;
                    let parent_potential = potentials[&parent];
                    if graph.get_edge(arc)?.left_node() == parent {
                        parent_potential + tension
                    } else {
                        parent_potential - tension
                    }
                }
            };
            potentials.insert(node, potential.rem_euclid(period));
        }
        Ok(potentials)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::tests::{graph, TestEdge};
    use pretty_assertions::assert_eq;

    fn no_span(_: &TestEdge) -> i64 {
        0
    }

    #[test]
    fn four_cycle_has_one_fundamental_cycle() {
        let g = graph(
            true,
            &[1, 2, 3, 4],
            &[(1, 1, 2, 0.0), (2, 2, 3, 0.0), (3, 3, 4, 0.0), (4, 4, 1, 0.0)],
        );
        let base = CycleBase::compute(&g, SpanningTreeStrategy::Bfs, no_span).unwrap();
        assert_eq!(1, base.len());
        // BFS from 1 reaches 2 by arc 1 and 4 by arc 4, then 3 by arc 2
        assert_eq!(&BTreeSet::from([1, 2, 4]), base.tree_arcs());
        // 3 -> 4 then 4 -> 1 -> 2 -> 3 along the tree
        assert_eq!(Some(&vec![(4, 1), (1, 1), (2, 1)]), base.cycles().get(&3));
    }

    #[test]
    fn orientation_against_the_walk() {
        // 1 -> 2, 1 -> 3, and non-tree 2 -> 3
        let g = graph(true, &[1, 2, 3], &[(1, 1, 2, 0.0), (2, 1, 3, 0.0), (3, 2, 3, 0.0)]);
        let base = CycleBase::compute(&g, SpanningTreeStrategy::Bfs, no_span).unwrap();
        // from 3 back to 2: 3 -> 1 against arc 2, 1 -> 2 along arc 1
        assert_eq!(Some(&vec![(2, -1), (1, 1)]), base.cycles().get(&3));
    }

    #[test]
    fn maximum_span_prefers_wide_arcs() {
        let g = graph(true, &[1, 2, 3], &[(1, 1, 2, 1.0), (2, 2, 3, 5.0), (3, 3, 1, 3.0)]);
        let base = CycleBase::compute(&g, SpanningTreeStrategy::MaximumSpan, |e: &TestEdge| {
            e.length as i64
        })
        .unwrap();
        assert_eq!(&BTreeSet::from([2, 3]), base.tree_arcs());
        assert_eq!(vec![1], base.cycles().keys().copied().collect::<Vec<_>>());
    }

    #[test]
    fn forest_and_potentials() {
        let g = graph(true, &[1, 2, 3, 4], &[(1, 1, 2, 0.0), (2, 3, 4, 0.0)]);
        let base = CycleBase::compute(&g, SpanningTreeStrategy::Bfs, no_span).unwrap();
        assert!(base.is_empty());
        assert_eq!(&[1, 3], base.roots());
        let tensions = HashMap::from([(1, 7), (2, 12)]);
        let potentials = base.potentials(&g, &tensions, 10).unwrap();
        assert_eq!(BTreeMap::from([(1, 0), (2, 7), (3, 0), (4, 2)]), potentials);
    }
}
