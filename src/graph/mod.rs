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

//! A generic directed or undirected graph with stable integer ids.
//!
//! Nodes and edges live in [`Arena`]s keyed by their own id; edges refer to
//! their endpoints by id only, so that nodes never own edges and the graph
//! can be renumbered at will with [`Graph::order_nodes`] and
//! [`Graph::order_edges`].

mod arena;
pub mod dijkstra;

pub use arena::{Arena, Identifiable};
pub use dijkstra::{Dijkstra, Path};

use crate::{error::LinTimError, Result};
use std::cmp::Ordering;
use std::collections::HashMap;

/// A node of a [`Graph`].
pub trait Node: Identifiable {}

/// An edge of a [`Graph`], referencing its endpoints by id.
pub trait Edge: Identifiable {
    /// Id of the tail node (or first endpoint of an undirected edge).
    fn left_node(&self) -> i32;
    /// Id of the head node (or second endpoint of an undirected edge).
    fn right_node(&self) -> i32;
    /// Rewire the edge. Only used by the graph while renumbering nodes.
    fn set_nodes(&mut self, left: i32, right: i32);
}

/// Graph storing nodes of type `N` and edges of type `E`.
#[derive(Debug, Clone)]
pub struct Graph<N, E> {
    directed: bool,
    nodes: Arena<N>,
    edges: Arena<E>,
    outgoing: HashMap<i32, Vec<i32>>,
    incoming: HashMap<i32, Vec<i32>>,
}

impl<N: Node, E: Edge> Graph<N, E> {
    /// Creates an empty graph.
    pub fn new(directed: bool) -> Self {
        Graph {
            directed,
            nodes: Arena::new(),
            edges: Arena::new(),
            outgoing: HashMap::new(),
            incoming: HashMap::new(),
        }
    }

    /// Whether the edges are directed.
    pub fn is_directed(&self) -> bool {
        self.directed
    }

    /// Number of nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Adds a node, failing if its id is already used.
    pub fn add_node(&mut self, node: N) -> Result<()> {
        let id = node.id();
        self.nodes
            .insert(node)
            .map_err(|_| LinTimError::GraphNodeIdMultiplyAssigned(id))?;
        self.outgoing.insert(id, Vec::new());
        self.incoming.insert(id, Vec::new());
        Ok(())
    }

    /// Adds an edge, failing if its id is already used or one of its
    /// endpoints is not in the graph.
    pub fn add_edge(&mut self, edge: E) -> Result<()> {
        let (id, left, right) = (edge.id(), edge.left_node(), edge.right_node());
        if self.edges.contains(id) {
            return Err(LinTimError::GraphEdgeIdMultiplyAssigned(id).into());
        }
        for node in [left, right] {
            if !self.nodes.contains(node) {
                return Err(LinTimError::GraphIncidentNodeNotFound { edge: id, node }.into());
            }
        }
        self.edges
            .insert(edge)
            .map_err(|_| LinTimError::GraphEdgeIdMultiplyAssigned(id))?;
        self.outgoing.entry(left).or_default().push(id);
        self.incoming.entry(right).or_default().push(id);
        Ok(())
    }

    /// Removes an edge and returns it.
    pub fn remove_edge(&mut self, id: i32) -> Result<E> {
        let edge = self
            .edges
            .remove(id)
            .ok_or(LinTimError::GraphEdgeNotFound(id))?;
        if let Some(out) = self.outgoing.get_mut(&edge.left_node()) {
            out.retain(|&e| e != id);
        }
        if let Some(inc) = self.incoming.get_mut(&edge.right_node()) {
            inc.retain(|&e| e != id);
        }
        Ok(edge)
    }

    /// Removes a node together with all its incident edges.
    pub fn remove_node(&mut self, id: i32) -> Result<N> {
        if !self.nodes.contains(id) {
            return Err(LinTimError::GraphNodeNotFound(id).into());
        }
        let mut incident = self.outgoing.remove(&id).unwrap_or_default();
        incident.extend(self.incoming.remove(&id).unwrap_or_default());
        incident.sort_unstable();
        incident.dedup();
        for edge in incident {
            if self.edges.contains(edge) {
                self.remove_edge(edge)?;
            }
        }
        self.nodes
            .remove(id)
            .ok_or_else(|| LinTimError::GraphNodeNotFound(id).into())
    }

    /// Access a node by id.
    pub fn node(&self, id: i32) -> Option<&N> {
        self.nodes.get(id)
    }

    /// Access a node by id, failing with `GraphNodeNotFound`.
    pub fn get_node(&self, id: i32) -> Result<&N> {
        self.nodes
            .get(id)
            .ok_or_else(|| LinTimError::GraphNodeNotFound(id).into())
    }

    /// Mutable access to a node. Its id must not be changed.
    pub fn node_mut(&mut self, id: i32) -> Option<&mut N> {
        self.nodes.get_mut(id)
    }

    /// Access an edge by id.
    pub fn edge(&self, id: i32) -> Option<&E> {
        self.edges.get(id)
    }

    /// Access an edge by id, failing with `GraphEdgeNotFound`.
    pub fn get_edge(&self, id: i32) -> Result<&E> {
        self.edges
            .get(id)
            .ok_or_else(|| LinTimError::GraphEdgeNotFound(id).into())
    }

    /// Mutable access to an edge. Its id and endpoints must not be changed.
    pub fn edge_mut(&mut self, id: i32) -> Option<&mut E> {
        self.edges.get_mut(id)
    }

    /// Iterates over the nodes.
    pub fn nodes(&self) -> impl Iterator<Item = &N> {
        self.nodes.values()
    }

    /// Iterates over the nodes, mutably.
    pub fn nodes_mut(&mut self) -> impl Iterator<Item = &mut N> {
        self.nodes.values_mut()
    }

    /// Iterates over the edges.
    pub fn edges(&self) -> impl Iterator<Item = &E> {
        self.edges.values()
    }

    /// Iterates over the edges, mutably.
    pub fn edges_mut(&mut self) -> impl Iterator<Item = &mut E> {
        self.edges.values_mut()
    }

    /// Largest node id, 0 for an empty graph.
    pub fn max_node_id(&self) -> i32 {
        self.nodes.max_id().unwrap_or(0)
    }

    /// Largest edge id, 0 for an empty graph.
    pub fn max_edge_id(&self) -> i32 {
        self.edges.max_id().unwrap_or(0)
    }

    fn incidence(&self, map: &HashMap<i32, Vec<i32>>, node: i32) -> Result<Vec<&E>> {
        let ids = map.get(&node).ok_or(LinTimError::GraphNodeNotFound(node))?;
        Ok(ids.iter().filter_map(|&id| self.edges.get(id)).collect())
    }

    /// Edges leaving `node`. For undirected graphs, every incident edge.
    pub fn outgoing_edges(&self, node: i32) -> Result<Vec<&E>> {
        if self.directed {
            self.incidence(&self.outgoing, node)
        } else {
            self.incident_edges(node)
        }
    }

    /// Edges entering `node`. For undirected graphs, every incident edge.
    pub fn incoming_edges(&self, node: i32) -> Result<Vec<&E>> {
        if self.directed {
            self.incidence(&self.incoming, node)
        } else {
            self.incident_edges(node)
        }
    }

    /// Every edge incident to `node`, a self-loop being listed once.
    pub fn incident_edges(&self, node: i32) -> Result<Vec<&E>> {
        let mut edges = self.incidence(&self.outgoing, node)?;
        edges.extend(
            self.incidence(&self.incoming, node)?
                .into_iter()
                .filter(|e| e.left_node() != node),
        );
        Ok(edges)
    }

    /// The first edge from `left` to `right`. Undirected edges match in
    /// both orientations.
    pub fn edge_between(&self, left: i32, right: i32) -> Option<&E> {
        let forward = self.outgoing.get(&left)?.iter().filter_map(|&id| {
            self.edges
                .get(id)
                .filter(|e| e.right_node() == right)
        });
        let mut found = forward.min_by_key(|e| e.id());
        if found.is_none() && !self.directed {
            found = self
                .outgoing
                .get(&right)?
                .iter()
                .filter_map(|&id| self.edges.get(id).filter(|e| e.right_node() == left))
                .min_by_key(|e| e.id());
        }
        found
    }

    /// The endpoint of `edge` which is not `node`.
    pub fn opposite(edge: &E, node: i32) -> i32 {
        if edge.left_node() == node {
            edge.right_node()
        } else {
            edge.left_node()
        }
    }

    /// Sorts the nodes with `compare` and renumbers them `1..=n`, rewiring
    /// every edge.
    pub fn order_nodes<F>(&mut self, compare: F)
    where
        F: FnMut(&N, &N) -> Ordering,
    {
        let mapping = self.nodes.renumber_by(compare);
        for edge in self.edges.values_mut() {
            let left = mapping[&edge.left_node()];
            let right = mapping[&edge.right_node()];
            edge.set_nodes(left, right);
        }
        self.rebuild_incidence();
    }

    /// Sorts the edges with `compare` and renumbers them `1..=m`.
    pub fn order_edges<F>(&mut self, compare: F)
    where
        F: FnMut(&E, &E) -> Ordering,
    {
        self.edges.renumber_by(compare);
        self.rebuild_incidence();
    }

    /// Whether the graph has no directed cycle. An undirected edge can be
    /// travelled back and forth, so undirected graphs only qualify when
    /// they have no edge.
    pub fn is_acyclic(&self) -> bool {
        if !self.directed {
            return self.edges.is_empty();
        }
        let mut in_degree: HashMap<i32, usize> = self
            .nodes
            .ids()
            .into_iter()
            .map(|id| (id, self.incoming.get(&id).map_or(0, Vec::len)))
            .collect();
        let mut ready: Vec<i32> = in_degree
            .iter()
            .filter(|(_, &d)| d == 0)
            .map(|(&id, _)| id)
            .collect();
        let mut visited = 0;
        while let Some(node) = ready.pop() {
            visited += 1;
            for edge in self.outgoing.get(&node).into_iter().flatten() {
                if let Some(edge) = self.edges.get(*edge) {
                    if let Some(degree) = in_degree.get_mut(&edge.right_node()) {
                        *degree -= 1;
                        if *degree == 0 {
                            ready.push(edge.right_node());
                        }
                    }
                }
            }
        }
        visited == self.nodes.len()
    }

    fn rebuild_incidence(&mut self) {
        self.outgoing = self.nodes.ids().into_iter().map(|id| (id, Vec::new())).collect();
        self.incoming = self.outgoing.clone();
        for edge in self.edges.values() {
            self.outgoing
                .entry(edge.left_node())
                .or_default()
                .push(edge.id());
            self.incoming
                .entry(edge.right_node())
                .or_default()
                .push(edge.id());
        }
    }
}

impl<N: Node, E: Edge> Default for Graph<N, E> {
    fn default() -> Self {
        Graph::new(true)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[derive(Debug, Clone, PartialEq)]
    pub(crate) struct TestNode {
        pub id: i32,
        pub name: String,
    }

    impl Identifiable for TestNode {
        fn id(&self) -> i32 {
            self.id
        }
        fn set_id(&mut self, id: i32) {
            self.id = id
        }
    }
    impl Node for TestNode {}

    #[derive(Debug, Clone, PartialEq)]
    pub(crate) struct TestEdge {
        pub id: i32,
        pub left: i32,
        pub right: i32,
        pub length: f64,
    }

    impl Identifiable for TestEdge {
        fn id(&self) -> i32 {
            self.id
        }
        fn set_id(&mut self, id: i32) {
            self.id = id
        }
    }
    impl Edge for TestEdge {
        fn left_node(&self) -> i32 {
            self.left
        }
        fn right_node(&self) -> i32 {
            self.right
        }
        fn set_nodes(&mut self, left: i32, right: i32) {
            self.left = left;
            self.right = right;
        }
    }

    pub(crate) fn graph(directed: bool, nodes: &[i32], edges: &[(i32, i32, i32, f64)]) -> Graph<TestNode, TestEdge> {
        let mut graph = Graph::new(directed);
        for &id in nodes {
            graph
                .add_node(TestNode {
                    id,
                    name: format!("n{id}"),
                })
                .unwrap();
        }
        for &(id, left, right, length) in edges {
            graph
                .add_edge(TestEdge {
                    id,
                    left,
                    right,
                    length,
                })
                .unwrap();
        }
        graph
    }

    fn error_of<T: std::fmt::Debug>(result: Result<T>) -> LinTimError {
        result
            .unwrap_err()
            .downcast_ref::<LinTimError>()
            .cloned()
            .unwrap()
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let mut g = graph(true, &[1, 2], &[(1, 1, 2, 1.0)]);
        let node = TestNode {
            id: 2,
            name: String::new(),
        };
        assert_eq!(
            LinTimError::GraphNodeIdMultiplyAssigned(2),
            error_of(g.add_node(node))
        );
        let edge = TestEdge {
            id: 1,
            left: 2,
            right: 1,
            length: 0.0,
        };
        assert_eq!(
            LinTimError::GraphEdgeIdMultiplyAssigned(1),
            error_of(g.add_edge(edge))
        );
    }

    #[test]
    fn missing_endpoint_is_rejected() {
        let mut g = graph(true, &[1], &[]);
        let edge = TestEdge {
            id: 1,
            left: 1,
            right: 9,
            length: 0.0,
        };
        assert_eq!(
            LinTimError::GraphIncidentNodeNotFound { edge: 1, node: 9 },
            error_of(g.add_edge(edge))
        );
        assert_eq!(LinTimError::GraphNodeNotFound(9), error_of(g.get_node(9)));
    }

    #[test]
    fn directed_incidence() {
        let g = graph(true, &[1, 2, 3], &[(1, 1, 2, 1.0), (2, 2, 3, 1.0), (3, 3, 2, 1.0)]);
        let out: Vec<i32> = g.outgoing_edges(2).unwrap().iter().map(|e| e.id).collect();
        let inc: Vec<i32> = g.incoming_edges(2).unwrap().iter().map(|e| e.id).collect();
        assert_eq!(vec![2], out);
        assert_eq!(vec![1, 3], inc);
        assert_eq!(Some(3), g.edge_between(3, 2).map(|e| e.id));
        assert_eq!(None, g.edge_between(3, 1).map(|e| e.id));
    }

    #[test]
    fn undirected_incidence_is_symmetric() {
        let g = graph(false, &[1, 2, 3], &[(1, 1, 2, 1.0), (2, 2, 3, 1.0)]);
        let out: Vec<i32> = g.outgoing_edges(2).unwrap().iter().map(|e| e.id).collect();
        let inc: Vec<i32> = g.incoming_edges(2).unwrap().iter().map(|e| e.id).collect();
        assert_eq!(vec![2, 1], out);
        assert_eq!(out, inc);
        assert_eq!(Some(1), g.edge_between(2, 1).map(|e| e.id));
    }

    #[test]
    fn cycle_detection() {
        let mut g = graph(true, &[1, 2, 3], &[(1, 1, 2, 1.0), (2, 2, 3, 1.0), (3, 1, 3, 1.0)]);
        assert!(g.is_acyclic());
        g.add_edge(TestEdge {
            id: 4,
            left: 3,
            right: 1,
            length: 1.0,
        })
        .unwrap();
        assert!(!g.is_acyclic());
        assert!(!graph(false, &[1, 2], &[(1, 1, 2, 1.0)]).is_acyclic());
    }

    #[test]
    fn remove_node_drops_incident_edges() {
        let mut g = graph(true, &[1, 2, 3], &[(1, 1, 2, 1.0), (2, 2, 3, 1.0), (3, 1, 3, 1.0)]);
        g.remove_node(2).unwrap();
        assert_eq!(2, g.node_count());
        assert_eq!(vec![3], g.edges().map(|e| e.id).collect::<Vec<_>>());
        assert!(g.outgoing_edges(1).unwrap().iter().all(|e| e.id == 3));
        assert_eq!(LinTimError::GraphEdgeNotFound(1), error_of(g.remove_edge(1)));
    }

    #[test]
    fn order_nodes_rewires_edges() {
        let mut g = graph(true, &[10, 5, 7], &[(4, 10, 5, 1.0), (9, 7, 10, 2.0)]);
        g.order_nodes(|a, b| a.name.cmp(&b.name));
        // names n10 < n5 < n7
        let names: Vec<(i32, String)> = g.nodes().map(|n| (n.id, n.name.clone())).collect();
        assert_eq!(
            vec![
                (1, "n10".to_string()),
                (2, "n5".to_string()),
                (3, "n7".to_string())
            ],
            names
        );
        assert_eq!((1, 2), {
            let e = g.get_edge(4).unwrap();
            (e.left, e.right)
        });
        g.order_edges(|a, b| b.length.total_cmp(&a.length));
        assert_eq!(vec![1, 2], g.edges().map(|e| e.id).collect::<Vec<_>>());
        assert_eq!(2.0, g.get_edge(1).unwrap().length);
        assert_eq!(vec![1], g.outgoing_edges(3).unwrap().iter().map(|e| e.id).collect::<Vec<_>>());
    }
}
