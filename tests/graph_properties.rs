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

use lintim_core::{
    cycle_base::{CycleBase, SpanningTreeStrategy},
    graph::{Dijkstra, Edge, Identifiable},
    ptn::{Link, Ptn, Stop},
};
use pretty_assertions::assert_eq;
use rand::{rngs::StdRng, seq::SliceRandom, Rng, SeedableRng};
use std::collections::BTreeSet;

const SEEDS: [u64; 8] = [1, 2, 3, 5, 8, 13, 21, 34];

/// Stops `1..=n` and random links. The length of a link is its original id,
/// which makes the length a total order key.
fn random_links(rng: &mut StdRng, n: i32, extra: usize) -> Vec<(i32, i32, i32)> {
    let mut links = Vec::new();
    // a spanning tree first, so that the network is connected
    for stop in 2..=n {
        let parent = rng.random_range(1..stop);
        links.push((parent, stop));
    }
    for _ in 0..extra {
        let left = rng.random_range(1..=n);
        let right = rng.random_range(1..=n);
        if left != right {
            links.push((left, right));
        }
    }
    links
        .into_iter()
        .enumerate()
        .map(|(i, (left, right))| (i as i32 + 1, left, right))
        .collect()
}

fn build(directed: bool, n: i32, links: &[(i32, i32, i32)], rng: &mut StdRng) -> Ptn {
    let mut stops: Vec<i32> = (1..=n).collect();
    stops.shuffle(rng);
    let mut ptn = Ptn::new(directed);
    for id in stops {
        ptn.add_node(Stop::new(id, &id.to_string(), &format!("Stop {id}"), f64::from(id), 0.0))
            .unwrap();
    }
    let mut links = links.to_vec();
    links.shuffle(rng);
    for (id, left, right) in links {
        let lower = rng.random_range(0..5);
        ptn.add_edge(Link::new(id, left, right, f64::from(id), lower, lower + 3).unwrap())
            .unwrap();
    }
    ptn
}

fn ordered(mut ptn: Ptn) -> Ptn {
    ptn.order_nodes(|a, b| a.short_name.cmp(&b.short_name));
    ptn.order_edges(|a, b| a.length.total_cmp(&b.length));
    ptn
}

#[test]
fn ordering_yields_identical_id_sequences() {
    for seed in SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let n = rng.random_range(2..20);
        let links = random_links(&mut rng, n, 15);
        let first = ordered(build(true, n, &links, &mut rng));
        let second = ordered(build(true, n, &links, &mut rng));

        let stops = |ptn: &Ptn| -> Vec<(i32, String)> {
            ptn.nodes().map(|s| (s.id, s.short_name.clone())).collect()
        };
        let link_ends = |ptn: &Ptn| -> Vec<(i32, i32, i32)> {
            ptn.edges().map(|l| (l.id, l.left_stop, l.right_stop)).collect()
        };
        assert_eq!(stops(&first), stops(&second), "seed {}", seed);
        assert_eq!(link_ends(&first), link_ends(&second), "seed {}", seed);
        let ids: Vec<i32> = first.nodes().map(|s| s.id).collect();
        assert_eq!((1..=n).collect::<Vec<_>>(), ids);
    }
}

#[test]
fn shortest_distances_are_tight() {
    for seed in SEEDS {
        let mut rng = StdRng::seed_from_u64(seed);
        let n = rng.random_range(2..25);
        let links = random_links(&mut rng, n, 30);
        let ptn = build(true, n, &links, &mut rng);
        let mut dijkstra = Dijkstra::new(&ptn, |l: &Link| f64::from(l.lower_bound));
        dijkstra.compute(1).unwrap();

        for link in ptn.edges() {
            let from = dijkstra.distance(link.left_node()).unwrap();
            let to = dijkstra.distance(link.right_node()).unwrap();
            if from.is_finite() {
                assert!(to <= from + f64::from(link.lower_bound) + 1e-9, "seed {}", seed);
            }
        }
        for stop in ptn.nodes() {
            let distance = dijkstra.distance(stop.id).unwrap();
            match dijkstra.path(stop.id).unwrap() {
                None => assert_eq!(f64::INFINITY, distance),
                Some(path) => {
                    assert_eq!(Some(&1), path.nodes.first());
                    assert_eq!(Some(&stop.id), path.nodes.last());
                    let length: f64 = path
                        .edges
                        .iter()
                        .map(|&l| f64::from(ptn.get_edge(l).unwrap().lower_bound))
                        .sum();
                    assert!((length - distance).abs() < 1e-9, "seed {}", seed);
                }
            }
        }
    }
}

#[test]
fn unreachable_stops_have_no_path() {
    let mut ptn = Ptn::new(true);
    for id in 1..=3 {
        ptn.add_node(Stop::new(id, &id.to_string(), "", 0.0, 0.0))
            .unwrap();
    }
    ptn.add_edge(Link::new(1, 2, 1, 1.0, 1, 1).unwrap()).unwrap();
    let mut dijkstra = Dijkstra::new(&ptn, |l: &Link| l.length);
    dijkstra.compute(1).unwrap();
    assert_eq!(None, dijkstra.path(2).unwrap());
    assert_eq!(f64::INFINITY, dijkstra.distance(3).unwrap());
    assert!(dijkstra.paths(3).unwrap().is_empty());
}

#[test]
fn cycle_base_covers_every_non_tree_link() {
    for seed in SEEDS {
        for strategy in [SpanningTreeStrategy::Bfs, SpanningTreeStrategy::MaximumSpan] {
            let mut rng = StdRng::seed_from_u64(seed);
            let n = rng.random_range(2..20);
            let links = random_links(&mut rng, n, 20);
            let ptn = build(true, n, &links, &mut rng);
            let base = CycleBase::compute(&ptn, strategy, |l: &Link| {
                i64::from(l.upper_bound - l.lower_bound)
            })
            .unwrap();

            let m = ptn.edge_count();
            assert_eq!(m - n as usize + 1, base.len(), "seed {}", seed);
            assert_eq!(1, base.roots().len());
            assert_eq!(n as usize - 1, base.tree_arcs().len());
            let non_tree: BTreeSet<i32> = base.cycles().keys().copied().collect();
            let all: BTreeSet<i32> = ptn.edges().map(|l| l.id()).collect();
            assert!(non_tree.is_disjoint(base.tree_arcs()));
            let covered: BTreeSet<i32> = non_tree.union(base.tree_arcs()).copied().collect();
            assert_eq!(all, covered);
            for cycle in base.cycles().values() {
                assert!(cycle.iter().all(|(arc, _)| base.tree_arcs().contains(arc)));
            }
        }
    }
}
