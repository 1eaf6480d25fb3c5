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

//! Lines, their repetitions and the line pool.

use crate::{error::LinTimError, ptn::Ptn, Result};
use anyhow::{bail, Context};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Direction in which a line runs along its route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LineDirection {
    /// Along the order of the pool file, written `>`.
    Forward,
    /// Against the order of the pool file, written `<`.
    Backward,
}

impl LineDirection {
    /// The other direction.
    pub fn reverse(self) -> Self {
        match self {
            LineDirection::Forward => LineDirection::Backward,
            LineDirection::Backward => LineDirection::Forward,
        }
    }
}

impl fmt::Display for LineDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineDirection::Forward => write!(f, ">"),
            LineDirection::Backward => write!(f, "<"),
        }
    }
}

impl FromStr for LineDirection {
    type Err = LinTimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            ">" => Ok(LineDirection::Forward),
            "<" => Ok(LineDirection::Backward),
            other => Err(LinTimError::DataIllegalLineDirection(other.to_string())),
        }
    }
}

/// Identifies one repetition of one direction of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LineKey {
    /// Undirected line id, as in the pool file.
    pub id: i32,
    /// Running direction.
    pub direction: LineDirection,
    /// Repetition index, from 1 to the frequency of the line.
    pub repetition: u32,
}

impl LineKey {
    /// Creates a key.
    pub fn new(id: i32, direction: LineDirection, repetition: u32) -> Self {
        LineKey {
            id,
            direction,
            repetition,
        }
    }

    /// Signed id: `id` forward, `-id` backward.
    pub fn directed_id(&self) -> i32 {
        match self.direction {
            LineDirection::Forward => self.id,
            LineDirection::Backward => -self.id,
        }
    }

    /// The key of the same repetition running the other way.
    pub fn reversed(&self) -> Self {
        LineKey::new(self.id, self.direction.reverse(), self.repetition)
    }
}

impl fmt::Display for LineKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}#{}", self.id, self.direction, self.repetition)
    }
}

/// One repetition of one direction of a line: a simple path in the PTN.
#[derive(Debug, Clone, PartialEq)]
pub struct Line {
    key: LineKey,
    frequency: u32,
    links: Vec<i32>,
    stops: Vec<i32>,
    length: f64,
    cost: f64,
}

impl Line {
    /// The identifying key.
    pub fn key(&self) -> LineKey {
        self.key
    }

    /// Undirected id.
    pub fn id(&self) -> i32 {
        self.key.id
    }

    /// Running direction.
    pub fn direction(&self) -> LineDirection {
        self.key.direction
    }

    /// Repetition index.
    pub fn repetition(&self) -> u32 {
        self.key.repetition
    }

    /// Number of repetitions of this line per period.
    pub fn frequency(&self) -> u32 {
        self.frequency
    }

    /// Links in running order.
    pub fn links(&self) -> &[i32] {
        &self.links
    }

    /// Stops in running order, one more than links.
    pub fn stops(&self) -> &[i32] {
        &self.stops
    }

    /// Length in kilometres.
    pub fn length(&self) -> f64 {
        self.length
    }

    /// Operating cost of one run per period.
    pub fn cost(&self) -> f64 {
        self.cost
    }

    /// First stop served.
    pub fn first_stop(&self) -> i32 {
        self.stops[0]
    }

    /// Last stop served.
    pub fn last_stop(&self) -> i32 {
        self.stops[self.stops.len() - 1]
    }

    /// Whether the line drives `first` then immediately `second`.
    pub fn has_consecutive_stops(&self, first: i32, second: i32) -> bool {
        self.stops.windows(2).any(|w| w[0] == first && w[1] == second)
    }
}

/// Cost model of lines without an explicit cost file.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LineCostModel {
    /// Fixed cost per line.
    pub fixed: f64,
    /// Cost per kilometre.
    pub per_length: f64,
    /// Cost per link.
    pub per_link: f64,
}

/// Candidate lines, keyed by `(id, direction, repetition)`.
///
/// For every undirected id the set of repetitions is exactly
/// `1..=frequency`, in both directions for undirected networks.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct LinePool {
    undirected: bool,
    lines: BTreeMap<LineKey, Line>,
}

fn stop_sequence(ptn: &Ptn, id: i32, links: &[i32]) -> Result<Vec<i32>> {
    if links.is_empty() {
        bail!(LinTimError::DataInconsistent(format!("line {id} has no link")));
    }
    let first = ptn.get_edge(links[0]).with_context(|| format!("line {id}"))?;
    let start = if !ptn.is_directed() && links.len() > 1 {
        let second = ptn.get_edge(links[1]).with_context(|| format!("line {id}"))?;
        if second.left_stop == first.left_stop || second.right_stop == first.left_stop {
            first.right_stop
        } else {
            first.left_stop
        }
    } else {
        first.left_stop
    };
    let mut stops = vec![start];
    let mut current = start;
    for &link_id in links {
        let link = ptn.get_edge(link_id).with_context(|| format!("line {id}"))?;
        let next = if link.left_stop == current {
            link.right_stop
        } else if !ptn.is_directed() && link.right_stop == current {
            link.left_stop
        } else {
            bail!(LinTimError::DataInconsistent(format!(
                "line {id}: link {link_id} does not continue at stop {current}"
            )));
        };
        stops.push(next);
        current = next;
    }
    let distinct: BTreeSet<i32> = stops.iter().copied().collect();
    if distinct.len() != stops.len() {
        bail!(LinTimError::DataInconsistent(format!(
            "line {id} is not a simple path"
        )));
    }
    Ok(stops)
}

impl LinePool {
    /// Creates an empty pool. Lines of an undirected pool exist in both
    /// directions.
    pub fn new(undirected: bool) -> Self {
        LinePool {
            undirected,
            lines: BTreeMap::new(),
        }
    }

    /// Whether lines run in both directions.
    pub fn is_undirected(&self) -> bool {
        self.undirected
    }

    /// Adds the line `id` running along `links`, with `frequency`
    /// repetitions (in both directions for undirected pools). When no
    /// `length_and_cost` is given they are derived from the links and
    /// `cost_model`.
    pub fn add_line(
        &mut self,
        ptn: &Ptn,
        id: i32,
        links: &[i32],
        frequency: u32,
        length_and_cost: Option<(f64, f64)>,
        cost_model: &LineCostModel,
    ) -> Result<()> {
        if self.lines.keys().any(|k| k.id == id) {
            bail!(LinTimError::DataInconsistent(format!(
                "line {id} is defined twice"
            )));
        }
        let stops = stop_sequence(ptn, id, links)?;
        let (length, cost) = match length_and_cost {
            Some(lc) => lc,
            None => {
                let length: f64 = links
                    .iter()
                    .map(|&l| ptn.get_edge(l).map(|link| link.length))
                    .sum::<Result<f64>>()?;
                let cost = cost_model.fixed
                    + cost_model.per_length * length
                    + cost_model.per_link * links.len() as f64;
                (length, cost)
            }
        };
        let mut directions = vec![(LineDirection::Forward, links.to_vec(), stops.clone())];
        if self.undirected {
            let mut backward_links = links.to_vec();
            backward_links.reverse();
            let mut backward_stops = stops;
            backward_stops.reverse();
            directions.push((LineDirection::Backward, backward_links, backward_stops));
        }
        for (direction, links, stops) in directions {
            for repetition in 1..=frequency.max(1) {
                let key = LineKey::new(id, direction, repetition);
                self.lines.insert(
                    key,
                    Line {
                        key,
                        frequency: frequency.max(1),
                        links: links.clone(),
                        stops: stops.clone(),
                        length,
                        cost,
                    },
                );
            }
        }
        debug!("Line {} added with frequency {}", id, frequency);
        Ok(())
    }

    /// Number of lines, counting repetitions and directions.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    /// Whether the pool is empty.
    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Access a line.
    pub fn get(&self, key: &LineKey) -> Option<&Line> {
        self.lines.get(key)
    }

    /// Access a line, failing with `DataIndexNotFound`.
    pub fn get_line(&self, key: &LineKey) -> Result<&Line> {
        self.lines.get(key).ok_or_else(|| {
            LinTimError::DataIndexNotFound {
                kind: "line",
                index: key.directed_id(),
            }
            .into()
        })
    }

    /// Iterates over every line in key order.
    pub fn lines(&self) -> impl Iterator<Item = &Line> {
        self.lines.values()
    }

    /// The distinct routes: first repetition of the forward direction of
    /// every undirected id.
    pub fn routes(&self) -> impl Iterator<Item = &Line> {
        self.lines
            .values()
            .filter(|l| l.repetition() == 1 && l.direction() == LineDirection::Forward)
    }

    /// The undirected line ids.
    pub fn ids(&self) -> BTreeSet<i32> {
        self.lines.keys().map(|k| k.id).collect()
    }

    /// The largest undirected id, 0 for an empty pool.
    pub fn max_id(&self) -> i32 {
        self.lines.keys().map(|k| k.id).max().unwrap_or(0)
    }

    /// Frequency of every undirected line.
    pub fn frequencies(&self) -> BTreeMap<i32, u32> {
        self.routes().map(|l| (l.id(), l.frequency())).collect()
    }

    /// Lines of the forward direction which run over `link`.
    pub fn forward_lines_on_link(&self, link: i32) -> impl Iterator<Item = &Line> {
        self.lines
            .values()
            .filter(move |l| l.direction() == LineDirection::Forward && l.links.contains(&link))
    }

    /// Lines running over `link`, any direction.
    pub fn lines_on_link(&self, link: i32) -> impl Iterator<Item = &Line> {
        self.lines.values().filter(move |l| l.links.contains(&link))
    }

    /// A pool holding the lines of `concept` (undirected id to frequency)
    /// expanded to their repetitions. Lines with frequency 0 are dropped.
    pub fn with_frequencies(&self, concept: &BTreeMap<i32, u32>) -> Result<LinePool> {
        let mut pool = LinePool::new(self.undirected);
        for (&id, &frequency) in concept {
            if frequency == 0 {
                continue;
            }
            let template = self
                .routes()
                .find(|l| l.id() == id)
                .ok_or(LinTimError::DataIndexNotFound { kind: "line", index: id })?;
            let mut directions = vec![LineDirection::Forward];
            if self.undirected {
                directions.push(LineDirection::Backward);
            }
            for direction in directions {
                let base = self.get_line(&LineKey::new(id, direction, 1))?;
                for repetition in 1..=frequency {
                    let key = LineKey::new(id, direction, repetition);
                    pool.lines.insert(
                        key,
                        Line {
                            key,
                            frequency,
                            links: base.links.clone(),
                            stops: base.stops.clone(),
                            length: template.length,
                            cost: template.cost,
                        },
                    );
                }
            }
        }
        Ok(pool)
    }

    /// Appends the lines of `other` after the current largest id, keeping
    /// the forward/backward pairing. Returns the mapping from the ids of
    /// `other` to their new ids.
    pub fn merge_appending(&mut self, other: LinePool) -> Result<BTreeMap<i32, i32>> {
        if other.undirected != self.undirected {
            bail!(LinTimError::DataInconsistent(
                "cannot merge a directed and an undirected line pool".to_string()
            ));
        }
        let offset = self.max_id();
        let mapping: BTreeMap<i32, i32> = other
            .ids()
            .into_iter()
            .enumerate()
            .map(|(position, id)| (id, offset + position as i32 + 1))
            .collect();
        for (key, mut line) in other.lines {
            let new_key = LineKey::new(mapping[&key.id], key.direction, key.repetition);
            line.key = new_key;
            self.lines.insert(new_key, line);
        }
        Ok(mapping)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::line_ptn;
    use pretty_assertions::assert_eq;

    #[test]
    fn undirected_line_has_both_directions_and_repetitions() {
        let ptn = line_ptn(false);
        let mut pool = LinePool::new(true);
        pool.add_line(&ptn, 1, &[1, 2], 2, None, &LineCostModel::default())
            .unwrap();
        assert_eq!(4, pool.len());
        let backward = pool
            .get(&LineKey::new(1, LineDirection::Backward, 2))
            .unwrap();
        assert_eq!(&[3, 2, 1], backward.stops());
        assert_eq!(&[2, 1], backward.links());
        assert_eq!(2.0, backward.length());
        assert_eq!(BTreeMap::from([(1, 2)]), pool.frequencies());
        assert_eq!(-1, backward.key().directed_id());
    }

    #[test]
    fn line_starting_against_link_orientation() {
        let ptn = line_ptn(false);
        let mut pool = LinePool::new(true);
        pool.add_line(&ptn, 5, &[2, 1], 1, Some((4.0, 9.0)), &LineCostModel::default())
            .unwrap();
        let line = pool.get(&LineKey::new(5, LineDirection::Forward, 1)).unwrap();
        assert_eq!(&[3, 2, 1], line.stops());
        assert_eq!(9.0, line.cost());
        assert!(line.has_consecutive_stops(2, 1));
        assert!(!line.has_consecutive_stops(1, 2));
    }

    #[test]
    fn broken_path_is_rejected() {
        let ptn = line_ptn(true);
        let mut pool = LinePool::new(false);
        assert!(pool
            .add_line(&ptn, 1, &[2, 1], 1, None, &LineCostModel::default())
            .is_err());
    }

    #[test]
    fn cost_model() {
        let ptn = line_ptn(false);
        let mut pool = LinePool::new(false);
        let model = LineCostModel {
            fixed: 10.0,
            per_length: 2.0,
            per_link: 1.0,
        };
        pool.add_line(&ptn, 1, &[1, 2], 1, None, &model).unwrap();
        assert_eq!(16.0, pool.routes().next().unwrap().cost());
    }

    #[test]
    fn concept_and_merge() {
        let ptn = line_ptn(false);
        let mut pool = LinePool::new(true);
        pool.add_line(&ptn, 1, &[1, 2], 3, None, &LineCostModel::default())
            .unwrap();
        pool.add_line(&ptn, 2, &[1], 1, None, &LineCostModel::default())
            .unwrap();
        let concept = pool
            .with_frequencies(&BTreeMap::from([(1, 2), (2, 0)]))
            .unwrap();
        assert_eq!(BTreeMap::from([(1, 2)]), concept.frequencies());
        assert_eq!(4, concept.len());

        let mut other = LinePool::new(true);
        other
            .add_line(&ptn, 1, &[2], 1, None, &LineCostModel::default())
            .unwrap();
        let mapping = pool.merge_appending(other).unwrap();
        assert_eq!(BTreeMap::from([(1, 3)]), mapping);
        assert!(pool.get(&LineKey::new(3, LineDirection::Backward, 1)).is_some());
    }
}
