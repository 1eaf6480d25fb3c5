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

//! Small networks and file helpers shared by the test suites.

use crate::{
    lines::{LineCostModel, LinePool},
    od::OdMatrix,
    ptn::{Link, Ptn, Stop},
    Parameters,
};
use std::fs::{self, File};
use std::io::prelude::*;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Writes `content` to `path/file_name`, creating missing directories.
pub fn create_file_with_content(path: &Path, file_name: &str, content: &str) -> PathBuf {
    let file_path = path.join(file_name);
    if let Some(parent) = file_path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    let mut f = File::create(&file_path).unwrap();
    f.write_all(content.as_bytes()).unwrap();
    file_path
}

/// Content of a file, panicking with its name when missing.
pub fn get_file_content<P: AsRef<Path>>(path: P) -> String {
    let path = path.as_ref();
    fs::read_to_string(path).unwrap_or_else(|_| panic!("file {:?} not found", path))
}

/// Runs `func` inside a fresh temporary directory.
pub fn test_in_tmp_dir<F>(func: F)
where
    F: FnOnce(&Path),
{
    let tmp_dir = TempDir::new().expect("create temp dir");
    func(tmp_dir.path());
    tmp_dir.close().expect("delete temp dir");
}

/// Three stops on a straight line, `1 - 2 - 3`, joined by links 1 and 2
/// of length 1 km and bounds `[2, 3]`.
pub fn line_ptn(directed: bool) -> Ptn {
    let mut ptn = Ptn::new(directed);
    for (id, x) in [(1, 0.0), (2, 1.0), (3, 2.0)] {
        ptn.add_node(Stop::new(id, &id.to_string(), &format!("Stop {id}"), x, 0.0))
            .unwrap();
    }
    ptn.add_edge(Link::new(1, 1, 2, 1.0, 2, 3).unwrap()).unwrap();
    ptn.add_edge(Link::new(2, 2, 3, 1.0, 2, 3).unwrap()).unwrap();
    ptn
}

/// `T = 10`, waiting between 1 and 2 minutes, defaults otherwise.
pub fn scenario_a_parameters() -> Parameters {
    Parameters {
        period_length: 10,
        min_wait_time: 1,
        max_wait_time: 2,
        ptn_is_undirected: false,
        ..Default::default()
    }
}

/// Line 1 running along links 1 and 2 of [`line_ptn`] once per period.
pub fn single_line_pool(ptn: &Ptn) -> LinePool {
    let mut pool = LinePool::new(!ptn.is_directed());
    pool.add_line(ptn, 1, &[1, 2], 1, None, &LineCostModel::default())
        .unwrap();
    pool
}

/// Demand from a list of `(origin, destination, passengers)` in time slice 1.
pub fn od_matrix(demand: &[(i32, i32, f64)]) -> OdMatrix {
    let mut od = OdMatrix::new();
    for &(origin, destination, passengers) in demand {
        od.set(origin, destination, 1, passengers);
    }
    od
}

/// [`line_ptn`] where link 2 must be served exactly twice per period, with
/// line 1 along links 1 and 2 and line 2 along link 2 only.
pub fn shared_link_network() -> (Ptn, LinePool) {
    let mut ptn = line_ptn(true);
    let link = ptn.edge_mut(2).unwrap();
    link.lower_frequency = Some(2);
    link.upper_frequency = Some(2);
    let mut pool = LinePool::new(false);
    let costs = LineCostModel::default();
    pool.add_line(&ptn, 1, &[1, 2], 1, Some((2.0, 2.0)), &costs)
        .unwrap();
    pool.add_line(&ptn, 2, &[2], 1, Some((1.0, 1.0)), &costs)
        .unwrap();
    (ptn, pool)
}

/// Two stops `A = 1` and `B = 2`, link 1 from A to B and link 2 back, both
/// with a fixed traversal time of `drive` time units, and the two lines
/// `A -> B` (id 1) and `B -> A` (id 2).
pub fn shuttle_network(drive: i32) -> (Ptn, LinePool) {
    let mut ptn = Ptn::new(true);
    ptn.add_node(Stop::new(1, "A", "Stop A", 0.0, 0.0)).unwrap();
    ptn.add_node(Stop::new(2, "B", "Stop B", 1.0, 0.0)).unwrap();
    ptn.add_edge(Link::new(1, 1, 2, 1.0, drive, drive).unwrap())
        .unwrap();
    ptn.add_edge(Link::new(2, 2, 1, 1.0, drive, drive).unwrap())
        .unwrap();
    let mut pool = LinePool::new(false);
    let costs = LineCostModel::default();
    pool.add_line(&ptn, 1, &[1], 1, None, &costs).unwrap();
    pool.add_line(&ptn, 2, &[2], 1, None, &costs).unwrap();
    (ptn, pool)
}
