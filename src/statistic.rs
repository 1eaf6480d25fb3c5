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

//! Solver statistics and objective breakdowns written after a solve.

use crate::{
    lintim_csv::{read_rows, write_rows},
    Result,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use tracing::warn;

/// Summands of the objective of the planning models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ObjectiveComponent {
    /// Length of the operated lines.
    LineLength,
    /// Cost of the operated lines.
    LineCost,
    /// Perceived drive time of the passengers.
    Drive,
    /// Perceived wait time of the passengers.
    Wait,
    /// Perceived transfer time of the passengers.
    Transfer,
    /// Penalty per transfer.
    TransferPenalty,
    /// Penalty for travelling outside the wished time slice.
    TimeSlice,
    /// Time between consecutive trips of a vehicle.
    TurnaroundTime,
    /// Distance of the empty trips, depot moves included.
    TurnaroundDistance,
    /// Number of vehicles.
    Vehicles,
    /// Drive time of the lines, not weighted by passengers.
    DriveTimeUnweighted,
}

impl ObjectiveComponent {
    /// Every component, in output order.
    pub const ALL: [ObjectiveComponent; 11] = [
        ObjectiveComponent::LineLength,
        ObjectiveComponent::LineCost,
        ObjectiveComponent::Drive,
        ObjectiveComponent::Wait,
        ObjectiveComponent::Transfer,
        ObjectiveComponent::TransferPenalty,
        ObjectiveComponent::TimeSlice,
        ObjectiveComponent::TurnaroundTime,
        ObjectiveComponent::TurnaroundDistance,
        ObjectiveComponent::Vehicles,
        ObjectiveComponent::DriveTimeUnweighted,
    ];
}

impl fmt::Display for ObjectiveComponent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ObjectiveComponent::LineLength => "line_length",
            ObjectiveComponent::LineCost => "line_cost",
            ObjectiveComponent::Drive => "drive_time",
            ObjectiveComponent::Wait => "wait_time",
            ObjectiveComponent::Transfer => "transfer_time",
            ObjectiveComponent::TransferPenalty => "transfer_penalty",
            ObjectiveComponent::TimeSlice => "time_slice_penalty",
            ObjectiveComponent::TurnaroundTime => "turn_around_time",
            ObjectiveComponent::TurnaroundDistance => "turn_around_distance",
            ObjectiveComponent::Vehicles => "vehicles",
            ObjectiveComponent::DriveTimeUnweighted => "drive_time_unweighted",
        };
        write!(f, "{name}")
    }
}

#[derive(Serialize, Deserialize)]
struct KeyValue {
    key: String,
    value: f64,
}

/// Value of every objective component in a solution.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ObjectiveBreakdown {
    values: BTreeMap<ObjectiveComponent, f64>,
}

impl ObjectiveBreakdown {
    /// Sets the value of a component.
    pub fn set(&mut self, component: ObjectiveComponent, value: f64) {
        self.values.insert(component, value);
    }

    /// Value of a component, 0 when the model does not have it.
    pub fn get(&self, component: ObjectiveComponent) -> f64 {
        self.values.get(&component).copied().unwrap_or(0.0)
    }

    /// Sum of the components.
    pub fn total(&self) -> f64 {
        self.values.values().sum()
    }

    /// Writes one `component; value` row per component.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let rows = ObjectiveComponent::ALL.iter().map(|&c| KeyValue {
            key: c.to_string(),
            value: self.get(c),
        });
        write_rows(path.as_ref(), "component; value", rows)
    }

    /// Reads a breakdown written by [`ObjectiveBreakdown::write`]. Unknown
    /// components are ignored.
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut breakdown = ObjectiveBreakdown::default();
        for (_, row) in read_rows::<KeyValue>(path.as_ref(), 2)? {
            match ObjectiveComponent::ALL.iter().find(|c| c.to_string() == row.key) {
                Some(&component) => breakdown.set(component, row.value),
                None => warn!("Unknown objective component {:?}", row.key),
            }
        }
        Ok(breakdown)
    }
}

/// What the solver reports about a solve.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct SolverStatistic {
    /// Wall-clock solve time in seconds.
    pub solver_time: f64,
    /// Relative MIP gap.
    pub gap: f64,
    /// Objective value.
    pub objective: f64,
}

impl SolverStatistic {
    /// Writes the `solver_time`, `gap` and `objective` rows.
    pub fn write<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let rows = [
            ("solver_time", self.solver_time),
            ("gap", self.gap),
            ("objective", self.objective),
        ]
        .into_iter()
        .map(|(key, value)| KeyValue {
            key: key.to_string(),
            value,
        });
        write_rows(path.as_ref(), "key; value", rows)
    }

    /// Reads a statistic written by [`SolverStatistic::write`].
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut statistic = SolverStatistic::default();
        for (_, row) in read_rows::<KeyValue>(path.as_ref(), 2)? {
            match row.key.as_str() {
                "solver_time" => statistic.solver_time = row.value,
                "gap" => statistic.gap = row.value,
                "objective" => statistic.objective = row.value,
                other => warn!("Unknown statistic {:?}", other),
            }
        }
        Ok(statistic)
    }
}
