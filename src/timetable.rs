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

//! Periodic and aperiodic timetables.

use crate::{
    ean::{modulo, PeriodicActivity, PeriodicEan},
    error::LinTimError,
    Result,
};
use anyhow::bail;
use std::collections::BTreeMap;

/// Times in `[0, T)` of periodic events.
#[derive(Debug, Clone, PartialEq)]
pub struct PeriodicTimetable {
    period: i32,
    time_units_per_minute: i32,
    times: BTreeMap<i32, i32>,
}

impl PeriodicTimetable {
    /// Creates an empty timetable of period `period` time units.
    pub fn new(period: i32, time_units_per_minute: i32) -> Self {
        PeriodicTimetable {
            period,
            time_units_per_minute,
            times: BTreeMap::new(),
        }
    }

    /// The period `T`.
    pub fn period(&self) -> i32 {
        self.period
    }

    /// Number of time units per minute.
    pub fn time_units_per_minute(&self) -> i32 {
        self.time_units_per_minute
    }

    /// Sets the time of `event`, reduced modulo the period.
    pub fn set(&mut self, event: i32, time: i64) {
        let time = modulo(time, i64::from(self.period)) as i32;
        self.times.insert(event, time);
    }

    /// Time of `event`.
    pub fn get(&self, event: i32) -> Option<i32> {
        self.times.get(&event).copied()
    }

    /// Time of `event`, failing with `DataIndexNotFound`.
    pub fn time(&self, event: i32) -> Result<i32> {
        self.get(event).ok_or_else(|| {
            LinTimError::DataIndexNotFound {
                kind: "timetable event",
                index: event,
            }
            .into()
        })
    }

    /// `(event, time)` in event order.
    pub fn iter(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        self.times.iter().map(|(&e, &t)| (e, t))
    }

    /// Number of events with a time.
    pub fn len(&self) -> usize {
        self.times.len()
    }

    /// Whether no time is set.
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// Times of the `frequency` repetitions of an event whose first
    /// repetition is at `first`, spread evenly over the period.
    pub fn expand_repetitions(&self, first: i32, frequency: u32) -> Vec<i32> {
        let frequency = frequency.max(1) as i32;
        (0..frequency)
            .map(|k| modulo(i64::from(first + k * self.period / frequency), i64::from(self.period)) as i32)
            .collect()
    }

    /// Smallest duration of `activity` which is at least its lower bound
    /// and congruent to `time(head) - time(tail)` modulo the period.
    pub fn duration(&self, activity: &PeriodicActivity) -> Result<i64> {
        let difference = i64::from(self.time(activity.head)?) - i64::from(self.time(activity.tail)?);
        let lower = i64::from(activity.lower_bound);
        Ok(lower + modulo(difference - lower, i64::from(self.period)))
    }

    /// Checks every network activity of `ean` against its bounds, taken
    /// periodically.
    pub fn check_feasibility(&self, ean: &PeriodicEan) -> Result<()> {
        for activity in ean.edges().filter(|a| a.activity_type.is_network()) {
            let duration = self.duration(activity)?;
            if !activity.accepts(duration) {
                bail!(LinTimError::DataInconsistent(format!(
                    "activity {} ({}) has periodic duration {} outside [{}, {}]",
                    activity.id,
                    activity.activity_type,
                    duration,
                    activity.lower_bound,
                    activity.upper_bound
                )));
            }
        }
        Ok(())
    }
}

/// Absolute times, in seconds, of aperiodic events.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AperiodicTimetable {
    times: BTreeMap<i32, i64>,
}

impl AperiodicTimetable {
    /// Creates an empty timetable.
    pub fn new() -> Self {
        AperiodicTimetable::default()
    }

    /// Sets the time of `event`.
    pub fn set(&mut self, event: i32, seconds: i64) {
        self.times.insert(event, seconds);
    }

    /// Time of `event`.
    pub fn get(&self, event: i32) -> Option<i64> {
        self.times.get(&event).copied()
    }

    /// `(event, time)` in event order.
    pub fn iter(&self) -> impl Iterator<Item = (i32, i64)> + '_ {
        self.times.iter().map(|(&e, &t)| (e, t))
    }

    /// Number of events with a time.
    pub fn len(&self) -> usize {
        self.times.len()
    }

    /// Whether no time is set.
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ean::{ActivityType, PeriodicActivity};
    use pretty_assertions::assert_eq;

    #[test]
    fn times_are_periodic() {
        let mut timetable = PeriodicTimetable::new(10, 1);
        timetable.set(1, 13);
        timetable.set(2, -1);
        assert_eq!(Some(3), timetable.get(1));
        assert_eq!(Some(9), timetable.get(2));
        assert_eq!(vec![3, 6, 9, 2], {
            let mut v = timetable.expand_repetitions(3, 3);
            v.push(timetable.expand_repetitions(7, 2)[1]);
            v
        });
    }

    #[test]
    fn durations_wrap_around_the_period() {
        let mut timetable = PeriodicTimetable::new(10, 1);
        timetable.set(1, 8);
        timetable.set(2, 1);
        let change = PeriodicActivity::new(1, ActivityType::Change, 1, 2, 3, 12);
        assert_eq!(3, timetable.duration(&change).unwrap());
        let drive = PeriodicActivity::new(2, ActivityType::Drive, 1, 2, 4, 6);
        assert_eq!(13, timetable.duration(&drive).unwrap());
        assert!(!drive.accepts(13));
    }
}
