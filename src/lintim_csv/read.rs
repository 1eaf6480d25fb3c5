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

use super::{
    read_optional_rows, read_rows, AperiodicActivityRow, AperiodicEventRow, AperiodicTimeRow,
    Dataset, HeadwayRow, LineConceptRow, LinkRow, LoadRow, OdRow, PeriodicActivityRow,
    PeriodicEventRow, PeriodicTimeRow, PoolCostRow, PoolRow, StopRow, VehicleScheduleRow,
};
use crate::{
    aperiodic::{AperiodicActivity, AperiodicEan, AperiodicEvent},
    ean::{PeriodicActivity, PeriodicEan, PeriodicEvent},
    error::LinTimError,
    lines::{LineKey, LinePool},
    od::OdMatrix,
    ptn::{Link, Ptn, Stop, WalkingEdge},
    timetable::{AperiodicTimetable, PeriodicTimetable},
    vehicle_schedule::{Trip, VehicleSchedule},
    Result,
};
use anyhow::{bail, Context};
use std::collections::BTreeMap;
use tracing::{info, warn};

type LineRoutes = BTreeMap<i32, BTreeMap<i32, i32>>;

impl Dataset {
    /// Reads the stops, the links and, when present, the loads and
    /// headways of the links.
    pub fn read_ptn(&self) -> Result<Ptn> {
        let files = &self.parameters.files;
        let mut ptn = Ptn::new(!self.parameters.ptn_is_undirected);
        for (_, row) in read_rows::<StopRow>(&self.path(&files.stops), 5)? {
            ptn.add_node(Stop::new(row.id, &row.short_name, &row.long_name, row.x, row.y))?;
        }
        let links = self.path(&files.links);
        for (line, row) in read_rows::<LinkRow>(&links, 6)? {
            let link = Link::new(
                row.id,
                row.left_stop,
                row.right_stop,
                row.length,
                row.lower_bound,
                row.upper_bound,
            )
            .with_context(|| format!("Error reading {:?} line {}", links, line))?;
            ptn.add_edge(link)?;
        }
        for (_, row) in read_optional_rows::<LoadRow>(&self.path(&files.loads), 4)? {
            let link = ptn.edge_mut(row.link).ok_or(LinTimError::DataIndexNotFound {
                kind: "link",
                index: row.link,
            })?;
            link.load = row.load;
            link.lower_frequency = Some(row.lower_frequency);
            link.upper_frequency = Some(row.upper_frequency);
        }
        for (_, row) in read_optional_rows::<HeadwayRow>(&self.path(&files.headways), 2)? {
            let link = ptn.edge_mut(row.link).ok_or(LinTimError::DataIndexNotFound {
                kind: "link",
                index: row.link,
            })?;
            link.headway = row.headway;
        }
        info!(
            "PTN read with {} stops and {} links",
            ptn.node_count(),
            ptn.edge_count()
        );
        Ok(ptn)
    }

    /// Reads the walking edges. With `walking_edge_skip_column` the files
    /// have five columns and the fourth one is ignored.
    pub fn read_walking_edges(&self) -> Result<Vec<WalkingEdge>> {
        let path = self.path(&self.parameters.files.walking_edges);
        let edges = if self.parameters.walking_edge_skip_column {
            read_optional_rows::<(i32, i32, f64, String, f64)>(&path, 5)?
                .into_iter()
                .map(|(_, (from_stop, to_stop, length, _, time))| WalkingEdge {
                    from_stop,
                    to_stop,
                    length,
                    time,
                })
                .collect()
        } else {
            read_optional_rows::<(i32, i32, f64, f64)>(&path, 4)?
                .into_iter()
                .map(|(_, (from_stop, to_stop, length, time))| WalkingEdge {
                    from_stop,
                    to_stop,
                    length,
                    time,
                })
                .collect()
        };
        Ok(edges)
    }

    fn read_line_costs(&self, routes: &LineRoutes) -> Result<Option<BTreeMap<i32, (f64, f64)>>> {
        let path = self.path(&self.parameters.files.pool_cost);
        if !path.exists() {
            info!("No line cost file, costs derived from the cost model");
            return Ok(None);
        }
        let mut costs = BTreeMap::new();
        for (_, row) in read_rows::<PoolCostRow>(&path, 3)? {
            if !routes.contains_key(&row.line) {
                bail!(LinTimError::DataLinePoolCostInconsistency(format!(
                    "line {} has a cost but is not in the pool",
                    row.line
                )));
            }
            costs.insert(row.line, (row.length, row.cost));
        }
        if let Some(line) = routes.keys().find(|id| !costs.contains_key(id)) {
            bail!(LinTimError::DataLinePoolCostInconsistency(format!(
                "line {} of the pool has no cost",
                line
            )));
        }
        Ok(Some(costs))
    }

    fn build_pool(&self, ptn: &Ptn, routes: &LineRoutes) -> Result<LinePool> {
        let costs = self.read_line_costs(routes)?;
        let mut pool = LinePool::new(self.parameters.ptn_is_undirected);
        for (&id, links) in routes {
            let links: Vec<i32> = links.values().copied().collect();
            let length_and_cost = costs.as_ref().map(|c| c[&id]);
            pool.add_line(
                ptn,
                id,
                &links,
                1,
                length_and_cost,
                &self.parameters.line_costs,
            )?;
        }
        Ok(pool)
    }

    /// Reads the line pool, every line with frequency 1, with the lengths
    /// and costs of the line cost file when present.
    pub fn read_line_pool(&self, ptn: &Ptn) -> Result<LinePool> {
        let mut routes: LineRoutes = BTreeMap::new();
        for (_, row) in read_rows::<PoolRow>(&self.path(&self.parameters.files.pool), 3)? {
            routes.entry(row.line).or_default().insert(row.order, row.link);
        }
        let pool = self.build_pool(ptn, &routes)?;
        info!("Line pool read with {} lines", routes.len());
        Ok(pool)
    }

    /// Reads a line concept. Returns the pool of every line of the file and
    /// the frequency of each, 0 for lines which are not operated.
    pub fn read_line_concept(&self, ptn: &Ptn) -> Result<(LinePool, BTreeMap<i32, u32>)> {
        let mut routes: LineRoutes = BTreeMap::new();
        let mut frequencies = BTreeMap::new();
        let path = self.path(&self.parameters.files.line_concept);
        for (line, row) in read_rows::<LineConceptRow>(&path, 4)? {
            routes.entry(row.line).or_default().insert(row.order, row.link);
            if let Some(&previous) = frequencies.get(&row.line) {
                if previous != row.frequency {
                    bail!(LinTimError::DataInconsistent(format!(
                        "{:?} line {}: line {} has frequencies {} and {}",
                        path, line, row.line, previous, row.frequency
                    )));
                }
            }
            frequencies.insert(row.line, row.frequency);
        }
        let pool = self.build_pool(ptn, &routes)?;
        Ok((pool, frequencies))
    }

    /// Reads the OD matrix, spread over `number_of_time_slices` slices.
    pub fn read_od(&self) -> Result<OdMatrix> {
        let mut od = OdMatrix::new();
        for (_, row) in read_rows::<OdRow>(&self.path(&self.parameters.files.od), 3)? {
            od.set(row.origin, row.destination, 1, row.passengers);
        }
        if self.parameters.number_of_time_slices > 1 {
            od = od.split_time_slices(self.parameters.number_of_time_slices);
        }
        info!("OD matrix read with {} passengers", od.passenger_count());
        Ok(od)
    }

    /// Reads the network events and activities of a periodic EAN.
    pub fn read_periodic_ean(&self) -> Result<PeriodicEan> {
        let files = &self.parameters.files;
        let mut ean = PeriodicEan::new(true);
        for (_, row) in read_rows::<PeriodicEventRow>(&self.path(&files.periodic_events), 7)? {
            let line = LineKey::new(row.line, row.direction.parse()?, row.repetition);
            let mut event = PeriodicEvent::network(row.id, row.stop, line, row.event_type.parse()?);
            event.passengers = row.passengers;
            ean.add_node(event)?;
        }
        for (_, row) in read_rows::<PeriodicActivityRow>(&self.path(&files.periodic_activities), 7)? {
            let mut activity = PeriodicActivity::new(
                row.id,
                row.activity_type.parse()?,
                row.tail,
                row.head,
                row.lower_bound,
                row.upper_bound,
            );
            activity.passengers = row.passengers;
            ean.add_edge(activity)?;
        }
        Ok(ean)
    }

    /// Reads a periodic timetable.
    pub fn read_periodic_timetable(&self) -> Result<PeriodicTimetable> {
        let mut timetable = PeriodicTimetable::new(
            self.parameters.period_length,
            self.parameters.time_units_per_minute,
        );
        let path = self.path(&self.parameters.files.periodic_timetable);
        for (_, row) in read_rows::<PeriodicTimeRow>(&path, 2)? {
            timetable.set(row.event, row.time);
        }
        Ok(timetable)
    }

    /// Reads an aperiodic EAN.
    pub fn read_aperiodic_ean(&self) -> Result<AperiodicEan> {
        let files = &self.parameters.files;
        let mut ean = AperiodicEan::new(true);
        for (_, row) in read_rows::<AperiodicEventRow>(&self.path(&files.aperiodic_events), 6)? {
            ean.add_node(AperiodicEvent {
                id: row.id,
                periodic_id: row.periodic_id,
                event_type: row.event_type.parse()?,
                time: row.time,
                passengers: row.passengers,
                stop: row.stop,
            })?;
        }
        let path = self.path(&files.aperiodic_activities);
        for (_, row) in read_rows::<AperiodicActivityRow>(&path, 8)? {
            ean.add_edge(AperiodicActivity {
                id: row.id,
                periodic_id: row.periodic_id,
                activity_type: row.activity_type.parse()?,
                tail: row.tail,
                head: row.head,
                lower_bound: row.lower_bound,
                upper_bound: row.upper_bound,
                passengers: row.passengers as f64,
                corresponding_headway_id: None,
            })?;
        }
        Ok(ean)
    }

    /// Reads an aperiodic timetable.
    pub fn read_aperiodic_timetable(&self) -> Result<AperiodicTimetable> {
        let mut timetable = AperiodicTimetable::new();
        let path = self.path(&self.parameters.files.aperiodic_timetable);
        for (_, row) in read_rows::<AperiodicTimeRow>(&path, 2)? {
            timetable.set(row.event, row.time);
        }
        Ok(timetable)
    }

    /// Reads a vehicle schedule.
    pub fn read_vehicle_schedule(&self) -> Result<VehicleSchedule> {
        let mut schedule = VehicleSchedule::new();
        let path = self.path(&self.parameters.files.vehicle_schedule);
        for (_, row) in read_rows::<VehicleScheduleRow>(&path, 13)? {
            let trip = Trip {
                trip_type: row.trip_type.parse()?,
                start_aperiodic_event: row.start_aperiodic_event,
                start_periodic_event: row.start_periodic_event,
                start_stop: row.start_stop,
                start_time: row.start_time,
                end_aperiodic_event: row.end_aperiodic_event,
                end_periodic_event: row.end_periodic_event,
                end_stop: row.end_stop,
                end_time: row.end_time,
                line: row.line,
            };
            schedule
                .circulation_mut(row.circulation)
                .tour_mut(row.vehicle)
                .insert(row.trip_number, trip)?;
        }
        if let Err(error) = schedule.check_consistency() {
            warn!("{:?}: {}", path, error);
        }
        Ok(schedule)
    }
}

