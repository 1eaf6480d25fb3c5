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
    write_rows, AperiodicActivityRow, AperiodicEventRow, AperiodicTimeRow, Dataset, EndEventRow,
    HeadwayRow, LineConceptRow, LinkRow, LoadRow, OdRow, PeriodicActivityRow, PeriodicEventRow,
    PeriodicTimeRow, PoolCostRow, PoolRow, StopRow, TripRow, VehicleScheduleRow,
};
use crate::{
    aperiodic::AperiodicEan,
    ean::{EventKind, PeriodicEan},
    lines::LinePool,
    od::OdMatrix,
    ptn::Ptn,
    timetable::{AperiodicTimetable, PeriodicTimetable},
    vehicle_schedule::{TripType, VehicleSchedule},
    Result,
};
use std::collections::BTreeMap;

impl Dataset {
    /// Writes the stops and links, plus loads and headways when some link
    /// has them.
    pub fn write_ptn(&self, ptn: &Ptn) -> Result<()> {
        let files = &self.parameters.files;
        let stops = ptn.nodes().map(|stop| StopRow {
            id: stop.id,
            short_name: stop.short_name.clone(),
            long_name: stop.long_name.clone(),
            x: stop.x,
            y: stop.y,
        });
        write_rows(
            &self.path(&files.stops),
            "stop-id; short-name; long-name; x-coordinate; y-coordinate",
            stops,
        )?;
        let links = ptn.edges().map(|link| LinkRow {
            id: link.id,
            left_stop: link.left_stop,
            right_stop: link.right_stop,
            length: link.length,
            lower_bound: link.lower_bound,
            upper_bound: link.upper_bound,
        });
        write_rows(
            &self.path(&files.links),
            "link-index; from-stop-id; to-stop-id; length; lower-bound; upper-bound",
            links,
        )?;
        let loads: Vec<LoadRow> = ptn
            .edges()
            .filter(|l| l.lower_frequency.is_some() || l.upper_frequency.is_some())
            .map(|link| LoadRow {
                link: link.id,
                load: link.load,
                lower_frequency: link.lower_frequency.unwrap_or(0),
                upper_frequency: link.upper_frequency.unwrap_or(0),
            })
            .collect();
        if !loads.is_empty() {
            write_rows(
                &self.path(&files.loads),
                "link-index; load; min-freq; max-freq",
                loads,
            )?;
        }
        let headways: Vec<HeadwayRow> = ptn
            .edges()
            .filter(|l| l.headway > 0)
            .map(|link| HeadwayRow {
                link: link.id,
                headway: link.headway,
            })
            .collect();
        if !headways.is_empty() {
            write_rows(&self.path(&files.headways), "link-index; headway", headways)?;
        }
        Ok(())
    }

    /// Writes the routes of the pool and their lengths and costs.
    pub fn write_line_pool(&self, pool: &LinePool) -> Result<()> {
        let files = &self.parameters.files;
        let routes = pool.routes().flat_map(|line| {
            (1..)
                .zip(line.links())
                .map(move |(order, &link)| PoolRow {
                    line: line.id(),
                    order,
                    link,
                })
        });
        write_rows(
            &self.path(&files.pool),
            "line-id; link-order; link-id",
            routes,
        )?;
        let costs = pool.routes().map(|line| PoolCostRow {
            line: line.id(),
            length: line.length(),
            cost: line.cost(),
        });
        write_rows(&self.path(&files.pool_cost), "line-id; length; cost", costs)
    }

    /// Writes every route of `pool` with its frequency in `concept`, 0 when
    /// the line is not operated.
    pub fn write_line_concept(&self, pool: &LinePool, concept: &BTreeMap<i32, u32>) -> Result<()> {
        let rows = pool.routes().flat_map(|line| {
            let frequency = concept.get(&line.id()).copied().unwrap_or(0);
            (1..)
                .zip(line.links())
                .map(move |(order, &link)| LineConceptRow {
                    line: line.id(),
                    order,
                    link,
                    frequency,
                })
        });
        write_rows(
            &self.path(&self.parameters.files.line_concept),
            "line-id; link-order; link-id; frequency",
            rows,
        )
    }

    /// Writes the demand of every pair, summed over the time slices.
    pub fn write_od(&self, od: &OdMatrix) -> Result<()> {
        let mut totals: BTreeMap<(i32, i32), f64> = BTreeMap::new();
        for pair in od.pairs() {
            *totals.entry((pair.origin, pair.destination)).or_insert(0.0) += pair.passengers;
        }
        let rows = totals.into_iter().map(|((origin, destination), passengers)| OdRow {
            origin,
            destination,
            passengers,
        });
        write_rows(
            &self.path(&self.parameters.files.od),
            "left-stop-id; right-stop-id; customers",
            rows,
        )
    }

    /// Writes the network events and activities of `ean`; OD events and the
    /// activities of the passenger routing are left out.
    pub fn write_periodic_ean(&self, ean: &PeriodicEan) -> Result<()> {
        let files = &self.parameters.files;
        let events = ean.nodes().filter_map(|event| match event.kind {
            EventKind::Network {
                stop,
                line,
                event_type,
            } => Some(PeriodicEventRow {
                id: event.id,
                event_type: event_type.to_string(),
                stop,
                line: line.id,
                passengers: event.passengers,
                direction: line.direction.to_string(),
                repetition: line.repetition,
            }),
            _ => None,
        });
        write_rows(
            &self.path(&files.periodic_events),
            "event-id; type; stop-id; line-id; passengers; line-direction; line-freq-repetition",
            events,
        )?;
        let activities = ean
            .edges()
            .filter(|a| a.activity_type.is_network())
            .map(|activity| PeriodicActivityRow {
                id: activity.id,
                activity_type: activity.activity_type.to_string(),
                tail: activity.tail,
                head: activity.head,
                lower_bound: activity.lower_bound,
                upper_bound: activity.upper_bound,
                passengers: activity.passengers,
            });
        write_rows(
            &self.path(&files.periodic_activities),
            "activity-index; type; from-event; to-event; lower-bound; upper-bound; passengers",
            activities,
        )
    }

    /// Writes a periodic timetable.
    pub fn write_periodic_timetable(&self, timetable: &PeriodicTimetable) -> Result<()> {
        let rows = timetable.iter().map(|(event, time)| PeriodicTimeRow {
            event,
            time: i64::from(time),
        });
        write_rows(
            &self.path(&self.parameters.files.periodic_timetable),
            "event-id; time",
            rows,
        )
    }

    /// Writes an aperiodic EAN. Passengers of activities are rounded.
    pub fn write_aperiodic_ean(&self, ean: &AperiodicEan) -> Result<()> {
        let files = &self.parameters.files;
        let events = ean.nodes().map(|event| AperiodicEventRow {
            id: event.id,
            periodic_id: event.periodic_id,
            event_type: event.event_type.to_string(),
            time: event.time,
            passengers: event.passengers,
            stop: event.stop,
        });
        write_rows(
            &self.path(&files.aperiodic_events),
            "event-id; periodic-id; type; time; passengers; stop-id",
            events,
        )?;
        let activities = ean.edges().map(|activity| AperiodicActivityRow {
            id: activity.id,
            periodic_id: activity.periodic_id,
            activity_type: activity.activity_type.to_string(),
            tail: activity.tail,
            head: activity.head,
            lower_bound: activity.lower_bound,
            upper_bound: activity.upper_bound,
            passengers: activity.passengers.round() as i64,
        });
        write_rows(
            &self.path(&files.aperiodic_activities),
            "activity-index; periodic-id; type; from-event; to-event; lower-bound; upper-bound; passengers",
            activities,
        )
    }

    /// Writes an aperiodic timetable.
    pub fn write_aperiodic_timetable(&self, timetable: &AperiodicTimetable) -> Result<()> {
        let rows = timetable
            .iter()
            .map(|(event, time)| AperiodicTimeRow { event, time });
        write_rows(
            &self.path(&self.parameters.files.aperiodic_timetable),
            "event-id; time",
            rows,
        )
    }

    /// Writes every trip of a vehicle schedule.
    pub fn write_vehicle_schedule(&self, schedule: &VehicleSchedule) -> Result<()> {
        let mut rows = Vec::new();
        for circulation in schedule.circulations() {
            for tour in circulation.tours() {
                for (trip_number, trip) in tour.trips() {
                    rows.push(VehicleScheduleRow {
                        circulation: circulation.id(),
                        vehicle: tour.vehicle_id(),
                        trip_number,
                        trip_type: trip.trip_type.to_string(),
                        start_aperiodic_event: trip.start_aperiodic_event,
                        start_periodic_event: trip.start_periodic_event,
                        start_stop: trip.start_stop,
                        start_time: trip.start_time,
                        end_aperiodic_event: trip.end_aperiodic_event,
                        end_periodic_event: trip.end_periodic_event,
                        end_stop: trip.end_stop,
                        end_time: trip.end_time,
                        line: trip.line,
                    });
                }
            }
        }
        write_rows(
            &self.path(&self.parameters.files.vehicle_schedule),
            "circulation-id; vehicle-id; trip-number; type; aperiodic-start-id; periodic-start-id; \
             start-station; start-time; aperiodic-end-id; periodic-end-id; end-station; end-time; line",
            rows,
        )
    }

    /// Writes the revenue trips of a vehicle schedule.
    pub fn write_trips(&self, schedule: &VehicleSchedule) -> Result<()> {
        let rows = schedule
            .circulations()
            .flat_map(|c| c.tours())
            .flat_map(|t| t.trips().map(|(_, trip)| trip))
            .filter(|trip| trip.trip_type == TripType::Trip)
            .map(|trip| TripRow {
                start_aperiodic_event: trip.start_aperiodic_event,
                start_periodic_event: trip.start_periodic_event,
                start_stop: trip.start_stop,
                start_time: trip.start_time,
                end_aperiodic_event: trip.end_aperiodic_event,
                end_periodic_event: trip.end_periodic_event,
                end_stop: trip.end_stop,
                end_time: trip.end_time,
                line: trip.line,
            });
        write_rows(
            &self.path(&self.parameters.files.trips),
            "start-ID; periodic-start-ID; start-station; start-time; end-ID; periodic-end-ID; \
             end-station; end-time; line",
            rows,
        )
    }

    /// Writes the aperiodic event each vehicle finishes its tour with.
    pub fn write_end_events(&self, schedule: &VehicleSchedule) -> Result<()> {
        let mut rows = Vec::new();
        for circulation in schedule.circulations() {
            for tour in circulation.tours() {
                if let Some((_, last)) = tour.trips().last() {
                    rows.push(EndEventRow {
                        circulation: circulation.id(),
                        vehicle: tour.vehicle_id(),
                        event: last.end_aperiodic_event,
                    });
                }
            }
        }
        write_rows(
            &self.path(&self.parameters.files.end_events),
            "circulation-id; vehicle-id; aperiodic-event-id",
            rows,
        )
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        aperiodic::expand,
        ean::{build_periodic_ean, ActivityType},
        error::LinTimError,
        lines::{LineCostModel, LineDirection, LineKey, LinePool},
        lintim_csv::Dataset,
        test_utils::{
            create_file_with_content, get_file_content, line_ptn, od_matrix, scenario_a_parameters,
            single_line_pool, test_in_tmp_dir,
        },
        timetable::PeriodicTimetable,
        vehicle_schedule::VehicleConnections,
        Parameters,
    };
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;
    use std::collections::{BTreeMap, BTreeSet};

    #[test]
    fn ptn_round_trip() {
        test_in_tmp_dir(|path| {
            let dataset = Dataset::new(path, scenario_a_parameters());
            let mut ptn = line_ptn(true);
            {
                let link = ptn.edge_mut(2).unwrap();
                link.load = 12.5;
                link.lower_frequency = Some(1);
                link.upper_frequency = Some(3);
                link.headway = 2;
            }
            ptn.node_mut(3).unwrap().x = 1.0 / 3.0;
            dataset.write_ptn(&ptn).unwrap();
            assert_eq!(
                "# link-index; headway\n2; 2\n",
                get_file_content(path.join("basis/Headway.giv"))
            );
            let read = dataset.read_ptn().unwrap();
            assert_eq!(
                ptn.nodes().collect::<Vec<_>>(),
                read.nodes().collect::<Vec<_>>()
            );
            assert_eq!(
                ptn.edges().collect::<Vec<_>>(),
                read.edges().collect::<Vec<_>>()
            );
            assert_relative_eq!(1.0 / 3.0, read.get_node(3).unwrap().x, epsilon = 1e-9);
        });
    }

    #[test]
    fn names_with_separators_and_quotes_round_trip() {
        test_in_tmp_dir(|path| {
            let dataset = Dataset::new(path, scenario_a_parameters());
            let mut ptn = line_ptn(true);
            ptn.node_mut(1).unwrap().long_name = "Gare; Nord".to_string();
            ptn.node_mut(2).unwrap().long_name = "Gare \"Nord\"".to_string();
            ptn.node_mut(3).unwrap().short_name = "#3".to_string();
            dataset.write_ptn(&ptn).unwrap();
            let content = get_file_content(path.join("basis/Stop.giv"));
            assert!(content.contains("1; 1; \"Gare; Nord\"; 0.0; 0.0\n"));

            let read = dataset.read_ptn().unwrap();
            assert_eq!("Gare; Nord", read.get_node(1).unwrap().long_name);
            assert_eq!("Gare \"Nord\"", read.get_node(2).unwrap().long_name);
            assert_eq!("#3", read.get_node(3).unwrap().short_name);
        });
    }

    #[test]
    fn only_text_is_quoted() {
        test_in_tmp_dir(|path| {
            let dataset = Dataset::new(path, scenario_a_parameters());
            dataset.write_ptn(&line_ptn(true)).unwrap();
            assert_eq!(
                "# stop-id; short-name; long-name; x-coordinate; y-coordinate\n\
                 1; 1; \"Stop 1\"; 0.0; 0.0\n\
                 2; 2; \"Stop 2\"; 1.0; 0.0\n\
                 3; 3; \"Stop 3\"; 2.0; 0.0\n",
                get_file_content(path.join("basis/Stop.giv"))
            );
        });
    }

    #[test]
    fn pool_and_concept_round_trip() {
        test_in_tmp_dir(|path| {
            let parameters = Parameters {
                ptn_is_undirected: true,
                ..Default::default()
            };
            let dataset = Dataset::new(path, parameters);
            let ptn = line_ptn(false);
            let mut pool = LinePool::new(true);
            pool.add_line(&ptn, 1, &[1, 2], 1, Some((2.0, 5.5)), &LineCostModel::default())
                .unwrap();
            pool.add_line(&ptn, 2, &[2], 1, Some((1.0, 3.0)), &LineCostModel::default())
                .unwrap();
            dataset.write_line_pool(&pool).unwrap();
            assert_eq!(pool, dataset.read_line_pool(&ptn).unwrap());

            let concept = BTreeMap::from([(1, 2)]);
            dataset.write_line_concept(&pool, &concept).unwrap();
            let (read_pool, frequencies) = dataset.read_line_concept(&ptn).unwrap();
            assert_eq!(BTreeMap::from([(1, 2), (2, 0)]), frequencies);
            let operated = read_pool.with_frequencies(&frequencies).unwrap();
            assert!(operated
                .get(&LineKey::new(1, LineDirection::Backward, 2))
                .is_some());
            assert_eq!(4, operated.len());
        });
    }

    #[test]
    fn unknown_line_in_cost_file() {
        test_in_tmp_dir(|path| {
            let dataset = Dataset::new(path, scenario_a_parameters());
            let ptn = line_ptn(true);
            create_file_with_content(path, "basis/Pool.giv", "1; 1; 1\n1; 2; 2\n");
            create_file_with_content(path, "basis/Pool-Cost.giv", "1; 2.0; 2.0\n4; 1.0; 1.0\n");
            let error = dataset.read_line_pool(&ptn).unwrap_err();
            assert!(matches!(
                error.downcast_ref::<LinTimError>(),
                Some(LinTimError::DataLinePoolCostInconsistency(_))
            ));
        });
    }

    #[test]
    fn od_round_trip_and_time_slices() {
        test_in_tmp_dir(|path| {
            let dataset = Dataset::new(path, scenario_a_parameters());
            let od = od_matrix(&[(1, 3, 7.0), (3, 1, 2.5)]);
            dataset.write_od(&od).unwrap();
            assert_eq!(od, dataset.read_od().unwrap());
            let sliced = Dataset::new(
                path,
                Parameters {
                    number_of_time_slices: 2,
                    ..scenario_a_parameters()
                },
            );
            let read = sliced.read_od().unwrap();
            assert_eq!(3.5, read.get(1, 3, 2));
            assert_eq!(9.5, read.passenger_count());
        });
    }

    #[test]
    fn periodic_round_trip() {
        test_in_tmp_dir(|path| {
            let parameters = scenario_a_parameters();
            let dataset = Dataset::new(path, parameters.clone());
            let ptn = line_ptn(true);
            let lines = single_line_pool(&ptn);
            let mut ean = build_periodic_ean(&ptn, &lines, &[(1, 3)], None, &parameters).unwrap();
            for activity in ean.edges_mut() {
                activity.passengers = 7.0;
            }
            dataset.write_periodic_ean(&ean).unwrap();
            let read = dataset.read_periodic_ean().unwrap();
            let network_events: Vec<_> = ean.nodes().filter(|e| e.is_network()).collect();
            assert_eq!(network_events, read.nodes().collect::<Vec<_>>());
            let network_activities: Vec<_> = ean
                .edges()
                .filter(|a| a.activity_type.is_network())
                .collect();
            assert_eq!(network_activities, read.edges().collect::<Vec<_>>());

            let mut timetable = PeriodicTimetable::new(10, 1);
            for (event, time) in [(1, 0), (2, 2), (3, 3), (4, 5)] {
                timetable.set(event, time);
            }
            dataset.write_periodic_timetable(&timetable).unwrap();
            assert_eq!(timetable, dataset.read_periodic_timetable().unwrap());
        });
    }

    #[test]
    fn aperiodic_and_vehicle_schedule_round_trip() {
        test_in_tmp_dir(|path| {
            let parameters = Parameters {
                p_max: 2,
                ..scenario_a_parameters()
            };
            let dataset = Dataset::new(path, parameters.clone());
            let ptn = line_ptn(true);
            let lines = single_line_pool(&ptn);
            let ean = build_periodic_ean(&ptn, &lines, &[], None, &parameters).unwrap();
            let mut timetable = PeriodicTimetable::new(10, 1);
            for (event, time) in [(1, 0), (2, 2), (3, 3), (4, 5)] {
                timetable.set(event, time);
            }
            let expansion = expand(&ean, &timetable, &parameters).unwrap();
            dataset.write_aperiodic_ean(&expansion.ean).unwrap();
            dataset.write_aperiodic_timetable(&expansion.timetable).unwrap();
            let read = dataset.read_aperiodic_ean().unwrap();
            assert_eq!(
                expansion.ean.nodes().collect::<Vec<_>>(),
                read.nodes().collect::<Vec<_>>()
            );
            assert_eq!(
                expansion.ean.edges().collect::<Vec<_>>(),
                read.edges().collect::<Vec<_>>()
            );
            assert!(read
                .edges()
                .all(|a| a.activity_type == ActivityType::Drive || a.activity_type == ActivityType::Wait));
            assert_eq!(expansion.timetable, dataset.read_aperiodic_timetable().unwrap());

            let line = LineKey::new(1, LineDirection::Forward, 1);
            let connections = VehicleConnections {
                trips: BTreeSet::from([(1, line), (2, line)]),
                pull_outs: BTreeSet::from([(1, line)]),
                next: BTreeMap::from([((1, line), (2, line))]),
            };
            let schedule = expansion.vehicle_schedule(&connections).unwrap();
            dataset.write_vehicle_schedule(&schedule).unwrap();
            dataset.write_trips(&schedule).unwrap();
            dataset.write_end_events(&schedule).unwrap();
            assert_eq!(schedule, dataset.read_vehicle_schedule().unwrap());
            assert_eq!(3, get_file_content(path.join("vehicle-scheduling/Trips.giv")).lines().count());
            let last = expansion.instance(4, 2).unwrap();
            assert_eq!(
                format!("# circulation-id; vehicle-id; aperiodic-event-id\n1; 1; {}\n", last),
                get_file_content(path.join("vehicle-scheduling/End-Events.giv"))
            );
        });
    }
}
