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

//! LinTim configuration: the `key; value` dictionary and the typed
//! parameters the models are built with.

use crate::{
    cycle_base::SpanningTreeStrategy, error::LinTimError, lines::LineCostModel, lintim_csv, Result,
};
use anyhow::bail;
use derivative::Derivative;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Dictionary of raw configuration values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    values: BTreeMap<String, String>,
}

impl Config {
    /// Creates an empty configuration.
    pub fn new() -> Self {
        Config::default()
    }

    /// Reads a configuration file and the files it includes.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Config::new();
        config.read_file(path)?;
        Ok(config)
    }

    /// Reads `path` into this configuration. Later definitions override
    /// earlier ones. `include; "file"` reads another file relative to the
    /// current one, `include_if_exists; "file"` skips missing files.
    pub fn read_file<P: AsRef<Path>>(&mut self, path: P) -> Result<()> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            bail!(LinTimError::ConfigNoFileName);
        }
        info!("Reading config {:?}", path);
        let directory = path.parent().map(Path::to_path_buf).unwrap_or_default();
        for (line, record) in lintim_csv::read_records(path)? {
            if record.len() != 2 {
                bail!(LinTimError::InputFormat {
                    file: path.to_path_buf(),
                    line,
                    expected: 2,
                    found: record.len(),
                });
            }
            let key = record[0].to_string();
            let value = record[1].to_string();
            match key.as_str() {
                "include" => self.read_file(directory.join(&value))?,
                "include_if_exists" => {
                    let included = directory.join(&value);
                    if included.exists() {
                        self.read_file(included)?;
                    } else {
                        debug!("Skipping missing config {:?}", included);
                    }
                }
                _ => {
                    self.values.insert(key, value);
                }
            }
        }
        Ok(())
    }

    /// Sets a raw value.
    pub fn set(&mut self, key: &str, value: &str) {
        self.values.insert(key.to_string(), value.to_string());
    }

    /// Whether `key` is defined.
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// The raw value of `key`.
    pub fn get_string(&self, key: &str) -> Result<String> {
        self.values
            .get(key)
            .cloned()
            .ok_or_else(|| LinTimError::ConfigKeyNotFound(key.to_string()).into())
    }

    fn parse<T: std::str::FromStr>(&self, key: &str, expected: &'static str) -> Result<T> {
        let value = self.get_string(key)?;
        value.parse().map_err(|_| {
            LinTimError::ConfigTypeMismatch {
                key: key.to_string(),
                value,
                expected,
            }
            .into()
        })
    }

    /// The value of `key` as an integer.
    pub fn get_integer(&self, key: &str) -> Result<i32> {
        self.parse(key, "integer")
    }

    /// The value of `key` as a floating point number.
    pub fn get_double(&self, key: &str) -> Result<f64> {
        self.parse(key, "double")
    }

    /// The value of `key` as a boolean (`true`/`false`, any case).
    pub fn get_boolean(&self, key: &str) -> Result<bool> {
        let value = self.get_string(key)?;
        match value.to_ascii_lowercase().as_str() {
            "true" => Ok(true),
            "false" => Ok(false),
            _ => Err(LinTimError::ConfigTypeMismatch {
                key: key.to_string(),
                value,
                expected: "boolean",
            }
            .into()),
        }
    }
}

/// Paths of the dataset files, relative to the dataset directory.
#[derive(Debug, Clone, PartialEq, Derivative)]
#[derivative(Default)]
pub struct FileNames {
    /// Stops of the PTN.
    #[derivative(Default(value = "\"basis/Stop.giv\".into()"))]
    pub stops: PathBuf,
    /// Links of the PTN.
    #[derivative(Default(value = "\"basis/Edge.giv\".into()"))]
    pub links: PathBuf,
    /// Link loads and frequency bounds.
    #[derivative(Default(value = "\"basis/Load.giv\".into()"))]
    pub loads: PathBuf,
    /// Minimal headways on links.
    #[derivative(Default(value = "\"basis/Headway.giv\".into()"))]
    pub headways: PathBuf,
    /// Walking links between stops.
    #[derivative(Default(value = "\"basis/Walking-Edge.giv\".into()"))]
    pub walking_edges: PathBuf,
    /// Links of the candidate lines.
    #[derivative(Default(value = "\"basis/Pool.giv\".into()"))]
    pub pool: PathBuf,
    /// Lengths and costs of the candidate lines.
    #[derivative(Default(value = "\"basis/Pool-Cost.giv\".into()"))]
    pub pool_cost: PathBuf,
    /// Demand.
    #[derivative(Default(value = "\"basis/OD.giv\".into()"))]
    pub od: PathBuf,
    /// Operated lines and frequencies.
    #[derivative(Default(value = "\"line-planning/Line-Concept.lin\".into()"))]
    pub line_concept: PathBuf,
    /// Periodic events.
    #[derivative(Default(value = "\"timetabling/Events-periodic.giv\".into()"))]
    pub periodic_events: PathBuf,
    /// Periodic activities.
    #[derivative(Default(value = "\"timetabling/Activities-periodic.giv\".into()"))]
    pub periodic_activities: PathBuf,
    /// Periodic timetable.
    #[derivative(Default(value = "\"timetabling/Timetable-periodic.tim\".into()"))]
    pub periodic_timetable: PathBuf,
    /// Aperiodic events.
    #[derivative(Default(value = "\"delay-management/Events-expanded.giv\".into()"))]
    pub aperiodic_events: PathBuf,
    /// Aperiodic activities.
    #[derivative(Default(value = "\"delay-management/Activities-expanded.giv\".into()"))]
    pub aperiodic_activities: PathBuf,
    /// Aperiodic timetable.
    #[derivative(Default(value = "\"delay-management/Timetable-expanded.tim\".into()"))]
    pub aperiodic_timetable: PathBuf,
    /// Vehicle schedule.
    #[derivative(Default(value = "\"vehicle-scheduling/Vehicle_Schedules.vs\".into()"))]
    pub vehicle_schedule: PathBuf,
    /// Trips of the vehicle schedule.
    #[derivative(Default(value = "\"vehicle-scheduling/Trips.giv\".into()"))]
    pub trips: PathBuf,
    /// Last event of every trip.
    #[derivative(Default(value = "\"vehicle-scheduling/End-Events.giv\".into()"))]
    pub end_events: PathBuf,
    /// Solver statistic.
    #[derivative(Default(value = "\"statistic/solver_statistic.sta\".into()"))]
    pub solver_statistic: PathBuf,
    /// Objective components.
    #[derivative(Default(value = "\"statistic/objectives.txt\".into()"))]
    pub objectives: PathBuf,
    /// Model in LP format.
    #[derivative(Default(value = "\"statistic/model.lp\".into()"))]
    pub lp_output: PathBuf,
    /// Irreducible infeasible subsystem.
    #[derivative(Default(value = "\"statistic/model.ilp\".into()"))]
    pub iis_output: PathBuf,
}

/// Every value the construction, preprocessing and optimisation steps
/// depend on. Times are expressed in time units.
#[derive(Debug, Clone, PartialEq, Derivative)]
#[derivative(Default)]
pub struct Parameters {
    /// Period length `T`.
    #[derivative(Default(value = "60"))]
    pub period_length: i32,
    /// Number of time units per minute.
    #[derivative(Default(value = "1"))]
    pub time_units_per_minute: i32,
    /// Whether the PTN and the lines are undirected.
    #[derivative(Default(value = "true"))]
    pub ptn_is_undirected: bool,
    /// Weight of the perceived travel time of the passengers.
    #[derivative(Default(value = "1.0"))]
    pub factor_travel_time: f64,
    /// Weight of drive times in the perceived travel time.
    #[derivative(Default(value = "1.0"))]
    pub factor_drive_time: f64,
    /// Weight of wait times in the perceived travel time.
    #[derivative(Default(value = "1.0"))]
    pub factor_wait_time: f64,
    /// Weight of transfer times in the perceived travel time.
    #[derivative(Default(value = "1.0"))]
    pub factor_transfer_time: f64,
    /// Penalty per transfer, in time units.
    pub transfer_penalty: f64,
    /// Weight of the deviation from the preferred time slice.
    #[derivative(Default(value = "1.0"))]
    pub factor_penalty_time_slice: f64,
    /// Cost per kilometre of operated line.
    pub factor_line_length: f64,
    /// Weight of the line costs.
    #[derivative(Default(value = "1.0"))]
    pub factor_line_cost: f64,
    /// Weight of the drive time of the vehicles, regardless of passengers.
    pub factor_drive_time_unweighted: f64,
    /// Weight of the time vehicles spend between two trips.
    pub factor_turn_around_time: f64,
    /// Weight of the distance of empty trips.
    pub factor_turn_around_distance: f64,
    /// Cost per vehicle.
    #[derivative(Default(value = "1.0"))]
    pub factor_vehicles: f64,
    /// Lower bound of wait activities.
    #[derivative(Default(value = "1"))]
    pub min_wait_time: i32,
    /// Upper bound of wait activities.
    #[derivative(Default(value = "60"))]
    pub max_wait_time: i32,
    /// Lower bound of change activities.
    #[derivative(Default(value = "3"))]
    pub min_trans_time: i32,
    /// Upper bound of change activities.
    #[derivative(Default(value = "62"))]
    pub max_trans_time: i32,
    /// Number of periods unrolled for vehicle scheduling.
    #[derivative(Default(value = "1"))]
    pub p_max: i32,
    /// Whether vehicles may drive empty between two different stops.
    #[derivative(Default(value = "true"))]
    pub vs_allow_empty_trips: bool,
    /// Whether all operated lines share one system frequency.
    pub use_system_frequency: bool,
    /// Whether link lower frequency bounds are enforced.
    pub check_lower_frequencies: bool,
    /// Whether link upper frequency bounds are enforced.
    pub check_upper_frequencies: bool,
    /// Whether transfers are only allowed at a minimal set of stops.
    pub restrict_transfer_stations: bool,
    /// Whether the routing is pruned by shortest path bounds.
    pub use_preprocessing: bool,
    /// Whether pairs without OD events travel on fixed paths in line planning models.
    pub add_fix_passenger_paths: bool,
    /// Whether pairs without OD events travel on fixed paths in timetabling models.
    pub tim_pass_fix_passengers: bool,
    /// Relative MIP gap at which the solver stops.
    pub mip_gap: f64,
    /// Seconds, negative for no limit.
    #[derivative(Default(value = "-1"))]
    pub time_limit: i32,
    /// Negative to let the solver decide.
    #[derivative(Default(value = "-1"))]
    pub n_threads: i32,
    /// Whether the model is written in LP format before solving.
    pub write_lp_output: bool,
    /// Number of time slices `N` of the demand.
    #[derivative(Default(value = "1"))]
    pub number_of_time_slices: u32,
    /// Number of OD pairs routed in the models, by decreasing demand.
    /// Negative to route every pair.
    #[derivative(Default(value = "-1"))]
    pub routed_od_pairs: i32,
    /// Start of the aperiodic horizon, in time units.
    pub ean_earliest_time: i32,
    /// Depot stop, negative if vehicles start anywhere at no cost.
    #[derivative(Default(value = "-1"))]
    pub vs_depot_index: i32,
    /// Minimal turnaround time at a stop, in time units.
    pub vs_turn_over_time: i32,
    /// Spanning tree of the cycle base.
    pub cycle_base_spanning_tree: SpanningTreeStrategy,
    /// Read walking edges from columns 1, 2, 3 and 5 instead of 1 to 4.
    #[derivative(Default(value = "true"))]
    pub walking_edge_skip_column: bool,
    /// Verbosity of the solver, 0 for silent.
    #[derivative(Default(value = "1"))]
    pub solver_output_level: i32,
    /// Cost model of lines without an explicit cost.
    pub line_costs: LineCostModel,
    /// Dataset file names.
    pub files: FileNames,
}

fn read_or<T>(
    config: &Config,
    key: &str,
    default: T,
    getter: fn(&Config, &str) -> Result<T>,
) -> Result<T> {
    if config.contains(key) {
        getter(config, key)
    } else {
        Ok(default)
    }
}

impl Parameters {
    /// Builds the parameters from a configuration. Undefined keys keep
    /// their default; ill-typed values are errors.
    pub fn from_config(config: &Config) -> Result<Self> {
        let d = Parameters::default();
        let int = Config::get_integer;
        let double = Config::get_double;
        let boolean = Config::get_boolean;
        let period_length = read_or(config, "period_length", d.period_length, int)?;
        let min_wait_time = read_or(config, "min_wait_time", d.min_wait_time, int)?;
        let min_trans_time = read_or(config, "min_trans_time", d.min_trans_time, int)?;
        let strategy = match config.get_string("cycle_base_spanning_tree") {
            Ok(value) => value.parse()?,
            Err(_) => d.cycle_base_spanning_tree,
        };
        let file = |key: &str, default: &PathBuf| -> PathBuf {
            config
                .get_string(key)
                .map(PathBuf::from)
                .unwrap_or_else(|_| default.clone())
        };
        let f = &d.files;
        let files = FileNames {
            stops: file("default_stops_file", &f.stops),
            links: file("default_edges_file", &f.links),
            loads: file("default_loads_file", &f.loads),
            headways: file("default_headways_file", &f.headways),
            walking_edges: file("default_walking_edges_file", &f.walking_edges),
            pool: file("default_pool_file", &f.pool),
            pool_cost: file("default_pool_cost_file", &f.pool_cost),
            od: file("default_od_file", &f.od),
            line_concept: file("default_lines_file", &f.line_concept),
            periodic_events: file("default_events_periodic_file", &f.periodic_events),
            periodic_activities: file(
                "default_activities_periodic_file",
                &f.periodic_activities,
            ),
            periodic_timetable: file("default_timetable_periodic_file", &f.periodic_timetable),
            aperiodic_events: file("default_events_expanded_file", &f.aperiodic_events),
            aperiodic_activities: file(
                "default_activities_expanded_file",
                &f.aperiodic_activities,
            ),
            aperiodic_timetable: file("default_timetable_expanded_file", &f.aperiodic_timetable),
            vehicle_schedule: file("default_vehicle_schedule_file", &f.vehicle_schedule),
            trips: file("default_trips_file", &f.trips),
            end_events: file("default_end_events_file", &f.end_events),
            solver_statistic: file("default_statistic_file", &f.solver_statistic),
            objectives: file("default_objectives_file", &f.objectives),
            lp_output: file("default_lp_output_file", &f.lp_output),
            iis_output: file("default_iis_output_file", &f.iis_output),
        };
        let parameters = Parameters {
            period_length,
            time_units_per_minute: read_or(
                config,
                "time_units_per_minute",
                d.time_units_per_minute,
                int,
            )?,
            ptn_is_undirected: read_or(config, "ptn_is_undirected", d.ptn_is_undirected, boolean)?,
            factor_travel_time: read_or(config, "factor_travel_time", d.factor_travel_time, double)?,
            factor_drive_time: read_or(config, "factor_drive_time", d.factor_drive_time, double)?,
            factor_wait_time: read_or(config, "factor_wait_time", d.factor_wait_time, double)?,
            factor_transfer_time: read_or(
                config,
                "factor_transfer_time",
                d.factor_transfer_time,
                double,
            )?,
            transfer_penalty: read_or(config, "transfer_penalty", d.transfer_penalty, double)?,
            factor_penalty_time_slice: read_or(
                config,
                "factor_penalty_time_slice",
                d.factor_penalty_time_slice,
                double,
            )?,
            factor_line_length: read_or(config, "factor_line_length", d.factor_line_length, double)?,
            factor_line_cost: read_or(config, "factor_line_cost", d.factor_line_cost, double)?,
            factor_drive_time_unweighted: read_or(
                config,
                "factor_drive_time_unweighted",
                d.factor_drive_time_unweighted,
                double,
            )?,
            factor_turn_around_time: read_or(
                config,
                "factor_turn_around_time",
                d.factor_turn_around_time,
                double,
            )?,
            factor_turn_around_distance: read_or(
                config,
                "factor_turn_around_distance",
                d.factor_turn_around_distance,
                double,
            )?,
            factor_vehicles: read_or(config, "factor_vehicles", d.factor_vehicles, double)?,
            min_wait_time,
            max_wait_time: read_or(
                config,
                "max_wait_time",
                min_wait_time + period_length - 1,
                int,
            )?,
            min_trans_time,
            max_trans_time: read_or(
                config,
                "max_trans_time",
                min_trans_time + period_length - 1,
                int,
            )?,
            p_max: read_or(config, "p_max", d.p_max, int)?,
            vs_allow_empty_trips: read_or(
                config,
                "vs_allow_empty_trips",
                d.vs_allow_empty_trips,
                boolean,
            )?,
            use_system_frequency: read_or(
                config,
                "use_system_frequency",
                d.use_system_frequency,
                boolean,
            )?,
            check_lower_frequencies: read_or(
                config,
                "check_lower_frequencies",
                d.check_lower_frequencies,
                boolean,
            )?,
            check_upper_frequencies: read_or(
                config,
                "check_upper_frequencies",
                d.check_upper_frequencies,
                boolean,
            )?,
            restrict_transfer_stations: read_or(
                config,
                "restrict_transfer_stations",
                d.restrict_transfer_stations,
                boolean,
            )?,
            use_preprocessing: read_or(config, "use_preprocessing", d.use_preprocessing, boolean)?,
            add_fix_passenger_paths: read_or(
                config,
                "add_fix_passenger_paths",
                d.add_fix_passenger_paths,
                boolean,
            )?,
            tim_pass_fix_passengers: read_or(
                config,
                "tim_pass_fix_passengers",
                d.tim_pass_fix_passengers,
                boolean,
            )?,
            mip_gap: read_or(config, "mip_gap", d.mip_gap, double)?,
            time_limit: read_or(config, "time_limit", d.time_limit, int)?,
            n_threads: read_or(config, "n_threads", d.n_threads, int)?,
            write_lp_output: read_or(config, "write_lp_output", d.write_lp_output, boolean)?,
            number_of_time_slices: read_or(
                config,
                "number_of_time_slices",
                d.number_of_time_slices as i32,
                int,
            )?
            .max(1) as u32,
            routed_od_pairs: read_or(config, "routed_od_pairs", d.routed_od_pairs, int)?,
            ean_earliest_time: read_or(config, "ean_earliest_time", d.ean_earliest_time, int)?,
            vs_depot_index: read_or(config, "vs_depot_index", d.vs_depot_index, int)?,
            vs_turn_over_time: read_or(config, "vs_turn_over_time", d.vs_turn_over_time, int)?,
            cycle_base_spanning_tree: strategy,
            walking_edge_skip_column: read_or(
                config,
                "walking_edge_skip_column",
                d.walking_edge_skip_column,
                boolean,
            )?,
            solver_output_level: read_or(
                config,
                "solver_output_level",
                d.solver_output_level,
                int,
            )?,
            line_costs: LineCostModel {
                fixed: read_or(config, "lpool_costs_fixed", 0.0, double)?,
                per_length: read_or(config, "lpool_costs_length", 0.0, double)?,
                per_link: read_or(config, "lpool_costs_edges", 0.0, double)?,
            },
            files,
        };
        parameters.check_time_slices()?;
        Ok(parameters)
    }

    /// Checks that the period splits into whole time slices.
    pub fn check_time_slices(&self) -> Result<()> {
        let slices = self.number_of_time_slices.max(1) as i32;
        if self.period_length % slices != 0 {
            bail!(LinTimError::DataInconsistent(format!(
                "period length {} cannot be split into {} time slices",
                self.period_length, slices
            )));
        }
        Ok(())
    }

    /// Length of one time slice, `T / N`.
    pub fn time_slice_length(&self) -> i32 {
        self.period_length / self.number_of_time_slices.max(1) as i32
    }

    /// Converts a duration in time units to seconds.
    pub fn to_seconds(&self, time_units: i64) -> i64 {
        time_units * 60 / i64::from(self.time_units_per_minute.max(1))
    }

    /// Converts seconds to time units, rounding down.
    pub fn from_seconds(&self, seconds: i64) -> i64 {
        (seconds * i64::from(self.time_units_per_minute.max(1))).div_euclid(60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::create_file_with_content;
    use pretty_assertions::assert_eq;
    use tempfile::TempDir;

    #[test]
    fn read_config_with_includes() {
        let dir = TempDir::new().unwrap();
        create_file_with_content(
            dir.path(),
            "Global.cnf",
            "# global\nperiod_length; 10\nmin_wait_time; 2\nptn_is_undirected; false\n",
        );
        create_file_with_content(
            dir.path(),
            "Config.cnf",
            "include; \"Global.cnf\"\ninclude_if_exists; \"Private.cnf\"\nmin_wait_time; 1\nfactor_line_cost; 2.5\ndefault_od_file; \"basis/Demand.giv\"\n",
        );
        let config = Config::from_file(dir.path().join("Config.cnf")).unwrap();
        assert_eq!(10, config.get_integer("period_length").unwrap());
        assert_eq!(1, config.get_integer("min_wait_time").unwrap());

        let parameters = Parameters::from_config(&config).unwrap();
        assert_eq!(10, parameters.period_length);
        assert_eq!(1, parameters.min_wait_time);
        assert_eq!(10, parameters.max_wait_time);
        assert_eq!(12, parameters.max_trans_time);
        assert!(!parameters.ptn_is_undirected);
        assert_eq!(2.5, parameters.factor_line_cost);
        assert_eq!(PathBuf::from("basis/Demand.giv"), parameters.files.od);
        assert_eq!(PathBuf::from("basis/Stop.giv"), parameters.files.stops);
    }

    #[test]
    fn typed_errors() {
        let mut config = Config::new();
        config.set("p_max", "two");
        config.set("use_preprocessing", "yes");
        let err = config.get_integer("p_max").unwrap_err();
        assert_eq!(
            Some(&LinTimError::ConfigTypeMismatch {
                key: "p_max".to_string(),
                value: "two".to_string(),
                expected: "integer"
            }),
            err.downcast_ref::<LinTimError>()
        );
        assert!(config.get_boolean("use_preprocessing").is_err());
        let err = config.get_double("missing").unwrap_err();
        assert_eq!(
            Some(&LinTimError::ConfigKeyNotFound("missing".to_string())),
            err.downcast_ref::<LinTimError>()
        );
        assert!(Parameters::from_config(&config).is_err());
    }

    #[test]
    fn time_slices_split_the_period() {
        let mut config = Config::new();
        config.set("period_length", "60");
        config.set("number_of_time_slices", "4");
        let parameters = Parameters::from_config(&config).unwrap();
        assert_eq!(15, parameters.time_slice_length());

        config.set("number_of_time_slices", "7");
        let err = Parameters::from_config(&config).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<LinTimError>(),
            Some(LinTimError::DataInconsistent(_))
        ));
    }

    #[test]
    fn unit_conversion() {
        let parameters = Parameters {
            time_units_per_minute: 2,
            ..Default::default()
        };
        assert_eq!(90, parameters.to_seconds(3));
        assert_eq!(3, parameters.from_seconds(90));
    }
}
