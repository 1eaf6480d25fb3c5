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

//! Mixed-integer programs deciding timetables, passenger routes, lines and
//! vehicle schedules on a periodic EAN.
//!
//! Every model is assembled from the same blocks, added in this order:
//! line planning (frequencies of the lines), periodic timetabling, passenger
//! routing, fixed passenger loads and vehicle scheduling. A [`ModelType`]
//! selects the blocks through its [`Features`].
//!
//! ```no_run
//! # use lintim_core::{lintim_csv::Dataset, models::*, ean::build_periodic_ean, Parameters};
//! # fn main() -> lintim_core::Result<()> {
//! let dataset = Dataset::new("dataset", Parameters::default());
//! let ptn = dataset.read_ptn()?;
//! let lines = dataset.read_line_pool(&ptn)?;
//! let od = dataset.read_od()?;
//! let (active, _) = od.active_pairs(-1);
//! let ean = build_periodic_ean(&ptn, &lines, &active, None, dataset.parameters())?;
//! let input = ModelInput::new(&ptn, &lines, &ean, &od, dataset.parameters());
//! let mut model = PlanningModel::new(ModelType::LinTimPass, input)?;
//! model.solve()?;
//! model.write_output(&dataset)?;
//! # Ok(())
//! # }
//! ```

mod lin_tim_pass;
mod lin_tim_pass_veh;
mod line_planning;
mod routing;
mod tim_pass;
mod tim_pass_cycle;
mod tim_veh;
mod timetabling;
mod vehicles;

use self::{
    line_planning::LinePlanning,
    routing::{FixedPassengers, Routing},
    timetabling::Timetabling,
    vehicles::Vehicles,
};
use crate::{
    aperiodic,
    ean::{line_event_sequences, EventKind, PeriodicActivity, PeriodicEan},
    error::LinTimError,
    lines::{LineKey, LinePool},
    lintim_csv::Dataset,
    od::OdMatrix,
    preprocessing::FixedLoad,
    ptn::Ptn,
    solver::{self, DoubleAttribute, IntAttribute, LinearExpression, Model, ObjectiveSense, Status},
    statistic::{ObjectiveBreakdown, ObjectiveComponent, SolverStatistic},
    timetable::PeriodicTimetable,
    turnaround::TurnaroundLookup,
    vehicle_schedule::VehicleConnections,
    Parameters, Result,
};
use anyhow::bail;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::{info, warn};

/// Everything a planning model is built from.
#[derive(Clone, Copy)]
pub struct ModelInput<'a> {
    /// The network the lines run on.
    pub ptn: &'a Ptn,
    /// Candidate lines, or the line concept for the timetabling models.
    pub lines: &'a LinePool,
    /// Periodic EAN of `lines`, with the OD events of the routed pairs.
    pub ean: &'a PeriodicEan,
    /// Passenger demand.
    pub od: &'a OdMatrix,
    /// Weights, bounds and solver settings.
    pub parameters: &'a Parameters,
    /// Turnaround times and distances, needed by the vehicle models.
    pub turnarounds: Option<&'a dyn TurnaroundLookup>,
}

impl<'a> ModelInput<'a> {
    /// An input without turnaround lookup.
    pub fn new(
        ptn: &'a Ptn,
        lines: &'a LinePool,
        ean: &'a PeriodicEan,
        od: &'a OdMatrix,
        parameters: &'a Parameters,
    ) -> Self {
        ModelInput {
            ptn,
            lines,
            ean,
            od,
            parameters,
            turnarounds: None,
        }
    }

    /// Sets the turnaround lookup of the vehicle models.
    pub fn with_turnarounds(mut self, turnarounds: &'a dyn TurnaroundLookup) -> Self {
        self.turnarounds = Some(turnarounds);
        self
    }

    /// OD pairs with demand but no OD events in the EAN.
    fn inactive_pairs(&self) -> Vec<(i32, i32)> {
        let routed: BTreeSet<(i32, i32)> = self
            .ean
            .nodes()
            .filter_map(|e| match e.kind {
                EventKind::TargetOd {
                    origin,
                    destination,
                } => Some((origin, destination)),
                _ => None,
            })
            .collect();
        self.od
            .od_totals()
            .into_iter()
            .filter(|(pair, passengers)| *passengers > 0.0 && !routed.contains(pair))
            .map(|(pair, _)| pair)
            .collect()
    }
}

/// Blocks making up a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Features {
    /// Lines are chosen from the pool.
    pub line_planning: bool,
    /// Passengers of the OD events are routed.
    pub routing: bool,
    /// Vehicles are scheduled over `p_max` periods.
    pub vehicles: bool,
    /// The timetable is modelled with the tensions of a cycle base.
    pub cycle_base: bool,
}

/// The available models.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ModelType {
    /// Timetabling with passenger routing.
    TimPass,
    /// [`ModelType::TimPass`] in the cycle-base formulation.
    TimPassCycle,
    /// Timetabling with vehicle scheduling, passengers on fixed paths.
    TimVeh,
    /// Line planning, timetabling and passenger routing.
    LinTimPass,
    /// Line planning, timetabling, passenger routing and vehicle scheduling.
    LinTimPassVeh,
}

impl ModelType {
    /// Every model.
    pub const ALL: [ModelType; 5] = [
        ModelType::TimPass,
        ModelType::TimPassCycle,
        ModelType::TimVeh,
        ModelType::LinTimPass,
        ModelType::LinTimPassVeh,
    ];

    /// Command line name of the model.
    pub fn name(self) -> &'static str {
        match self {
            ModelType::TimPass => "tim-pass",
            ModelType::TimPassCycle => "tim-pass-cycle",
            ModelType::TimVeh => "tim-veh",
            ModelType::LinTimPass => "lin-tim-pass",
            ModelType::LinTimPassVeh => "lin-tim-pass-veh",
        }
    }

    /// Blocks of the model.
    pub fn features(self) -> Features {
        match self {
            ModelType::TimPass => tim_pass::FEATURES,
            ModelType::TimPassCycle => tim_pass_cycle::FEATURES,
            ModelType::TimVeh => tim_veh::FEATURES,
            ModelType::LinTimPass => lin_tim_pass::FEATURES,
            ModelType::LinTimPassVeh => lin_tim_pass_veh::FEATURES,
        }
    }

    /// Checks that `input` can be handled by the model.
    pub fn validate(self, input: &ModelInput) -> Result<()> {
        let parameters = input.parameters;
        if parameters.period_length <= 0 {
            bail!(LinTimError::DataInconsistent(format!(
                "period length {} is not positive",
                parameters.period_length
            )));
        }
        parameters.check_time_slices()?;
        match self {
            ModelType::TimPass => tim_pass::validate(input),
            ModelType::TimPassCycle => tim_pass_cycle::validate(input),
            ModelType::TimVeh => tim_veh::validate(input),
            ModelType::LinTimPass => lin_tim_pass::validate(input),
            ModelType::LinTimPassVeh => lin_tim_pass_veh::validate(input),
        }
    }

    /// Passengers which are not routed by the model.
    fn fixed_loads(self, input: &ModelInput) -> Result<Vec<FixedLoad>> {
        match self {
            ModelType::TimPass | ModelType::TimPassCycle => tim_pass::fixed_loads(input),
            ModelType::TimVeh => tim_veh::fixed_loads(input),
            ModelType::LinTimPass | ModelType::LinTimPassVeh => lin_tim_pass::fixed_loads(input),
        }
    }
}

impl fmt::Display for ModelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl FromStr for ModelType {
    type Err = LinTimError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();
        ModelType::ALL
            .iter()
            .copied()
            .find(|model| model.name().replace('-', "") == normalized)
            .ok_or_else(|| LinTimError::UnsupportedFeature(format!("model {s:?}")))
    }
}

/// Every lines' run in the EAN must belong to the pool and the other way
/// round.
fn check_line_events(input: &ModelInput) -> Result<()> {
    let runs = line_event_sequences(input.ean)?;
    for line in input.lines.lines() {
        if !runs.contains_key(&line.key()) {
            bail!(LinTimError::DataInconsistent(format!(
                "line {} has no event in the EAN",
                line.key()
            )));
        }
    }
    if let Some(key) = runs.keys().find(|key| input.lines.get(key).is_none()) {
        bail!(LinTimError::DataIndexNotFound {
            kind: "line",
            index: key.directed_id(),
        });
    }
    Ok(())
}

fn require_turnarounds<'a>(input: &ModelInput<'a>) -> Result<&'a dyn TurnaroundLookup> {
    match input.turnarounds {
        Some(turnarounds) => Ok(turnarounds),
        None => bail!(LinTimError::UnsupportedFeature(
            "vehicle scheduling without turnaround lookup".to_string()
        )),
    }
}

/// The objective, one expression per component.
#[derive(Debug, Default)]
struct Objectives {
    components: BTreeMap<ObjectiveComponent, LinearExpression>,
}

impl Objectives {
    fn component(&mut self, component: ObjectiveComponent) -> &mut LinearExpression {
        self.components.entry(component).or_default()
    }

    fn total(&self) -> LinearExpression {
        let mut total = LinearExpression::new();
        for expression in self.components.values() {
            total.multi_add(1.0, expression);
        }
        total
    }

    fn breakdown(&self, model: &Model) -> Result<ObjectiveBreakdown> {
        let mut breakdown = ObjectiveBreakdown::default();
        for (&component, expression) in &self.components {
            breakdown.set(component, model.evaluate(expression)?);
        }
        Ok(breakdown)
    }
}

/// What a solved model decided.
#[derive(Debug, Clone, PartialEq)]
pub struct ModelSolution {
    /// Solver status, [`Status::Optimal`] or [`Status::Feasible`].
    pub status: Status,
    /// Objective value.
    pub objective: f64,
    /// Relative MIP gap.
    pub gap: f64,
    /// Solve time in seconds.
    pub runtime: f64,
    /// Time of every network event.
    pub timetable: PeriodicTimetable,
    /// Passengers on every network activity, routed and fixed.
    pub activity_loads: BTreeMap<i32, f64>,
    /// Operated lines, every line when lines are not decided.
    pub used_lines: BTreeSet<LineKey>,
    /// Frequency of every line id, when lines are decided.
    pub line_concept: Option<BTreeMap<i32, u32>>,
    /// Time from the first departure to the last arrival of every line.
    pub durations: BTreeMap<LineKey, i64>,
    /// Activities used by each routed `(origin, destination, time slice)`,
    /// in travel order.
    pub routes: BTreeMap<(i32, i32, u32), Vec<i32>>,
    /// Runs served in a row by the vehicles, when scheduled.
    pub vehicle_connections: Option<VehicleConnections>,
    /// Value of every objective component.
    pub objectives: ObjectiveBreakdown,
}

impl ModelSolution {
    /// Network events and activities of the operated lines, activities
    /// carrying their passengers.
    pub fn operated_ean(&self, ean: &PeriodicEan) -> Result<PeriodicEan> {
        let mut operated = PeriodicEan::new(true);
        for event in ean.nodes() {
            if event.line().map_or(false, |l| self.used_lines.contains(&l)) {
                operated.add_node(event.clone())?;
            }
        }
        for activity in ean.edges().filter(|a| a.activity_type.is_network()) {
            if operated.node(activity.tail).is_none() || operated.node(activity.head).is_none() {
                continue;
            }
            let mut activity = activity.clone();
            activity.passengers = self.activity_loads.get(&activity.id).copied().unwrap_or(0.0);
            operated.add_edge(activity)?;
        }
        let mut event_loads: BTreeMap<i32, f64> = BTreeMap::new();
        for activity in operated.edges().filter(|a| a.activity_type.is_line_internal()) {
            *event_loads.entry(activity.tail).or_insert(0.0) += activity.passengers;
        }
        for event in operated.nodes_mut() {
            event.passengers = event_loads.get(&event.id).copied().unwrap_or(0.0);
        }
        Ok(operated)
    }
}

/// A model built from a [`ModelInput`], solved and written out.
pub struct PlanningModel<'a> {
    model_type: ModelType,
    input: ModelInput<'a>,
    model: Model,
    lines: Option<LinePlanning>,
    timetable: Timetabling,
    routing: Option<Routing>,
    fixed: FixedPassengers,
    vehicles: Option<Vehicles>,
    objectives: Objectives,
    iis_output: Option<PathBuf>,
    solution: Option<ModelSolution>,
}

impl<'a> PlanningModel<'a> {
    /// Validates the input and builds the variables, constraints and
    /// objective of the model.
    pub fn new(model_type: ModelType, input: ModelInput<'a>) -> Result<Self> {
        model_type.validate(&input)?;
        let features = model_type.features();
        info!("Building model {}...", model_type);
        let mut model = Model::new(model_type.name());
        let mut objectives = Objectives::default();
        let lines = if features.line_planning {
            Some(LinePlanning::build(&mut model, &input, &mut objectives)?)
        } else {
            None
        };
        let timetable = Timetabling::build(&mut model, &input, lines.as_ref(), features.cycle_base)?;
        let routing = if features.routing {
            Some(Routing::build(
                &mut model,
                &input,
                &timetable,
                lines.as_ref(),
                &mut objectives,
            )?)
        } else {
            None
        };
        let fixed_loads = model_type.fixed_loads(&input)?;
        let fixed = routing::add_fixed_loads(
            &mut model,
            &input,
            fixed_loads,
            &timetable,
            lines.as_ref(),
            &mut objectives,
        )?;
        let vehicles = if features.vehicles {
            Some(Vehicles::build(
                &mut model,
                &input,
                &timetable,
                lines.as_ref(),
                &mut objectives,
            )?)
        } else {
            None
        };
        model.set_objective(objectives.total(), ObjectiveSense::Minimize);
        info!(
            "Model {} has {} variables and {} constraints",
            model_type,
            model.get_int_attribute(IntAttribute::NumVariables)?,
            model.get_int_attribute(IntAttribute::NumConstraints)?
        );
        Ok(PlanningModel {
            model_type,
            input,
            model,
            lines,
            timetable,
            routing,
            fixed,
            vehicles,
            objectives,
            iis_output: None,
            solution: None,
        })
    }

    /// Which model this is.
    pub fn model_type(&self) -> ModelType {
        self.model_type
    }

    /// The underlying MIP.
    pub fn model(&self) -> &Model {
        &self.model
    }

    /// Where to write an irreducible infeasible subsystem when the model
    /// turns out infeasible.
    pub fn set_iis_output<P: AsRef<Path>>(&mut self, path: P) {
        self.iis_output = Some(path.as_ref().to_path_buf());
    }

    /// Writes the MIP in LP format.
    pub fn write_lp<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        self.model.write(path)
    }

    /// Solves the model and extracts the solution when there is one.
    pub fn solve(&mut self) -> Result<Status> {
        solver::apply_parameters(&mut self.model, self.input.parameters);
        info!("Solving model {}...", self.model_type);
        let status = self.model.solve()?;
        self.solution = None;
        if status.has_solution() {
            let solution = self.extract(status)?;
            info!(
                "Model {} solved: {}, objective {}",
                self.model_type, status, solution.objective
            );
            self.solution = Some(solution);
        } else if status == Status::Infeasible {
            warn!("Model {} is infeasible", self.model_type);
            if let Some(path) = &self.iis_output {
                let constraints = self.model.compute_iis(path)?;
                warn!("{} constraints in the IIS", constraints.len());
            }
        } else {
            warn!("Model {} has no solution: {}", self.model_type, status);
        }
        Ok(status)
    }

    /// The solution of the last successful solve.
    pub fn solution(&self) -> Option<&ModelSolution> {
        self.solution.as_ref()
    }

    fn extract(&self, status: Status) -> Result<ModelSolution> {
        let parameters = self.input.parameters;
        let timetable = self.timetable.extract(&self.model, parameters)?;
        let (used_lines, line_concept) = match &self.lines {
            Some(lines) => {
                let used = lines.used_lines(&self.model)?;
                let concept = lines.line_concept(self.input.lines, &used);
                (used, Some(concept))
            }
            None => (self.input.lines.lines().map(|l| l.key()).collect(), None),
        };
        let (mut activity_loads, routes) = match &self.routing {
            Some(routing) => routing.extract(&self.model, self.input.ean)?,
            None => Default::default(),
        };
        for (activity, load) in self.fixed.extract(&self.model)? {
            *activity_loads.entry(activity).or_insert(0.0) += load;
        }
        let mut durations = BTreeMap::new();
        let internal: BTreeMap<(i32, i32), &PeriodicActivity> = self
            .input
            .ean
            .edges()
            .filter(|a| a.activity_type.is_line_internal())
            .map(|a| ((a.tail, a.head), a))
            .collect();
        for (line, run) in line_event_sequences(self.input.ean)? {
            let mut duration = 0;
            for pair in run.windows(2) {
                if let Some(activity) = internal.get(&(pair[0], pair[1])) {
                    duration += timetable.duration(activity)?;
                }
            }
            durations.insert(line, duration);
        }
        let vehicle_connections = match &self.vehicles {
            Some(vehicles) => Some(vehicles.extract(&self.model)?),
            None => None,
        };
        Ok(ModelSolution {
            status,
            objective: self.model.get_double_attribute(DoubleAttribute::ObjectiveValue)?,
            gap: self.model.get_double_attribute(DoubleAttribute::MipGap)?,
            runtime: self.model.get_double_attribute(DoubleAttribute::Runtime)?,
            timetable,
            activity_loads,
            used_lines,
            line_concept,
            durations,
            routes,
            vehicle_connections,
            objectives: self.objectives.breakdown(&self.model)?,
        })
    }

    /// Writes every artifact of the solution into `dataset`: the periodic
    /// EAN of the operated lines and its timetable, the line concept, the
    /// statistics, the aperiodic EAN and timetable and the vehicle
    /// schedule.
    pub fn write_output(&self, dataset: &Dataset) -> Result<()> {
        let solution = match &self.solution {
            Some(solution) => solution,
            None => bail!(LinTimError::StoppingCriterion(format!(
                "model {} has no solution to write",
                self.model_type
            ))),
        };
        let files = &dataset.parameters().files;
        let ean = solution.operated_ean(self.input.ean)?;
        let mut timetable = PeriodicTimetable::new(
            solution.timetable.period(),
            solution.timetable.time_units_per_minute(),
        );
        for event in ean.nodes() {
            timetable.set(event.id, i64::from(solution.timetable.time(event.id)?));
        }
        timetable.check_feasibility(&ean)?;
        dataset.write_periodic_ean(&ean)?;
        dataset.write_periodic_timetable(&timetable)?;
        if let Some(concept) = &solution.line_concept {
            dataset.write_line_concept(self.input.lines, concept)?;
        }
        SolverStatistic {
            solver_time: solution.runtime,
            gap: solution.gap,
            objective: solution.objective,
        }
        .write(dataset.path(&files.solver_statistic))?;
        solution.objectives.write(dataset.path(&files.objectives))?;

        let expansion = aperiodic::expand(&ean, &timetable, self.input.parameters)?;
        dataset.write_aperiodic_ean(&expansion.ean)?;
        dataset.write_aperiodic_timetable(&expansion.timetable)?;
        if let Some(connections) = &solution.vehicle_connections {
            let schedule = expansion.vehicle_schedule(connections)?;
            dataset.write_vehicle_schedule(&schedule)?;
            dataset.write_trips(&schedule)?;
            dataset.write_end_events(&schedule)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        ean::build_periodic_ean,
        test_utils::{line_ptn, od_matrix, scenario_a_parameters, single_line_pool, test_in_tmp_dir},
    };
    use pretty_assertions::assert_eq;

    #[test]
    fn model_names() {
        assert_eq!(ModelType::LinTimPassVeh, "lin-tim-pass-veh".parse().unwrap());
        assert_eq!(ModelType::TimPassCycle, "TIM_PASS_CYCLE".parse().unwrap());
        assert_eq!(ModelType::TimVeh, "timveh".parse().unwrap());
        assert_eq!(
            LinTimError::UnsupportedFeature("model \"tim\"".to_string()),
            "tim".parse::<ModelType>().unwrap_err()
        );
        for model in ModelType::ALL {
            assert_eq!(model, model.to_string().parse().unwrap());
        }
    }

    #[test]
    fn feature_matrix() {
        let with = |f: fn(Features) -> bool| {
            ModelType::ALL
                .iter()
                .filter(|m| f(m.features()))
                .map(|m| m.name())
                .collect::<Vec<_>>()
        };
        assert_eq!(vec!["lin-tim-pass", "lin-tim-pass-veh"], with(|f| f.line_planning));
        assert_eq!(vec!["tim-veh", "lin-tim-pass-veh"], with(|f| f.vehicles));
        assert_eq!(vec!["tim-pass-cycle"], with(|f| f.cycle_base));
        assert_eq!(4, with(|f| f.routing).len());
    }

    #[test]
    fn non_positive_period() {
        let ptn = line_ptn(true);
        let pool = single_line_pool(&ptn);
        let od = od_matrix(&[]);
        let parameters = Parameters {
            period_length: 0,
            ..scenario_a_parameters()
        };
        let ean = build_periodic_ean(&ptn, &pool, &[], None, &scenario_a_parameters()).unwrap();
        let input = ModelInput::new(&ptn, &pool, &ean, &od, &parameters);
        assert!(PlanningModel::new(ModelType::TimPass, input).is_err());
    }

    #[test]
    fn inactive_pairs_have_no_od_events() {
        let ptn = line_ptn(true);
        let pool = single_line_pool(&ptn);
        let od = od_matrix(&[(1, 3, 7.0), (1, 2, 3.0), (2, 2, 1.0)]);
        let parameters = scenario_a_parameters();
        let ean = build_periodic_ean(&ptn, &pool, &[(1, 3)], None, &parameters).unwrap();
        let input = ModelInput::new(&ptn, &pool, &ean, &od, &parameters);
        assert_eq!(vec![(1, 2)], input.inactive_pairs());
    }

    #[test]
    fn no_output_without_solution() {
        test_in_tmp_dir(|path| {
            let ptn = line_ptn(true);
            let pool = single_line_pool(&ptn);
            let od = od_matrix(&[]);
            let parameters = scenario_a_parameters();
            let ean = build_periodic_ean(&ptn, &pool, &[], None, &parameters).unwrap();
            let input = ModelInput::new(&ptn, &pool, &ean, &od, &parameters);
            let model = PlanningModel::new(ModelType::TimPass, input).unwrap();
            let dataset = Dataset::new(path, parameters.clone());
            let error = model.write_output(&dataset).unwrap_err();
            assert!(matches!(
                error.downcast_ref::<LinTimError>(),
                Some(LinTimError::StoppingCriterion(_))
            ));
        });
    }
}
