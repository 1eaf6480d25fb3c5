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

use anyhow::bail;
use clap::Parser;
use lintim_core::{
    ean::build_periodic_ean,
    lines::LinePool,
    lintim_csv::Dataset,
    models::{ModelInput, ModelType, PlanningModel},
    preprocessing::potential_transfer_stations,
    turnaround::PtnTurnarounds,
    Config, LinTimError, Parameters, Result,
};
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{
    filter::{EnvFilter, LevelFilter},
    layer::SubscriberExt as _,
    util::SubscriberInitExt as _,
};

#[derive(Debug, Parser)]
#[command(
    name = "lintim-solve",
    about = "Solve an integrated planning model on a LinTim dataset.",
    version
)]
struct Opt {
    /// Dataset directory.
    #[arg(short = 'd', long = "dataset", default_value = ".")]
    dataset: PathBuf,

    /// Model to solve: tim-pass, tim-pass-cycle, tim-veh, lin-tim-pass or
    /// lin-tim-pass-veh.
    #[arg(short = 'm', long = "model")]
    model: ModelType,

    /// Configuration file, `basis/Config.cnf` of the dataset by default.
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Write the MIP in LP format before solving.
    #[arg(long)]
    write_lp: bool,
}

fn init_logger() {
    let default_level = LevelFilter::INFO;
    let rust_log =
        std::env::var(EnvFilter::DEFAULT_ENV).unwrap_or_else(|_| default_level.to_string());
    let env_filter_subscriber = EnvFilter::try_new(rust_log).unwrap_or_else(|e| {
        eprintln!(
            "invalid {}, falling back to level '{}' - {}",
            EnvFilter::DEFAULT_ENV,
            default_level,
            e,
        );
        EnvFilter::new(default_level.to_string())
    });
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(env_filter_subscriber)
        .init();
}

fn read_parameters(dataset: &Path, config: Option<PathBuf>) -> Result<Parameters> {
    let default_config = dataset.join("basis/Config.cnf");
    let config = match config {
        Some(path) => Config::from_file(path)?,
        None if default_config.exists() => Config::from_file(default_config)?,
        None => {
            warn!("No configuration found, using default parameters");
            Config::new()
        }
    };
    Parameters::from_config(&config)
}

fn run(opt: Opt) -> Result<()> {
    info!("Launching lintim-solve...");

    let parameters = read_parameters(&opt.dataset, opt.config)?;
    let dataset = Dataset::new(&opt.dataset, parameters.clone());
    let ptn = dataset.read_ptn()?;
    let features = opt.model.features();
    let lines: LinePool = if features.line_planning {
        dataset.read_line_pool(&ptn)?
    } else {
        let (pool, concept) = dataset.read_line_concept(&ptn)?;
        pool.with_frequencies(&concept)?
    };
    if lines.is_empty() {
        bail!(LinTimError::DataInconsistent("no line to plan".to_string()));
    }
    let od = dataset.read_od()?;
    let (routed, fixed) = od.active_pairs(parameters.routed_od_pairs);
    info!("{} OD pairs routed, {} fixed", routed.len(), fixed.len());

    let transfer_stations = if parameters.restrict_transfer_stations {
        Some(potential_transfer_stations(&lines, &parameters)?)
    } else {
        None
    };
    let ean = build_periodic_ean(
        &ptn,
        &lines,
        &routed,
        transfer_stations.as_ref(),
        &parameters,
    )?;

    let turnarounds = if features.vehicles {
        Some(PtnTurnarounds::new(&ptn, &parameters)?)
    } else {
        None
    };
    let mut input = ModelInput::new(&ptn, &lines, &ean, &od, &parameters);
    if let Some(turnarounds) = &turnarounds {
        input = input.with_turnarounds(turnarounds);
    }

    let mut model = PlanningModel::new(opt.model, input)?;
    if opt.write_lp || parameters.write_lp_output {
        model.write_lp(dataset.path(&parameters.files.lp_output))?;
    }
    model.set_iis_output(dataset.path(&parameters.files.iis_output));
    let status = model.solve()?;
    if model.solution().is_none() {
        bail!(LinTimError::StoppingCriterion(status.to_string()));
    }
    model.write_output(&dataset)
}

fn main() {
    init_logger();
    if let Err(err) = run(Opt::parse()) {
        for cause in err.chain() {
            eprintln!("{cause}");
        }
        std::process::exit(1);
    }
}
