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

//! [`super::ModelType::TimPass`] with the tensions of a cycle base as
//! timetable variables.

use super::{tim_pass, Features, ModelInput};
use crate::{error::LinTimError, Result};
use anyhow::bail;

pub(super) const FEATURES: Features = Features {
    line_planning: false,
    routing: true,
    vehicles: false,
    cycle_base: true,
};

pub(super) fn validate(input: &ModelInput) -> Result<()> {
    tim_pass::validate(input)?;
    // time slices need event times
    if input.parameters.number_of_time_slices > 1 {
        bail!(LinTimError::UnsupportedFeature(format!(
            "{} time slices in the cycle-base formulation",
            input.parameters.number_of_time_slices
        )));
    }
    Ok(())
}
