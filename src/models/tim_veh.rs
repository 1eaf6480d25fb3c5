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

//! Periodic timetabling with vehicle scheduling on a fixed line concept.
//! Passengers stay on the activities they were assigned to in the EAN.

use super::{check_line_events, require_turnarounds, Features, ModelInput};
use crate::{ean::ActivityType, preprocessing::FixedLoad, Result};

pub(super) const FEATURES: Features = Features {
    line_planning: false,
    routing: false,
    vehicles: true,
    cycle_base: false,
};

pub(super) fn validate(input: &ModelInput) -> Result<()> {
    require_turnarounds(input)?;
    check_line_events(input)
}

/// Passengers read from the drive, wait and change activities of the EAN.
pub(super) fn fixed_loads(input: &ModelInput) -> Result<Vec<FixedLoad>> {
    Ok(input
        .ean
        .edges()
        .filter(|a| a.activity_type.is_line_internal() || a.activity_type == ActivityType::Change)
        .filter(|a| a.passengers > 0.0)
        .map(|a| FixedLoad::on(a.id, a.passengers))
        .collect())
}
