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

//! Reductions computed before building the models: the network parts that
//! may carry an optimal passenger path, the loads of the passengers which
//! are not routed by the models, and the stops where transfers are allowed.

pub mod ean;
pub mod ptn;
pub mod transfer_stations;

pub use self::ean::{ean_candidates, fixed_loads, EanCandidates, FixedLoads};
pub use self::ptn::{od_candidates, FixedLoad, FixedPassengerWeights, PtnBounds};
pub use self::transfer_stations::potential_transfer_stations;
