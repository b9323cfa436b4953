/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Generic join execution over range tables
//!
//! - `range_table`: the per-relation row range representation of partial results
//! - `engine`: plan interpretation and the join operators

pub mod engine;
pub mod range_table;

pub use engine::{ExecutionLimits, JoinEngine, JoinOutput};
pub use range_table::{MixedRadix, RangeTable, RowRange};
