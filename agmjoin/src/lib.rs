/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Worst-case optimal multi-way equality joins.
//!
//! Queries are planned against AGM bounds (`cost`), split into connected
//! components (`hypergraph`), searched by one of several strategies
//! (`optimizer`) and executed over range tables (`execution`).

pub mod config;
pub mod cost;
pub mod error;
pub mod execution;
pub mod hypergraph;
pub mod optimizer;
pub mod order;
pub mod plan;
pub mod query_engine;
pub mod utils;

pub use config::{JoinConfig, Strategy};
pub use error::{JoinError, Result};
pub use execution::{JoinEngine, JoinOutput};
pub use optimizer::build_plan;
pub use order::VariableOrder;
pub use plan::PlanNode;
pub use query_engine::{JoinReport, PlanSummary, QueryEngine};
