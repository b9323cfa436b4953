/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::config::JoinConfig;
use crate::error::Result;
use crate::execution::{JoinEngine, JoinOutput};
use crate::optimizer::build_plan;
use crate::order::VariableOrder;
use crate::plan::PlanNode;
use crate::utils::Timer;
use log::{debug, info};
use relstore::{Relation, RelationSchema, RelationStats};
use std::time::Duration;

/// Outcome of planning a query from statistics alone.
#[derive(Debug, Clone)]
pub struct PlanSummary {
    pub plan: PlanNode,
    pub variable_order: VariableOrder,
    pub optimize_time: Duration,
}

/// Everything a full run produces.
#[derive(Debug)]
pub struct JoinReport {
    pub cardinality: usize,
    pub variable_order: VariableOrder,
    pub plan: PlanNode,
    pub output: JoinOutput,
    pub optimize_time: Duration,
    pub sort_time: Duration,
    pub join_time: Duration,
    pub total_time: Duration,
}

impl JoinReport {
    /// Number of query attributes the plan binds.
    pub fn attribute_count(&self) -> usize {
        self.variable_order.len()
    }
}

/// Plans, sorts and joins relations under one configuration.
pub struct QueryEngine {
    config: JoinConfig,
}

impl QueryEngine {
    pub fn new(config: JoinConfig) -> Result<Self> {
        config.validate()?;
        Ok(QueryEngine { config })
    }

    pub fn config(&self) -> &JoinConfig {
        &self.config
    }

    pub fn plan<R: RelationSchema + Sync>(
        &self,
        relations: &[R],
        attributes: &[String],
    ) -> Result<(PlanNode, VariableOrder)> {
        build_plan(relations, attributes, &self.config)
    }

    /// Plans against statistics without touching any tuple data.
    pub fn plan_only(&self, stats: &[RelationStats], attributes: &[String]) -> Result<PlanSummary> {
        let mut timer = Timer::new();
        let (plan, variable_order) = self.plan(stats, attributes)?;
        let optimize_time = timer.lap("opt");
        debug!(
            "planned {} relations / {} attributes in {:.6}s",
            stats.len(),
            attributes.len(),
            optimize_time.as_secs_f64()
        );
        Ok(PlanSummary {
            plan,
            variable_order,
            optimize_time,
        })
    }

    /// Runs the whole pipeline. `relations` are re-sorted in place by the chosen variable order.
    pub fn run(&self, relations: &mut [Relation], attributes: &[String]) -> Result<JoinReport> {
        let mut timer = Timer::new();

        let (plan, variable_order) = self.plan(&*relations, attributes)?;
        let optimize_time = timer.lap("opt");

        variable_order.apply(relations);
        let sort_time = timer.lap("sort");

        let engine = JoinEngine::new(relations, &self.config);
        let output = engine.execute(plan.clone())?;
        let join_time = timer.lap("join");

        let cardinality = output.cardinality();
        let total_time = timer.elapsed();
        info!(
            "{} join produced {} tuples in {:.6}s (opt {:.6}s, sort {:.6}s, join {:.6}s)",
            self.config.strategy,
            cardinality,
            total_time.as_secs_f64(),
            optimize_time.as_secs_f64(),
            sort_time.as_secs_f64(),
            join_time.as_secs_f64()
        );

        Ok(JoinReport {
            cardinality,
            variable_order,
            plan,
            output,
            optimize_time,
            sort_time,
            join_time,
            total_time,
        })
    }
}
