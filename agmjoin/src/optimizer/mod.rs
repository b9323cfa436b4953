/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Plan search over the join hypergraph
//!
//! Every strategy plans one connected component at a time through the
//! [`PlanSearch`] trait and shares the search primitives of
//! [`SearchContext`]: AGM-bound estimates and hypergraph splits.
//!
//! - `top_down`: greedy attribute elimination
//! - `dynamic_programming`: exact and beam DP over attribute subsets
//! - `hub`: decomposition around a cut relation

pub mod dynamic_programming;
pub mod hub;
pub mod top_down;

pub use dynamic_programming::DynamicProgramming;
pub use hub::HubSearch;
pub use top_down::TopDown;

use crate::config::{JoinConfig, Strategy};
use crate::cost::CardinalityEstimator;
use crate::error::{JoinError, Result};
use crate::hypergraph::{self, Component};
use crate::order::VariableOrder;
use crate::plan::PlanNode;
use log::{debug, info};
use rayon::prelude::*;
use relstore::RelationSchema;
use rustc_hash::{FxHashMap, FxHashSet};
use std::sync::RwLock;

type EstimateKey = (Vec<usize>, Vec<String>);

/// Read-only inputs and memoised estimates shared by one plan search
pub struct SearchContext<'a, R> {
    relations: &'a [R],
    estimator: CardinalityEstimator,
    parallel: bool,
    estimates: RwLock<FxHashMap<EstimateKey, f64>>,
}

impl<'a, R: RelationSchema + Sync> SearchContext<'a, R> {
    pub fn new(relations: &'a [R], config: &JoinConfig) -> Result<Self> {
        Ok(Self {
            relations,
            estimator: CardinalityEstimator::new(config.lp_solver()?),
            parallel: config.parallel,
            estimates: RwLock::new(FxHashMap::default()),
        })
    }

    pub fn relations(&self) -> &'a [R] {
        self.relations
    }

    /// AGM bound of joining `candidates` over `attributes`
    pub fn estimate(&self, candidates: &[usize], attributes: &[String]) -> f64 {
        let mut relations = candidates.to_vec();
        relations.sort_unstable();
        let mut names = attributes.to_vec();
        names.sort_unstable();
        let key = (relations, names);

        if let Ok(cache) = self.estimates.read() {
            if let Some(&bound) = cache.get(&key) {
                return bound;
            }
        }

        let refs: Vec<&R> = key.0.iter().map(|&i| &self.relations[i]).collect();
        let bound = self.estimator.estimate(&refs, attributes);
        if let Ok(mut cache) = self.estimates.write() {
            cache.insert(key, bound);
        }
        bound
    }

    pub fn split(&self, candidates: &[usize], attributes: &[String]) -> Vec<Component> {
        hypergraph::split(self.relations, candidates, attributes)
    }

    /// Candidates carrying `attribute`
    pub fn carrying(&self, candidates: &[usize], attribute: &str) -> Vec<usize> {
        candidates
            .iter()
            .copied()
            .filter(|&r| self.relations[r].has_attribute(attribute))
            .collect()
    }

    /// Candidates carrying at least one of `attributes`
    pub fn touching(&self, candidates: &[usize], attributes: &[String]) -> Vec<usize> {
        candidates
            .iter()
            .copied()
            .filter(|&r| attributes.iter().any(|a| self.relations[r].has_attribute(a)))
            .collect()
    }

    pub fn min_len(&self, candidates: &[usize]) -> f64 {
        candidates
            .iter()
            .map(|&r| self.relations[r].len())
            .min()
            .unwrap_or(0) as f64
    }

    /// Applies `f` to every item, on the rayon pool when parallel search is enabled.
    pub fn map<T, U, F>(&self, items: &[T], f: F) -> Result<Vec<U>>
    where
        T: Sync,
        U: Send,
        F: Fn(&T) -> Result<U> + Sync + Send,
    {
        if self.parallel && items.len() > 1 {
            items.par_iter().map(f).collect()
        } else {
            items.iter().map(f).collect()
        }
    }

    pub fn estimates_cached(&self) -> usize {
        self.estimates.read().map(|cache| cache.len()).unwrap_or(0)
    }
}

/// A plan search strategy for one connected component.
pub trait PlanSearch: Sync {
    fn name(&self) -> &'static str;

    /// Plans the join of `relations` over the connected attribute set `attributes`.
    fn search_component<R: RelationSchema + Sync>(
        &self,
        ctx: &SearchContext<'_, R>,
        relations: &[usize],
        attributes: &[String],
    ) -> Result<PlanNode> {
        let _ = (ctx, relations, attributes);
        Err(JoinError::Unimplemented(self.name()))
    }
}

/// Leaf binding `attribute` over the candidates carrying it, costed by the smallest one.
pub(crate) fn leaf<R: RelationSchema + Sync>(
    ctx: &SearchContext<'_, R>,
    relations: &[usize],
    attribute: &str,
) -> Result<PlanNode> {
    let carrying = ctx.carrying(relations, attribute);
    if carrying.is_empty() {
        return Err(JoinError::illegal(format!("no relation carries '{}'", attribute)));
    }
    let cost = ctx.min_len(&carrying);
    Ok(PlanNode::leaf(attribute, carrying, cost))
}

/// Left-deep chain binding `attributes` in the given order, first attribute innermost.
pub(crate) fn sequential_chain<R: RelationSchema + Sync>(
    ctx: &SearchContext<'_, R>,
    relations: &[usize],
    attributes: &[String],
) -> Result<PlanNode> {
    let mut node: Option<PlanNode> = None;
    for (width, attribute) in attributes.iter().enumerate() {
        node = Some(match node {
            None => leaf(ctx, relations, attribute)?,
            Some(child) => {
                let carrying = ctx.carrying(relations, attribute);
                if carrying.is_empty() {
                    return Err(JoinError::illegal(format!("no relation carries '{}'", attribute)));
                }
                let bound = &attributes[..=width];
                let cost = ctx.estimate(&ctx.touching(relations, bound), bound);
                PlanNode::sequential(attribute.clone(), carrying, child, cost)
            }
        });
    }
    node.ok_or_else(|| JoinError::illegal("cannot chain an empty attribute set"))
}

/// Rejects queries no strategy can plan.
pub fn validate_query<R: RelationSchema>(relations: &[R], attributes: &[String]) -> Result<()> {
    if relations.is_empty() {
        return Err(JoinError::illegal("query has no relations"));
    }
    if attributes.is_empty() {
        return Err(JoinError::illegal("query has no attributes"));
    }
    let mut seen = FxHashSet::default();
    for attribute in attributes {
        if !seen.insert(attribute.as_str()) {
            return Err(JoinError::illegal(format!("attribute '{}' listed twice", attribute)));
        }
        if !relations.iter().any(|r| r.has_attribute(attribute)) {
            return Err(JoinError::illegal(format!("no relation carries '{}'", attribute)));
        }
    }
    Ok(())
}

/// Plans every connected component with `strategy`; several components meet under a Cartesian node.
pub fn plan_components<R, S>(ctx: &SearchContext<'_, R>, strategy: &S, attributes: &[String]) -> Result<PlanNode>
where
    R: RelationSchema + Sync,
    S: PlanSearch,
{
    let all: Vec<usize> = (0..ctx.relations().len()).collect();
    let components = ctx.split(&all, attributes);
    if components.is_empty() {
        return Err(JoinError::illegal("hypergraph split returned no components"));
    }
    if let Some(orphan) = components.iter().find(|c| !c.has_relations()) {
        return Err(JoinError::illegal(format!(
            "attributes {:?} are not carried by any relation",
            orphan.attributes
        )));
    }
    debug!(
        "{} planning {} component(s) over {} relations",
        strategy.name(),
        components.len(),
        all.len()
    );

    let mut plans = ctx.map(&components, |component| {
        strategy.search_component(ctx, &component.relations, &component.attributes)
    })?;
    if plans.len() == 1 {
        if let Some(plan) = plans.pop() {
            return Ok(plan);
        }
    }
    Ok(PlanNode::cartesian(plans))
}

/// Chooses a plan and the variable order it binds attributes in.
pub fn build_plan<R: RelationSchema + Sync>(
    relations: &[R],
    attributes: &[String],
    config: &JoinConfig,
) -> Result<(PlanNode, VariableOrder)> {
    config.validate()?;
    validate_query(relations, attributes)?;
    let ctx = SearchContext::new(relations, config)?;

    let plan = match config.strategy {
        Strategy::TopDown => plan_components(&ctx, &TopDown, attributes)?,
        Strategy::Dp => plan_components(&ctx, &DynamicProgramming::exact(config.dp_max_attributes), attributes)?,
        Strategy::Beam => plan_components(&ctx, &DynamicProgramming::beam(config.beam_width), attributes)?,
        Strategy::Hub => plan_components(&ctx, &HubSearch, attributes)?,
    };

    let order = VariableOrder::from_plan(&plan);
    let mut bound: Vec<&String> = order.iter().collect();
    bound.sort();
    bound.dedup();
    if bound.len() != attributes.len() || order.len() != attributes.len() {
        return Err(JoinError::illegal(format!(
            "plan binds {} but the query joins {:?}",
            order, attributes
        )));
    }

    info!(
        "{} plan: cost {:.1}, {} nodes, {} estimates, order [{}]",
        config.strategy,
        plan.cost(),
        plan.node_count(),
        ctx.estimates_cached(),
        order
    );
    Ok((plan, order))
}

#[cfg(test)]
mod tests {
    use super::*;
    use relstore::RelationStats;

    struct Unplanned;

    impl PlanSearch for Unplanned {
        fn name(&self) -> &'static str {
            "unplanned"
        }
    }

    fn attrs(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn triangle() -> Vec<RelationStats> {
        vec![
            RelationStats::new("R", 4, vec!["a", "b"]),
            RelationStats::new("S", 4, vec!["b", "c"]),
            RelationStats::new("T", 4, vec!["c", "a"]),
        ]
    }

    #[test]
    fn test_default_search_is_unimplemented() {
        let relations = triangle();
        let ctx = SearchContext::new(&relations, &JoinConfig::default()).unwrap();
        let err = plan_components(&ctx, &Unplanned, &attrs(&["a", "b", "c"])).unwrap_err();
        assert!(matches!(err, JoinError::Unimplemented("unplanned")));
    }

    #[test]
    fn test_validate_rejects_uncarried_attribute() {
        let err = validate_query(&triangle(), &attrs(&["a", "z"])).unwrap_err();
        assert!(matches!(err, JoinError::IllegalQuery(_)));
    }

    #[test]
    fn test_validate_rejects_duplicates_and_empty() {
        assert!(validate_query(&triangle(), &attrs(&["a", "a"])).is_err());
        assert!(validate_query(&triangle(), &[]).is_err());
        assert!(validate_query::<RelationStats>(&[], &attrs(&["a"])).is_err());
    }

    #[test]
    fn test_estimates_are_memoised() {
        let relations = triangle();
        let ctx = SearchContext::new(&relations, &JoinConfig::default()).unwrap();
        let first = ctx.estimate(&[2, 0, 1], &attrs(&["c", "a", "b"]));
        let second = ctx.estimate(&[0, 1, 2], &attrs(&["a", "b", "c"]));
        assert_eq!(first, second);
        assert_eq!(ctx.estimates_cached(), 1);
    }

    #[test]
    fn test_sequential_chain_binds_input_order() {
        let relations = triangle();
        let ctx = SearchContext::new(&relations, &JoinConfig::default()).unwrap();
        let plan = sequential_chain(&ctx, &[0, 1, 2], &attrs(&["b", "a", "c"])).unwrap();
        assert_eq!(plan.binding_order(), attrs(&["b", "a", "c"]));
        assert_eq!(plan.relations(), &[1, 2]);
    }

    #[test]
    fn test_every_strategy_orders_all_attributes() {
        let relations = triangle();
        let query = attrs(&["a", "b", "c"]);
        for strategy in Strategy::ALL {
            let (_, order) = build_plan(&relations, &query, &JoinConfig::with_strategy(strategy)).unwrap();
            let mut bound = order.as_slice().to_vec();
            bound.sort();
            assert_eq!(bound, query, "strategy {}", strategy);
        }
    }

    #[test]
    fn test_disconnected_query_plans_cartesian() {
        let relations = vec![
            RelationStats::new("R", 3, vec!["x"]),
            RelationStats::new("S", 5, vec!["y"]),
        ];
        let (plan, order) = build_plan(&relations, &attrs(&["x", "y"]), &JoinConfig::default()).unwrap();
        assert_eq!(plan.kind(), "Cartesian");
        assert_eq!(plan.cost(), 15.0);
        assert_eq!(order.as_slice(), &attrs(&["x", "y"])[..]);
    }
}
