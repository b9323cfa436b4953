/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use super::{PlanSearch, SearchContext};
use crate::error::{JoinError, Result};
use crate::plan::PlanNode;
use log::debug;
use relstore::RelationSchema;
use rustc_hash::FxHashMap;
use std::cmp::Ordering;

/// Sorted attribute positions; the key of an unordered attribute combination
type AttributeSet = Vec<usize>;

#[derive(Debug, Clone)]
struct State {
    /// Attribute positions in binding order
    order: Vec<usize>,
    cost: f64,
    predecessor: Option<AttributeSet>,
}

/// Dynamic programming over attribute subsets.
///
/// Each state holds the cheapest ordered binding sequence found for one
/// attribute combination. With a beam width only the cheapest states of
/// every width are expanded further.
#[derive(Debug, Clone, Copy)]
pub struct DynamicProgramming {
    beam: Option<usize>,
    max_attributes: usize,
}

impl DynamicProgramming {
    /// Exhaustive search; refuses components wider than `max_attributes`.
    pub fn exact(max_attributes: usize) -> Self {
        Self {
            beam: None,
            max_attributes,
        }
    }

    pub fn beam(width: usize) -> Self {
        Self {
            beam: Some(width.max(1)),
            max_attributes: usize::MAX,
        }
    }

    fn prune(&self, level: &mut FxHashMap<AttributeSet, State>) {
        let Some(width) = self.beam else {
            return;
        };
        if level.len() <= width {
            return;
        }
        let mut ranked: Vec<(AttributeSet, State)> = level.drain().collect();
        ranked.sort_by(|a, b| by_cost(a, b));
        ranked.truncate(width);
        level.extend(ranked);
    }

    fn expand<R: RelationSchema + Sync>(
        &self,
        ctx: &SearchContext<'_, R>,
        relations: &[usize],
        attributes: &[String],
        key: &AttributeSet,
        state: &State,
    ) -> Vec<(AttributeSet, State)> {
        (0..attributes.len())
            .filter(|position| key.binary_search(position).is_err())
            .map(|position| {
                let mut extended = key.clone();
                let at = extended.partition_point(|&p| p < position);
                extended.insert(at, position);

                let names: Vec<String> = extended.iter().map(|&p| attributes[p].clone()).collect();
                let touching = ctx.touching(relations, &names);
                let cost = state.cost + ctx.estimate(&touching, &names);

                let mut order = state.order.clone();
                order.push(position);
                let next = State {
                    order,
                    cost,
                    predecessor: Some(key.clone()),
                };
                (extended, next)
            })
            .collect()
    }

    fn to_plan<R: RelationSchema + Sync>(
        &self,
        ctx: &SearchContext<'_, R>,
        relations: &[usize],
        attributes: &[String],
        levels: &[FxHashMap<AttributeSet, State>],
        terminal: &State,
    ) -> Result<PlanNode> {
        let mut chain = vec![terminal];
        let mut current = terminal;
        while let Some(key) = &current.predecessor {
            let previous = levels[key.len() - 1]
                .get(key)
                .ok_or_else(|| JoinError::illegal("dynamic programming lost a predecessor state"))?;
            chain.push(previous);
            current = previous;
        }

        let mut node: Option<PlanNode> = None;
        for state in chain.into_iter().rev() {
            let position = state.order[state.order.len() - 1];
            let attribute = &attributes[position];
            let carrying = ctx.carrying(relations, attribute);
            node = Some(match node {
                None => PlanNode::leaf(attribute.clone(), carrying, state.cost),
                Some(child) => PlanNode::sequential(attribute.clone(), carrying, child, state.cost),
            });
        }
        node.ok_or_else(|| JoinError::illegal("dynamic programming produced no plan"))
    }
}

fn by_cost(a: &(AttributeSet, State), b: &(AttributeSet, State)) -> Ordering {
    a.1.cost.total_cmp(&b.1.cost).then_with(|| a.0.cmp(&b.0))
}

impl PlanSearch for DynamicProgramming {
    fn name(&self) -> &'static str {
        match self.beam {
            Some(_) => "beam dynamic programming",
            None => "dynamic programming",
        }
    }

    fn search_component<R: RelationSchema + Sync>(
        &self,
        ctx: &SearchContext<'_, R>,
        relations: &[usize],
        attributes: &[String],
    ) -> Result<PlanNode> {
        let n = attributes.len();
        if n == 0 {
            return Err(JoinError::illegal("cannot plan an empty attribute set"));
        }
        if n > self.max_attributes {
            return Err(JoinError::ResourceExceeded {
                resource: "dynamic programming attributes",
                limit: self.max_attributes,
            });
        }

        let mut first = FxHashMap::default();
        for (position, attribute) in attributes.iter().enumerate() {
            let carrying = ctx.carrying(relations, attribute);
            if carrying.is_empty() {
                return Err(JoinError::illegal(format!("no relation carries '{}'", attribute)));
            }
            let state = State {
                order: vec![position],
                cost: ctx.min_len(&carrying),
                predecessor: None,
            };
            first.insert(vec![position], state);
        }
        self.prune(&mut first);

        let mut levels: Vec<FxHashMap<AttributeSet, State>> = vec![first];
        for width in 2..=n {
            let mut previous: Vec<(&AttributeSet, &State)> = levels[width - 2].iter().collect();
            previous.sort_by(|a, b| a.0.cmp(b.0));

            let expansions = ctx.map(&previous, |(key, state)| {
                Ok(self.expand(ctx, relations, attributes, key, state))
            })?;

            let mut level: FxHashMap<AttributeSet, State> = FxHashMap::default();
            for (key, state) in expansions.into_iter().flatten() {
                match level.get(&key) {
                    Some(existing) if existing.cost <= state.cost => {}
                    _ => {
                        level.insert(key, state);
                    }
                }
            }
            self.prune(&mut level);
            debug!("{}: width {} keeps {} states", self.name(), width, level.len());
            levels.push(level);
        }

        let terminal = levels[n - 1]
            .iter()
            .min_by(|a, b| a.1.cost.total_cmp(&b.1.cost).then_with(|| a.0.cmp(b.0)))
            .map(|(_, state)| state.clone())
            .ok_or_else(|| JoinError::illegal("no full-width state"))?;

        self.to_plan(ctx, relations, attributes, &levels, &terminal)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::JoinConfig;
    use relstore::RelationStats;

    fn attrs(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn four_cycle() -> Vec<RelationStats> {
        vec![
            RelationStats::new("R", 10, vec!["a", "b"]),
            RelationStats::new("S", 200, vec!["b", "c"]),
            RelationStats::new("T", 30, vec!["c", "d"]),
            RelationStats::new("U", 4000, vec!["d", "a"]),
        ]
    }

    #[test]
    fn test_exact_plan_is_chain_over_all_attributes() {
        let relations = four_cycle();
        let ctx = SearchContext::new(&relations, &JoinConfig::default()).unwrap();
        let query = attrs(&["a", "b", "c", "d"]);
        let plan = DynamicProgramming::exact(20)
            .search_component(&ctx, &[0, 1, 2, 3], &query)
            .unwrap();
        assert_eq!(plan.depth(), 4);
        let mut order = plan.binding_order();
        order.sort();
        assert_eq!(order, query);
    }

    #[test]
    fn test_exact_starts_from_smallest_relation() {
        let relations = four_cycle();
        let ctx = SearchContext::new(&relations, &JoinConfig::default()).unwrap();
        let plan = DynamicProgramming::exact(20)
            .search_component(&ctx, &[0, 1, 2, 3], &attrs(&["a", "b", "c", "d"]))
            .unwrap();
        let first = &plan.binding_order()[0];
        assert!(first == "a" || first == "b", "first bound {}", first);
    }

    #[test]
    fn test_wide_beam_matches_exact_cost() {
        let relations = four_cycle();
        let ctx = SearchContext::new(&relations, &JoinConfig::default()).unwrap();
        let query = attrs(&["a", "b", "c", "d"]);
        let exact = DynamicProgramming::exact(20)
            .search_component(&ctx, &[0, 1, 2, 3], &query)
            .unwrap();
        let beam = DynamicProgramming::beam(64)
            .search_component(&ctx, &[0, 1, 2, 3], &query)
            .unwrap();
        assert!((exact.cost() - beam.cost()).abs() < 1e-9);
    }

    #[test]
    fn test_narrow_beam_never_beats_exact() {
        let relations = four_cycle();
        let ctx = SearchContext::new(&relations, &JoinConfig::default()).unwrap();
        let query = attrs(&["a", "b", "c", "d"]);
        let exact = DynamicProgramming::exact(20)
            .search_component(&ctx, &[0, 1, 2, 3], &query)
            .unwrap();
        let beam = DynamicProgramming::beam(1)
            .search_component(&ctx, &[0, 1, 2, 3], &query)
            .unwrap();
        assert!(beam.cost() >= exact.cost() - 1e-9);
    }

    #[test]
    fn test_exact_refuses_wide_components() {
        let relations = four_cycle();
        let ctx = SearchContext::new(&relations, &JoinConfig::default()).unwrap();
        let err = DynamicProgramming::exact(3)
            .search_component(&ctx, &[0, 1, 2, 3], &attrs(&["a", "b", "c", "d"]))
            .unwrap_err();
        assert!(matches!(err, JoinError::ResourceExceeded { limit: 3, .. }));
    }
}
