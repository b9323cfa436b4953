/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use super::{leaf, PlanSearch, SearchContext};
use crate::error::{JoinError, Result};
use crate::hypergraph::Component;
use crate::plan::PlanNode;
use log::debug;
use relstore::RelationSchema;

/// Greedy search eliminating the attribute whose removal leaves the cheapest remainder
#[derive(Debug, Clone, Copy, Default)]
pub struct TopDown;

struct Candidate {
    position: usize,
    cost: f64,
    components: Vec<Component>,
}

/// Estimated cost of producing a group and sort-merging it with its siblings
fn sort_merge_cost(estimate: f64) -> f64 {
    if estimate < 1.0 {
        estimate.max(0.0)
    } else {
        estimate + estimate * estimate.log2()
    }
}

impl TopDown {
    fn score<R: RelationSchema + Sync>(
        &self,
        ctx: &SearchContext<'_, R>,
        relations: &[usize],
        attributes: &[String],
        position: usize,
    ) -> Result<Candidate> {
        let removed = &attributes[position];
        let rest: Vec<String> = attributes
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != position)
            .map(|(_, a)| a.clone())
            .collect();

        let mut components = ctx.split(relations, &rest);
        if components.is_empty() {
            return Err(JoinError::illegal(format!(
                "removing '{}' from {:?} leaves nothing to join",
                removed, attributes
            )));
        }
        if let Some(orphan) = components.iter().find(|c| !c.has_relations()) {
            return Err(JoinError::illegal(format!(
                "attributes {:?} are not carried by any relation",
                orphan.attributes
            )));
        }

        let cost = if components.len() == 1 {
            ctx.estimate(relations, &rest)
        } else {
            let mut total = 0.0;
            for component in components.iter_mut() {
                component.attributes.push(removed.clone());
                total += sort_merge_cost(ctx.estimate(&component.relations, &component.attributes));
            }
            total
        };

        Ok(Candidate {
            position,
            cost,
            components,
        })
    }
}

impl PlanSearch for TopDown {
    fn name(&self) -> &'static str {
        "top-down"
    }

    fn search_component<R: RelationSchema + Sync>(
        &self,
        ctx: &SearchContext<'_, R>,
        relations: &[usize],
        attributes: &[String],
    ) -> Result<PlanNode> {
        match attributes.len() {
            0 => return Err(JoinError::illegal("cannot plan an empty attribute set")),
            1 => return leaf(ctx, relations, &attributes[0]),
            _ => {}
        }

        let positions: Vec<usize> = (0..attributes.len()).collect();
        let candidates = ctx.map(&positions, |&position| {
            self.score(ctx, relations, attributes, position)
        })?;
        let best = candidates
            .into_iter()
            .min_by(|a, b| a.cost.total_cmp(&b.cost).then(a.position.cmp(&b.position)))
            .ok_or_else(|| JoinError::illegal("no candidate attribute"))?;

        let attribute = &attributes[best.position];
        let carrying = ctx.carrying(relations, attribute);
        debug!(
            "top-down: bind '{}' last over {:?}, {} group(s), cost {:.1}",
            attribute,
            carrying,
            best.components.len(),
            best.cost
        );

        let mut components = best.components;
        if components.len() == 1 {
            let component = components.remove(0);
            let child = self.search_component(ctx, &component.relations, &component.attributes)?;
            return Ok(PlanNode::sequential(attribute.clone(), carrying, child, best.cost));
        }

        let children = ctx.map(&components, |component| {
            self.search_component(ctx, &component.relations, &component.attributes)
        })?;
        Ok(PlanNode::binary(Some(attribute.clone()), carrying, children))
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

    #[test]
    fn test_single_attribute_is_leaf() {
        let relations = vec![
            RelationStats::new("R", 10, vec!["a"]),
            RelationStats::new("S", 3, vec!["a"]),
        ];
        let ctx = SearchContext::new(&relations, &JoinConfig::default()).unwrap();
        let plan = TopDown.search_component(&ctx, &[0, 1], &attrs(&["a"])).unwrap();
        assert_eq!(plan.kind(), "Sequential");
        assert_eq!(plan.relations(), &[0, 1]);
        assert_eq!(plan.cost(), 3.0);
    }

    #[test]
    fn test_star_center_becomes_binary() {
        // Removing the center k leaves three independent arms
        let relations = vec![
            RelationStats::new("A", 100, vec!["k", "x"]),
            RelationStats::new("B", 100, vec!["k", "y"]),
            RelationStats::new("C", 100, vec!["k", "z"]),
        ];
        let ctx = SearchContext::new(&relations, &JoinConfig::default()).unwrap();
        let query = attrs(&["k", "x", "y", "z"]);
        let plan = TopDown.search_component(&ctx, &[0, 1, 2], &query).unwrap();

        assert_eq!(plan.kind(), "Binary");
        assert_eq!(plan.attribute(), Some("k"));
        assert_eq!(plan.relations(), &[0, 1, 2]);
        assert_eq!(plan.children().len(), 3);

        let order = plan.binding_order();
        assert_eq!(order.iter().filter(|a| *a == "k").count(), 1);
        assert_eq!(order.len(), 4);
    }

    #[test]
    fn test_path_query_is_sequential_chain() {
        let relations = vec![
            RelationStats::new("R", 5, vec!["a", "b"]),
            RelationStats::new("S", 5, vec!["b", "c"]),
        ];
        let ctx = SearchContext::new(&relations, &JoinConfig::default()).unwrap();
        let plan = TopDown.search_component(&ctx, &[0, 1], &attrs(&["a", "b", "c"])).unwrap();
        assert_eq!(plan.depth(), 3);
        let mut order = plan.binding_order();
        order.sort();
        assert_eq!(order, attrs(&["a", "b", "c"]));
    }

    #[test]
    fn test_sort_merge_cost_is_monotone() {
        assert_eq!(sort_merge_cost(0.0), 0.0);
        assert_eq!(sort_merge_cost(1.0), 1.0);
        assert!(sort_merge_cost(8.0) == 32.0);
        assert!(sort_merge_cost(16.0) > sort_merge_cost(8.0));
    }
}
