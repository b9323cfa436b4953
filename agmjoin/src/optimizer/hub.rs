/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use super::{sequential_chain, PlanSearch, SearchContext};
use crate::error::Result;
use crate::hypergraph::Component;
use crate::plan::{HubBranch, PlanNode};
use log::debug;
use relstore::RelationSchema;

/// Decomposes a component around the relation whose removal disconnects it most cheaply
#[derive(Debug, Clone, Copy, Default)]
pub struct HubSearch;

struct HubCandidate {
    slot: usize,
    cost: f64,
    components: Vec<Component>,
}

impl HubSearch {
    /// Splits the component without `relations[slot]`; `None` unless at least two groups keep relations.
    fn score<R: RelationSchema + Sync>(
        &self,
        ctx: &SearchContext<'_, R>,
        relations: &[usize],
        attributes: &[String],
        slot: usize,
    ) -> Option<HubCandidate> {
        let remaining: Vec<usize> = relations
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != slot)
            .map(|(_, &r)| r)
            .collect();
        let components = ctx.split(&remaining, attributes);
        let productive = components.iter().filter(|c| c.has_relations()).count();
        if productive < 2 {
            return None;
        }
        let cost = components
            .iter()
            .filter(|c| c.has_relations())
            .map(|c| ctx.estimate(&c.relations, &c.attributes))
            .sum();
        Some(HubCandidate {
            slot,
            cost,
            components,
        })
    }
}

impl PlanSearch for HubSearch {
    fn name(&self) -> &'static str {
        "hub"
    }

    fn search_component<R: RelationSchema + Sync>(
        &self,
        ctx: &SearchContext<'_, R>,
        relations: &[usize],
        attributes: &[String],
    ) -> Result<PlanNode> {
        let slots: Vec<usize> = (0..relations.len()).collect();
        let candidates = ctx.map(&slots, |&slot| Ok(self.score(ctx, relations, attributes, slot)))?;
        let best = candidates
            .into_iter()
            .flatten()
            .min_by(|a, b| a.cost.total_cmp(&b.cost).then(a.slot.cmp(&b.slot)));

        let Some(best) = best else {
            debug!("hub: no cut relation among {:?}, chaining {:?}", relations, attributes);
            return sequential_chain(ctx, relations, attributes);
        };

        let hub = relations[best.slot];
        let hub_relation = &ctx.relations()[hub];
        debug!(
            "hub: relation {} splits {:?} into {} groups, cost {:.1}",
            hub_relation.name(),
            attributes,
            best.components.len(),
            best.cost
        );

        let mut exclusive = Vec::new();
        let mut grouped = Vec::new();
        for component in best.components {
            if component.has_relations() {
                grouped.push(component);
            } else {
                exclusive.extend(component.attributes);
            }
        }

        let branches = ctx.map(&grouped, |component| {
            let plan = sequential_chain(ctx, &component.relations, &component.attributes)?;
            let join_attributes = component
                .attributes
                .iter()
                .filter(|a| hub_relation.has_attribute(a))
                .cloned()
                .collect();
            Ok(HubBranch {
                join_attributes,
                plan,
            })
        })?;

        Ok(PlanNode::hub(hub, branches, exclusive, best.cost))
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

    fn bridged_triangles() -> Vec<RelationStats> {
        vec![
            RelationStats::new("R", 4, vec!["a", "b"]),
            RelationStats::new("S", 4, vec!["b", "c"]),
            RelationStats::new("T", 4, vec!["c", "a"]),
            RelationStats::new("H", 6, vec!["a", "d", "h"]),
            RelationStats::new("U", 4, vec!["d", "e"]),
            RelationStats::new("V", 4, vec!["e", "f"]),
            RelationStats::new("W", 4, vec!["f", "d"]),
        ]
    }

    #[test]
    fn test_bridge_relation_is_hub() {
        let relations = bridged_triangles();
        let ctx = SearchContext::new(&relations, &JoinConfig::default()).unwrap();
        let query = attrs(&["a", "b", "c", "d", "e", "f", "h"]);
        let plan = HubSearch
            .search_component(&ctx, &(0..relations.len()).collect::<Vec<_>>(), &query)
            .unwrap();

        let PlanNode::Hub {
            relation,
            branches,
            exclusive,
            ..
        } = &plan
        else {
            panic!("expected a hub plan, got {}", plan);
        };
        assert_eq!(*relation, 3);
        assert_eq!(exclusive, &attrs(&["h"]));
        assert_eq!(branches.len(), 2);
        assert_eq!(branches[0].join_attributes, attrs(&["a"]));
        assert_eq!(branches[1].join_attributes, attrs(&["d"]));
        assert_eq!(plan.binding_order(), query);
    }

    #[test]
    fn test_cycle_without_cut_relation_falls_back_to_chain() {
        let relations = bridged_triangles()[..3].to_vec();
        let ctx = SearchContext::new(&relations, &JoinConfig::default()).unwrap();
        let plan = HubSearch
            .search_component(&ctx, &[0, 1, 2], &attrs(&["c", "a", "b"]))
            .unwrap();
        assert_eq!(plan.kind(), "Sequential");
        assert_eq!(plan.binding_order(), attrs(&["c", "a", "b"]));
    }
}
