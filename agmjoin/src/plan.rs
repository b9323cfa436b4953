/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use serde::Serialize;
use std::fmt;

/// A child of a hub join with the attributes it shares with the hub relation
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HubBranch {
    pub join_attributes: Vec<String>,
    pub plan: PlanNode,
}

/// Join plan tree.
///
/// Relation sets are indices into the relation slice the plan was built
/// for. Executing a plan consumes it.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlanNode {
    /// Binds `attribute` across `relations`, once per row of the child's output
    /// or once from the root tuple when there is no child
    Sequential {
        attribute: String,
        relations: Vec<usize>,
        child: Option<Box<PlanNode>>,
        cost: f64,
    },
    /// Sort-merge of the children on `attribute`, or their cross product without one
    Binary {
        attribute: Option<String>,
        relations: Vec<usize>,
        children: Vec<PlanNode>,
        cost: f64,
    },
    /// Cross product of attribute-disjoint children
    Cartesian { children: Vec<PlanNode>, cost: f64 },
    /// Joins every branch with the hub relation on the attributes they share.
    /// `exclusive` lists attributes only the hub carries.
    Hub {
        relation: usize,
        branches: Vec<HubBranch>,
        exclusive: Vec<String>,
        cost: f64,
    },
}

impl PlanNode {
    pub fn leaf(attribute: impl Into<String>, relations: Vec<usize>, cost: f64) -> Self {
        PlanNode::Sequential {
            attribute: attribute.into(),
            relations,
            child: None,
            cost,
        }
    }

    pub fn sequential(
        attribute: impl Into<String>,
        relations: Vec<usize>,
        child: PlanNode,
        cost: f64,
    ) -> Self {
        PlanNode::Sequential {
            attribute: attribute.into(),
            relations,
            child: Some(Box::new(child)),
            cost,
        }
    }

    pub fn binary(attribute: Option<String>, relations: Vec<usize>, children: Vec<PlanNode>) -> Self {
        let cost = children.iter().map(PlanNode::cost).product();
        PlanNode::Binary {
            attribute,
            relations,
            children,
            cost,
        }
    }

    pub fn cartesian(children: Vec<PlanNode>) -> Self {
        let cost = children.iter().map(PlanNode::cost).product();
        PlanNode::Cartesian { children, cost }
    }

    pub fn hub(relation: usize, branches: Vec<HubBranch>, exclusive: Vec<String>, cost: f64) -> Self {
        PlanNode::Hub {
            relation,
            branches,
            exclusive,
            cost,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            PlanNode::Sequential { .. } => "Sequential",
            PlanNode::Binary { .. } => "Binary",
            PlanNode::Cartesian { .. } => "Cartesian",
            PlanNode::Hub { .. } => "Hub",
        }
    }

    pub fn attribute(&self) -> Option<&str> {
        match self {
            PlanNode::Sequential { attribute, .. } => Some(attribute),
            PlanNode::Binary { attribute, .. } => attribute.as_deref(),
            PlanNode::Cartesian { .. } | PlanNode::Hub { .. } => None,
        }
    }

    pub fn relations(&self) -> &[usize] {
        match self {
            PlanNode::Sequential { relations, .. } | PlanNode::Binary { relations, .. } => relations,
            PlanNode::Cartesian { .. } => &[],
            PlanNode::Hub { relation, .. } => std::slice::from_ref(relation),
        }
    }

    pub fn cost(&self) -> f64 {
        match self {
            PlanNode::Sequential { cost, .. }
            | PlanNode::Binary { cost, .. }
            | PlanNode::Cartesian { cost, .. }
            | PlanNode::Hub { cost, .. } => *cost,
        }
    }

    pub fn children(&self) -> Vec<&PlanNode> {
        match self {
            PlanNode::Sequential { child, .. } => child.iter().map(|c| c.as_ref()).collect(),
            PlanNode::Binary { children, .. } | PlanNode::Cartesian { children, .. } => {
                children.iter().collect()
            }
            PlanNode::Hub { branches, .. } => branches.iter().map(|b| &b.plan).collect(),
        }
    }

    pub fn depth(&self) -> usize {
        1 + self.children().iter().map(|c| c.depth()).max().unwrap_or(0)
    }

    pub fn node_count(&self) -> usize {
        1 + self.children().iter().map(|c| c.node_count()).sum::<usize>()
    }

    /// Attributes in the order execution binds them.
    ///
    /// A sort-merge node splices its children's orders around the shared
    /// attribute so that attribute appears once.
    pub fn binding_order(&self) -> Vec<String> {
        match self {
            PlanNode::Sequential { attribute, child, .. } => {
                let mut order = child.as_ref().map(|c| c.binding_order()).unwrap_or_default();
                if !order.contains(attribute) {
                    order.push(attribute.clone());
                }
                order
            }
            PlanNode::Binary {
                attribute: Some(attribute),
                children,
                ..
            } => {
                let mut before = Vec::new();
                let mut after = Vec::new();
                for child in children {
                    let order = child.binding_order();
                    match order.iter().position(|a| a == attribute) {
                        Some(at) => {
                            before.extend_from_slice(&order[..at]);
                            after.extend_from_slice(&order[at + 1..]);
                        }
                        None => before.extend(order),
                    }
                }
                before.push(attribute.clone());
                before.extend(after);
                before
            }
            PlanNode::Binary { children, .. } | PlanNode::Cartesian { children, .. } => {
                children.iter().flat_map(|c| c.binding_order()).collect()
            }
            PlanNode::Hub {
                branches, exclusive, ..
            } => branches
                .iter()
                .flat_map(|b| b.plan.binding_order())
                .chain(exclusive.iter().cloned())
                .collect(),
        }
    }

    fn label(&self) -> String {
        match self {
            PlanNode::Sequential {
                attribute,
                relations,
                cost,
                ..
            } => format!("Sequential {} over {:?} (cost {:.1})", attribute, relations, cost),
            PlanNode::Binary {
                attribute,
                relations,
                cost,
                ..
            } => match attribute {
                Some(attribute) => {
                    format!("Binary merge on {} over {:?} (cost {:.1})", attribute, relations, cost)
                }
                None => format!("Binary cross (cost {:.1})", cost),
            },
            PlanNode::Cartesian { cost, .. } => format!("Cartesian (cost {:.1})", cost),
            PlanNode::Hub {
                relation,
                exclusive,
                cost,
                ..
            } => {
                if exclusive.is_empty() {
                    format!("Hub relation {} (cost {:.1})", relation, cost)
                } else {
                    format!("Hub relation {} binding {:?} (cost {:.1})", relation, exclusive, cost)
                }
            }
        }
    }
}

impl fmt::Display for PlanNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn print_tree(f: &mut fmt::Formatter<'_>, node: &PlanNode, prefix: &str, last: bool) -> fmt::Result {
            writeln!(f, "{}{}{}", prefix, if last { "└── " } else { "├── " }, node.label())?;
            let new_prefix = format!("{}{}", prefix, if last { "    " } else { "│   " });
            if let PlanNode::Hub { branches, .. } = node {
                let len = branches.len();
                for (i, branch) in branches.iter().enumerate() {
                    let branch_last = i == len - 1;
                    writeln!(
                        f,
                        "{}{}on {:?}",
                        new_prefix,
                        if branch_last { "└── " } else { "├── " },
                        branch.join_attributes
                    )?;
                    let branch_prefix = format!("{}{}", new_prefix, if branch_last { "    " } else { "│   " });
                    print_tree(f, &branch.plan, &branch_prefix, true)?;
                }
                return Ok(());
            }
            let children = node.children();
            let len = children.len();
            for (i, child) in children.into_iter().enumerate() {
                print_tree(f, child, &new_prefix, i == len - 1)?;
            }
            Ok(())
        }

        print_tree(f, self, "", true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chain(attributes: &[&str]) -> PlanNode {
        let mut node = PlanNode::leaf(attributes[0], vec![0], 1.0);
        for attribute in &attributes[1..] {
            node = PlanNode::sequential(*attribute, vec![0], node, 2.0);
        }
        node
    }

    #[test]
    fn test_chain_binds_innermost_first() {
        let plan = chain(&["a", "b", "c"]);
        assert_eq!(plan.binding_order(), vec!["a", "b", "c"]);
        assert_eq!(plan.depth(), 3);
        assert_eq!(plan.attribute(), Some("c"));
    }

    #[test]
    fn test_binary_splices_shared_attribute() {
        let plan = PlanNode::binary(
            Some("k".to_string()),
            vec![0, 1],
            vec![chain(&["x", "k", "y"]), chain(&["k", "z"])],
        );
        assert_eq!(plan.binding_order(), vec!["x", "k", "y", "z"]);
        assert_eq!(plan.cost(), 4.0);
    }

    #[test]
    fn test_hub_appends_exclusive_attributes() {
        let plan = PlanNode::hub(
            2,
            vec![
                HubBranch {
                    join_attributes: vec!["a".into()],
                    plan: chain(&["a", "b"]),
                },
                HubBranch {
                    join_attributes: vec!["d".into()],
                    plan: chain(&["d"]),
                },
            ],
            vec!["h".into()],
            3.0,
        );
        assert_eq!(plan.binding_order(), vec!["a", "b", "d", "h"]);
        assert_eq!(plan.relations(), &[2]);
        assert_eq!(plan.node_count(), 4);
    }

    #[test]
    fn test_display_tree() {
        let plan = PlanNode::cartesian(vec![chain(&["a"]), chain(&["b"])]);
        let rendered = plan.to_string();
        assert!(rendered.starts_with("└── Cartesian"));
        assert!(rendered.contains("    ├── Sequential a"));
        assert!(rendered.contains("    └── Sequential b"));
    }

    #[test]
    fn test_serializes_with_kind_tag() {
        let json = serde_json::to_value(chain(&["a"])).unwrap();
        assert_eq!(json["kind"], "sequential");
        assert_eq!(json["attribute"], "a");
    }
}
