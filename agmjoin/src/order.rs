/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::plan::PlanNode;
use rayon::prelude::*;
use relstore::{Relation, RelationSchema};
use serde::Serialize;
use std::fmt;

/// The order in which a plan binds attributes.
///
/// Relations are sorted by it before execution so that every range the
/// engine narrows is sorted on the attribute being bound next.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct VariableOrder(Vec<String>);

impl VariableOrder {
    pub fn new(attributes: Vec<String>) -> Self {
        VariableOrder(attributes)
    }

    pub fn from_plan(plan: &PlanNode) -> Self {
        VariableOrder(plan.binding_order())
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.0.iter()
    }

    pub fn position(&self, attribute: &str) -> Option<usize> {
        self.0.iter().position(|a| a == attribute)
    }

    /// The attributes of this order a relation carries, in order
    pub fn restricted_to<R: RelationSchema + ?Sized>(&self, relation: &R) -> Vec<&str> {
        self.0
            .iter()
            .filter(|a| relation.has_attribute(a))
            .map(String::as_str)
            .collect()
    }

    /// Sorts every relation by its restriction of this order.
    pub fn apply(&self, relations: &mut [Relation]) {
        relations
            .par_iter_mut()
            .for_each(|relation| relation.sort_by_order(&self.0));
    }
}

impl fmt::Display for VariableOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(" "))
    }
}

impl From<Vec<String>> for VariableOrder {
    fn from(attributes: Vec<String>) -> Self {
        VariableOrder(attributes)
    }
}
