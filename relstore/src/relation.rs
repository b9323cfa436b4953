/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::column::{Column, RowRange};
use crate::error::{Result, StorageError};
use std::cmp::Ordering;
use std::collections::BTreeMap;

/// The part of a relation a join planner looks at: its name, its size and
/// which attributes it carries.
pub trait RelationSchema {
    fn name(&self) -> &str;
    fn len(&self) -> usize;
    fn has_attribute(&self, attribute: &str) -> bool;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A named table of equal-length integer columns
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    name: String,
    tuple_count: usize,
    declared: Vec<String>,
    columns: BTreeMap<String, Column>,
}

impl Relation {
    pub fn new(name: impl Into<String>, tuple_count: usize) -> Self {
        Self {
            name: name.into(),
            tuple_count,
            declared: Vec::new(),
            columns: BTreeMap::new(),
        }
    }

    /// Builds a relation from `(attribute, values)` pairs; the first column fixes the row count.
    pub fn from_columns<S: Into<String>>(
        name: impl Into<String>,
        columns: Vec<(S, Vec<i32>)>,
    ) -> Result<Self> {
        let tuple_count = columns.first().map(|(_, values)| values.len()).unwrap_or(0);
        let mut relation = Relation::new(name, tuple_count);
        for (attribute, values) in columns {
            relation.add_column(attribute, values)?;
        }
        Ok(relation)
    }

    pub fn add_column(&mut self, attribute: impl Into<String>, values: Vec<i32>) -> Result<()> {
        let attribute = attribute.into();
        if values.len() != self.tuple_count {
            return Err(StorageError::ColumnLength {
                relation: self.name.clone(),
                attribute,
                expected: self.tuple_count,
                actual: values.len(),
            });
        }
        if self.columns.contains_key(&attribute) {
            return Err(StorageError::DuplicateAttribute {
                relation: self.name.clone(),
                attribute,
            });
        }
        self.declared.push(attribute.clone());
        self.columns.insert(attribute, Column::new(values));
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.tuple_count
    }

    pub fn is_empty(&self) -> bool {
        self.tuple_count == 0
    }

    pub fn full_range(&self) -> RowRange {
        RowRange::full(self.tuple_count)
    }

    /// Attribute names in declaration order
    pub fn attributes(&self) -> &[String] {
        &self.declared
    }

    pub fn has_attribute(&self, attribute: &str) -> bool {
        self.columns.contains_key(attribute)
    }

    pub fn column(&self, attribute: &str) -> Option<&Column> {
        self.columns.get(attribute)
    }

    /// Value of `attribute` at `row`
    pub fn value(&self, attribute: &str, row: usize) -> Option<i32> {
        self.column(attribute).and_then(|column| column.get(row))
    }

    /// Values of the row in declaration order
    pub fn row(&self, row: usize) -> Option<Vec<i32>> {
        self.declared
            .iter()
            .map(|attribute| self.value(attribute, row))
            .collect()
    }

    /// Sorts the rows by the composite key formed by the attributes of
    /// `order` this relation carries, taken in that order.
    ///
    /// Every column is permuted together so rows stay intact. The sort is
    /// stable, and a relation carrying none of the attributes is untouched.
    pub fn sort_by_order<S: AsRef<str>>(&mut self, order: &[S]) {
        let key = self.key_columns(order);
        if key.is_empty() || self.tuple_count < 2 {
            return;
        }
        let mut permutation: Vec<usize> = (0..self.tuple_count).collect();
        permutation.sort_by(|&a, &b| compare_rows(&key, a, b));
        drop(key);

        for column in self.columns.values_mut() {
            column.permute(&permutation);
        }
    }

    /// Whether the rows are ordered by the composite key `order` induces
    pub fn is_sorted_by<S: AsRef<str>>(&self, order: &[S]) -> bool {
        let key = self.key_columns(order);
        if key.is_empty() {
            return true;
        }
        if key.len() == 1 {
            return key[0].is_sorted_within(self.full_range());
        }
        (1..self.tuple_count).all(|row| compare_rows(&key, row - 1, row) != Ordering::Greater)
    }

    fn key_columns<S: AsRef<str>>(&self, order: &[S]) -> Vec<&Column> {
        order
            .iter()
            .filter_map(|attribute| self.columns.get(attribute.as_ref()))
            .collect()
    }
}

fn compare_rows(key: &[&Column], a: usize, b: usize) -> Ordering {
    key.iter()
        .map(|column| column.values()[a].cmp(&column.values()[b]))
        .find(|ordering| *ordering != Ordering::Equal)
        .unwrap_or(Ordering::Equal)
}

impl RelationSchema for Relation {
    fn name(&self) -> &str {
        Relation::name(self)
    }

    fn len(&self) -> usize {
        Relation::len(self)
    }

    fn has_attribute(&self, attribute: &str) -> bool {
        Relation::has_attribute(self, attribute)
    }
}

/// Row count and attribute set of a relation, without any data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelationStats {
    pub name: String,
    pub tuple_count: usize,
    pub attributes: Vec<String>,
}

impl RelationStats {
    pub fn new<S: Into<String>>(name: impl Into<String>, tuple_count: usize, attributes: Vec<S>) -> Self {
        Self {
            name: name.into(),
            tuple_count,
            attributes: attributes.into_iter().map(Into::into).collect(),
        }
    }
}

impl From<&Relation> for RelationStats {
    fn from(relation: &Relation) -> Self {
        RelationStats::new(relation.name(), relation.len(), relation.attributes().to_vec())
    }
}

impl RelationSchema for RelationStats {
    fn name(&self) -> &str {
        &self.name
    }

    fn len(&self) -> usize {
        self.tuple_count
    }

    fn has_attribute(&self, attribute: &str) -> bool {
        self.attributes.iter().any(|a| a == attribute)
    }
}
