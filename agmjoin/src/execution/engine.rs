/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use super::range_table::{MixedRadix, RangeTable, RowRange};
use crate::config::JoinConfig;
use crate::error::{JoinError, Result};
use crate::plan::PlanNode;
use log::{debug, info};
use rayon::prelude::*;
use relstore::{Column, Relation};
use std::cmp::Ordering;

/// Caps applied to every range table the engine builds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionLimits {
    pub row_limit: usize,
    pub capacity_ceiling: usize,
}

impl Default for ExecutionLimits {
    fn default() -> Self {
        Self::from(&JoinConfig::default())
    }
}

impl From<&JoinConfig> for ExecutionLimits {
    fn from(config: &JoinConfig) -> Self {
        Self {
            row_limit: config.row_limit,
            capacity_ceiling: config.capacity_ceiling,
        }
    }
}

/// The root range table of an executed plan
#[derive(Debug, Clone)]
pub struct JoinOutput {
    table: RangeTable,
}

impl JoinOutput {
    /// Number of distinct bindings of the query attributes
    pub fn cardinality(&self) -> usize {
        self.table.len()
    }

    pub fn table(&self) -> &RangeTable {
        &self.table
    }

    /// Reads the bound value of every attribute for up to `limit` result tuples.
    pub fn materialize(
        &self,
        relations: &[Relation],
        attributes: &[String],
        limit: Option<usize>,
    ) -> Result<Vec<Vec<i32>>> {
        let sources = attributes
            .iter()
            .map(|attribute| {
                self.table
                    .tracked()
                    .iter()
                    .find_map(|&r| relations.get(r)?.column(attribute).map(|c| (r, c)))
                    .ok_or_else(|| JoinError::illegal(format!("attribute '{}' is not bound", attribute)))
            })
            .collect::<Result<Vec<_>>>()?;

        let rows = limit.unwrap_or(usize::MAX).min(self.table.len());
        Ok((0..rows)
            .map(|row| {
                sources
                    .iter()
                    .map(|&(relation, column)| self.table.value_at(row, relation, column))
                    .collect()
            })
            .collect())
    }
}

/// A child table with its rows ordered by key columns of tracked relations
struct SortedSide<'t, 'a> {
    table: &'t RangeTable,
    keys: Vec<(usize, &'a Column)>,
    order: Vec<usize>,
}

impl<'t, 'a> SortedSide<'t, 'a> {
    fn new(table: &'t RangeTable, keys: Vec<(usize, &'a Column)>) -> Self {
        let order = table.sorted_rows(&keys);
        Self { table, keys, order }
    }

    fn compare(&self, row: usize, wanted: &[i32]) -> Ordering {
        self.keys
            .iter()
            .zip(wanted)
            .map(|(&(relation, column), value)| self.table.value_at(row, relation, column).cmp(value))
            .find(|ordering| ordering.is_ne())
            .unwrap_or(Ordering::Equal)
    }

    /// Positions in `order` whose key equals `wanted`
    fn bracket(&self, wanted: &[i32]) -> RowRange {
        let lower = self
            .order
            .partition_point(|&row| self.compare(row, wanted) == Ordering::Less);
        let upper = self
            .order
            .partition_point(|&row| self.compare(row, wanted) != Ordering::Greater);
        RowRange::new(lower, upper)
    }

    fn row(&self, position: usize) -> usize {
        self.order[position]
    }
}

/// Copies the ranges of the relations `table` tracks from `row` into `tuple`.
fn merge_tracked(tuple: &mut [RowRange], table: &RangeTable, row: usize) {
    let source = table.tuple(row);
    for &relation in table.tracked() {
        tuple[relation] = source[relation];
    }
}

/// Evaluates plans bottom-up over relations sorted by the plan's variable order
pub struct JoinEngine<'a> {
    relations: &'a [Relation],
    full: Vec<RowRange>,
    limits: ExecutionLimits,
    parallel: bool,
}

impl<'a> JoinEngine<'a> {
    pub fn new(relations: &'a [Relation], config: &JoinConfig) -> Self {
        Self::with_limits(relations, ExecutionLimits::from(config), config.parallel)
    }

    pub fn with_limits(relations: &'a [Relation], limits: ExecutionLimits, parallel: bool) -> Self {
        Self {
            relations,
            full: relations.iter().map(Relation::full_range).collect(),
            limits,
            parallel,
        }
    }

    /// Consumes the plan and returns the root table; its row count is the join cardinality.
    pub fn execute(&self, plan: PlanNode) -> Result<JoinOutput> {
        let table = self.evaluate(plan)?;
        info!("Join produced {} tuples", table.len());
        Ok(JoinOutput { table })
    }

    fn root_table(&self) -> RangeTable {
        let lengths: Vec<usize> = self.full.iter().map(RowRange::len).collect();
        RangeTable::root(&lengths)
    }

    fn evaluate(&self, plan: PlanNode) -> Result<RangeTable> {
        let table = match plan {
            PlanNode::Sequential {
                attribute,
                relations,
                child,
                ..
            } => {
                let input = match child {
                    Some(child) => self.evaluate(*child)?,
                    None => self.root_table(),
                };
                self.extend(&input, &attribute, &relations)?
            }
            PlanNode::Binary {
                attribute: Some(attribute),
                relations,
                children,
                ..
            } => {
                let tables = self.evaluate_all(children)?;
                self.sort_merge(tables, &attribute, &relations)?
            }
            PlanNode::Binary { children, .. } | PlanNode::Cartesian { children, .. } => {
                let tables = self.evaluate_all(children)?;
                self.cross(tables)?
            }
            PlanNode::Hub {
                relation,
                branches,
                exclusive,
                ..
            } => {
                let (plans, joins): (Vec<_>, Vec<_>) = branches
                    .into_iter()
                    .map(|branch| (branch.plan, branch.join_attributes))
                    .unzip();
                let tables = self.evaluate_all(plans)?;
                self.hub_join(relation, tables.into_iter().zip(joins).collect(), &exclusive)?
            }
        };
        Ok(table)
    }

    fn evaluate_all(&self, plans: Vec<PlanNode>) -> Result<Vec<RangeTable>> {
        if self.parallel && plans.len() > 1 {
            plans.into_par_iter().map(|plan| self.evaluate(plan)).collect()
        } else {
            plans.into_iter().map(|plan| self.evaluate(plan)).collect()
        }
    }

    fn new_table(&self, hint: usize) -> RangeTable {
        RangeTable::with_capacity(self.full.len(), hint.min(self.limits.capacity_ceiling))
    }

    fn emit(&self, table: &mut RangeTable, tuple: &[RowRange]) -> Result<()> {
        if table.len() >= self.limits.row_limit {
            return Err(JoinError::ResourceExceeded {
                resource: "range table rows",
                limit: self.limits.row_limit,
            });
        }
        table.push(tuple);
        Ok(())
    }

    fn relation(&self, index: usize) -> Result<&'a Relation> {
        self.relations.get(index).ok_or_else(|| {
            JoinError::illegal(format!(
                "plan refers to relation {} but only {} are loaded",
                index,
                self.relations.len()
            ))
        })
    }

    /// Rejects tables built over a different relation set.
    fn check_table(&self, table: &RangeTable) -> Result<()> {
        let width = self.full.len();
        if table.width() != width {
            return Err(JoinError::illegal(format!(
                "range table spans {} relations, expected {}",
                table.width(),
                width
            )));
        }
        if let Some(&relation) = table.tracked().iter().find(|&&r| r >= width) {
            return Err(JoinError::illegal(format!("range table tracks unknown relation {}", relation)));
        }
        Ok(())
    }

    fn column(&self, relation: usize, attribute: &str) -> Result<&'a Column> {
        let carrier = self.relation(relation)?;
        carrier.column(attribute).ok_or_else(|| {
            JoinError::illegal(format!(
                "relation {} has no attribute '{}'",
                carrier.name(),
                attribute
            ))
        })
    }

    /// `(index, column)` of each relation in `relations` carrying `attribute`
    fn carriers(&self, relations: &[usize], attribute: &str) -> Result<Vec<(usize, &'a Column)>> {
        let mut carriers = Vec::with_capacity(relations.len());
        for &r in relations {
            if let Some(column) = self.relation(r)?.column(attribute) {
                carriers.push((r, column));
            }
        }
        Ok(carriers)
    }

    /// First relation `table` tracks that carries `attribute`
    fn tracker(&self, table: &RangeTable, attribute: &str) -> Result<(usize, &'a Column)> {
        let relations = self.relations;
        table
            .tracked()
            .iter()
            .find_map(|&r| relations.get(r)?.column(attribute).map(|c| (r, c)))
            .ok_or_else(|| JoinError::illegal(format!("no joined relation binds '{}'", attribute)))
    }

    /// Binds `attribute` in every tuple of `input` across the relations carrying it.
    ///
    /// The relation with the shortest current range drives: each distinct
    /// value in its range is looked up in the others, and a tuple is emitted
    /// when all of them contain it.
    pub fn extend(&self, input: &RangeTable, attribute: &str, relations: &[usize]) -> Result<RangeTable> {
        self.check_table(input)?;
        let carriers = self.carriers(relations, attribute)?;
        if carriers.is_empty() {
            return Err(JoinError::illegal(format!(
                "no relation in {:?} carries '{}'",
                relations, attribute
            )));
        }

        let hint = input
            .tuples()
            .map(|tuple| carriers.iter().map(|&(r, _)| tuple[r].len()).min().unwrap_or(0))
            .fold(0usize, usize::saturating_add);
        let mut output = self.new_table(hint);
        output.track(input.tracked().iter().copied());
        output.track(carriers.iter().map(|&(r, _)| r));

        let mut scratch = Vec::with_capacity(self.full.len());
        for tuple in input.tuples() {
            let Some(driver) = (0..carriers.len()).min_by_key(|&slot| tuple[carriers[slot].0].len()) else {
                continue;
            };
            let (driver_relation, driver_column) = carriers[driver];
            let bracket = tuple[driver_relation];

            let mut position = bracket.start;
            while position < bracket.end {
                let value = driver_column.values()[position];
                let run = driver_column.query(RowRange::new(position, bracket.end), value);
                position = run.end.max(position + 1);

                scratch.clear();
                scratch.extend_from_slice(tuple);
                scratch[driver_relation] = run;
                let mut matched = true;
                for (slot, &(relation, column)) in carriers.iter().enumerate() {
                    if slot == driver {
                        continue;
                    }
                    let narrowed = column.query(tuple[relation], value);
                    if narrowed.is_empty() {
                        matched = false;
                        break;
                    }
                    scratch[relation] = narrowed;
                }
                if matched {
                    self.emit(&mut output, &scratch)?;
                }
            }
        }
        debug!("extend '{}': {} -> {} tuples", attribute, input.len(), output.len());
        Ok(output)
    }

    /// Cross product of tables over disjoint relation sets.
    pub fn cross(&self, tables: Vec<RangeTable>) -> Result<RangeTable> {
        for table in &tables {
            self.check_table(table)?;
        }
        let lengths: Vec<usize> = tables.iter().map(RangeTable::len).collect();
        let total = MixedRadix::total(&lengths)
            .filter(|&total| total <= self.limits.row_limit)
            .ok_or(JoinError::ResourceExceeded {
                resource: "cross product rows",
                limit: self.limits.row_limit,
            })?;

        let mut output = self.new_table(total);
        for table in &tables {
            output.track(table.tracked().iter().copied());
        }

        let mut scratch = self.full.clone();
        let mut counter = MixedRadix::new(lengths);
        while let Some(rows) = counter.advance() {
            scratch.copy_from_slice(&self.full);
            for (table, &row) in tables.iter().zip(rows) {
                merge_tracked(&mut scratch, table, row);
            }
            self.emit(&mut output, &scratch)?;
        }
        debug!("cross of {} tables: {} tuples", tables.len(), output.len());
        Ok(output)
    }

    /// Sort-merge join of tables that all bind `attribute`.
    ///
    /// Relations of `relations` carrying the attribute that no table tracks
    /// are narrowed directly from their full range.
    pub fn sort_merge(&self, tables: Vec<RangeTable>, attribute: &str, relations: &[usize]) -> Result<RangeTable> {
        for table in &tables {
            self.check_table(table)?;
        }
        let sides = tables
            .iter()
            .map(|table| Ok(SortedSide::new(table, vec![self.tracker(table, attribute)?])))
            .collect::<Result<Vec<_>>>()?;
        let untracked: Vec<usize> = relations
            .iter()
            .copied()
            .filter(|&r| !tables.iter().any(|table| table.tracks(r)))
            .collect();
        let extras = self.carriers(&untracked, attribute)?;

        let hint = tables.iter().map(RangeTable::len).max().unwrap_or(0);
        let mut output = self.new_table(hint);
        for table in &tables {
            output.track(table.tracked().iter().copied());
        }
        output.track(extras.iter().map(|&(r, _)| r));

        let Some(driver) = (0..sides.len()).min_by_key(|&i| sides[i].order.len()) else {
            return Ok(output);
        };

        let mut scratch = self.full.clone();
        let mut brackets = vec![RowRange::EMPTY; sides.len()];
        let mut narrowed = vec![RowRange::EMPTY; extras.len()];
        let driver_side = &sides[driver];
        let mut position = 0;
        while position < driver_side.order.len() {
            let row = driver_side.row(position);
            let value = driver_side.table.value_at(row, driver_side.keys[0].0, driver_side.keys[0].1);
            let wanted = [value];
            brackets[driver] = driver_side.bracket(&wanted);
            position = brackets[driver].end.max(position + 1);

            let mut matched = true;
            for (i, side) in sides.iter().enumerate() {
                if i != driver {
                    brackets[i] = side.bracket(&wanted);
                    if brackets[i].is_empty() {
                        matched = false;
                        break;
                    }
                }
            }
            if matched {
                for (slot, &(relation, column)) in extras.iter().enumerate() {
                    narrowed[slot] = column.query(self.full[relation], value);
                    if narrowed[slot].is_empty() {
                        matched = false;
                        break;
                    }
                }
            }
            if !matched {
                continue;
            }

            let mut counter = MixedRadix::new(brackets.iter().map(RowRange::len).collect());
            while let Some(offsets) = counter.advance() {
                scratch.copy_from_slice(&self.full);
                for ((side, bracket), &offset) in sides.iter().zip(&brackets).zip(offsets) {
                    merge_tracked(&mut scratch, side.table, side.row(bracket.start + offset));
                }
                for (&(relation, _), range) in extras.iter().zip(&narrowed) {
                    scratch[relation] = *range;
                }
                self.emit(&mut output, &scratch)?;
            }
        }
        debug!("sort-merge on '{}' of {} tables: {} tuples", attribute, tables.len(), output.len());
        Ok(output)
    }

    /// Joins each branch table with the hub relation on the branch's join attributes.
    ///
    /// The hub must be sorted by the branches' join attributes in branch
    /// order followed by `exclusive`. Each distinct hub key is bracketed in
    /// every branch; within a key, every distinct combination of exclusive
    /// values becomes one hub range crossed with the branch brackets.
    pub fn hub_join(
        &self,
        hub: usize,
        branches: Vec<(RangeTable, Vec<String>)>,
        exclusive: &[String],
    ) -> Result<RangeTable> {
        let hub_relation = self.relation(hub)?;
        for (table, _) in &branches {
            self.check_table(table)?;
        }
        let hub_order: Vec<&str> = branches
            .iter()
            .flat_map(|(_, join_attributes)| join_attributes.iter().map(String::as_str))
            .chain(exclusive.iter().map(String::as_str))
            .collect();
        if !hub_relation.is_sorted_by(&hub_order) {
            return Err(JoinError::illegal(format!(
                "hub relation {} is not sorted by {:?}",
                hub_relation.name(),
                hub_order
            )));
        }

        let mut sides = Vec::with_capacity(branches.len());
        let mut hub_keys: Vec<&Column> = Vec::new();
        for (table, join_attributes) in &branches {
            let mut keys = Vec::with_capacity(join_attributes.len());
            for attribute in join_attributes {
                keys.push(self.tracker(table, attribute)?);
                hub_keys.push(self.column(hub, attribute)?);
            }
            sides.push(SortedSide::new(table, keys));
        }
        let exclusive_columns = exclusive
            .iter()
            .map(|attribute| self.column(hub, attribute))
            .collect::<Result<Vec<_>>>()?;

        let mut output = self.new_table(hub_relation.len());
        for (table, _) in &branches {
            output.track(table.tracked().iter().copied());
        }
        output.track([hub]);
        if sides.iter().any(|side| side.order.is_empty()) {
            return Ok(output);
        }

        let rows = hub_relation.len();
        let mut key = Vec::with_capacity(hub_keys.len());
        let mut brackets = vec![RowRange::EMPTY; sides.len()];
        let mut scratch = self.full.clone();
        let mut row = 0;
        while row < rows {
            key.clear();
            key.extend(hub_keys.iter().map(|column| column.values()[row]));
            let mut matching = RowRange::full(rows);
            for (column, &value) in hub_keys.iter().zip(&key) {
                matching = column.query(matching, value);
            }
            if matching.start != row || matching.is_empty() {
                return Err(JoinError::illegal(format!(
                    "hub relation {} is not sorted by its join attributes",
                    hub_relation.name()
                )));
            }
            row = matching.end;

            let mut offset = 0;
            let mut matched = true;
            for (i, side) in sides.iter().enumerate() {
                let wanted = &key[offset..offset + side.keys.len()];
                offset += side.keys.len();
                brackets[i] = side.bracket(wanted);
                if brackets[i].is_empty() {
                    matched = false;
                    break;
                }
            }
            if !matched {
                continue;
            }

            let mut start = matching.start;
            while start < matching.end {
                let mut run = RowRange::new(start, matching.end);
                for column in &exclusive_columns {
                    run = column.query(run, column.values()[start]);
                }
                start = run.end.max(start + 1);

                let mut counter = MixedRadix::new(brackets.iter().map(RowRange::len).collect());
                while let Some(offsets) = counter.advance() {
                    scratch.copy_from_slice(&self.full);
                    scratch[hub] = run;
                    for ((side, bracket), &offset) in sides.iter().zip(&brackets).zip(offsets) {
                        merge_tracked(&mut scratch, side.table, side.row(bracket.start + offset));
                    }
                    self.emit(&mut output, &scratch)?;
                }
            }
        }
        debug!(
            "hub join on {} with {} branches: {} tuples",
            hub_relation.name(),
            sides.len(),
            output.len()
        );
        Ok(output)
    }
}
