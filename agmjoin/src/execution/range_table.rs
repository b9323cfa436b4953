/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

pub use relstore::RowRange;

use relstore::Column;
use std::collections::BTreeSet;

/// Partial join results as one row range per relation per tuple.
///
/// Tuples are fixed-width records in a flat arena, addressed by
/// `(tuple, relation)`. `tracked` lists the relations whose ranges the
/// producing subtree has narrowed; every other relation keeps its full range.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RangeTable {
    width: usize,
    rows: usize,
    ranges: Vec<RowRange>,
    tracked: BTreeSet<usize>,
}

impl RangeTable {
    /// An empty table reserving room for `capacity` tuples
    pub fn with_capacity(width: usize, capacity: usize) -> Self {
        Self {
            width,
            rows: 0,
            ranges: Vec::with_capacity(width.saturating_mul(capacity)),
            tracked: BTreeSet::new(),
        }
    }

    /// The single tuple spanning every relation completely
    pub fn root(lengths: &[usize]) -> Self {
        let mut table = Self::with_capacity(lengths.len(), 1);
        let tuple: Vec<RowRange> = lengths.iter().map(|&len| RowRange::full(len)).collect();
        table.push(&tuple);
        table
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn len(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn tuple(&self, row: usize) -> &[RowRange] {
        &self.ranges[row * self.width..(row + 1) * self.width]
    }

    pub fn range(&self, row: usize, relation: usize) -> RowRange {
        self.ranges[row * self.width + relation]
    }

    pub fn tuples(&self) -> impl Iterator<Item = &[RowRange]> + '_ {
        (0..self.rows).map(move |row| self.tuple(row))
    }

    pub fn push(&mut self, tuple: &[RowRange]) {
        debug_assert_eq!(tuple.len(), self.width);
        self.ranges.extend_from_slice(tuple);
        self.rows += 1;
    }

    pub fn tracked(&self) -> &BTreeSet<usize> {
        &self.tracked
    }

    pub fn tracks(&self, relation: usize) -> bool {
        self.tracked.contains(&relation)
    }

    pub fn track(&mut self, relations: impl IntoIterator<Item = usize>) {
        self.tracked.extend(relations);
    }

    /// Value of `column` at the start of `relation`'s range in `row`
    pub fn value_at(&self, row: usize, relation: usize, column: &Column) -> i32 {
        column.values()[self.range(row, relation).start]
    }

    /// Row indices ordered by the values the given `(relation, column)` keys hold in each row
    pub fn sorted_rows(&self, keys: &[(usize, &Column)]) -> Vec<usize> {
        let values: Vec<Vec<i32>> = (0..self.rows)
            .map(|row| {
                keys.iter()
                    .map(|&(relation, column)| self.value_at(row, relation, column))
                    .collect()
            })
            .collect();
        let mut order: Vec<usize> = (0..self.rows).collect();
        order.sort_by(|&a, &b| values[a].cmp(&values[b]));
        order
    }
}

/// Counter over a mixed-radix number whose digit `i` runs in `0..bounds[i]`.
///
/// Enumerates the cross product of several index ranges, last digit fastest.
#[derive(Debug, Clone)]
pub struct MixedRadix {
    bounds: Vec<usize>,
    digits: Vec<usize>,
    started: bool,
    exhausted: bool,
}

impl MixedRadix {
    pub fn new(bounds: Vec<usize>) -> Self {
        let exhausted = bounds.iter().any(|&b| b == 0);
        Self {
            digits: vec![0; bounds.len()],
            bounds,
            started: false,
            exhausted,
        }
    }

    /// Number of combinations, `None` on overflow
    pub fn total(bounds: &[usize]) -> Option<usize> {
        bounds.iter().try_fold(1usize, |acc, &b| acc.checked_mul(b))
    }

    /// Advances to the next combination.
    pub fn advance(&mut self) -> Option<&[usize]> {
        if self.exhausted {
            return None;
        }
        if !self.started {
            self.started = true;
            return Some(&self.digits);
        }
        for i in (0..self.digits.len()).rev() {
            self.digits[i] += 1;
            if self.digits[i] < self.bounds[i] {
                return Some(&self.digits);
            }
            self.digits[i] = 0;
        }
        self.exhausted = true;
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_root_table_spans_relations() {
        let table = RangeTable::root(&[3, 0, 5]);
        assert_eq!(table.len(), 1);
        assert_eq!(table.tuple(0), &[RowRange::full(3), RowRange::full(0), RowRange::full(5)]);
        assert!(table.tracked().is_empty());
    }

    #[test]
    fn test_push_and_index() {
        let mut table = RangeTable::with_capacity(2, 0);
        table.push(&[RowRange::new(0, 1), RowRange::new(2, 4)]);
        table.push(&[RowRange::new(1, 2), RowRange::new(4, 6)]);
        assert_eq!(table.len(), 2);
        assert_eq!(table.range(1, 1), RowRange::new(4, 6));
        assert_eq!(table.tuples().count(), 2);
    }

    #[test]
    fn test_sorted_rows_by_value() {
        let column = Column::new(vec![30, 10, 20]);
        let mut table = RangeTable::with_capacity(1, 3);
        for row in 0..3 {
            table.push(&[RowRange::new(row, row + 1)]);
        }
        assert_eq!(table.sorted_rows(&[(0, &column)]), vec![1, 2, 0]);
    }

    #[test]
    fn test_mixed_radix_enumerates_cross_product() {
        let mut counter = MixedRadix::new(vec![2, 3]);
        let mut seen = Vec::new();
        while let Some(digits) = counter.advance() {
            seen.push(digits.to_vec());
        }
        assert_eq!(seen.len(), 6);
        assert_eq!(seen[0], vec![0, 0]);
        assert_eq!(seen[1], vec![0, 1]);
        assert_eq!(seen[5], vec![1, 2]);
        assert_eq!(MixedRadix::total(&[2, 3]), Some(6));
    }

    #[test]
    fn test_mixed_radix_with_zero_bound_is_empty() {
        let mut counter = MixedRadix::new(vec![4, 0]);
        assert!(counter.advance().is_none());
        assert_eq!(MixedRadix::total(&[4, 0]), Some(0));
    }

    #[test]
    fn test_mixed_radix_without_digits_yields_once() {
        let mut counter = MixedRadix::new(Vec::new());
        assert_eq!(counter.advance(), Some(&[][..]));
        assert!(counter.advance().is_none());
    }
}
