/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::fmt;

/// Half-open interval `[start, end)` of row positions inside one relation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct RowRange {
    pub start: usize,
    pub end: usize,
}

impl RowRange {
    pub const EMPTY: RowRange = RowRange { start: 0, end: 0 };

    pub fn new(start: usize, end: usize) -> Self {
        debug_assert!(start <= end, "inverted range {}..{}", start, end);
        Self { start, end }
    }

    /// The range covering every row of a relation with `len` rows
    pub fn full(len: usize) -> Self {
        Self { start: 0, end: len }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start >= self.end
    }

    pub fn rows(&self) -> std::ops::Range<usize> {
        self.start..self.end
    }
}

impl fmt::Display for RowRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// One attribute column of a relation
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Column {
    values: Vec<i32>,
}

impl Column {
    pub fn new(values: Vec<i32>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, row: usize) -> Option<i32> {
        self.values.get(row).copied()
    }

    pub fn values(&self) -> &[i32] {
        &self.values
    }

    /// Returns the maximal sub-range of `range` whose values equal `value`.
    ///
    /// The column must be sorted ascending inside `range`. An absent value
    /// yields an empty range positioned at its insertion point.
    pub fn query(&self, range: RowRange, value: i32) -> RowRange {
        let end = range.end.min(self.values.len());
        let start = range.start.min(end);
        let window = &self.values[start..end];
        let lower = window.partition_point(|v| *v < value);
        let upper = lower + window[lower..].partition_point(|v| *v <= value);
        RowRange::new(start + lower, start + upper)
    }

    pub(crate) fn permute(&mut self, order: &[usize]) {
        self.values = order.iter().map(|&row| self.values[row]).collect();
    }

    pub(crate) fn is_sorted_within(&self, range: RowRange) -> bool {
        self.values[range.rows()].windows(2).all(|w| w[0] <= w[1])
    }
}

impl From<Vec<i32>> for Column {
    fn from(values: Vec<i32>) -> Self {
        Column::new(values)
    }
}
