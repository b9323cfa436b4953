/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

//! Columnar storage for integer relations.
//!
//! A [`Relation`] is a named set of equal-length integer columns. Rows are
//! addressed through half-open [`RowRange`]s, and a column answers equality
//! queries inside a range once the relation has been sorted on the right key.

pub mod column;
pub mod error;
pub mod loader;
pub mod relation;

pub use column::{Column, RowRange};
pub use error::{Result, StorageError};
pub use loader::{Dataset, QuerySpec, RelationDesc, StatsCatalog};
pub use relation::{Relation, RelationSchema, RelationStats};
