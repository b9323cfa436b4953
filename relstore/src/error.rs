/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, StorageError>;

/// Failures while building or loading relations
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Parse error in {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Column '{attribute}' of relation '{relation}' has {actual} rows, expected {expected}")]
    ColumnLength {
        relation: String,
        attribute: String,
        expected: usize,
        actual: usize,
    },

    #[error("Relation '{relation}' already has attribute '{attribute}'")]
    DuplicateAttribute { relation: String, attribute: String },
}

impl StorageError {
    pub fn parse(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        StorageError::Parse {
            path: path.into(),
            message: message.into(),
        }
    }
}
