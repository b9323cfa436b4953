/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use relstore::StorageError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, JoinError>;

/// Errors raised while planning or executing a join
#[derive(Error, Debug)]
pub enum JoinError {
    /// Unknown or unsupported LP backend, or an out-of-range setting
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The query or a plan for it does not describe a joinable hypergraph
    #[error("Illegal query: {0}")]
    IllegalQuery(String),

    #[error("{0} does not implement plan search")]
    Unimplemented(&'static str),

    #[error("Resource limit exceeded: {resource} reached {limit}")]
    ResourceExceeded { resource: &'static str, limit: usize },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl JoinError {
    pub fn illegal(message: impl Into<String>) -> Self {
        JoinError::IllegalQuery(message.into())
    }

    pub fn config(message: impl Into<String>) -> Self {
        JoinError::InvalidConfiguration(message.into())
    }
}
