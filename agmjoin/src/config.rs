/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::cost::LpSolver;
use crate::error::{JoinError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Plan search strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Strategy {
    /// Greedy attribute elimination
    #[default]
    TopDown,
    /// Exact dynamic programming over attribute subsets
    Dp,
    /// Dynamic programming keeping the cheapest states per width
    Beam,
    /// Cut-relation decomposition
    Hub,
}

impl Strategy {
    pub const ALL: [Strategy; 4] = [Strategy::TopDown, Strategy::Dp, Strategy::Beam, Strategy::Hub];

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::TopDown => "top-down",
            Strategy::Dp => "dp",
            Strategy::Beam => "beam",
            Strategy::Hub => "hub",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = JoinError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "top-down" | "topdown" => Ok(Strategy::TopDown),
            "dp" => Ok(Strategy::Dp),
            "beam" | "dp5" => Ok(Strategy::Beam),
            "hub" | "eh" => Ok(Strategy::Hub),
            other => Err(JoinError::config(format!("unknown strategy: {}", other))),
        }
    }
}

/// Settings for one planning and execution run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JoinConfig {
    pub strategy: Strategy,
    /// LP backend used for fractional edge covers
    pub solver: String,
    /// States kept per width by beam search
    pub beam_width: usize,
    /// Largest component exact DP will enumerate
    pub dp_max_attributes: usize,
    /// Hard cap on the rows of any intermediate or final range table
    pub row_limit: usize,
    /// Upper bound on preallocated range table capacity
    pub capacity_ceiling: usize,
    /// Run independent plan branches and candidate scoring on the rayon pool
    pub parallel: bool,
}

impl Default for JoinConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::TopDown,
            solver: "MINILP".to_string(),
            beam_width: 5,
            dp_max_attributes: 20,
            row_limit: 100_000_000,
            capacity_ceiling: 1_000_000,
            parallel: true,
        }
    }
}

impl JoinConfig {
    pub fn with_strategy(strategy: Strategy) -> Self {
        Self {
            strategy,
            ..Default::default()
        }
    }

    pub fn from_json_str(text: &str) -> Result<Self> {
        let config: JoinConfig = serde_json::from_str(text)
            .map_err(|e| JoinError::config(format!("malformed config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            JoinError::config(format!("cannot read config {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&text)
    }

    /// Resolves the solver id; fails on unknown or unsupported backends.
    pub fn lp_solver(&self) -> Result<LpSolver> {
        LpSolver::from_id(&self.solver)
    }

    pub fn validate(&self) -> Result<()> {
        self.lp_solver()?;
        if self.beam_width == 0 {
            return Err(JoinError::config("beam_width must be at least 1"));
        }
        if self.row_limit == 0 {
            return Err(JoinError::config("row_limit must be at least 1"));
        }
        Ok(())
    }
}
