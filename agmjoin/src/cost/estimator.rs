/*
 * Copyright © 2024 Volodymyr Kadzhaia
 * Copyright © 2024 Pieter Bonte
 * KU Leuven — Stream Intelligence Lab, Belgium
 *
 * This Source Code Form is subject to the terms of the Mozilla Public
 * License, v. 2.0. If a copy of the MPL was not distributed with this file,
 * you can obtain one at https://mozilla.org/MPL/2.0/.
 */

use crate::error::{JoinError, Result};
use log::{debug, warn};
use minilp::{ComparisonOp, LinearExpr, OptimizationDirection, Problem};
use relstore::RelationSchema;

/// LP backend used to solve fractional edge covers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LpSolver {
    /// In-process dense simplex
    MiniLp,
}

impl LpSolver {
    /// Backends that exist but cannot solve this problem type in-process
    const UNSUPPORTED: [&'static str; 8] =
        ["GLOP", "PDLP", "CLP", "CBC", "SCIP", "GUROBI", "CPLEX", "XPRESS"];

    /// Resolves a solver id, case-insensitively.
    pub fn from_id(id: &str) -> Result<Self> {
        let normalized = id.trim().to_ascii_uppercase();
        if normalized == "MINILP" {
            return Ok(LpSolver::MiniLp);
        }
        if Self::UNSUPPORTED.contains(&normalized.as_str()) {
            return Err(JoinError::config(format!("unsupported problem type: {}", id)));
        }
        Err(JoinError::config(format!("unknown solver: {}", id)))
    }

    pub fn id(&self) -> &'static str {
        match self {
            LpSolver::MiniLp => "MINILP",
        }
    }
}

/// A fractional edge cover and the AGM bound it yields
#[derive(Debug, Clone, PartialEq)]
pub struct FractionalCover {
    /// One weight per input relation; relations carrying none of the attributes get 0
    pub weights: Vec<f64>,
    /// `Π |R_i| ^ weight_i`
    pub bound: f64,
    /// False when the solver failed and the full cover was used instead
    pub optimal: bool,
}

impl FractionalCover {
    fn trivial(relations: usize, bound: f64) -> Self {
        Self {
            weights: vec![0.0; relations],
            bound,
            optimal: true,
        }
    }
}

/// Computes AGM bounds of joins over attribute subsets
#[derive(Debug, Clone, Copy)]
pub struct CardinalityEstimator {
    solver: LpSolver,
}

impl CardinalityEstimator {
    pub fn new(solver: LpSolver) -> Self {
        Self { solver }
    }

    pub fn from_id(solver_id: &str) -> Result<Self> {
        Ok(Self::new(LpSolver::from_id(solver_id)?))
    }

    pub fn solver(&self) -> LpSolver {
        self.solver
    }

    /// Upper bound on the number of distinct tuples over `attributes` in the join of `relations`
    pub fn estimate<R: RelationSchema + ?Sized>(&self, relations: &[&R], attributes: &[String]) -> f64 {
        self.fractional_cover(relations, attributes).bound
    }

    /// Solves `min Σ x_i·ln|R_i|` subject to `Σ{R_i ∋ a} x_i ≥ 1` for every attribute `a`.
    pub fn fractional_cover<R: RelationSchema + ?Sized>(
        &self,
        relations: &[&R],
        attributes: &[String],
    ) -> FractionalCover {
        if attributes.is_empty() {
            return FractionalCover::trivial(relations.len(), 1.0);
        }

        let relevant: Vec<usize> = relations
            .iter()
            .enumerate()
            .filter(|(_, r)| attributes.iter().any(|a| r.has_attribute(a)))
            .map(|(i, _)| i)
            .collect();

        if let Some(&empty) = relevant.iter().find(|&&i| relations[i].is_empty()) {
            let mut cover = FractionalCover::trivial(relations.len(), 0.0);
            cover.weights[empty] = 1.0;
            return cover;
        }

        let weights = match self.solver {
            LpSolver::MiniLp => solve_minilp(relations, &relevant, attributes),
        };

        let (weights, optimal) = match weights {
            Ok(weights) => (weights, true),
            Err(reason) => {
                warn!(
                    "Fractional cover over {:?} did not solve ({}); using the full cover",
                    attributes, reason
                );
                (vec![1.0; relevant.len()], false)
            }
        };

        let mut cover = FractionalCover::trivial(relations.len(), 1.0);
        let mut log_bound = 0.0;
        for (&i, weight) in relevant.iter().zip(weights) {
            let weight = weight.clamp(0.0, 1.0);
            cover.weights[i] = weight;
            log_bound += weight * (relations[i].len() as f64).ln();
        }
        cover.bound = log_bound.exp();
        cover.optimal = optimal;
        debug!("AGM bound over {:?}: {:.3}", attributes, cover.bound);
        cover
    }
}

fn solve_minilp<R: RelationSchema + ?Sized>(
    relations: &[&R],
    relevant: &[usize],
    attributes: &[String],
) -> std::result::Result<Vec<f64>, String> {
    let mut problem = Problem::new(OptimizationDirection::Minimize);
    let variables: Vec<_> = relevant
        .iter()
        .map(|&i| problem.add_var((relations[i].len() as f64).ln(), (0.0, 1.0)))
        .collect();

    for attribute in attributes {
        let mut row = LinearExpr::empty();
        let mut covered = false;
        for (variable, &i) in variables.iter().zip(relevant) {
            if relations[i].has_attribute(attribute) {
                row.add(*variable, 1.0);
                covered = true;
            }
        }
        if !covered {
            return Err(format!("no relation carries '{}'", attribute));
        }
        problem.add_constraint(row, ComparisonOp::Ge, 1.0);
    }

    let solution = problem.solve().map_err(|e| e.to_string())?;
    Ok(variables.iter().map(|&variable| solution[variable]).collect())
}

/// Resolves `solver_id` and estimates the join size; no problem is built when the id is rejected.
pub fn estimate<R: RelationSchema + ?Sized>(
    relations: &[&R],
    attributes: &[String],
    solver_id: &str,
) -> Result<f64> {
    let estimator = CardinalityEstimator::from_id(solver_id)?;
    Ok(estimator.estimate(relations, attributes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use relstore::RelationStats;

    fn attrs(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn triangle(size: usize) -> Vec<RelationStats> {
        vec![
            RelationStats::new("R", size, vec!["a", "b"]),
            RelationStats::new("S", size, vec!["b", "c"]),
            RelationStats::new("T", size, vec!["c", "a"]),
        ]
    }

    fn refs(relations: &[RelationStats]) -> Vec<&RelationStats> {
        relations.iter().collect()
    }

    #[test]
    fn test_triangle_bound() {
        let relations = triangle(4);
        let bound = estimate(&refs(&relations), &attrs(&["a", "b", "c"]), "MINILP").unwrap();
        assert!((bound - 8.0).abs() < 1e-6, "bound was {}", bound);
    }

    #[test]
    fn test_empty_attributes_estimate_one() {
        let relations = triangle(4);
        let bound = estimate(&refs(&relations), &[], "MINILP").unwrap();
        assert_eq!(bound, 1.0);
    }

    #[test]
    fn test_single_relation_bound_is_its_size() {
        let relations = triangle(7);
        let bound = estimate(&refs(&relations), &attrs(&["a"]), "minilp").unwrap();
        assert!((bound - 7.0).abs() < 1e-6);
    }

    #[test]
    fn test_disjoint_relations_multiply() {
        let relations = vec![
            RelationStats::new("R", 3, vec!["x"]),
            RelationStats::new("S", 5, vec!["y"]),
        ];
        let bound = estimate(&refs(&relations), &attrs(&["x", "y"]), "MINILP").unwrap();
        assert!((bound - 15.0).abs() < 1e-6);
    }

    #[test]
    fn test_uninvolved_relation_gets_zero_weight() {
        let relations = triangle(4);
        let estimator = CardinalityEstimator::new(LpSolver::MiniLp);
        let cover = estimator.fractional_cover(&refs(&relations), &attrs(&["b"]));
        assert_eq!(cover.weights[2], 0.0);
        assert!(cover.optimal);
        assert!((cover.bound - 4.0).abs() < 1e-6);
    }

    #[test]
    fn test_empty_relation_bounds_to_zero() {
        let mut relations = triangle(4);
        relations[1].tuple_count = 0;
        let bound = estimate(&refs(&relations), &attrs(&["a", "b", "c"]), "MINILP").unwrap();
        assert_eq!(bound, 0.0);
    }

    #[test]
    fn test_uncovered_attribute_falls_back_to_full_cover() {
        let relations = triangle(4);
        let estimator = CardinalityEstimator::new(LpSolver::MiniLp);
        let cover = estimator.fractional_cover(&refs(&relations), &attrs(&["a", "zzz"]));
        assert!(!cover.optimal);
        assert!((cover.bound - 16.0).abs() < 1e-6);
    }

    #[test]
    fn test_unknown_solver_is_invalid_configuration() {
        let relations = triangle(4);
        let err = estimate(&refs(&relations), &attrs(&["a"]), "NOT_A_SOLVER").unwrap_err();
        assert!(matches!(err, JoinError::InvalidConfiguration(ref m) if m.contains("unknown solver")));
    }

    #[test]
    fn test_unsupported_solver_is_invalid_configuration() {
        let err = LpSolver::from_id("glop").unwrap_err();
        assert!(matches!(err, JoinError::InvalidConfiguration(ref m) if m.contains("unsupported problem type")));
    }
}
