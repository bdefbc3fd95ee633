//! Quadratic objective strategies
//!
//! An objective maps the current [`DynamicsSnapshot`] to the quadratic cost
//! `f(x) = xᵀ A x + bᵀ x` that the backend minimizes. Strategies must be
//! deterministic for a given snapshot and carry no mutable state between
//! calls; everything the resolver needs comes back in the returned
//! [`QuadraticCost`].

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::problem::QuadraticCost;
use crate::resolver::ResolverError;
use crate::snapshot::DynamicsSnapshot;

/// Strategy producing the quadratic cost for the current snapshot.
pub trait Objective {
    /// Build the cost matrices `(A, b)` for this snapshot.
    fn update(&self, snapshot: &DynamicsSnapshot) -> Result<QuadraticCost, ResolverError>;

    /// Scalar cost of a candidate solution under a cost previously returned
    /// by [`Objective::update`].
    fn evaluate(&self, cost: &QuadraticCost, forces: &DVector<f64>) -> f64 {
        cost.evaluate(forces)
    }
}

/// Minimize the weighted squared tension norm, `Σ wᵢ fᵢ²`.
///
/// With uniform weights this is the classical minimum-2-norm force
/// distribution; per-cable weights let heavily loaded winches trade tension
/// against the others.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MinimumNormObjective {
    /// Per-cable weights; empty means identity weighting.
    pub weights: Vec<f64>,
}

impl MinimumNormObjective {
    /// Identity-weighted minimum norm.
    pub fn new() -> Self {
        Self { weights: Vec::new() }
    }

    /// Per-cable weighted minimum norm.
    pub fn weighted(weights: Vec<f64>) -> Self {
        Self { weights }
    }

    fn weight_matrix(&self, n: usize) -> Result<DMatrix<f64>, ResolverError> {
        if self.weights.is_empty() {
            return Ok(DMatrix::identity(n, n));
        }
        if self.weights.len() != n {
            return Err(ResolverError::DimensionMismatch {
                what: "objective weights",
                expected: n,
                got: self.weights.len(),
            });
        }
        Ok(DMatrix::from_diagonal(&DVector::from_row_slice(
            &self.weights,
        )))
    }
}

impl Default for MinimumNormObjective {
    fn default() -> Self {
        Self::new()
    }
}

impl Objective for MinimumNormObjective {
    fn update(&self, snapshot: &DynamicsSnapshot) -> Result<QuadraticCost, ResolverError> {
        let n = snapshot.cable_count();
        Ok(QuadraticCost {
            a: self.weight_matrix(n)?,
            b: DVector::zeros(n),
        })
    }
}

/// Pull tensions toward the middle of their admissible band.
///
/// Minimizes `‖f − (f_min + f_max)/2‖²_W`, which keeps every cable as far from
/// both bounds as the equations of motion allow. Expanding the square gives
/// `A = W`, `b = −2 W f_mid` (the constant term does not affect the argmin and
/// is dropped, so reported costs can be negative).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundCentringObjective {
    /// Per-cable weights; empty means identity weighting.
    pub weights: Vec<f64>,
}

impl BoundCentringObjective {
    pub fn new() -> Self {
        Self { weights: Vec::new() }
    }
}

impl Default for BoundCentringObjective {
    fn default() -> Self {
        Self::new()
    }
}

impl Objective for BoundCentringObjective {
    fn update(&self, snapshot: &DynamicsSnapshot) -> Result<QuadraticCost, ResolverError> {
        let n = snapshot.cable_count();
        let w = if self.weights.is_empty() {
            DMatrix::identity(n, n)
        } else {
            if self.weights.len() != n {
                return Err(ResolverError::DimensionMismatch {
                    what: "objective weights",
                    expected: n,
                    got: self.weights.len(),
                });
            }
            DMatrix::from_diagonal(&DVector::from_row_slice(&self.weights))
        };
        let mid = snapshot.bound_midpoint();
        let b = -2.0 * (&w * mid);
        Ok(QuadraticCost { a: w, b })
    }
}
