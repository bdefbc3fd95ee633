//! Assembled QP for one resolve call
//!
//! Transient: constructed fresh from a [`DynamicsSnapshot`](crate::snapshot::DynamicsSnapshot)
//! and the registered strategies, handed to the backend, then discarded.

use nalgebra::{DMatrix, DVector};

/// Quadratic cost description `f(x) = xᵀ A x + bᵀ x`.
#[derive(Debug, Clone)]
pub struct QuadraticCost {
    /// Symmetric cost matrix `A` (n × n).
    pub a: DMatrix<f64>,
    /// Linear cost term `b` (n).
    pub b: DVector<f64>,
}

impl QuadraticCost {
    /// Evaluate `xᵀ A x + bᵀ x` for a candidate solution.
    pub fn evaluate(&self, x: &DVector<f64>) -> f64 {
        (x.transpose() * &self.a * x)[(0, 0)] + self.b.dot(x)
    }
}

/// The QP handed to a backend for one resolve call.
///
/// The inequality block is the vertical concatenation of the registered
/// constraint blocks in registration order; the order determines only which
/// rows belong to which constraint, never feasibility.
#[derive(Debug, Clone)]
pub struct Problem {
    /// Quadratic objective.
    pub cost: QuadraticCost,
    /// Equality constraint matrix (equations of motion).
    pub a_eq: DMatrix<f64>,
    /// Equality right-hand side.
    pub b_eq: DVector<f64>,
    /// Stacked inequality matrix, zero rows when no constraints registered.
    pub a_ineq: DMatrix<f64>,
    /// Stacked inequality right-hand side.
    pub b_ineq: DVector<f64>,
    /// Per-cable lower bounds.
    pub f_min: DVector<f64>,
    /// Per-cable upper bounds.
    pub f_max: DVector<f64>,
}

impl Problem {
    /// Number of decision variables (cables).
    pub fn num_cables(&self) -> usize {
        self.cost.a.ncols()
    }

    /// Check a candidate against every constraint class within `tol`.
    pub fn is_feasible(&self, x: &DVector<f64>, tol: f64) -> bool {
        if self.a_eq.nrows() > 0 {
            let eq_residual = &self.a_eq * x - &self.b_eq;
            if eq_residual.amax() > tol {
                return false;
            }
        }
        if self.a_ineq.nrows() > 0 {
            let slack = &self.a_ineq * x - &self.b_ineq;
            if slack.max() > tol {
                return false;
            }
        }
        (0..x.len()).all(|i| x[i] >= self.f_min[i] - tol && x[i] <= self.f_max[i] + tol)
    }
}
