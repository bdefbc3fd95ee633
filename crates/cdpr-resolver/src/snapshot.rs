//! Dynamics snapshot
//!
//! One control instant of the rigid-body equations of motion, reduced to the
//! linear equality constraint the force distribution must satisfy:
//!
//! ```text
//! M(q)q̈ + C(q, q̇) + G(q) + F_ext = -Jᵀ f
//! ```
//!
//! The dynamics model owns the terms on the left; the resolver only sees the
//! assembled pair `A_eq f = b_eq` together with the per-cable tension bounds.

use nalgebra::{DMatrix, DVector};

use crate::resolver::ResolverError;

/// Equations-of-motion state for one resolve call.
///
/// Immutable for the duration of the call; produced by the external dynamics
/// model, read-only to the resolver.
#[derive(Debug, Clone)]
pub struct DynamicsSnapshot {
    a_eq: DMatrix<f64>,
    b_eq: DVector<f64>,
    f_min: DVector<f64>,
    f_max: DVector<f64>,
}

impl DynamicsSnapshot {
    /// Create a snapshot from a pre-assembled equality pair and tension bounds.
    ///
    /// All dimensions are checked here so that a malformed snapshot fails fast
    /// instead of producing a silently truncated problem.
    pub fn new(
        a_eq: DMatrix<f64>,
        b_eq: DVector<f64>,
        f_min: DVector<f64>,
        f_max: DVector<f64>,
    ) -> Result<Self, ResolverError> {
        let n = a_eq.ncols();
        if n == 0 {
            return Err(ResolverError::EmptyProblem);
        }
        if b_eq.len() != a_eq.nrows() {
            return Err(ResolverError::DimensionMismatch {
                what: "equality right-hand side",
                expected: a_eq.nrows(),
                got: b_eq.len(),
            });
        }
        if f_min.len() != n {
            return Err(ResolverError::DimensionMismatch {
                what: "lower force bounds",
                expected: n,
                got: f_min.len(),
            });
        }
        if f_max.len() != n {
            return Err(ResolverError::DimensionMismatch {
                what: "upper force bounds",
                expected: n,
                got: f_max.len(),
            });
        }
        Ok(Self {
            a_eq,
            b_eq,
            f_min,
            f_max,
        })
    }

    /// Build the equality pair from equations-of-motion terms.
    ///
    /// `j_transpose` is the structure matrix `Jᵀ` mapping cable tensions to
    /// the task-space wrench; `wrench` is `M·q̈ + C + G + F_ext`. The equality
    /// then reads `(-Jᵀ) f = wrench`.
    pub fn from_equations_of_motion(
        j_transpose: DMatrix<f64>,
        wrench: DVector<f64>,
        f_min: DVector<f64>,
        f_max: DVector<f64>,
    ) -> Result<Self, ResolverError> {
        Self::new(-j_transpose, wrench, f_min, f_max)
    }

    /// Number of cables `n`.
    pub fn cable_count(&self) -> usize {
        self.a_eq.ncols()
    }

    /// Equality constraint matrix `A_eq` (degrees of freedom × cables).
    pub fn a_eq(&self) -> &DMatrix<f64> {
        &self.a_eq
    }

    /// Equality right-hand side `b_eq`.
    pub fn b_eq(&self) -> &DVector<f64> {
        &self.b_eq
    }

    /// Per-cable lower tension bounds.
    pub fn f_min(&self) -> &DVector<f64> {
        &self.f_min
    }

    /// Per-cable upper tension bounds.
    pub fn f_max(&self) -> &DVector<f64> {
        &self.f_max
    }

    /// Midpoint of the admissible tension band, `(f_min + f_max) / 2`.
    pub fn bound_midpoint(&self) -> DVector<f64> {
        (&self.f_min + &self.f_max) * 0.5
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_cable_snapshot() -> DynamicsSnapshot {
        DynamicsSnapshot::new(
            DMatrix::from_row_slice(1, 2, &[1.0, 1.0]),
            DVector::from_row_slice(&[10.0]),
            DVector::from_row_slice(&[0.0, 0.0]),
            DVector::from_row_slice(&[20.0, 20.0]),
        )
        .unwrap()
    }

    #[test]
    fn test_cable_count() {
        assert_eq!(two_cable_snapshot().cable_count(), 2);
    }

    #[test]
    fn test_bound_midpoint() {
        let snapshot = two_cable_snapshot();
        let mid = snapshot.bound_midpoint();
        assert_eq!(mid[0], 10.0);
        assert_eq!(mid[1], 10.0);
    }

    #[test]
    fn test_rejects_mismatched_bounds() {
        let result = DynamicsSnapshot::new(
            DMatrix::from_row_slice(1, 2, &[1.0, 1.0]),
            DVector::from_row_slice(&[10.0]),
            DVector::from_row_slice(&[0.0]),
            DVector::from_row_slice(&[20.0, 20.0]),
        );
        assert!(matches!(
            result,
            Err(ResolverError::DimensionMismatch { expected: 2, got: 1, .. })
        ));
    }

    #[test]
    fn test_rejects_mismatched_rhs() {
        let result = DynamicsSnapshot::new(
            DMatrix::from_row_slice(2, 2, &[1.0, 1.0, 0.0, 1.0]),
            DVector::from_row_slice(&[10.0]),
            DVector::from_row_slice(&[0.0, 0.0]),
            DVector::from_row_slice(&[20.0, 20.0]),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_from_equations_of_motion_negates_structure_matrix() {
        let snapshot = DynamicsSnapshot::from_equations_of_motion(
            DMatrix::from_row_slice(1, 2, &[-1.0, -1.0]),
            DVector::from_row_slice(&[10.0]),
            DVector::from_row_slice(&[0.0, 0.0]),
            DVector::from_row_slice(&[20.0, 20.0]),
        )
        .unwrap();
        assert_eq!(snapshot.a_eq()[(0, 0)], 1.0);
        assert_eq!(snapshot.a_eq()[(0, 1)], 1.0);
    }
}
