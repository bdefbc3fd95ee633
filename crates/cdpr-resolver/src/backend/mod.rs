//! QP solver backends
//!
//! A backend wraps one concrete numerical QP solver behind a uniform
//! contract: it takes the assembled [`Problem`] plus the warm-start hint and
//! returns forces, a classified [`ExitStatus`] and a replacement hint. The
//! hint is returned by value, never mutated in place, so backends cannot
//! alias the resolver's retained state.
//!
//! The concrete backend is resolved once at construction via
//! [`create_backend`]; an identifier that is not compiled in is rejected
//! there, not at resolve time.

#[cfg(feature = "clarabel")]
pub mod clarabel;

pub mod active_set;

use nalgebra::DVector;

use crate::config::{BackendId, SolverOptions};
use crate::problem::Problem;
use crate::resolver::ResolverError;

/// Classified outcome of one QP solve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// Feasible optimum found within tolerance.
    Success,
    /// No force vector satisfies all constraints simultaneously.
    Infeasible,
    /// Ill-conditioned or degenerate problem detected by the backend.
    NumericalFailure,
    /// Iteration budget exhausted without certified convergence.
    IterationLimitExceeded,
    /// The configured backend is not recognized or not linked.
    ///
    /// In practice this is rejected at resolver construction
    /// ([`ResolverError::BackendUnavailable`]); the variant completes the
    /// taxonomy for callers matching exhaustively.
    SolverUnavailable,
}

impl ExitStatus {
    pub fn is_success(self) -> bool {
        self == ExitStatus::Success
    }
}

/// Warm-start state carried between solves.
///
/// Owned by the resolver; the active-set descriptor is an opaque index
/// encoding meaningful only to the backend that produced it.
#[derive(Debug, Clone, Default)]
pub struct SolverHint {
    /// Previous successful force solution, length = cable count of that solve.
    pub previous_forces: Option<DVector<f64>>,
    /// Previous active-set descriptor, for backends that support it.
    pub active_set: Option<Vec<usize>>,
}

impl SolverHint {
    /// A hint carrying nothing (cold start).
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether this hint offers any warm-start information.
    pub fn is_empty(&self) -> bool {
        self.previous_forces.is_none() && self.active_set.is_none()
    }

    /// Whether the hint matches a problem with `n` cables.
    pub fn matches_cable_count(&self, n: usize) -> bool {
        match &self.previous_forces {
            Some(f) => f.len() == n,
            None => true,
        }
    }
}

/// Everything a backend reports for one solve.
#[derive(Debug, Clone)]
pub struct SolveOutcome {
    /// Force solution; meaningful only when `status` is `Success`.
    pub forces: DVector<f64>,
    /// Classified exit status.
    pub status: ExitStatus,
    /// Iterations spent by the underlying solver.
    pub iterations: usize,
    /// Replacement warm-start hint for the next solve.
    pub hint: SolverHint,
}

/// One concrete numerical QP solver behind the uniform contract.
pub trait QpBackend {
    /// Identifier this backend was created for.
    fn id(&self) -> BackendId;

    /// Solve the assembled problem, optionally seeded by `hint`.
    ///
    /// Backends that do not understand part of the hint (for example the
    /// active-set descriptor) ignore it and fall back to their default
    /// starting strategy.
    fn solve(&self, problem: &Problem, hint: &SolverHint) -> SolveOutcome;
}

/// Resolve a backend identifier to a concrete backend instance.
///
/// Options are captured once here and reused for every subsequent solve.
pub fn create_backend(
    id: BackendId,
    options: &SolverOptions,
) -> Result<Box<dyn QpBackend>, ResolverError> {
    match id {
        BackendId::ActiveSet => Ok(Box::new(active_set::ActiveSetBackend::new(options.clone()))),
        #[cfg(feature = "clarabel")]
        BackendId::Clarabel => Ok(Box::new(clarabel::ClarabelBackend::new(options.clone()))),
        #[cfg(not(feature = "clarabel"))]
        BackendId::Clarabel => Err(ResolverError::BackendUnavailable(id)),
    }
}
