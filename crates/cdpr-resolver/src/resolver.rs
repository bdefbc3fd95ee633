//! Inverse-dynamics resolver
//!
//! [`IdResolver`] is the per-step orchestrator: it formulates the tension QP
//! from a [`DynamicsSnapshot`], dispatches it to the configured backend with
//! the retained warm-start hint, classifies the outcome and updates the hint
//! for the next step.
//!
//! One resolver instance serves one robot: the hint state is mutated in place
//! across calls and is not safe to share. Callers resolving several robots in
//! parallel use one instance each.

use nalgebra::{DMatrix, DVector};
use thiserror::Error;

use crate::backend::{create_backend, ExitStatus, QpBackend, SolverHint};
use crate::config::{BackendId, HintPolicy, ResolverConfig, SolverOptions};
use crate::constraint::LinearConstraint;
use crate::objective::Objective;
use crate::problem::Problem;
use crate::snapshot::DynamicsSnapshot;

/// Reserved marker written into every force entry of a failed resolve.
///
/// No physical cable tension is negative, so negative infinity can never
/// collide with a valid solution.
pub const INVALID_FORCE: f64 = f64::NEG_INFINITY;

/// Unrecoverable formulation or configuration errors.
///
/// Backend outcomes are never reported here; they land in
/// [`Resolution::exit_status`] so a stepping caller can keep going.
#[derive(Debug, Error)]
pub enum ResolverError {
    /// A matrix or vector does not match the cable count or its block shape.
    #[error("dimension mismatch in {what}: expected {expected}, got {got}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },
    /// The configured backend is not compiled into this build.
    #[error("QP backend `{0}` is not available in this build")]
    BackendUnavailable(BackendId),
    /// The snapshot describes zero cables.
    #[error("snapshot describes zero cables")]
    EmptyProblem,
}

/// Result of one resolve call.
#[derive(Debug, Clone)]
pub struct Resolution {
    /// Cable tensions; every entry is [`INVALID_FORCE`] unless `exit_status`
    /// is [`ExitStatus::Success`].
    pub forces: DVector<f64>,
    /// Objective value of `forces`; finite iff the solve succeeded.
    pub cost: f64,
    /// Classified backend outcome.
    pub exit_status: ExitStatus,
    /// Iterations spent by the backend.
    pub iterations: usize,
}

impl Resolution {
    /// Whether this resolution carries a usable force distribution.
    pub fn is_valid(&self) -> bool {
        self.exit_status.is_success()
    }

    fn failed(n: usize, exit_status: ExitStatus, iterations: usize) -> Self {
        Self {
            forces: DVector::from_element(n, INVALID_FORCE),
            cost: f64::INFINITY,
            exit_status,
            iterations,
        }
    }
}

/// QP-based inverse-dynamics resolver for one CDPR instance.
pub struct IdResolver {
    objective: Box<dyn Objective>,
    constraints: Vec<Box<dyn LinearConstraint>>,
    backend: Box<dyn QpBackend>,
    options: SolverOptions,
    hint_policy: HintPolicy,
    hint: SolverHint,
}

impl IdResolver {
    /// Create a resolver with the given configuration and objective.
    ///
    /// The backend is resolved here, so an unavailable backend identifier
    /// fails construction rather than the first resolve.
    pub fn new(config: ResolverConfig, objective: Box<dyn Objective>) -> Result<Self, ResolverError> {
        let backend = create_backend(config.backend, &config.options)?;
        Ok(Self {
            objective,
            constraints: Vec::new(),
            backend,
            options: config.options,
            hint_policy: config.hint_policy,
            hint: SolverHint::empty(),
        })
    }

    /// Append a constraint strategy. Registration order fixes which stacked
    /// rows belong to which strategy; it has no effect on feasibility.
    pub fn add_constraint(&mut self, constraint: Box<dyn LinearConstraint>) {
        self.constraints.push(constraint);
    }

    /// Swap the backend. The warm-start hint is reset: hints are meaningful
    /// only to the backend that produced them.
    pub fn set_backend(&mut self, id: BackendId) -> Result<(), ResolverError> {
        self.backend = create_backend(id, &self.options)?;
        self.hint = SolverHint::empty();
        Ok(())
    }

    /// The warm-start hint that will seed the next resolve.
    pub fn hint(&self) -> &SolverHint {
        &self.hint
    }

    /// Resolve the cable-force distribution for one control instant.
    pub fn resolve(&mut self, snapshot: &DynamicsSnapshot) -> Result<Resolution, ResolverError> {
        let n = snapshot.cable_count();

        // A hint from a different cable count is meaningless; drop it.
        if !self.hint.matches_cable_count(n) {
            self.hint = SolverHint::empty();
        }

        let problem = self.formulate(snapshot)?;
        let outcome = self.backend.solve(&problem, &self.hint);

        if self.options.verbose {
            eprintln!(
                "resolver: backend={} status={:?} iterations={}",
                self.backend.id(),
                outcome.status,
                outcome.iterations
            );
        }

        if !outcome.status.is_success() {
            match self.hint_policy {
                HintPolicy::RetainLastGood => {}
                HintPolicy::ClearOnFailure => self.hint = SolverHint::empty(),
            }
            return Ok(Resolution::failed(n, outcome.status, outcome.iterations));
        }

        let cost = self.objective.evaluate(&problem.cost, &outcome.forces);
        self.hint = outcome.hint;
        Ok(Resolution {
            forces: outcome.forces,
            cost,
            exit_status: ExitStatus::Success,
            iterations: outcome.iterations,
        })
    }

    /// Assemble the QP for one snapshot, stacking constraint blocks in
    /// registration order. Any shape mismatch is a hard error; blocks are
    /// never truncated or padded.
    fn formulate(&self, snapshot: &DynamicsSnapshot) -> Result<Problem, ResolverError> {
        let n = snapshot.cable_count();
        let cost = self.objective.update(snapshot)?;
        if cost.a.nrows() != n {
            return Err(ResolverError::DimensionMismatch {
                what: "objective matrix rows",
                expected: n,
                got: cost.a.nrows(),
            });
        }
        if cost.a.ncols() != n {
            return Err(ResolverError::DimensionMismatch {
                what: "objective matrix columns",
                expected: n,
                got: cost.a.ncols(),
            });
        }
        if cost.b.len() != n {
            return Err(ResolverError::DimensionMismatch {
                what: "objective linear term",
                expected: n,
                got: cost.b.len(),
            });
        }

        let mut blocks = Vec::with_capacity(self.constraints.len());
        let mut total_rows = 0;
        for constraint in &self.constraints {
            let block = constraint.update(snapshot)?;
            if block.a.ncols() != n {
                return Err(ResolverError::DimensionMismatch {
                    what: "constraint block columns",
                    expected: n,
                    got: block.a.ncols(),
                });
            }
            total_rows += block.rows();
            blocks.push(block);
        }

        let mut a_ineq = DMatrix::zeros(total_rows, n);
        let mut b_ineq = DVector::zeros(total_rows);
        let mut row = 0;
        for block in &blocks {
            a_ineq
                .view_mut((row, 0), (block.rows(), n))
                .copy_from(&block.a);
            b_ineq.rows_mut(row, block.rows()).copy_from(&block.b);
            row += block.rows();
        }

        Ok(Problem {
            cost,
            a_eq: snapshot.a_eq().clone(),
            b_eq: snapshot.b_eq().clone(),
            a_ineq,
            b_ineq,
            f_min: snapshot.f_min().clone(),
            f_max: snapshot.f_max().clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constraint::StaticBlock;
    use crate::objective::MinimumNormObjective;
    use approx::assert_relative_eq;

    fn resolver() -> IdResolver {
        IdResolver::new(
            ResolverConfig::default(),
            Box::new(MinimumNormObjective::new()),
        )
        .unwrap()
    }

    fn snapshot(b_eq: f64, f_max: [f64; 2]) -> DynamicsSnapshot {
        DynamicsSnapshot::new(
            DMatrix::from_row_slice(1, 2, &[1.0, 1.0]),
            DVector::from_element(1, b_eq),
            DVector::from_row_slice(&[0.0, 0.0]),
            DVector::from_row_slice(&f_max),
        )
        .unwrap()
    }

    #[test]
    fn test_resolve_feasible() {
        let mut resolver = resolver();
        let resolution = resolver.resolve(&snapshot(10.0, [20.0, 20.0])).unwrap();
        assert!(resolution.is_valid());
        assert_relative_eq!(resolution.forces.sum(), 10.0, epsilon = 1e-6);
        assert_relative_eq!(resolution.cost, 50.0, epsilon = 1e-6);
    }

    #[test]
    fn test_failed_resolve_yields_sentinel_and_keeps_hint() {
        let mut resolver = resolver();
        let good = resolver.resolve(&snapshot(10.0, [20.0, 20.0])).unwrap();
        let bad = resolver.resolve(&snapshot(10.0, [3.0, 3.0])).unwrap();

        assert_eq!(bad.exit_status, ExitStatus::Infeasible);
        assert!(bad.forces.iter().all(|&f| f == INVALID_FORCE));
        assert_eq!(bad.cost, f64::INFINITY);

        // RetainLastGood: the hint still holds the successful forces.
        let hint_forces = resolver.hint().previous_forces.as_ref().unwrap();
        assert_relative_eq!(hint_forces[0], good.forces[0], epsilon = 1e-9);
    }

    #[test]
    fn test_clear_on_failure_policy() {
        let config = ResolverConfig {
            hint_policy: HintPolicy::ClearOnFailure,
            ..ResolverConfig::default()
        };
        let mut resolver =
            IdResolver::new(config, Box::new(MinimumNormObjective::new())).unwrap();
        resolver.resolve(&snapshot(10.0, [20.0, 20.0])).unwrap();
        assert!(!resolver.hint().is_empty());
        resolver.resolve(&snapshot(10.0, [3.0, 3.0])).unwrap();
        assert!(resolver.hint().is_empty());
    }

    #[test]
    fn test_cable_count_change_invalidates_hint() {
        let mut resolver = resolver();
        resolver.resolve(&snapshot(10.0, [20.0, 20.0])).unwrap();
        assert!(!resolver.hint().is_empty());

        let three_cables = DynamicsSnapshot::new(
            DMatrix::from_row_slice(1, 3, &[1.0, 1.0, 1.0]),
            DVector::from_element(1, 10.0),
            DVector::zeros(3),
            DVector::from_element(3, 20.0),
        )
        .unwrap();
        let resolution = resolver.resolve(&three_cables).unwrap();
        assert!(resolution.is_valid());
        assert_eq!(resolver.hint().previous_forces.as_ref().unwrap().len(), 3);
    }

    #[test]
    fn test_backend_swap_resets_hint() {
        let mut resolver = resolver();
        resolver.resolve(&snapshot(10.0, [20.0, 20.0])).unwrap();
        assert!(!resolver.hint().is_empty());
        resolver.set_backend(BackendId::ActiveSet).unwrap();
        assert!(resolver.hint().is_empty());
    }

    #[test]
    fn test_row_deficient_objective_reports_row_count() {
        use crate::problem::QuadraticCost;

        struct RowDeficientObjective;
        impl Objective for RowDeficientObjective {
            fn update(&self, snapshot: &DynamicsSnapshot) -> Result<QuadraticCost, ResolverError> {
                let n = snapshot.cable_count();
                Ok(QuadraticCost {
                    a: DMatrix::zeros(1, n),
                    b: DVector::zeros(n),
                })
            }
        }

        let mut resolver = IdResolver::new(
            ResolverConfig::default(),
            Box::new(RowDeficientObjective),
        )
        .unwrap();
        let result = resolver.resolve(&snapshot(10.0, [20.0, 20.0]));
        assert!(matches!(
            result,
            Err(ResolverError::DimensionMismatch {
                what: "objective matrix rows",
                expected: 2,
                got: 1,
            })
        ));
    }

    #[test]
    fn test_mismatched_constraint_block_fails_fast() {
        let mut resolver = resolver();
        resolver.add_constraint(Box::new(
            StaticBlock::new(DMatrix::zeros(1, 3), DVector::zeros(1)).unwrap(),
        ));
        let result = resolver.resolve(&snapshot(10.0, [20.0, 20.0]));
        assert!(matches!(
            result,
            Err(ResolverError::DimensionMismatch { expected: 2, got: 3, .. })
        ));
    }
}
