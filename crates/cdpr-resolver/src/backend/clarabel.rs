//! Clarabel interior-point backend
//!
//! Wraps the pure-Rust Clarabel conic solver. The tension QP is lowered to
//! the conic form `min ½xᵀPx + qᵀx s.t. Ax + s = b, s ∈ K` with a zero cone
//! for the equations of motion and a nonnegative cone for the stacked
//! inequalities and both sides of the tension bounds.
//!
//! This is the plain-QP backend variant: it takes a fixed iteration cap from
//! the solver options and ignores the hint's active-set descriptor.

use clarabel::algebra::CscMatrix;
use clarabel::solver::{
    DefaultSettingsBuilder, DefaultSolver, IPSolver, SolverStatus, SupportedConeT,
};
use nalgebra::{DMatrix, DVector};

use crate::config::{BackendId, SolverOptions};
use crate::problem::Problem;

use super::{ExitStatus, QpBackend, SolveOutcome, SolverHint};

/// Clarabel-backed QP solve with a fixed iteration cap.
pub struct ClarabelBackend {
    options: SolverOptions,
}

impl ClarabelBackend {
    pub fn new(options: SolverOptions) -> Self {
        Self { options }
    }
}

fn classify(status: SolverStatus) -> ExitStatus {
    match status {
        SolverStatus::Solved => ExitStatus::Success,
        SolverStatus::PrimalInfeasible | SolverStatus::AlmostPrimalInfeasible => {
            ExitStatus::Infeasible
        }
        SolverStatus::MaxIterations | SolverStatus::MaxTime => ExitStatus::IterationLimitExceeded,
        _ => ExitStatus::NumericalFailure,
    }
}

/// Convert a dense nalgebra matrix to Clarabel CSC, keeping all entries.
fn to_csc(m: &DMatrix<f64>) -> CscMatrix<f64> {
    let mut colptr = Vec::with_capacity(m.ncols() + 1);
    let mut rowval = Vec::new();
    let mut nzval = Vec::new();
    colptr.push(0);
    for c in 0..m.ncols() {
        for r in 0..m.nrows() {
            let v = m[(r, c)];
            if v != 0.0 {
                rowval.push(r);
                nzval.push(v);
            }
        }
        colptr.push(rowval.len());
    }
    CscMatrix::new(m.nrows(), m.ncols(), colptr, rowval, nzval)
}

/// Upper-triangular CSC of a symmetric matrix, as Clarabel expects for `P`.
fn to_upper_csc(m: &DMatrix<f64>) -> CscMatrix<f64> {
    let mut colptr = Vec::with_capacity(m.ncols() + 1);
    let mut rowval = Vec::new();
    let mut nzval = Vec::new();
    colptr.push(0);
    for c in 0..m.ncols() {
        for r in 0..=c {
            let v = m[(r, c)];
            if v != 0.0 {
                rowval.push(r);
                nzval.push(v);
            }
        }
        colptr.push(rowval.len());
    }
    CscMatrix::new(m.nrows(), m.ncols(), colptr, rowval, nzval)
}

impl QpBackend for ClarabelBackend {
    fn id(&self) -> BackendId {
        BackendId::Clarabel
    }

    fn solve(&self, problem: &Problem, _hint: &SolverHint) -> SolveOutcome {
        let n = problem.num_cables();
        let m_eq = problem.a_eq.nrows();
        let m_ineq = problem.a_ineq.nrows();

        // Clarabel minimizes ½xᵀPx + qᵀx; our cost is xᵀAx + bᵀx.
        let p = to_upper_csc(&(&problem.cost.a + problem.cost.a.transpose()));
        let q: Vec<f64> = problem.cost.b.iter().copied().collect();

        // Stack [A_eq; A_ineq; I; -I] with rhs [b_eq; b_ineq; f_max; -f_min].
        let rows = m_eq + m_ineq + 2 * n;
        let mut a = DMatrix::zeros(rows, n);
        let mut b = DVector::zeros(rows);
        a.view_mut((0, 0), (m_eq, n)).copy_from(&problem.a_eq);
        b.rows_mut(0, m_eq).copy_from(&problem.b_eq);
        if m_ineq > 0 {
            a.view_mut((m_eq, 0), (m_ineq, n)).copy_from(&problem.a_ineq);
            b.rows_mut(m_eq, m_ineq).copy_from(&problem.b_ineq);
        }
        for i in 0..n {
            a[(m_eq + m_ineq + i, i)] = 1.0;
            b[m_eq + m_ineq + i] = problem.f_max[i];
            a[(m_eq + m_ineq + n + i, i)] = -1.0;
            b[m_eq + m_ineq + n + i] = -problem.f_min[i];
        }

        let mut cones = Vec::with_capacity(2);
        if m_eq > 0 {
            cones.push(SupportedConeT::ZeroConeT(m_eq));
        }
        cones.push(SupportedConeT::NonnegativeConeT(m_ineq + 2 * n));

        let settings = DefaultSettingsBuilder::default()
            .verbose(self.options.verbose)
            .max_iter(self.options.max_iterations as u32)
            .tol_gap_abs(self.options.tolerance)
            .tol_gap_rel(self.options.tolerance)
            .tol_feas(self.options.tolerance)
            .build()
            .expect("static Clarabel settings are valid");

        let b: Vec<f64> = b.iter().copied().collect();
        let mut solver = DefaultSolver::new(&p, &q, &to_csc(&a), &b, &cones, settings);
        solver.solve();

        let status = classify(solver.solution.status);
        let iterations = solver.info.iterations as usize;
        if status == ExitStatus::Success {
            let forces = DVector::from_row_slice(&solver.solution.x);
            let hint = SolverHint {
                previous_forces: Some(forces.clone()),
                active_set: None,
            };
            SolveOutcome {
                forces,
                status: ExitStatus::Success,
                iterations,
                hint,
            }
        } else {
            SolveOutcome {
                forces: DVector::zeros(n),
                status,
                iterations,
                hint: SolverHint::empty(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::QuadraticCost;
    use approx::assert_relative_eq;

    fn two_cable_problem(f_max: [f64; 2]) -> Problem {
        Problem {
            cost: QuadraticCost {
                a: DMatrix::identity(2, 2),
                b: DVector::zeros(2),
            },
            a_eq: DMatrix::from_row_slice(1, 2, &[1.0, 1.0]),
            b_eq: DVector::from_element(1, 10.0),
            a_ineq: DMatrix::zeros(0, 2),
            b_ineq: DVector::zeros(0),
            f_min: DVector::from_row_slice(&[0.0, 0.0]),
            f_max: DVector::from_row_slice(&f_max),
        }
    }

    #[test]
    fn test_feasible_problem_solved() {
        let backend = ClarabelBackend::new(SolverOptions::default());
        let outcome = backend.solve(&two_cable_problem([20.0, 20.0]), &SolverHint::empty());
        assert_eq!(outcome.status, ExitStatus::Success);
        assert_relative_eq!(outcome.forces[0] + outcome.forces[1], 10.0, epsilon = 1e-6);
        assert!(outcome.iterations > 0);
    }

    #[test]
    fn test_infeasible_bounds_classified() {
        let backend = ClarabelBackend::new(SolverOptions::default());
        let outcome = backend.solve(&two_cable_problem([3.0, 3.0]), &SolverHint::empty());
        assert_eq!(outcome.status, ExitStatus::Infeasible);
    }

    #[test]
    fn test_csc_conversion_roundtrip() {
        let m = DMatrix::from_row_slice(2, 3, &[1.0, 0.0, 2.0, 0.0, 3.0, 0.0]);
        let csc = to_csc(&m);
        assert_eq!(csc.m, 2);
        assert_eq!(csc.n, 3);
        assert_eq!(csc.nzval, vec![1.0, 3.0, 2.0]);
    }

    #[test]
    fn test_upper_csc_drops_lower_triangle() {
        let m = DMatrix::from_row_slice(2, 2, &[2.0, 1.0, 1.0, 2.0]);
        let csc = to_upper_csc(&m);
        assert_eq!(csc.nzval, vec![2.0, 1.0, 2.0]);
    }
}
