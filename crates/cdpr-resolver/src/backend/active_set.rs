//! Native active-set QP backend
//!
//! Dense primal active-set iteration for the strictly convex tension QPs this
//! crate produces. Each iteration solves the KKT system of the equality
//! constraints plus the current working set, then either
//!
//! - adds the most violated bound or inequality to the working set,
//! - drops the working-set item with the most negative multiplier, or
//! - terminates with the current iterate.
//!
//! When the pinned system grows past the variable count the working set fully
//! determines the iterate; an inconsistent or still-violated pinned system at
//! that point is classified as infeasible. This is the clamping scheme used
//! for cable force distribution, where infeasibility almost always surfaces
//! as "every cable saturated and the wrench still unmet".
//!
//! The working set doubles as the warm-start descriptor: it is encoded into
//! the hint after a successful solve and decoded back on the next call. An
//! absent descriptor simply means an empty initial working set.

use nalgebra::{DMatrix, DVector};

use crate::config::{BackendId, SolverOptions};
use crate::problem::Problem;

use super::{ExitStatus, QpBackend, SolveOutcome, SolverHint};

/// One member of the working set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ActiveItem {
    /// Cable `i` pinned at its lower bound.
    Lower(usize),
    /// Cable `i` pinned at its upper bound.
    Upper(usize),
    /// Inequality row `j` treated as an equality.
    Ineq(usize),
}

impl ActiveItem {
    /// Opaque hint encoding: bounds occupy `[0, 2n)`, inequality rows follow.
    fn encode(self, n: usize) -> usize {
        match self {
            ActiveItem::Lower(i) => 2 * i,
            ActiveItem::Upper(i) => 2 * i + 1,
            ActiveItem::Ineq(j) => 2 * n + j,
        }
    }

    fn decode(code: usize, n: usize, m_ineq: usize) -> Option<Self> {
        if code < 2 * n {
            let i = code / 2;
            if code % 2 == 0 {
                Some(ActiveItem::Lower(i))
            } else {
                Some(ActiveItem::Upper(i))
            }
        } else if code - 2 * n < m_ineq {
            Some(ActiveItem::Ineq(code - 2 * n))
        } else {
            None
        }
    }

    /// The item viewed as a row `a·x = c` of the pinned system.
    fn row(self, problem: &Problem) -> (DVector<f64>, f64) {
        let n = problem.num_cables();
        match self {
            // Lower bound is the inequality -x_i <= -f_min_i.
            ActiveItem::Lower(i) => {
                let mut a = DVector::zeros(n);
                a[i] = -1.0;
                (a, -problem.f_min[i])
            }
            ActiveItem::Upper(i) => {
                let mut a = DVector::zeros(n);
                a[i] = 1.0;
                (a, problem.f_max[i])
            }
            ActiveItem::Ineq(j) => (problem.a_ineq.row(j).transpose(), problem.b_ineq[j]),
        }
    }

    /// For a bound, the item pinning the same cable at the other bound.
    fn opposite(self) -> Option<Self> {
        match self {
            ActiveItem::Lower(i) => Some(ActiveItem::Upper(i)),
            ActiveItem::Upper(i) => Some(ActiveItem::Lower(i)),
            ActiveItem::Ineq(_) => None,
        }
    }
}

/// Dense active-set backend with active-set warm-starting.
pub struct ActiveSetBackend {
    options: SolverOptions,
}

impl ActiveSetBackend {
    pub fn new(options: SolverOptions) -> Self {
        Self { options }
    }

    fn decode_hint(&self, hint: &SolverHint, n: usize, m_ineq: usize) -> Vec<ActiveItem> {
        let mut working = Vec::new();
        if let Some(codes) = &hint.active_set {
            for &code in codes {
                if let Some(item) = ActiveItem::decode(code, n, m_ineq) {
                    if !working.contains(&item) {
                        working.push(item);
                    }
                }
            }
        }
        working
    }

    /// Solve the KKT system of the equalities plus the working set.
    ///
    /// Returns `(x, multipliers)` where `multipliers[k]` belongs to
    /// `working[k]`, or `None` when the system is singular.
    fn solve_kkt(
        &self,
        problem: &Problem,
        working: &[ActiveItem],
    ) -> Option<(DVector<f64>, DVector<f64>)> {
        let n = problem.num_cables();
        let m_eq = problem.a_eq.nrows();
        let m_w = working.len();
        let dim = n + m_eq + m_w;

        // Hessian of x'Ax + b'x is A + A'.
        let hessian = &problem.cost.a + problem.cost.a.transpose();

        let mut kkt = DMatrix::zeros(dim, dim);
        let mut rhs = DVector::zeros(dim);

        kkt.view_mut((0, 0), (n, n)).copy_from(&hessian);
        for i in 0..n {
            rhs[i] = -problem.cost.b[i];
        }
        for r in 0..m_eq {
            for c in 0..n {
                kkt[(n + r, c)] = problem.a_eq[(r, c)];
                kkt[(c, n + r)] = problem.a_eq[(r, c)];
            }
            rhs[n + r] = problem.b_eq[r];
        }
        for (k, item) in working.iter().enumerate() {
            let (a, c) = item.row(problem);
            for col in 0..n {
                kkt[(n + m_eq + k, col)] = a[col];
                kkt[(col, n + m_eq + k)] = a[col];
            }
            rhs[n + m_eq + k] = c;
        }

        let solution = kkt.lu().solve(&rhs)?;
        let x = solution.rows(0, n).into_owned();
        let multipliers = solution.rows(n + m_eq, m_w).into_owned();
        Some((x, multipliers))
    }

    /// Least-squares solve of the fully pinned system `[A_eq; W] x = [b; c]`.
    ///
    /// Used once the pinned rows outnumber the variables: a consistent system
    /// yields the unique candidate, an inconsistent one proves the working
    /// set cannot coexist with the equations of motion.
    fn solve_pinned(
        &self,
        problem: &Problem,
        working: &[ActiveItem],
    ) -> Result<(DVector<f64>, f64), ()> {
        let n = problem.num_cables();
        let m_eq = problem.a_eq.nrows();
        let rows = m_eq + working.len();

        let mut stacked = DMatrix::zeros(rows, n);
        let mut rhs = DVector::zeros(rows);
        stacked
            .view_mut((0, 0), (m_eq, n))
            .copy_from(&problem.a_eq);
        for r in 0..m_eq {
            rhs[r] = problem.b_eq[r];
        }
        for (k, item) in working.iter().enumerate() {
            let (a, c) = item.row(problem);
            for col in 0..n {
                stacked[(m_eq + k, col)] = a[col];
            }
            rhs[m_eq + k] = c;
        }

        let svd = stacked.clone().svd(true, true);
        let x = svd.solve(&rhs, f64::EPSILON).map_err(|_| ())?;
        let residual = (&stacked * &x - &rhs).amax();
        Ok((x, residual))
    }

    /// Most violated bound or non-working inequality, if any.
    fn most_violated(
        &self,
        problem: &Problem,
        x: &DVector<f64>,
        working: &[ActiveItem],
    ) -> Option<ActiveItem> {
        let tol = self.options.feasibility_tolerance;
        let mut worst: Option<(f64, ActiveItem)> = None;
        let mut consider = |violation: f64, item: ActiveItem| {
            if violation > tol && worst.map_or(true, |(v, _)| violation > v) {
                worst = Some((violation, item));
            }
        };

        for i in 0..x.len() {
            consider(problem.f_min[i] - x[i], ActiveItem::Lower(i));
            consider(x[i] - problem.f_max[i], ActiveItem::Upper(i));
        }
        for j in 0..problem.a_ineq.nrows() {
            let item = ActiveItem::Ineq(j);
            if !working.contains(&item) {
                let slack = problem.a_ineq.row(j).transpose().dot(x) - problem.b_ineq[j];
                consider(slack, item);
            }
        }
        worst.map(|(_, item)| item)
    }

    fn failure(&self, n: usize, status: ExitStatus, iterations: usize) -> SolveOutcome {
        SolveOutcome {
            forces: DVector::zeros(n),
            status,
            iterations,
            hint: SolverHint::empty(),
        }
    }
}

impl QpBackend for ActiveSetBackend {
    fn id(&self) -> BackendId {
        BackendId::ActiveSet
    }

    fn solve(&self, problem: &Problem, hint: &SolverHint) -> SolveOutcome {
        let n = problem.num_cables();
        let m_eq = problem.a_eq.nrows();
        let m_ineq = problem.a_ineq.nrows();
        let tol = self.options.feasibility_tolerance;

        // Crossed bounds can never be satisfied.
        for i in 0..n {
            if problem.f_min[i] > problem.f_max[i] + tol {
                return self.failure(n, ExitStatus::Infeasible, 0);
            }
        }

        let mut working = self.decode_hint(hint, n, m_ineq);
        working.truncate(n.saturating_sub(m_eq));

        for iteration in 1..=self.options.max_iterations {
            if m_eq + working.len() > n {
                // Fully pinned: the working set leaves no freedom.
                return match self.solve_pinned(problem, &working) {
                    Ok((x, residual)) if residual <= tol => {
                        if self.most_violated(problem, &x, &working).is_some() {
                            self.failure(n, ExitStatus::Infeasible, iteration)
                        } else {
                            let hint = SolverHint {
                                previous_forces: Some(x.clone()),
                                active_set: Some(
                                    working.iter().map(|item| item.encode(n)).collect(),
                                ),
                            };
                            SolveOutcome {
                                forces: x,
                                status: ExitStatus::Success,
                                iterations: iteration,
                                hint,
                            }
                        }
                    }
                    Ok(_) => self.failure(n, ExitStatus::Infeasible, iteration),
                    Err(()) => self.failure(n, ExitStatus::NumericalFailure, iteration),
                };
            }

            let (x, multipliers) = match self.solve_kkt(problem, &working) {
                Some(solution) => solution,
                None => {
                    // Singular KKT: linearly dependent pinned rows. An
                    // inconsistent system proves infeasibility (saturated
                    // constraints that cannot meet the wrench); only a
                    // consistent rank-deficient one is a numerical breakdown.
                    return match self.solve_pinned(problem, &working) {
                        Ok((_, residual)) if residual > tol => {
                            self.failure(n, ExitStatus::Infeasible, iteration)
                        }
                        _ => self.failure(n, ExitStatus::NumericalFailure, iteration),
                    };
                }
            };

            if let Some(item) = self.most_violated(problem, &x, &working) {
                // A bound can only be active on one side at a time.
                if let Some(opposite) = item.opposite() {
                    working.retain(|&w| w != opposite);
                }
                working.push(item);
                continue;
            }

            // Optimality requires nonnegative multipliers on the working set.
            let mut drop_index = None;
            let mut most_negative = -tol;
            for (k, &mu) in multipliers.iter().enumerate() {
                if mu < most_negative {
                    most_negative = mu;
                    drop_index = Some(k);
                }
            }
            if let Some(k) = drop_index {
                working.remove(k);
                continue;
            }

            let hint = SolverHint {
                previous_forces: Some(x.clone()),
                active_set: Some(working.iter().map(|item| item.encode(n)).collect()),
            };
            return SolveOutcome {
                forces: x,
                status: ExitStatus::Success,
                iterations: iteration,
                hint,
            };
        }

        self.failure(n, ExitStatus::IterationLimitExceeded, self.options.max_iterations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::problem::QuadraticCost;
    use approx::assert_relative_eq;

    fn problem(b_eq: f64, f_min: [f64; 2], f_max: [f64; 2]) -> Problem {
        Problem {
            cost: QuadraticCost {
                a: DMatrix::identity(2, 2),
                b: DVector::zeros(2),
            },
            a_eq: DMatrix::from_row_slice(1, 2, &[1.0, 1.0]),
            b_eq: DVector::from_element(1, b_eq),
            a_ineq: DMatrix::zeros(0, 2),
            b_ineq: DVector::zeros(0),
            f_min: DVector::from_row_slice(&f_min),
            f_max: DVector::from_row_slice(&f_max),
        }
    }

    fn backend() -> ActiveSetBackend {
        ActiveSetBackend::new(SolverOptions::default())
    }

    #[test]
    fn test_unconstrained_interior_solution() {
        let outcome = backend().solve(&problem(10.0, [0.0, 0.0], [20.0, 20.0]), &SolverHint::empty());
        assert_eq!(outcome.status, ExitStatus::Success);
        assert_relative_eq!(outcome.forces[0], 5.0, epsilon = 1e-9);
        assert_relative_eq!(outcome.forces[1], 5.0, epsilon = 1e-9);
        assert_eq!(outcome.iterations, 1);
    }

    #[test]
    fn test_bound_becomes_active() {
        let outcome = backend().solve(&problem(10.0, [0.0, 0.0], [4.0, 20.0]), &SolverHint::empty());
        assert_eq!(outcome.status, ExitStatus::Success);
        assert_relative_eq!(outcome.forces[0], 4.0, epsilon = 1e-9);
        assert_relative_eq!(outcome.forces[1], 6.0, epsilon = 1e-9);
        // One add step after the unconstrained solve.
        assert_eq!(outcome.iterations, 2);
        assert_eq!(outcome.hint.active_set.as_deref(), Some(&[1_usize][..]));
    }

    #[test]
    fn test_warm_start_skips_add_step() {
        let problem = problem(10.0, [0.0, 0.0], [4.0, 20.0]);
        let backend = backend();
        let cold = backend.solve(&problem, &SolverHint::empty());
        let warm = backend.solve(&problem, &cold.hint);
        assert_eq!(warm.status, ExitStatus::Success);
        assert!(warm.iterations < cold.iterations);
        assert_relative_eq!(warm.forces[0], cold.forces[0], epsilon = 1e-9);
    }

    #[test]
    fn test_saturated_bounds_infeasible() {
        let outcome = backend().solve(&problem(10.0, [0.0, 0.0], [3.0, 3.0]), &SolverHint::empty());
        assert_eq!(outcome.status, ExitStatus::Infeasible);
    }

    #[test]
    fn test_dependent_saturated_caps_infeasible() {
        // Pairwise caps sum to 10 but the wrench needs 12. Activating both
        // caps makes the pinned rows linearly dependent with the equality
        // and the KKT system singular; the inconsistency must still be
        // classified as infeasible, not as a numerical breakdown.
        let p = Problem {
            cost: QuadraticCost {
                a: DMatrix::identity(4, 4),
                b: DVector::zeros(4),
            },
            a_eq: DMatrix::from_row_slice(1, 4, &[1.0, 1.0, 1.0, 1.0]),
            b_eq: DVector::from_element(1, 12.0),
            a_ineq: DMatrix::from_row_slice(2, 4, &[1.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 1.0]),
            b_ineq: DVector::from_row_slice(&[5.0, 5.0]),
            f_min: DVector::zeros(4),
            f_max: DVector::from_element(4, 20.0),
        };
        let outcome = backend().solve(&p, &SolverHint::empty());
        assert_eq!(outcome.status, ExitStatus::Infeasible);
    }

    #[test]
    fn test_crossed_bounds_infeasible() {
        let outcome = backend().solve(&problem(10.0, [5.0, 5.0], [3.0, 20.0]), &SolverHint::empty());
        assert_eq!(outcome.status, ExitStatus::Infeasible);
    }

    #[test]
    fn test_inequality_row_activates() {
        let mut p = problem(10.0, [0.0, 0.0], [20.0, 20.0]);
        // Force an asymmetric split: f_0 - f_1 <= -2.
        p.a_ineq = DMatrix::from_row_slice(1, 2, &[1.0, -1.0]);
        p.b_ineq = DVector::from_element(1, -2.0);
        let outcome = backend().solve(&p, &SolverHint::empty());
        assert_eq!(outcome.status, ExitStatus::Success);
        assert_relative_eq!(outcome.forces[0], 4.0, epsilon = 1e-9);
        assert_relative_eq!(outcome.forces[1], 6.0, epsilon = 1e-9);
    }

    #[test]
    fn test_stale_hint_codes_are_discarded() {
        let problem = problem(10.0, [0.0, 0.0], [20.0, 20.0]);
        let hint = SolverHint {
            previous_forces: None,
            active_set: Some(vec![99, 250]),
        };
        let outcome = backend().solve(&problem, &hint);
        assert_eq!(outcome.status, ExitStatus::Success);
        assert_relative_eq!(outcome.forces[0], 5.0, epsilon = 1e-9);
    }
}
