//! Resolver configuration
//!
//! Backend selection and solver options are fixed at construction time; there
//! is no lazy first-call initialization, so every resolve call runs with the
//! same option set.

use serde::{Deserialize, Serialize};

/// Closed enumeration of QP backends.
///
/// Selecting a backend that is not compiled in is a configuration error
/// reported at resolver construction, never at resolve time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendId {
    /// Native dense active-set solver with active-set warm-starting.
    ActiveSet,
    /// Clarabel interior-point solver (requires the `clarabel` feature).
    Clarabel,
}

impl std::fmt::Display for BackendId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BackendId::ActiveSet => write!(f, "active_set"),
            BackendId::Clarabel => write!(f, "clarabel"),
        }
    }
}

/// What happens to the warm-start hint when a solve fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HintPolicy {
    /// Keep the hint from the last successful solve (default). A failed step
    /// must not poison the next warm start.
    RetainLastGood,
    /// Reset the hint so the next solve starts cold.
    ClearOnFailure,
}

impl Default for HintPolicy {
    fn default() -> Self {
        HintPolicy::RetainLastGood
    }
}

/// Per-backend solver options, built once at resolver construction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SolverOptions {
    /// Iteration cap per solve, independent of problem size.
    pub max_iterations: usize,
    /// Convergence tolerance passed to the backend.
    pub tolerance: f64,
    /// Tolerance used when checking constraint satisfaction.
    pub feasibility_tolerance: f64,
    /// Print per-solve diagnostics to stderr.
    pub verbose: bool,
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            tolerance: 1e-8,
            feasibility_tolerance: 1e-6,
            verbose: false,
        }
    }
}

/// Full resolver configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Which QP backend to dispatch to.
    pub backend: BackendId,
    /// Solver options shared by all backends.
    pub options: SolverOptions,
    /// Warm-start hint policy on failed solves.
    pub hint_policy: HintPolicy,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            backend: BackendId::ActiveSet,
            options: SolverOptions::default(),
            hint_policy: HintPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = SolverOptions::default();
        assert_eq!(options.max_iterations, 100);
        assert!(!options.verbose);
    }

    #[test]
    fn test_default_hint_policy_retains_last_good() {
        let config = ResolverConfig::default();
        assert_eq!(config.hint_policy, HintPolicy::RetainLastGood);
    }

    #[test]
    fn test_backend_id_display_names() {
        assert_eq!(BackendId::ActiveSet.to_string(), "active_set");
        assert_eq!(BackendId::Clarabel.to_string(), "clarabel");
    }
}
