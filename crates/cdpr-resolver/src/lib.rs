//! # CDPR Resolver
//!
//! Cable-force distribution for cable-driven parallel robots (CDPRs).
//!
//! A CDPR is over-actuated and its cables can only pull, so the rigid-body
//! equations of motion admit infinitely many tension vectors. This crate
//! resolves the redundancy with a quadratic program solved once per control
//! step:
//!
//! ```text
//! minimize    fᵀ A_obj f + b_objᵀ f
//! subject to  A_eq f = b_eq            (equations of motion)
//!             A_ineq f ≤ b_ineq        (registered constraint blocks)
//!             f_min ≤ f ≤ f_max        (per-cable tension bounds)
//! ```
//!
//! ## Modules
//!
//! - [`snapshot`]: per-instant dynamics input ([`DynamicsSnapshot`])
//! - [`objective`]: quadratic cost strategies
//! - [`constraint`]: linear inequality strategies
//! - [`backend`]: interchangeable QP solver backends
//! - [`resolver`]: the per-step orchestrator ([`IdResolver`])
//! - [`config`]: backend selection and solver options

pub mod backend;
pub mod config;
pub mod constraint;
pub mod objective;
pub mod problem;
pub mod resolver;
pub mod snapshot;

pub use backend::{ExitStatus, QpBackend, SolveOutcome, SolverHint};
pub use config::{BackendId, HintPolicy, ResolverConfig, SolverOptions};
pub use constraint::{ConstraintBlock, LinearConstraint, StaticBlock, TotalTensionLimit};
pub use objective::{BoundCentringObjective, MinimumNormObjective, Objective};
pub use problem::{Problem, QuadraticCost};
pub use resolver::{IdResolver, Resolution, ResolverError, INVALID_FORCE};
pub use snapshot::DynamicsSnapshot;
