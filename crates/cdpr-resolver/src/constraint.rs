//! Linear inequality constraint strategies
//!
//! Each strategy produces one block `A_block · f ≤ b_block` from the current
//! snapshot; the resolver stacks the blocks vertically in registration order.
//! A block whose column count does not match the cable count is a hard error:
//! the resolver never truncates or pads constraint matrices.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::resolver::ResolverError;
use crate::snapshot::DynamicsSnapshot;

/// One block of linear inequality constraints.
#[derive(Debug, Clone)]
pub struct ConstraintBlock {
    /// Block matrix (rows × cables).
    pub a: DMatrix<f64>,
    /// Block right-hand side.
    pub b: DVector<f64>,
}

impl ConstraintBlock {
    /// Create a block, validating internal consistency.
    pub fn new(a: DMatrix<f64>, b: DVector<f64>) -> Result<Self, ResolverError> {
        if b.len() != a.nrows() {
            return Err(ResolverError::DimensionMismatch {
                what: "constraint right-hand side",
                expected: a.nrows(),
                got: b.len(),
            });
        }
        Ok(Self { a, b })
    }

    /// Number of rows in this block.
    pub fn rows(&self) -> usize {
        self.a.nrows()
    }
}

/// Strategy producing one inequality block per snapshot.
pub trait LinearConstraint {
    /// Build this strategy's block for the current snapshot.
    fn update(&self, snapshot: &DynamicsSnapshot) -> Result<ConstraintBlock, ResolverError>;
}

/// Cap on the summed tension of all cables, `1ᵀ f ≤ cap`.
///
/// Bounds the total load on the winch frame independently of how the
/// distribution splits it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TotalTensionLimit {
    /// Maximum summed tension [N].
    pub cap: f64,
}

impl TotalTensionLimit {
    pub fn new(cap: f64) -> Self {
        Self { cap }
    }
}

impl LinearConstraint for TotalTensionLimit {
    fn update(&self, snapshot: &DynamicsSnapshot) -> Result<ConstraintBlock, ResolverError> {
        let n = snapshot.cable_count();
        ConstraintBlock::new(
            DMatrix::from_element(1, n, 1.0),
            DVector::from_element(1, self.cap),
        )
    }
}

/// A fixed, user-supplied block.
///
/// Useful for constraints computed outside the resolver (for example a
/// linearized interference cone). The block is re-validated against the cable
/// count on every call, so a snapshot with a different cable count fails fast.
#[derive(Debug, Clone)]
pub struct StaticBlock {
    block: ConstraintBlock,
}

impl StaticBlock {
    pub fn new(a: DMatrix<f64>, b: DVector<f64>) -> Result<Self, ResolverError> {
        Ok(Self {
            block: ConstraintBlock::new(a, b)?,
        })
    }
}

impl LinearConstraint for StaticBlock {
    fn update(&self, snapshot: &DynamicsSnapshot) -> Result<ConstraintBlock, ResolverError> {
        if self.block.a.ncols() != snapshot.cable_count() {
            return Err(ResolverError::DimensionMismatch {
                what: "static constraint block columns",
                expected: snapshot.cable_count(),
                got: self.block.a.ncols(),
            });
        }
        Ok(self.block.clone())
    }
}
