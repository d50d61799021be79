use std::fmt::{self, Debug};

use crate::dtype::DType;
use crate::error::Result;
use crate::program::{Program, TargetOp};
use crate::shape::ValueShape;
use crate::storage::Scalar;

/// Binary reducers usable by scans and reductions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Reducer {
    Add,
    Mul,
    Max,
}

impl Reducer {
    /// The identity element of this reducer in `dtype`.
    pub fn identity(&self, dtype: DType) -> Scalar {
        match self {
            Reducer::Add => Scalar::zero(dtype),
            Reducer::Mul => Scalar::one(dtype),
            Reducer::Max => Scalar::lowest(dtype),
        }
    }
}

impl fmt::Display for Reducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Reducer::Add => write!(f, "add"),
            Reducer::Mul => write!(f, "mul"),
            Reducer::Max => write!(f, "max"),
        }
    }
}

/// Both results of a collective permute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CollectivePermuteResult {
    pub result: TargetOp,
    pub token: TargetOp,
}

/// The target-operation algebra lowering emits into.
///
/// Every primitive appends to the builder's [`Program`] and returns a handle
/// to the new operation. Builders validate operand shapes and reject invalid
/// requests with an error rather than emitting a malformed operation.
pub trait OpBuilder: Debug {
    /// Returns the name of this builder (e.g., "shape", "cpu").
    fn name(&self) -> &str;

    /// The operations emitted so far.
    fn program(&self) -> &Program;

    /// The value type of a previously emitted operation.
    fn shape_of(&self, op: TargetOp) -> Result<ValueShape> {
        self.program().shape_of(op).cloned()
    }

    /// An input of the computation, identified by position.
    fn parameter(&mut self, index: usize, shape: &ValueShape, name: &str) -> Result<TargetOp>;

    /// A fresh sequencing token.
    fn create_token(&mut self) -> Result<TargetOp>;

    /// Row-major reshape to `dims`; the element count must be unchanged.
    fn reshape(&mut self, input: TargetOp, dims: &[usize]) -> Result<TargetOp>;

    /// Elements `start, start + stride, ...` below `limit` along `dim`.
    fn slice_in_dim(
        &mut self,
        input: TargetOp,
        start: usize,
        limit: usize,
        stride: usize,
        dim: usize,
    ) -> Result<TargetOp>;

    /// Output dimension `i` is input dimension `permutation[i]`.
    fn transpose(&mut self, input: TargetOp, permutation: &[usize]) -> Result<TargetOp>;

    /// Element type conversion.
    fn convert(&mut self, input: TargetOp, dtype: DType) -> Result<TargetOp>;

    /// Inclusive running reduction along `dim`, seeded with `init`.
    fn cumulative(
        &mut self,
        input: TargetOp,
        dim: usize,
        reducer: Reducer,
        init: Scalar,
    ) -> Result<TargetOp>;

    /// Reduction along `dim`; the dimension is removed.
    fn reduce(
        &mut self,
        input: TargetOp,
        dim: usize,
        reducer: Reducer,
        init: Scalar,
    ) -> Result<TargetOp>;

    /// Index (as `S64`) of the element selected by `reducer` along `dim`;
    /// ties resolve to the lowest index. The dimension is removed.
    fn arg_reduce(&mut self, input: TargetOp, dim: usize, reducer: Reducer) -> Result<TargetOp>;

    /// Sends each source device's `input` to its paired target device,
    /// ordered after `token`.
    fn collective_permute(
        &mut self,
        input: TargetOp,
        token: TargetOp,
        pairs: &[(usize, usize)],
    ) -> Result<CollectivePermuteResult>;
}

/// Reshapes `input` to rank 1, or returns it unchanged if it already is.
pub fn flatten(builder: &mut dyn OpBuilder, input: TargetOp) -> Result<TargetOp> {
    let shape = builder.shape_of(input)?;
    let (_, dims) = shape.as_array()?;
    if dims.ndim() == 1 {
        return Ok(input);
    }
    builder.reshape(input, &[dims.try_numel()?])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reducer_identity() {
        assert_eq!(Reducer::Add.identity(DType::F32), Scalar::Float(0.0));
        assert_eq!(Reducer::Mul.identity(DType::S32), Scalar::Int(1));
        assert_eq!(Reducer::Max.identity(DType::S64), Scalar::Int(i64::MIN));
        assert_eq!(Reducer::Max.identity(DType::F64), Scalar::Float(f64::NEG_INFINITY));
    }

    #[test]
    fn test_reducer_display() {
        assert_eq!(Reducer::Add.to_string(), "add");
        assert_eq!(Reducer::Max.to_string(), "max");
    }
}
