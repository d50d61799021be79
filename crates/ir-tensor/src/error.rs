use thiserror::Error;

#[derive(Error, Debug)]
pub enum TensorError {
    #[error("shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch { expected: Vec<usize>, got: Vec<usize> },
    #[error("dtype mismatch: expected {expected}, got {got}")]
    DTypeMismatch { expected: String, got: String },
    #[error("invalid axis {axis} for tensor with {ndim} dimensions")]
    InvalidAxis { axis: usize, ndim: usize },
    #[error("invalid permutation {permutation:?} for rank {rank}")]
    InvalidPermutation { permutation: Vec<usize>, rank: usize },
    #[error("slice [{start}, {limit}) with stride {stride} out of bounds for dimension {dim} of size {size}")]
    SliceOutOfBounds {
        start: usize,
        limit: usize,
        stride: usize,
        dim: usize,
        size: usize,
    },
    #[error("element count of {0:?} overflows usize")]
    ElementCountOverflow(Vec<usize>),
    #[error("expected an array value, got {0}")]
    ExpectedArray(String),
    #[error("expected a token value, got {0}")]
    ExpectedToken(String),
    #[error("invalid source/target pairs: {0}")]
    InvalidDevicePairs(String),
    #[error("no data bound for parameter {0}")]
    UnboundParameter(usize),
    #[error("unknown target operation %{0}")]
    UnknownOp(usize),
    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, TensorError>;
