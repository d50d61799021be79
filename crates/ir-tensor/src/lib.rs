//! `ir-tensor` - Element types, shapes and the target-operation algebra that
//! IR lowering emits into.
//!
//! This crate provides:
//! - Data type, shape and value-type definitions (arrays and sequencing tokens)
//! - An `OpBuilder` trait describing the target primitives (slice, reshape,
//!   transpose, cumulative scan, reductions, collective permute)
//! - A recorded `Program` of emitted instructions
//! - A `ShapeBuilder` that tracks shapes only, for shape inference
//! - A reference `CpuBuilder` that evaluates every primitive on CPU tensors

pub mod backend;
pub mod cpu;
pub mod dtype;
pub mod error;
pub mod program;
pub mod shape;
pub mod shape_only;
pub mod storage;
pub mod tensor;

// Re-export primary types at the crate root for convenience.
pub use backend::{CollectivePermuteResult, OpBuilder, Reducer};
pub use cpu::CpuBuilder;
pub use dtype::DType;
pub use error::{Result, TensorError};
pub use program::{Instruction, InstructionKind, Program, TargetOp};
pub use shape::{Shape, ValueShape};
pub use shape_only::ShapeBuilder;
pub use storage::{CpuStorage, Scalar};
pub use tensor::Tensor;
