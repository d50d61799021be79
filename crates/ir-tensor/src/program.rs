use std::fmt;

use crate::backend::Reducer;
use crate::dtype::DType;
use crate::error::{Result, TensorError};
use crate::shape::ValueShape;
use crate::storage::Scalar;

/// Handle to one operation emitted into a builder's program.
///
/// Handles are only meaningful for the builder that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetOp(usize);

impl TargetOp {
    /// Position of the operation in its program.
    pub fn index(&self) -> usize {
        self.0
    }
}

impl fmt::Display for TargetOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

/// The primitive an instruction applies.
#[derive(Debug, Clone, PartialEq)]
pub enum InstructionKind {
    Parameter { index: usize, name: String },
    CreateToken,
    Reshape { dims: Vec<usize> },
    SliceInDim {
        start: usize,
        limit: usize,
        stride: usize,
        dim: usize,
    },
    Transpose { permutation: Vec<usize> },
    Convert { dtype: DType },
    Cumulative {
        dim: usize,
        reducer: Reducer,
        init: Scalar,
    },
    Reduce {
        dim: usize,
        reducer: Reducer,
        init: Scalar,
    },
    ArgReduce { dim: usize, reducer: Reducer },
    CollectivePermute { pairs: Vec<(usize, usize)> },
    /// The token produced alongside a collective permute; its only operand
    /// is that permute.
    CollectiveToken,
}

impl InstructionKind {
    /// Short primitive name used in dumps and counts.
    pub fn name(&self) -> &'static str {
        match self {
            InstructionKind::Parameter { .. } => "parameter",
            InstructionKind::CreateToken => "create-token",
            InstructionKind::Reshape { .. } => "reshape",
            InstructionKind::SliceInDim { .. } => "slice-in-dim",
            InstructionKind::Transpose { .. } => "transpose",
            InstructionKind::Convert { .. } => "convert",
            InstructionKind::Cumulative { .. } => "cumulative",
            InstructionKind::Reduce { .. } => "reduce",
            InstructionKind::ArgReduce { .. } => "arg-reduce",
            InstructionKind::CollectivePermute { .. } => "collective-permute",
            InstructionKind::CollectiveToken => "collective-token",
        }
    }
}

impl fmt::Display for InstructionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstructionKind::Parameter { index, name } => {
                write!(f, "index={}, name={}", index, name)
            }
            InstructionKind::CreateToken | InstructionKind::CollectiveToken => Ok(()),
            InstructionKind::Reshape { dims } => write!(f, "dims={:?}", dims),
            InstructionKind::SliceInDim {
                start,
                limit,
                stride,
                dim,
            } => write!(
                f,
                "start={}, limit={}, stride={}, dim={}",
                start, limit, stride, dim
            ),
            InstructionKind::Transpose { permutation } => {
                write!(f, "permutation={:?}", permutation)
            }
            InstructionKind::Convert { dtype } => write!(f, "dtype={}", dtype),
            InstructionKind::Cumulative { dim, reducer, init }
            | InstructionKind::Reduce { dim, reducer, init } => {
                write!(f, "dim={}, reducer={}, init={}", dim, reducer, init)
            }
            InstructionKind::ArgReduce { dim, reducer } => {
                write!(f, "dim={}, reducer={}", dim, reducer)
            }
            InstructionKind::CollectivePermute { pairs } => {
                write!(f, "source_target_pairs={:?}", pairs)
            }
        }
    }
}

/// One emitted operation.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    pub op: TargetOp,
    pub kind: InstructionKind,
    pub operands: Vec<TargetOp>,
    pub shape: ValueShape,
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {} {}(", self.op, self.shape, self.kind.name())?;
        for (i, operand) in self.operands.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", operand)?;
        }
        write!(f, ")")?;
        let params = self.kind.to_string();
        if !params.is_empty() {
            write!(f, ", {}", params)?;
        }
        Ok(())
    }
}

/// The ordered list of operations a builder has emitted.
#[derive(Debug, Clone, Default)]
pub struct Program {
    instructions: Vec<Instruction>,
}

impl Program {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an instruction and returns its handle.
    pub fn push(
        &mut self,
        kind: InstructionKind,
        operands: Vec<TargetOp>,
        shape: ValueShape,
    ) -> TargetOp {
        let op = TargetOp(self.instructions.len());
        log::trace!("emit {} {} {}", op, kind.name(), shape);
        self.instructions.push(Instruction {
            op,
            kind,
            operands,
            shape,
        });
        op
    }

    pub fn instruction(&self, op: TargetOp) -> Result<&Instruction> {
        self.instructions
            .get(op.0)
            .ok_or(TensorError::UnknownOp(op.0))
    }

    pub fn shape_of(&self, op: TargetOp) -> Result<&ValueShape> {
        Ok(&self.instruction(op)?.shape)
    }

    pub fn instructions(&self) -> &[Instruction] {
        &self.instructions
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    /// Number of instructions applying the primitive called `name`.
    pub fn count(&self, name: &str) -> usize {
        self.instructions
            .iter()
            .filter(|inst| inst.kind.name() == name)
            .count()
    }
}

impl fmt::Display for Program {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for inst in &self.instructions {
            writeln!(f, "{}", inst)?;
        }
        Ok(())
    }
}
