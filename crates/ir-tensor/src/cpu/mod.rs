pub mod layout;
pub mod reduce;

use std::collections::HashMap;

use crate::backend::{CollectivePermuteResult, OpBuilder, Reducer};
use crate::dtype::DType;
use crate::error::{Result, TensorError};
use crate::program::{InstructionKind, Program, TargetOp};
use crate::shape::{Shape, ValueShape};
use crate::shape_only;
use crate::storage::Scalar;
use crate::tensor::Tensor;

#[derive(Debug, Clone)]
enum CpuValue {
    /// One tensor per replica.
    Array(Vec<Tensor>),
    Token,
}

/// Pure-Rust reference builder that evaluates every primitive eagerly.
///
/// The program is executed for `replica_count` simulated devices at once, so
/// collective primitives can move data between them. Intended as a reference
/// implementation for testing lowerings, not for performance.
#[derive(Debug)]
pub struct CpuBuilder {
    replica_count: usize,
    program: Program,
    values: Vec<CpuValue>,
    bindings: HashMap<usize, Vec<Tensor>>,
}

impl CpuBuilder {
    /// A builder for a single device.
    pub fn new() -> Self {
        Self::with_replicas(1)
    }

    /// A builder simulating `replica_count` devices (at least one).
    pub fn with_replicas(replica_count: usize) -> Self {
        CpuBuilder {
            replica_count: replica_count.max(1),
            program: Program::new(),
            values: Vec::new(),
            bindings: HashMap::new(),
        }
    }

    pub fn replica_count(&self) -> usize {
        self.replica_count
    }

    /// Binds the same tensor to parameter `index` on every replica.
    pub fn bind_parameter(&mut self, index: usize, tensor: Tensor) {
        let tensors = vec![tensor; self.replica_count];
        self.bindings.insert(index, tensors);
    }

    /// Binds one tensor per replica to parameter `index`.
    pub fn bind_replicated(&mut self, index: usize, tensors: Vec<Tensor>) -> Result<()> {
        if tensors.len() != self.replica_count {
            return Err(TensorError::Other(format!(
                "expected {} replica tensors for parameter {}, got {}",
                self.replica_count,
                index,
                tensors.len()
            )));
        }
        if let Some(first) = tensors.first() {
            let shape = first.value_shape();
            if tensors.iter().any(|t| t.value_shape() != shape) {
                return Err(TensorError::Other(format!(
                    "replica tensors for parameter {} disagree on shape",
                    index
                )));
            }
        }
        self.bindings.insert(index, tensors);
        Ok(())
    }

    /// The value `op` computed on `replica`.
    pub fn output(&self, op: TargetOp, replica: usize) -> Result<&Tensor> {
        let tensors = self.arrays(op)?;
        tensors.get(replica).ok_or_else(|| {
            TensorError::Other(format!(
                "replica {} out of range for {} replicas",
                replica, self.replica_count
            ))
        })
    }

    fn value(&self, op: TargetOp) -> Result<&CpuValue> {
        self.values
            .get(op.index())
            .ok_or(TensorError::UnknownOp(op.index()))
    }

    fn arrays(&self, op: TargetOp) -> Result<&[Tensor]> {
        match self.value(op)? {
            CpuValue::Array(tensors) => Ok(tensors),
            CpuValue::Token => Err(TensorError::ExpectedArray(ValueShape::Token.to_string())),
        }
    }

    fn map_replicas<F>(&self, input: TargetOp, f: F) -> Result<CpuValue>
    where
        F: Fn(&Tensor) -> Result<Tensor>,
    {
        let tensors = self
            .arrays(input)?
            .iter()
            .map(f)
            .collect::<Result<Vec<_>>>()?;
        Ok(CpuValue::Array(tensors))
    }

    fn emit(
        &mut self,
        kind: InstructionKind,
        operands: Vec<TargetOp>,
        shape: ValueShape,
        value: CpuValue,
    ) -> TargetOp {
        let op = self.program.push(kind, operands, shape);
        self.values.push(value);
        op
    }
}

impl Default for CpuBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl OpBuilder for CpuBuilder {
    fn name(&self) -> &str {
        "cpu"
    }

    fn program(&self) -> &Program {
        &self.program
    }

    fn parameter(&mut self, index: usize, shape: &ValueShape, name: &str) -> Result<TargetOp> {
        let value = if shape.is_token() {
            CpuValue::Token
        } else {
            let tensors = self
                .bindings
                .get(&index)
                .ok_or(TensorError::UnboundParameter(index))?;
            if let Some(bound) = tensors.first() {
                let bound_shape = bound.value_shape();
                if &bound_shape != shape {
                    return Err(TensorError::Other(format!(
                        "parameter {} declared as {} but bound to {}",
                        index, shape, bound_shape
                    )));
                }
            }
            CpuValue::Array(tensors.clone())
        };
        let kind = InstructionKind::Parameter {
            index,
            name: name.to_string(),
        };
        Ok(self.emit(kind, vec![], shape.clone(), value))
    }

    fn create_token(&mut self) -> Result<TargetOp> {
        Ok(self.emit(
            InstructionKind::CreateToken,
            vec![],
            ValueShape::Token,
            CpuValue::Token,
        ))
    }

    fn reshape(&mut self, input: TargetOp, dims: &[usize]) -> Result<TargetOp> {
        let shape = shape_only::reshape_shape(self.program.shape_of(input)?, dims)?;
        let value = self.map_replicas(input, |t| t.reshape(Shape::from_slice(dims)))?;
        let kind = InstructionKind::Reshape {
            dims: dims.to_vec(),
        };
        Ok(self.emit(kind, vec![input], shape, value))
    }

    fn slice_in_dim(
        &mut self,
        input: TargetOp,
        start: usize,
        limit: usize,
        stride: usize,
        dim: usize,
    ) -> Result<TargetOp> {
        let shape =
            shape_only::slice_shape(self.program.shape_of(input)?, start, limit, stride, dim)?;
        let value =
            self.map_replicas(input, |t| layout::slice_in_dim(t, start, limit, stride, dim))?;
        let kind = InstructionKind::SliceInDim {
            start,
            limit,
            stride,
            dim,
        };
        Ok(self.emit(kind, vec![input], shape, value))
    }

    fn transpose(&mut self, input: TargetOp, permutation: &[usize]) -> Result<TargetOp> {
        let shape = shape_only::transpose_shape(self.program.shape_of(input)?, permutation)?;
        let value = self.map_replicas(input, |t| layout::transpose(t, permutation))?;
        let kind = InstructionKind::Transpose {
            permutation: permutation.to_vec(),
        };
        Ok(self.emit(kind, vec![input], shape, value))
    }

    fn convert(&mut self, input: TargetOp, dtype: DType) -> Result<TargetOp> {
        let shape = shape_only::convert_shape(self.program.shape_of(input)?, dtype)?;
        let value = self.map_replicas(input, |t| {
            Tensor::from_storage(t.storage().convert(dtype), t.shape().clone())
        })?;
        Ok(self.emit(InstructionKind::Convert { dtype }, vec![input], shape, value))
    }

    fn cumulative(
        &mut self,
        input: TargetOp,
        dim: usize,
        reducer: Reducer,
        init: Scalar,
    ) -> Result<TargetOp> {
        let shape = shape_only::scan_shape(self.program.shape_of(input)?, dim)?;
        let value = self.map_replicas(input, |t| reduce::cumulative(t, dim, reducer, init))?;
        let kind = InstructionKind::Cumulative { dim, reducer, init };
        Ok(self.emit(kind, vec![input], shape, value))
    }

    fn reduce(
        &mut self,
        input: TargetOp,
        dim: usize,
        reducer: Reducer,
        init: Scalar,
    ) -> Result<TargetOp> {
        let shape = shape_only::reduce_shape(self.program.shape_of(input)?, dim)?;
        let value = self.map_replicas(input, |t| reduce::reduce(t, dim, reducer, init))?;
        let kind = InstructionKind::Reduce { dim, reducer, init };
        Ok(self.emit(kind, vec![input], shape, value))
    }

    fn arg_reduce(&mut self, input: TargetOp, dim: usize, reducer: Reducer) -> Result<TargetOp> {
        let shape = shape_only::arg_reduce_shape(self.program.shape_of(input)?, dim)?;
        let value = self.map_replicas(input, |t| reduce::arg_reduce(t, dim, reducer))?;
        let kind = InstructionKind::ArgReduce { dim, reducer };
        Ok(self.emit(kind, vec![input], shape, value))
    }

    fn collective_permute(
        &mut self,
        input: TargetOp,
        token: TargetOp,
        pairs: &[(usize, usize)],
    ) -> Result<CollectivePermuteResult> {
        let shape = shape_only::collective_permute_shape(
            self.program.shape_of(input)?,
            self.program.shape_of(token)?,
            pairs,
        )?;
        if let Some(&(source, target)) = pairs
            .iter()
            .find(|&&(s, t)| s >= self.replica_count || t >= self.replica_count)
        {
            return Err(TensorError::InvalidDevicePairs(format!(
                "pair ({}, {}) out of range for {} replicas",
                source, target, self.replica_count
            )));
        }

        // Replicas nobody sends to receive zeros.
        let sent = self.arrays(input)?;
        let (dtype, dims) = shape.as_array()?;
        let mut received = vec![Tensor::zeros(dtype, dims.clone()); self.replica_count];
        for &(source, target) in pairs {
            received[target] = sent[source].clone();
        }

        let kind = InstructionKind::CollectivePermute {
            pairs: pairs.to_vec(),
        };
        let result = self.emit(
            kind,
            vec![input, token],
            shape.clone(),
            CpuValue::Array(received),
        );
        let token = self.emit(
            InstructionKind::CollectiveToken,
            vec![result],
            ValueShape::Token,
            CpuValue::Token,
        );
        Ok(CollectivePermuteResult { result, token })
    }
}
