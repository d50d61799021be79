use std::any::Any;

use ir_tensor::shape_only::parameter_shape;
use ir_tensor::{OpBuilder, TargetOp, ValueShape};

use crate::error::{IrError, Result};
use crate::fingerprint::Fingerprint;
use crate::kind::{self, OpKind};
use crate::node::{Node, Operation, Value};
use crate::shape_inference::expect_operands;

/// Input `index` of the computation, with a fixed value type.
///
/// `name` is descriptive only; two parameters with the same index and type
/// are the same input.
#[derive(Debug, Clone)]
pub struct Parameter {
    index: usize,
    shape: ValueShape,
    name: String,
}

impl Parameter {
    pub fn new(index: usize, shape: ValueShape, name: impl Into<String>) -> Self {
        Parameter {
            index,
            shape,
            name: name.into(),
        }
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Operation for Parameter {
    fn kind(&self) -> OpKind {
        kind::PARAMETER
    }

    fn infer_shapes(&self, operands: &[ValueShape]) -> Result<Vec<ValueShape>> {
        expect_operands(self.kind(), operands, 0)?;
        let shape = parameter_shape(&self.shape)
            .map_err(|e| IrError::shape(self.kind(), e.to_string()))?;
        Ok(vec![shape])
    }

    fn lower(&self, _operands: &[TargetOp], builder: &mut dyn OpBuilder) -> Result<Vec<TargetOp>> {
        Ok(vec![builder.parameter(self.index, &self.shape, &self.name)?])
    }

    fn fingerprint_params(&self) -> Fingerprint {
        Fingerprint::of(&(self.index, &self.shape))
    }

    fn describe_params(&self) -> String {
        format!(", index={}, shape={}, name={}", self.index, self.shape, self.name)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// A fresh sequencing token, the root of a chain of side-effecting ops.
#[derive(Debug, Clone, Copy, Default)]
pub struct CreateToken;

impl Operation for CreateToken {
    fn kind(&self) -> OpKind {
        kind::CREATE_TOKEN
    }

    fn infer_shapes(&self, operands: &[ValueShape]) -> Result<Vec<ValueShape>> {
        expect_operands(self.kind(), operands, 0)?;
        Ok(vec![ValueShape::Token])
    }

    fn lower(&self, _operands: &[TargetOp], builder: &mut dyn OpBuilder) -> Result<Vec<TargetOp>> {
        Ok(vec![builder.create_token()?])
    }

    fn fingerprint_params(&self) -> Fingerprint {
        Fingerprint::of(&())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub fn parameter(index: usize, shape: ValueShape, name: &str) -> Result<Value> {
    Ok(Node::new(Parameter::new(index, shape, name), vec![])?.output(0))
}

pub fn create_token() -> Result<Value> {
    Ok(Node::new(CreateToken, vec![])?.output(0))
}
