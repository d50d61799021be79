use std::any::Any;

use ir_tensor::{OpBuilder, Reducer, TargetOp, ValueShape};

use crate::error::{IrError, Result};
use crate::fingerprint::Fingerprint;
use crate::kind::{self, OpKind};
use crate::node::{Node, Operation, Value};
use crate::shape_inference::{check_dim, expect_operands, infer_output_shapes};

/// Maximum along `dim` and the (first) index where it occurs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MaxInDim {
    dim: usize,
    keepdim: bool,
}

impl MaxInDim {
    pub fn new(dim: usize, keepdim: bool) -> Self {
        MaxInDim { dim, keepdim }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn keepdim(&self) -> bool {
        self.keepdim
    }
}

fn lower_max_in_dim(
    builder: &mut dyn OpBuilder,
    input: TargetOp,
    dim: usize,
    keepdim: bool,
) -> Result<Vec<TargetOp>> {
    let input_shape = builder.shape_of(input)?;
    let (dtype, shape) = input_shape.as_array()?;
    let values = builder.reduce(input, dim, Reducer::Max, Reducer::Max.identity(dtype))?;
    let indices = builder.arg_reduce(input, dim, Reducer::Max)?;
    if !keepdim {
        return Ok(vec![values, indices]);
    }

    let mut kept = shape.dims().to_vec();
    kept[dim] = 1;
    Ok(vec![
        builder.reshape(values, &kept)?,
        builder.reshape(indices, &kept)?,
    ])
}

impl Operation for MaxInDim {
    fn kind(&self) -> OpKind {
        kind::MAX_IN_DIM
    }

    fn num_outputs(&self) -> usize {
        2
    }

    fn infer_shapes(&self, operands: &[ValueShape]) -> Result<Vec<ValueShape>> {
        expect_operands(self.kind(), operands, 1)?;
        check_dim(self.kind(), &operands[0], self.dim)?;
        if operands[0].dims()[self.dim] == 0 {
            return Err(IrError::shape(
                self.kind(),
                format!("dimension {} is empty and has no maximum", self.dim),
            ));
        }
        infer_output_shapes(self.kind(), operands, |builder, params| {
            lower_max_in_dim(builder, params[0], self.dim, self.keepdim)
        })
    }

    fn lower(&self, operands: &[TargetOp], builder: &mut dyn OpBuilder) -> Result<Vec<TargetOp>> {
        lower_max_in_dim(builder, operands[0], self.dim, self.keepdim)
    }

    fn fingerprint_params(&self) -> Fingerprint {
        Fingerprint::of(&(self.dim, self.keepdim))
    }

    fn describe_params(&self) -> String {
        format!(", dim={}, keepdim={}", self.dim, self.keepdim)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Outputs of [`max_in_dim`].
#[derive(Debug, Clone)]
pub struct MaxInDimOutputs {
    pub values: Value,
    pub indices: Value,
}

pub fn max_in_dim(input: &Value, dim: usize, keepdim: bool) -> Result<MaxInDimOutputs> {
    let node = Node::new(MaxInDim::new(dim, keepdim), vec![input.clone()])?;
    Ok(MaxInDimOutputs {
        values: node.output(0),
        indices: node.output(1),
    })
}
