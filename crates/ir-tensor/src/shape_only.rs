//! Shape rules for every primitive, and a builder that only tracks shapes.
//!
//! The rule functions are the single definition of what each primitive
//! accepts and produces; [`ShapeBuilder`] applies them without computing any
//! data, and the CPU builder applies them before running its kernels.

use std::collections::HashSet;

use crate::backend::{CollectivePermuteResult, OpBuilder, Reducer};
use crate::dtype::DType;
use crate::error::{Result, TensorError};
use crate::program::{InstructionKind, Program, TargetOp};
use crate::shape::{Shape, ValueShape};
use crate::storage::Scalar;

fn check_axis(shape: &Shape, dim: usize) -> Result<()> {
    if dim >= shape.ndim() {
        return Err(TensorError::InvalidAxis {
            axis: dim,
            ndim: shape.ndim(),
        });
    }
    Ok(())
}

pub fn reshape_shape(input: &ValueShape, dims: &[usize]) -> Result<ValueShape> {
    let (dtype, shape) = input.as_array()?;
    let target = Shape::from_slice(dims);
    if shape.try_numel()? != target.try_numel()? {
        return Err(TensorError::ShapeMismatch {
            expected: shape.dims().to_vec(),
            got: dims.to_vec(),
        });
    }
    Ok(ValueShape::Array {
        dtype,
        shape: target,
    })
}

/// Checks that an array parameter's element count fits in `usize`.
pub fn parameter_shape(shape: &ValueShape) -> Result<ValueShape> {
    if let ValueShape::Array { shape: dims, .. } = shape {
        dims.try_numel()?;
    }
    Ok(shape.clone())
}

pub fn slice_shape(
    input: &ValueShape,
    start: usize,
    limit: usize,
    stride: usize,
    dim: usize,
) -> Result<ValueShape> {
    let (dtype, shape) = input.as_array()?;
    check_axis(shape, dim)?;
    let size = shape.dim(dim);
    if stride == 0 || start > limit || limit > size {
        return Err(TensorError::SliceOutOfBounds {
            start,
            limit,
            stride,
            dim,
            size,
        });
    }
    let mut dims = shape.dims().to_vec();
    dims[dim] = (limit - start).div_ceil(stride);
    Ok(ValueShape::Array {
        dtype,
        shape: Shape::new(dims),
    })
}

pub fn transpose_shape(input: &ValueShape, permutation: &[usize]) -> Result<ValueShape> {
    let (dtype, shape) = input.as_array()?;
    Ok(ValueShape::Array {
        dtype,
        shape: shape.permute(permutation)?,
    })
}

pub fn convert_shape(input: &ValueShape, dtype: DType) -> Result<ValueShape> {
    input.with_dtype(dtype)
}

pub fn scan_shape(input: &ValueShape, dim: usize) -> Result<ValueShape> {
    let (_, shape) = input.as_array()?;
    check_axis(shape, dim)?;
    Ok(input.clone())
}

pub fn reduce_shape(input: &ValueShape, dim: usize) -> Result<ValueShape> {
    let (dtype, shape) = input.as_array()?;
    check_axis(shape, dim)?;
    let mut dims = shape.dims().to_vec();
    dims.remove(dim);
    Ok(ValueShape::Array {
        dtype,
        shape: Shape::new(dims),
    })
}

pub fn arg_reduce_shape(input: &ValueShape, dim: usize) -> Result<ValueShape> {
    reduce_shape(input, dim)?.with_dtype(DType::S64)
}

/// Returns the data shape of a collective permute; the second result is
/// always a token.
pub fn collective_permute_shape(
    input: &ValueShape,
    token: &ValueShape,
    pairs: &[(usize, usize)],
) -> Result<ValueShape> {
    input.as_array()?;
    if !token.is_token() {
        return Err(TensorError::ExpectedToken(token.to_string()));
    }
    let mut sources = HashSet::new();
    let mut targets = HashSet::new();
    for &(source, target) in pairs {
        if !sources.insert(source) {
            return Err(TensorError::InvalidDevicePairs(format!(
                "device {} appears more than once as a source",
                source
            )));
        }
        if !targets.insert(target) {
            return Err(TensorError::InvalidDevicePairs(format!(
                "device {} appears more than once as a target",
                target
            )));
        }
    }
    Ok(input.clone())
}

/// Builder that tracks value types only.
///
/// Running a lowering against it yields the shapes that lowering would
/// produce, without touching any data.
#[derive(Debug, Default)]
pub struct ShapeBuilder {
    program: Program,
}

impl ShapeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    fn operand(&self, op: TargetOp) -> Result<&ValueShape> {
        self.program.shape_of(op)
    }
}

impl OpBuilder for ShapeBuilder {
    fn name(&self) -> &str {
        "shape"
    }

    fn program(&self) -> &Program {
        &self.program
    }

    fn parameter(&mut self, index: usize, shape: &ValueShape, name: &str) -> Result<TargetOp> {
        let shape = parameter_shape(shape)?;
        Ok(self.program.push(
            InstructionKind::Parameter {
                index,
                name: name.to_string(),
            },
            vec![],
            shape,
        ))
    }

    fn create_token(&mut self) -> Result<TargetOp> {
        Ok(self
            .program
            .push(InstructionKind::CreateToken, vec![], ValueShape::Token))
    }

    fn reshape(&mut self, input: TargetOp, dims: &[usize]) -> Result<TargetOp> {
        let shape = reshape_shape(self.operand(input)?, dims)?;
        Ok(self.program.push(
            InstructionKind::Reshape {
                dims: dims.to_vec(),
            },
            vec![input],
            shape,
        ))
    }

    fn slice_in_dim(
        &mut self,
        input: TargetOp,
        start: usize,
        limit: usize,
        stride: usize,
        dim: usize,
    ) -> Result<TargetOp> {
        let shape = slice_shape(self.operand(input)?, start, limit, stride, dim)?;
        Ok(self.program.push(
            InstructionKind::SliceInDim {
                start,
                limit,
                stride,
                dim,
            },
            vec![input],
            shape,
        ))
    }

    fn transpose(&mut self, input: TargetOp, permutation: &[usize]) -> Result<TargetOp> {
        let shape = transpose_shape(self.operand(input)?, permutation)?;
        Ok(self.program.push(
            InstructionKind::Transpose {
                permutation: permutation.to_vec(),
            },
            vec![input],
            shape,
        ))
    }

    fn convert(&mut self, input: TargetOp, dtype: DType) -> Result<TargetOp> {
        let shape = convert_shape(self.operand(input)?, dtype)?;
        Ok(self
            .program
            .push(InstructionKind::Convert { dtype }, vec![input], shape))
    }

    fn cumulative(
        &mut self,
        input: TargetOp,
        dim: usize,
        reducer: Reducer,
        init: Scalar,
    ) -> Result<TargetOp> {
        let shape = scan_shape(self.operand(input)?, dim)?;
        Ok(self.program.push(
            InstructionKind::Cumulative { dim, reducer, init },
            vec![input],
            shape,
        ))
    }

    fn reduce(
        &mut self,
        input: TargetOp,
        dim: usize,
        reducer: Reducer,
        init: Scalar,
    ) -> Result<TargetOp> {
        let shape = reduce_shape(self.operand(input)?, dim)?;
        Ok(self.program.push(
            InstructionKind::Reduce { dim, reducer, init },
            vec![input],
            shape,
        ))
    }

    fn arg_reduce(&mut self, input: TargetOp, dim: usize, reducer: Reducer) -> Result<TargetOp> {
        let shape = arg_reduce_shape(self.operand(input)?, dim)?;
        Ok(self.program.push(
            InstructionKind::ArgReduce { dim, reducer },
            vec![input],
            shape,
        ))
    }

    fn collective_permute(
        &mut self,
        input: TargetOp,
        token: TargetOp,
        pairs: &[(usize, usize)],
    ) -> Result<CollectivePermuteResult> {
        let shape = collective_permute_shape(self.operand(input)?, self.operand(token)?, pairs)?;
        let result = self.program.push(
            InstructionKind::CollectivePermute {
                pairs: pairs.to_vec(),
            },
            vec![input, token],
            shape,
        );
        let token = self
            .program
            .push(InstructionKind::CollectiveToken, vec![result], ValueShape::Token);
        Ok(CollectivePermuteResult { result, token })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn f32_param(b: &mut ShapeBuilder, dims: &[usize]) -> TargetOp {
        b.parameter(0, &ValueShape::array(DType::F32, dims), "x")
            .unwrap()
    }

    #[test]
    fn test_reshape() {
        let mut b = ShapeBuilder::new();
        let x = f32_param(&mut b, &[2, 3]);
        let r = b.reshape(x, &[6]).unwrap();
        assert_eq!(b.shape_of(r).unwrap(), ValueShape::array(DType::F32, &[6]));
        assert!(b.reshape(x, &[4]).is_err());
        assert!(matches!(
            b.reshape(x, &[1 << 63, 2, 0]),
            Err(TensorError::ElementCountOverflow(_))
        ));
    }

    #[test]
    fn test_parameter_element_count_must_fit() {
        let mut b = ShapeBuilder::new();
        let shape = ValueShape::array(DType::F32, &[usize::MAX, 2]);
        assert!(matches!(
            b.parameter(0, &shape, "x"),
            Err(TensorError::ElementCountOverflow(_))
        ));
    }

    #[test]
    fn test_slice() {
        let mut b = ShapeBuilder::new();
        let x = f32_param(&mut b, &[10]);
        let s = b.slice_in_dim(x, 2, 9, 3, 0).unwrap();
        // elements 2, 5, 8
        assert_eq!(b.shape_of(s).unwrap().dims(), &[3]);
        assert!(b.slice_in_dim(x, 2, 11, 1, 0).is_err());
        assert!(b.slice_in_dim(x, 5, 4, 1, 0).is_err());
        assert!(b.slice_in_dim(x, 0, 4, 0, 0).is_err());
        assert!(b.slice_in_dim(x, 0, 4, 1, 1).is_err());
    }

    #[test]
    fn test_transpose() {
        let mut b = ShapeBuilder::new();
        let x = f32_param(&mut b, &[2, 3, 4]);
        let t = b.transpose(x, &[2, 0, 1]).unwrap();
        assert_eq!(b.shape_of(t).unwrap().dims(), &[4, 2, 3]);
        assert!(b.transpose(x, &[0, 1]).is_err());
    }

    #[test]
    fn test_reductions() {
        let mut b = ShapeBuilder::new();
        let x = f32_param(&mut b, &[2, 3]);
        let c = b
            .cumulative(x, 1, Reducer::Add, Scalar::zero(DType::F32))
            .unwrap();
        assert_eq!(b.shape_of(c).unwrap(), ValueShape::array(DType::F32, &[2, 3]));
        let r = b
            .reduce(x, 0, Reducer::Max, Scalar::lowest(DType::F32))
            .unwrap();
        assert_eq!(b.shape_of(r).unwrap(), ValueShape::array(DType::F32, &[3]));
        let a = b.arg_reduce(x, 1, Reducer::Max).unwrap();
        assert_eq!(b.shape_of(a).unwrap(), ValueShape::array(DType::S64, &[2]));
        assert!(b.cumulative(x, 2, Reducer::Add, Scalar::Int(0)).is_err());
    }

    #[test]
    fn test_collective_permute() {
        let mut b = ShapeBuilder::new();
        let x = f32_param(&mut b, &[4]);
        let t = b.create_token().unwrap();
        let out = b.collective_permute(x, t, &[(0, 1), (1, 0)]).unwrap();
        assert_eq!(b.shape_of(out.result).unwrap(), ValueShape::array(DType::F32, &[4]));
        assert_eq!(b.shape_of(out.token).unwrap(), ValueShape::Token);

        assert!(b.collective_permute(x, x, &[(0, 1)]).is_err());
        assert!(b.collective_permute(t, t, &[(0, 1)]).is_err());
        assert!(b.collective_permute(x, t, &[(0, 1), (0, 2)]).is_err());
        assert!(b.collective_permute(x, t, &[(0, 1), (2, 1)]).is_err());
    }

    #[test]
    fn test_unknown_operand() {
        let mut b = ShapeBuilder::new();
        let x = f32_param(&mut b, &[4]);
        let mut other = ShapeBuilder::new();
        assert!(other.reshape(x, &[4]).is_err());
    }
}
