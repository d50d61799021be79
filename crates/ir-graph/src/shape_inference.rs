//! Output-shape derivation for operations.
//!
//! Simple operations compute their shapes in closed form with the helpers
//! below. Operations whose lowering composes several primitives derive their
//! shapes by running that same lowering against a [`ShapeBuilder`], so the
//! inferred shape cannot drift from what lowering emits.

use ir_tensor::{DType, OpBuilder, ShapeBuilder, TargetOp, ValueShape};

use crate::error::{IrError, Result};
use crate::kind::OpKind;

/// Re-tags primitive failures raised during inference as shape errors.
fn as_shape_error(kind: OpKind, err: IrError) -> IrError {
    match err {
        IrError::Tensor(e) => IrError::shape(kind, e.to_string()),
        other => other,
    }
}

/// Runs `lower` against a shape-only builder whose parameters have the
/// operand types, and returns the types of the handles it returns.
pub fn infer_output_shapes<F>(
    kind: OpKind,
    operands: &[ValueShape],
    lower: F,
) -> Result<Vec<ValueShape>>
where
    F: FnOnce(&mut dyn OpBuilder, &[TargetOp]) -> Result<Vec<TargetOp>>,
{
    let mut builder = ShapeBuilder::new();
    let mut params = Vec::with_capacity(operands.len());
    for (i, shape) in operands.iter().enumerate() {
        let param = builder
            .parameter(i, shape, &format!("p{}", i))
            .map_err(|e| as_shape_error(kind, e.into()))?;
        params.push(param);
    }

    let outputs = lower(&mut builder, &params).map_err(|e| as_shape_error(kind, e))?;
    let shapes = outputs
        .iter()
        .map(|&op| builder.shape_of(op))
        .collect::<ir_tensor::Result<Vec<_>>>()
        .map_err(|e| as_shape_error(kind, e.into()))?;
    log::trace!("inferred {} -> {:?} by shape-only lowering", kind, shapes);
    Ok(shapes)
}

/// Checks the operand count.
pub fn expect_operands(kind: OpKind, operands: &[ValueShape], count: usize) -> Result<()> {
    if operands.len() != count {
        return Err(IrError::shape(
            kind,
            format!("expected {} operands, got {}", count, operands.len()),
        ));
    }
    Ok(())
}

/// Checks that `dim` indexes a dimension of the array `input`.
pub fn check_dim(kind: OpKind, input: &ValueShape, dim: usize) -> Result<()> {
    let (_, shape) = input
        .as_array()
        .map_err(|e| IrError::shape(kind, e.to_string()))?;
    if dim >= shape.ndim() {
        return Err(IrError::shape(
            kind,
            format!("dimension {} out of range for rank {}", dim, shape.ndim()),
        ));
    }
    Ok(())
}

/// The array shape of `input`, recast to `dtype` when one is given.
pub fn same_shape_with_dtype(
    kind: OpKind,
    input: &ValueShape,
    dtype: Option<DType>,
) -> Result<ValueShape> {
    let recast = match dtype {
        Some(dtype) => input.with_dtype(dtype),
        None => input.as_array().map(|_| input.clone()),
    };
    recast.map_err(|e| IrError::shape(kind, e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_KIND: OpKind = OpKind::new("test::shape");

    #[test]
    fn test_shape_only_execution() {
        let operands = [ValueShape::array(DType::F32, &[2, 3])];
        let shapes = infer_output_shapes(TEST_KIND, &operands, |b, params| {
            let t = b.transpose(params[0], &[1, 0])?;
            let r = b.reshape(t, &[6])?;
            Ok(vec![t, r])
        })
        .unwrap();
        assert_eq!(
            shapes,
            vec![
                ValueShape::array(DType::F32, &[3, 2]),
                ValueShape::array(DType::F32, &[6]),
            ]
        );
    }

    #[test]
    fn test_primitive_failure_becomes_shape_error() {
        let operands = [ValueShape::array(DType::F32, &[2, 3])];
        let err = infer_output_shapes(TEST_KIND, &operands, |b, params| {
            Ok(vec![b.reshape(params[0], &[5])?])
        })
        .unwrap_err();
        assert!(err.is_shape_error());
    }

    #[test]
    fn test_other_errors_pass_through() {
        let err = infer_output_shapes(TEST_KIND, &[], |_, _| {
            Err(IrError::unsupported(TEST_KIND, "nope"))
        })
        .unwrap_err();
        assert!(err.is_unsupported());
    }

    #[test]
    fn test_closed_form_helpers() {
        let input = ValueShape::array(DType::F32, &[2, 3]);
        assert!(check_dim(TEST_KIND, &input, 1).is_ok());
        assert!(check_dim(TEST_KIND, &input, 2).unwrap_err().is_shape_error());
        assert!(check_dim(TEST_KIND, &ValueShape::Token, 0).is_err());

        assert_eq!(
            same_shape_with_dtype(TEST_KIND, &input, Some(DType::F64)).unwrap(),
            ValueShape::array(DType::F64, &[2, 3])
        );
        assert_eq!(same_shape_with_dtype(TEST_KIND, &input, None).unwrap(), input);
        assert!(expect_operands(TEST_KIND, &[input], 2).is_err());
    }
}
