use std::any::Any;

use ir_tensor::backend::flatten;
use ir_tensor::shape::{inverse_permutation, is_identity_permutation};
use ir_tensor::{OpBuilder, Shape, TargetOp, TensorError, ValueShape};

use crate::error::{IrError, Result};
use crate::fingerprint::Fingerprint;
use crate::kind::{self, OpKind};
use crate::node::{Node, Operation, Value};
use crate::ops::join;
use crate::shape_inference::{expect_operands, infer_output_shapes};

/// A view of the flattened input with the given sizes, strides and offset,
/// realized with slice, reshape and transpose.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsStrided {
    size: Vec<usize>,
    stride: Vec<usize>,
    storage_offset: usize,
}

impl AsStrided {
    pub fn new(size: Vec<usize>, stride: Vec<usize>, storage_offset: usize) -> Self {
        AsStrided {
            size,
            stride,
            storage_offset,
        }
    }

    pub fn size(&self) -> &[usize] {
        &self.size
    }

    pub fn stride(&self) -> &[usize] {
        &self.stride
    }

    pub fn storage_offset(&self) -> usize {
        self.storage_offset
    }

    /// Whether the slice/reshape/transpose lowering can realize `stride`.
    ///
    /// Only checks for a unit-stride dimension; it does not prove the full
    /// size/stride combination is realizable.
    pub fn stride_is_supported(stride: &[usize]) -> bool {
        stride.iter().min().map_or(true, |&smallest| smallest == 1)
    }

    /// Dimension indices ordered by decreasing stride, ties kept in index
    /// order.
    pub fn array_stride_permutation(stride: &[usize]) -> Vec<usize> {
        let mut permutation: Vec<usize> = (0..stride.len()).collect();
        permutation.sort_by(|&a, &b| stride[b].cmp(&stride[a]));
        permutation
    }

    fn validate(&self, input: &ValueShape) -> Result<()> {
        let kind = self.kind();
        if self.size.len() != self.stride.len() {
            return Err(IrError::shape(
                kind,
                format!(
                    "size has {} dimensions but stride has {}",
                    self.size.len(),
                    self.stride.len()
                ),
            ));
        }
        let as_shape_error = |e: TensorError| IrError::shape(kind, e.to_string());
        let (_, shape) = input.as_array().map_err(as_shape_error)?;
        let available = shape.try_numel().map_err(as_shape_error)?;
        let requested = Shape::from_slice(&self.size)
            .try_numel()
            .map_err(as_shape_error)?;
        let end = self.storage_offset.checked_add(requested);
        if end.map_or(true, |end| end > available) {
            return Err(IrError::shape(
                kind,
                format!(
                    "storage_offset {} + {} elements exceeds the {} available",
                    self.storage_offset, requested, available
                ),
            ));
        }
        if !Self::stride_is_supported(&self.stride) {
            return Err(IrError::unsupported(
                kind,
                format!("stride {:?} has no unit-stride dimension", self.stride),
            ));
        }
        Ok(())
    }
}

fn lower_as_strided(
    builder: &mut dyn OpBuilder,
    input: TargetOp,
    size: &[usize],
    stride: &[usize],
    storage_offset: usize,
) -> Result<TargetOp> {
    let input_shape = builder.shape_of(input)?;
    let input_element_count = input_shape.as_array()?.1.try_numel()?;
    let slice_size = Shape::from_slice(size).try_numel()?;

    let mut off_input = input;
    if storage_offset > 0 || slice_size < input_element_count {
        let limit = storage_offset.checked_add(slice_size).ok_or_else(|| {
            TensorError::SliceOutOfBounds {
                start: storage_offset,
                limit: usize::MAX,
                stride: 1,
                dim: 0,
                size: input_element_count,
            }
        })?;
        let flat = flatten(builder, input)?;
        off_input = builder.slice_in_dim(flat, storage_offset, limit, 1, 0)?;
    }

    let permutation = inverse_permutation(&AsStrided::array_stride_permutation(stride));
    let new_sizes = Shape::from_slice(size).permute_inverse(&permutation)?;
    let reshaped = builder.reshape(off_input, new_sizes.dims())?;
    if is_identity_permutation(&permutation) {
        Ok(reshaped)
    } else {
        Ok(builder.transpose(reshaped, &permutation)?)
    }
}

impl Operation for AsStrided {
    fn kind(&self) -> OpKind {
        kind::AS_STRIDED
    }

    fn infer_shapes(&self, operands: &[ValueShape]) -> Result<Vec<ValueShape>> {
        expect_operands(self.kind(), operands, 1)?;
        self.validate(&operands[0])?;
        infer_output_shapes(self.kind(), operands, |builder, params| {
            let view = lower_as_strided(
                builder,
                params[0],
                &self.size,
                &self.stride,
                self.storage_offset,
            )?;
            Ok(vec![view])
        })
    }

    fn lower(&self, operands: &[TargetOp], builder: &mut dyn OpBuilder) -> Result<Vec<TargetOp>> {
        let view = lower_as_strided(
            builder,
            operands[0],
            &self.size,
            &self.stride,
            self.storage_offset,
        )?;
        Ok(vec![view])
    }

    fn fingerprint_params(&self) -> Fingerprint {
        Fingerprint::of(&(&self.size, &self.stride, self.storage_offset))
    }

    fn describe_params(&self) -> String {
        format!(
            ", size={}, stride={}, storage_offset={}",
            join(&self.size),
            join(&self.stride),
            self.storage_offset
        )
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub fn as_strided(
    input: &Value,
    size: Vec<usize>,
    stride: Vec<usize>,
    storage_offset: usize,
) -> Result<Value> {
    let op = AsStrided::new(size, stride, storage_offset);
    Ok(Node::new(op, vec![input.clone()])?.output(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::parameter::parameter;
    use crate::ops::test_util::{iota, lower_into};
    use ir_tensor::{CpuBuilder, DType};

    fn buffer(n: usize) -> Value {
        parameter(0, ValueShape::array(DType::F32, &[n]), "buf").unwrap()
    }

    fn run(view: &Value, n: usize) -> (CpuBuilder, Vec<f32>) {
        let mut builder = CpuBuilder::new();
        builder.bind_parameter(0, iota(&[n]));
        let outputs = lower_into(&mut builder, std::slice::from_ref(view));
        let data = builder
            .output(outputs[0], 0)
            .unwrap()
            .data_f32()
            .unwrap()
            .to_vec();
        (builder, data)
    }

    #[test]
    fn test_row_major_view_is_a_plain_reshape() {
        let view = as_strided(&buffer(24), vec![2, 3, 4], vec![12, 4, 1], 0).unwrap();
        assert_eq!(view.shape(), &ValueShape::array(DType::F32, &[2, 3, 4]));

        let (builder, data) = run(&view, 24);
        let program = builder.program();
        assert_eq!(program.count("transpose"), 0);
        assert_eq!(program.count("slice-in-dim"), 0);
        assert_eq!(program.count("reshape"), 1);
        let expected: Vec<f32> = (0..24).map(|v| v as f32).collect();
        assert_eq!(data, expected);
    }

    #[test]
    fn test_offset_past_end_is_a_shape_error() {
        let err = as_strided(&buffer(24), vec![2, 2], vec![2, 1], 21).unwrap_err();
        assert!(err.is_shape_error(), "{}", err);
    }

    #[test]
    fn test_huge_offset_is_a_shape_error() {
        let err = as_strided(&buffer(24), vec![2], vec![1], usize::MAX).unwrap_err();
        assert!(err.is_shape_error(), "{}", err);
    }

    #[test]
    fn test_overflowing_size_is_a_shape_error() {
        let err = as_strided(&buffer(24), vec![1 << 63, 2], vec![2, 1], 0).unwrap_err();
        assert!(err.is_shape_error(), "{}", err);
        let err = as_strided(&buffer(24), vec![usize::MAX, usize::MAX], vec![1, 1], 0).unwrap_err();
        assert!(err.to_string().contains("overflows usize"), "{}", err);
    }

    #[test]
    fn test_offset_at_end_is_accepted() {
        let view = as_strided(&buffer(24), vec![2, 2], vec![2, 1], 20).unwrap();
        let (_, data) = run(&view, 24);
        assert_eq!(data, vec![20.0, 21.0, 22.0, 23.0]);
    }

    #[test]
    fn test_stride_without_unit_dimension_is_unsupported() {
        let err = as_strided(&buffer(24), vec![2, 2], vec![2, 3], 0).unwrap_err();
        assert!(err.is_unsupported(), "{}", err);
        assert!(!AsStrided::stride_is_supported(&[2, 3]));
        assert!(AsStrided::stride_is_supported(&[3, 1]));
        assert!(AsStrided::stride_is_supported(&[]));
    }

    #[test]
    fn test_mismatched_size_and_stride_rank() {
        let err = as_strided(&buffer(24), vec![2, 3], vec![1], 0).unwrap_err();
        assert!(err.is_shape_error());
    }

    #[test]
    fn test_transposed_view() {
        // element (i, j) lives at i + 2 * j
        let view = as_strided(&buffer(6), vec![2, 3], vec![1, 2], 0).unwrap();
        assert_eq!(view.shape().dims(), &[2, 3]);
        let (builder, data) = run(&view, 6);
        assert_eq!(builder.program().count("transpose"), 1);
        assert_eq!(data, vec![0.0, 2.0, 4.0, 1.0, 3.0, 5.0]);
    }

    #[test]
    fn test_three_dimensional_permuted_view() {
        // element (i, j, k) lives at i + 8 * j + 2 * k
        let view = as_strided(&buffer(24), vec![2, 3, 4], vec![1, 8, 2], 0).unwrap();
        let (_, data) = run(&view, 24);
        for i in 0..2 {
            for j in 0..3 {
                for k in 0..4 {
                    let expected = (i + 8 * j + 2 * k) as f32;
                    assert_eq!(data[(i * 3 + j) * 4 + k], expected);
                }
            }
        }
    }

    #[test]
    fn test_offset_view_slices_first() {
        let view = as_strided(&buffer(12), vec![2, 2], vec![2, 1], 3).unwrap();
        let (builder, data) = run(&view, 12);
        assert_eq!(builder.program().count("slice-in-dim"), 1);
        assert_eq!(data, vec![3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_multi_dimensional_input_is_flattened() {
        let input = parameter(0, ValueShape::array(DType::F32, &[4, 3]), "m").unwrap();
        let view = as_strided(&input, vec![5], vec![1], 1).unwrap();
        let mut builder = CpuBuilder::new();
        builder.bind_parameter(0, iota(&[4, 3]));
        let outputs = lower_into(&mut builder, &[view]);
        let data = builder.output(outputs[0], 0).unwrap().data_f32().unwrap();
        assert_eq!(data, &[1.0, 2.0, 3.0, 4.0, 5.0]);
    }

    #[test]
    fn test_stride_permutation_is_stable() {
        assert_eq!(AsStrided::array_stride_permutation(&[4, 4, 1]), vec![0, 1, 2]);
        assert_eq!(AsStrided::array_stride_permutation(&[1, 4, 4]), vec![1, 2, 0]);
        assert_eq!(AsStrided::array_stride_permutation(&[]), Vec::<usize>::new());
    }

    #[test]
    fn test_shape_matches_requested_size() {
        let view = as_strided(&buffer(24), vec![3, 2, 2], vec![1, 6, 3], 2).unwrap();
        assert_eq!(view.shape(), &ValueShape::array(DType::F32, &[3, 2, 2]));
    }

    #[test]
    fn test_fingerprint_covers_every_parameter() {
        let input = buffer(24);
        let base = as_strided(&input, vec![2, 3], vec![3, 1], 0).unwrap();
        let same = as_strided(&input, vec![2, 3], vec![3, 1], 0).unwrap();
        assert_eq!(base.fingerprint(), same.fingerprint());
        for other in [
            as_strided(&input, vec![3, 2], vec![3, 1], 0).unwrap(),
            as_strided(&input, vec![2, 3], vec![1, 2], 0).unwrap(),
            as_strided(&input, vec![2, 3], vec![3, 1], 1).unwrap(),
        ] {
            assert_ne!(base.fingerprint(), other.fingerprint());
        }
    }

    #[test]
    fn test_description_lists_parameters() {
        let view = as_strided(&buffer(24), vec![2, 3], vec![3, 1], 4).unwrap();
        let text = view.node().to_string();
        assert!(text.contains("aten::as_strided("), "{}", text);
        assert!(text.ends_with(", size=(2, 3), stride=(3, 1), storage_offset=4"), "{}", text);
    }

    #[test]
    fn test_clone_onto_equivalent_operand() {
        let view = as_strided(&buffer(24), vec![2, 3], vec![1, 2], 0).unwrap();
        let other = parameter(0, ValueShape::array(DType::F32, &[24]), "again").unwrap();
        let cloned = view.node().clone_with_operands(vec![other.clone()]).unwrap();
        assert_eq!(cloned.shapes(), view.node().shapes());
        assert_eq!(cloned.fingerprint(), view.node().fingerprint());
        assert_eq!(cloned.operand(0), &other);
        assert_eq!(cloned.downcast::<AsStrided>(), view.node().downcast::<AsStrided>());
    }

    #[test]
    fn test_clone_onto_smaller_operand_revalidates() {
        let view = as_strided(&buffer(24), vec![2, 3], vec![3, 1], 10).unwrap();
        let small = buffer(8);
        assert!(view
            .node()
            .clone_with_operands(vec![small])
            .unwrap_err()
            .is_shape_error());
    }
}
