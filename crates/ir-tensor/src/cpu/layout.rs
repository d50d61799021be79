// Data movement kernels: strided slicing and axis permutation.

use crate::error::Result;
use crate::shape::Shape;
use crate::tensor::Tensor;

/// Splits `dims` around `dim` into (outer, size, inner) extents.
pub(crate) fn split_at_dim(dims: &[usize], dim: usize) -> (usize, usize, usize) {
    let outer = dims[..dim].iter().product();
    let inner = dims[dim + 1..].iter().product();
    (outer, dims[dim], inner)
}

/// Slices `input` along `dim`. Bounds are validated by the shape rules.
pub fn slice_in_dim(
    input: &Tensor,
    start: usize,
    limit: usize,
    stride: usize,
    dim: usize,
) -> Result<Tensor> {
    let dims = input.shape().dims();
    let (outer, size, inner) = split_at_dim(dims, dim);
    let count = (limit - start).div_ceil(stride);

    let mut indices = Vec::with_capacity(outer * count * inner);
    for o in 0..outer {
        for i in 0..count {
            let row = o * size + start + i * stride;
            for k in 0..inner {
                indices.push(row * inner + k);
            }
        }
    }

    let mut out_dims = dims.to_vec();
    out_dims[dim] = count;
    Tensor::from_storage(input.storage().gather(&indices), Shape::new(out_dims))
}

/// Permutes the axes of `input`: output dimension `i` is input dimension
/// `permutation[i]`.
pub fn transpose(input: &Tensor, permutation: &[usize]) -> Result<Tensor> {
    let out_shape = input.shape().permute(permutation)?;
    let in_strides = input.shape().strides();
    let out_dims = out_shape.dims();
    let rank = out_dims.len();

    let mut indices = Vec::with_capacity(out_shape.numel());
    let mut counter = vec![0usize; rank];
    for _ in 0..out_shape.numel() {
        let offset: usize = counter
            .iter()
            .zip(permutation)
            .map(|(&c, &p)| c * in_strides[p])
            .sum();
        indices.push(offset);

        // Advance the row-major output counter.
        for axis in (0..rank).rev() {
            counter[axis] += 1;
            if counter[axis] < out_dims[axis] {
                break;
            }
            counter[axis] = 0;
        }
    }

    Tensor::from_storage(input.storage().gather(&indices), out_shape)
}
