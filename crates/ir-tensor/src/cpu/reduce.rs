// Scan and reduction kernels over a single dimension.

use crate::backend::Reducer;
use crate::cpu::layout::split_at_dim;
use crate::error::Result;
use crate::shape::Shape;
use crate::storage::{map_storage, CpuStorage, Element, Scalar};
use crate::tensor::Tensor;

fn combine<T: Element>(acc: T, value: T, reducer: Reducer) -> T {
    match reducer {
        Reducer::Add => acc.add(value),
        Reducer::Mul => acc.mul(value),
        Reducer::Max => {
            if value > acc {
                value
            } else {
                acc
            }
        }
    }
}

fn scan_vec<T: Element>(
    values: &[T],
    extents: (usize, usize, usize),
    reducer: Reducer,
    init: Scalar,
) -> Vec<T> {
    let (outer, size, inner) = extents;
    let mut out = values.to_vec();
    for o in 0..outer {
        for k in 0..inner {
            let mut acc = T::from_scalar(init);
            for i in 0..size {
                let idx = (o * size + i) * inner + k;
                acc = combine(acc, values[idx], reducer);
                out[idx] = acc;
            }
        }
    }
    out
}

fn reduce_vec<T: Element>(
    values: &[T],
    extents: (usize, usize, usize),
    reducer: Reducer,
    init: Scalar,
) -> Vec<T> {
    let (outer, size, inner) = extents;
    let mut out = Vec::with_capacity(outer * inner);
    for o in 0..outer {
        for k in 0..inner {
            let mut acc = T::from_scalar(init);
            for i in 0..size {
                acc = combine(acc, values[(o * size + i) * inner + k], reducer);
            }
            out.push(acc);
        }
    }
    out
}

fn arg_reduce_vec<T: Element>(
    values: &[T],
    extents: (usize, usize, usize),
    reducer: Reducer,
) -> Vec<i64> {
    let (outer, size, inner) = extents;
    let mut out = Vec::with_capacity(outer * inner);
    for o in 0..outer {
        for k in 0..inner {
            let mut best = 0usize;
            for i in 1..size {
                let current = values[(o * size + best) * inner + k];
                let candidate = values[(o * size + i) * inner + k];
                let better = match reducer {
                    Reducer::Max => candidate > current,
                    Reducer::Add | Reducer::Mul => false,
                };
                if better {
                    best = i;
                }
            }
            out.push(best as i64);
        }
    }
    out
}

fn reduced_shape(shape: &Shape, dim: usize) -> Shape {
    let mut dims = shape.dims().to_vec();
    dims.remove(dim);
    Shape::new(dims)
}

/// Inclusive running reduction of `input` along `dim`.
pub fn cumulative(input: &Tensor, dim: usize, reducer: Reducer, init: Scalar) -> Result<Tensor> {
    let extents = split_at_dim(input.shape().dims(), dim);
    let storage = map_storage!(input.storage(), |v| scan_vec(v, extents, reducer, init));
    Tensor::from_storage(storage, input.shape().clone())
}

/// Reduces `input` along `dim`, removing that dimension.
pub fn reduce(input: &Tensor, dim: usize, reducer: Reducer, init: Scalar) -> Result<Tensor> {
    let extents = split_at_dim(input.shape().dims(), dim);
    let storage = map_storage!(input.storage(), |v| reduce_vec(v, extents, reducer, init));
    Tensor::from_storage(storage, reduced_shape(input.shape(), dim))
}

/// Index of the element `reducer` selects along `dim`, as `S64`.
pub fn arg_reduce(input: &Tensor, dim: usize, reducer: Reducer) -> Result<Tensor> {
    let extents = split_at_dim(input.shape().dims(), dim);
    let indices = match input.storage() {
        CpuStorage::Pred(v) => arg_reduce_vec(v, extents, reducer),
        CpuStorage::S32(v) => arg_reduce_vec(v, extents, reducer),
        CpuStorage::S64(v) => arg_reduce_vec(v, extents, reducer),
        CpuStorage::F16(v) => arg_reduce_vec(v, extents, reducer),
        CpuStorage::BF16(v) => arg_reduce_vec(v, extents, reducer),
        CpuStorage::F32(v) => arg_reduce_vec(v, extents, reducer),
        CpuStorage::F64(v) => arg_reduce_vec(v, extents, reducer),
    };
    Tensor::from_storage(CpuStorage::S64(indices), reduced_shape(input.shape(), dim))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtype::DType;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_cumsum_rows() {
        let t = Tensor::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], Shape::new(vec![2, 3]));
        let r = cumulative(&t, 1, Reducer::Add, Scalar::zero(DType::F32)).unwrap();
        assert_eq!(r.data_f32().unwrap(), &[1.0, 3.0, 6.0, 4.0, 9.0, 15.0]);
    }

    #[test]
    fn test_cumsum_columns() {
        let t = Tensor::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], Shape::new(vec![2, 3]));
        let r = cumulative(&t, 0, Reducer::Add, Scalar::zero(DType::F32)).unwrap();
        assert_eq!(r.data_f32().unwrap(), &[1.0, 2.0, 3.0, 5.0, 7.0, 9.0]);
    }

    #[test]
    fn test_cumprod_f64() {
        let storage = CpuStorage::F64(vec![0.5, 2.0, 3.0]);
        let t = Tensor::from_storage(storage, Shape::new(vec![3])).unwrap();
        let r = cumulative(&t, 0, Reducer::Mul, Scalar::one(DType::F64)).unwrap();
        let values = r.to_f64_vec();
        assert_abs_diff_eq!(values[0], 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(values[1], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(values[2], 3.0, epsilon = 1e-12);
    }

    #[test]
    fn test_cumsum_integers() {
        let t = Tensor::from_storage(CpuStorage::S32(vec![1, 2, 3]), Shape::new(vec![3])).unwrap();
        let r = cumulative(&t, 0, Reducer::Add, Scalar::Int(0)).unwrap();
        assert_eq!(r.storage(), &CpuStorage::S32(vec![1, 3, 6]));
    }

    #[test]
    fn test_reduce_max() {
        let t = Tensor::new(vec![1.0, 9.0, 3.0, 7.0, 5.0, 6.0], Shape::new(vec![2, 3]));
        let r = reduce(&t, 1, Reducer::Max, Scalar::lowest(DType::F32)).unwrap();
        assert_eq!(r.shape().dims(), &[2]);
        assert_eq!(r.data_f32().unwrap(), &[9.0, 7.0]);

        let c = reduce(&t, 0, Reducer::Max, Scalar::lowest(DType::F32)).unwrap();
        assert_eq!(c.data_f32().unwrap(), &[7.0, 9.0, 6.0]);
    }

    #[test]
    fn test_arg_reduce_ties_pick_first() {
        let t = Tensor::new(vec![4.0, 1.0, 4.0, 2.0, 8.0, 8.0], Shape::new(vec![2, 3]));
        let r = arg_reduce(&t, 1, Reducer::Max).unwrap();
        assert_eq!(r.dtype(), DType::S64);
        assert_eq!(r.storage(), &CpuStorage::S64(vec![0, 1]));
    }
}
