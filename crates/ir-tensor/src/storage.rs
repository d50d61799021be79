use std::fmt;

use half::{bf16, f16};

use crate::dtype::DType;
use crate::error::{Result, TensorError};

/// A single constant, used for reducer identities and fill values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Scalar {
    Pred(bool),
    Int(i64),
    Float(f64),
}

impl Scalar {
    /// The additive identity of `dtype`.
    pub fn zero(dtype: DType) -> Scalar {
        match dtype {
            DType::Pred => Scalar::Pred(false),
            DType::S32 | DType::S64 => Scalar::Int(0),
            _ => Scalar::Float(0.0),
        }
    }

    /// The multiplicative identity of `dtype`.
    pub fn one(dtype: DType) -> Scalar {
        match dtype {
            DType::Pred => Scalar::Pred(true),
            DType::S32 | DType::S64 => Scalar::Int(1),
            _ => Scalar::Float(1.0),
        }
    }

    /// The smallest representable value of `dtype` (identity of max).
    pub fn lowest(dtype: DType) -> Scalar {
        match dtype {
            DType::Pred => Scalar::Pred(false),
            DType::S32 => Scalar::Int(i32::MIN as i64),
            DType::S64 => Scalar::Int(i64::MIN),
            _ => Scalar::Float(f64::NEG_INFINITY),
        }
    }

    pub fn as_f64(&self) -> f64 {
        match *self {
            Scalar::Pred(b) => {
                if b {
                    1.0
                } else {
                    0.0
                }
            }
            Scalar::Int(i) => i as f64,
            Scalar::Float(f) => f,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Pred(b) => write!(f, "{}", b),
            Scalar::Int(i) => write!(f, "{}", i),
            Scalar::Float(v) => write!(f, "{:?}", v),
        }
    }
}

/// Element types the CPU kernels are generic over.
pub(crate) trait Element: Copy + PartialOrd + fmt::Debug {
    fn from_f64(v: f64) -> Self;
    fn to_f64(self) -> f64;
    fn from_scalar(s: Scalar) -> Self {
        Self::from_f64(s.as_f64())
    }
    fn add(self, other: Self) -> Self;
    fn mul(self, other: Self) -> Self;
}

impl Element for bool {
    fn from_f64(v: f64) -> Self {
        v != 0.0
    }
    fn to_f64(self) -> f64 {
        if self {
            1.0
        } else {
            0.0
        }
    }
    fn add(self, other: Self) -> Self {
        self || other
    }
    fn mul(self, other: Self) -> Self {
        self && other
    }
}

impl Element for i32 {
    fn from_f64(v: f64) -> Self {
        v as i32
    }
    fn to_f64(self) -> f64 {
        self as f64
    }
    fn from_scalar(s: Scalar) -> Self {
        match s {
            Scalar::Int(i) => i as i32,
            other => Self::from_f64(other.as_f64()),
        }
    }
    fn add(self, other: Self) -> Self {
        self.wrapping_add(other)
    }
    fn mul(self, other: Self) -> Self {
        self.wrapping_mul(other)
    }
}

impl Element for i64 {
    fn from_f64(v: f64) -> Self {
        v as i64
    }
    fn to_f64(self) -> f64 {
        self as f64
    }
    fn from_scalar(s: Scalar) -> Self {
        match s {
            Scalar::Int(i) => i,
            other => Self::from_f64(other.as_f64()),
        }
    }
    fn add(self, other: Self) -> Self {
        self.wrapping_add(other)
    }
    fn mul(self, other: Self) -> Self {
        self.wrapping_mul(other)
    }
}

impl Element for f16 {
    fn from_f64(v: f64) -> Self {
        f16::from_f64(v)
    }
    fn to_f64(self) -> f64 {
        f16::to_f64(self)
    }
    fn add(self, other: Self) -> Self {
        f16::from_f32(self.to_f32() + other.to_f32())
    }
    fn mul(self, other: Self) -> Self {
        f16::from_f32(self.to_f32() * other.to_f32())
    }
}

impl Element for bf16 {
    fn from_f64(v: f64) -> Self {
        bf16::from_f64(v)
    }
    fn to_f64(self) -> f64 {
        bf16::to_f64(self)
    }
    fn add(self, other: Self) -> Self {
        bf16::from_f32(self.to_f32() + other.to_f32())
    }
    fn mul(self, other: Self) -> Self {
        bf16::from_f32(self.to_f32() * other.to_f32())
    }
}

impl Element for f32 {
    fn from_f64(v: f64) -> Self {
        v as f32
    }
    fn to_f64(self) -> f64 {
        self as f64
    }
    fn add(self, other: Self) -> Self {
        self + other
    }
    fn mul(self, other: Self) -> Self {
        self * other
    }
}

impl Element for f64 {
    fn from_f64(v: f64) -> Self {
        v
    }
    fn to_f64(self) -> f64 {
        self
    }
    fn add(self, other: Self) -> Self {
        self + other
    }
    fn mul(self, other: Self) -> Self {
        self * other
    }
}

/// Applies `$body` to the typed vector inside `$storage` and wraps the
/// result back into the same variant.
macro_rules! map_storage {
    ($storage:expr, |$v:ident| $body:expr) => {
        match $storage {
            $crate::storage::CpuStorage::Pred($v) => $crate::storage::CpuStorage::Pred($body),
            $crate::storage::CpuStorage::S32($v) => $crate::storage::CpuStorage::S32($body),
            $crate::storage::CpuStorage::S64($v) => $crate::storage::CpuStorage::S64($body),
            $crate::storage::CpuStorage::F16($v) => $crate::storage::CpuStorage::F16($body),
            $crate::storage::CpuStorage::BF16($v) => $crate::storage::CpuStorage::BF16($body),
            $crate::storage::CpuStorage::F32($v) => $crate::storage::CpuStorage::F32($body),
            $crate::storage::CpuStorage::F64($v) => $crate::storage::CpuStorage::F64($body),
        }
    };
}
pub(crate) use map_storage;

/// CPU-side tensor storage, one typed vector per element type.
#[derive(Debug, Clone, PartialEq)]
pub enum CpuStorage {
    Pred(Vec<bool>),
    S32(Vec<i32>),
    S64(Vec<i64>),
    F16(Vec<f16>),
    BF16(Vec<bf16>),
    F32(Vec<f32>),
    F64(Vec<f64>),
}

fn gather_vec<T: Copy>(values: &[T], indices: &[usize]) -> Vec<T> {
    indices.iter().map(|&i| values[i]).collect()
}

fn to_f64_vec<T: Element>(values: &[T]) -> Vec<f64> {
    values.iter().map(|v| v.to_f64()).collect()
}

fn from_f64_slice<T: Element>(values: &[f64]) -> Vec<T> {
    values.iter().map(|&v| T::from_f64(v)).collect()
}

impl CpuStorage {
    /// Number of elements in this storage.
    pub fn len(&self) -> usize {
        match self {
            CpuStorage::Pred(v) => v.len(),
            CpuStorage::S32(v) => v.len(),
            CpuStorage::S64(v) => v.len(),
            CpuStorage::F16(v) => v.len(),
            CpuStorage::BF16(v) => v.len(),
            CpuStorage::F32(v) => v.len(),
            CpuStorage::F64(v) => v.len(),
        }
    }

    /// Returns true if the storage contains no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the dtype of this storage.
    pub fn dtype(&self) -> DType {
        match self {
            CpuStorage::Pred(_) => DType::Pred,
            CpuStorage::S32(_) => DType::S32,
            CpuStorage::S64(_) => DType::S64,
            CpuStorage::F16(_) => DType::F16,
            CpuStorage::BF16(_) => DType::BF16,
            CpuStorage::F32(_) => DType::F32,
            CpuStorage::F64(_) => DType::F64,
        }
    }

    /// Create zero-filled storage for the given dtype and element count.
    pub fn zeros(dtype: DType, n: usize) -> Self {
        Self::filled(dtype, Scalar::zero(dtype), n)
    }

    /// Create storage of `n` copies of `value` converted to `dtype`.
    pub fn filled(dtype: DType, value: Scalar, n: usize) -> Self {
        match dtype {
            DType::Pred => CpuStorage::Pred(vec![bool::from_scalar(value); n]),
            DType::S32 => CpuStorage::S32(vec![i32::from_scalar(value); n]),
            DType::S64 => CpuStorage::S64(vec![i64::from_scalar(value); n]),
            DType::F16 => CpuStorage::F16(vec![f16::from_scalar(value); n]),
            DType::BF16 => CpuStorage::BF16(vec![bf16::from_scalar(value); n]),
            DType::F32 => CpuStorage::F32(vec![f32::from_scalar(value); n]),
            DType::F64 => CpuStorage::F64(vec![f64::from_scalar(value); n]),
        }
    }

    /// Create storage from an f32 vector.
    pub fn from_f32_vec(data: Vec<f32>) -> Self {
        CpuStorage::F32(data)
    }

    /// Create storage of the given dtype from f64 values, converting each.
    pub fn from_f64_vec(dtype: DType, data: &[f64]) -> Self {
        match dtype {
            DType::Pred => CpuStorage::Pred(from_f64_slice(data)),
            DType::S32 => CpuStorage::S32(from_f64_slice(data)),
            DType::S64 => CpuStorage::S64(from_f64_slice(data)),
            DType::F16 => CpuStorage::F16(from_f64_slice(data)),
            DType::BF16 => CpuStorage::BF16(from_f64_slice(data)),
            DType::F32 => CpuStorage::F32(from_f64_slice(data)),
            DType::F64 => CpuStorage::F64(data.to_vec()),
        }
    }

    /// Returns the data as an f32 slice.
    ///
    /// # Errors
    /// Returns an error if the storage is not F32.
    pub fn as_f32_slice(&self) -> Result<&[f32]> {
        match self {
            CpuStorage::F32(v) => Ok(v.as_slice()),
            other => Err(TensorError::DTypeMismatch {
                expected: DType::F32.to_string(),
                got: other.dtype().to_string(),
            }),
        }
    }

    /// Returns every element widened to f64.
    pub fn to_f64_vec(&self) -> Vec<f64> {
        match self {
            CpuStorage::Pred(v) => to_f64_vec(v),
            CpuStorage::S32(v) => to_f64_vec(v),
            CpuStorage::S64(v) => to_f64_vec(v),
            CpuStorage::F16(v) => to_f64_vec(v),
            CpuStorage::BF16(v) => to_f64_vec(v),
            CpuStorage::F32(v) => to_f64_vec(v),
            CpuStorage::F64(v) => v.clone(),
        }
    }

    /// Returns a new storage holding `self[indices[i]]` at position `i`.
    ///
    /// # Panics
    /// Panics if an index is out of bounds.
    pub fn gather(&self, indices: &[usize]) -> Self {
        map_storage!(self, |v| gather_vec(v, indices))
    }

    /// Converts every element to `dtype`. Conversions between distinct types
    /// go through f64.
    pub fn convert(&self, dtype: DType) -> Self {
        if dtype == self.dtype() {
            return self.clone();
        }
        Self::from_f64_vec(dtype, &self.to_f64_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_f32_vec() {
        let s = CpuStorage::from_f32_vec(vec![1.0, 2.0, 3.0]);
        assert_eq!(s.len(), 3);
        assert!(!s.is_empty());
        assert_eq!(s.as_f32_slice().unwrap(), &[1.0, 2.0, 3.0]);
    }

    #[test]
    fn test_zeros_every_dtype() {
        for dtype in [
            DType::Pred,
            DType::S32,
            DType::S64,
            DType::F16,
            DType::BF16,
            DType::F32,
            DType::F64,
        ] {
            let s = CpuStorage::zeros(dtype, 5);
            assert_eq!(s.len(), 5);
            assert_eq!(s.dtype(), dtype);
            assert_eq!(s.to_f64_vec(), vec![0.0; 5]);
        }
    }

    #[test]
    fn test_as_f32_slice_wrong_dtype() {
        let s = CpuStorage::zeros(DType::S32, 2);
        assert!(s.as_f32_slice().is_err());
    }

    #[test]
    fn test_gather() {
        let s = CpuStorage::S64(vec![10, 20, 30, 40]);
        assert_eq!(s.gather(&[3, 0, 0]), CpuStorage::S64(vec![40, 10, 10]));
    }

    #[test]
    fn test_convert() {
        let s = CpuStorage::from_f32_vec(vec![1.5, -2.0, 0.0]);
        assert_eq!(s.convert(DType::S32), CpuStorage::S32(vec![1, -2, 0]));
        assert_eq!(
            s.convert(DType::Pred),
            CpuStorage::Pred(vec![true, true, false])
        );
        let h = s.convert(DType::F16);
        assert_eq!(h.dtype(), DType::F16);
        assert_eq!(h.to_f64_vec(), vec![1.5, -2.0, 0.0]);
    }

    #[test]
    fn test_scalar_identities() {
        assert_eq!(Scalar::zero(DType::F32), Scalar::Float(0.0));
        assert_eq!(Scalar::one(DType::S64), Scalar::Int(1));
        assert_eq!(Scalar::one(DType::Pred), Scalar::Pred(true));
        assert_eq!(Scalar::lowest(DType::S32), Scalar::Int(i32::MIN as i64));
        assert_eq!(Scalar::lowest(DType::F64), Scalar::Float(f64::NEG_INFINITY));
    }

    #[test]
    fn test_filled_exact_for_integers() {
        let s = CpuStorage::filled(DType::S64, Scalar::Int(i64::MIN), 2);
        assert_eq!(s, CpuStorage::S64(vec![i64::MIN, i64::MIN]));
    }
}
