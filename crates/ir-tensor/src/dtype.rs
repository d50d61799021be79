use std::fmt;

/// Element types a target operation can produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    /// Boolean predicate.
    Pred,
    /// 32-bit signed integer.
    S32,
    /// 64-bit signed integer. Index outputs use this type.
    S64,
    /// 16-bit floating point (IEEE 754 half-precision, via the `half` crate).
    F16,
    /// bfloat16 (via the `half` crate).
    BF16,
    /// 32-bit floating point.
    F32,
    /// 64-bit floating point.
    F64,
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DType::Pred => write!(f, "pred"),
            DType::S32 => write!(f, "s32"),
            DType::S64 => write!(f, "s64"),
            DType::F16 => write!(f, "f16"),
            DType::BF16 => write!(f, "bf16"),
            DType::F32 => write!(f, "f32"),
            DType::F64 => write!(f, "f64"),
        }
    }
}
