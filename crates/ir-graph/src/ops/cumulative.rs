use std::any::Any;
use std::fmt;

use ir_tensor::{DType, OpBuilder, Reducer, TargetOp, ValueShape};

use crate::error::Result;
use crate::fingerprint::Fingerprint;
use crate::kind::{self, OpKind};
use crate::node::{Node, Operation, Value};
use crate::shape_inference::{check_dim, expect_operands, same_shape_with_dtype};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CumulativeReduction {
    Sum,
    Prod,
}

impl CumulativeReduction {
    fn reducer(self) -> Reducer {
        match self {
            CumulativeReduction::Sum => Reducer::Add,
            CumulativeReduction::Prod => Reducer::Mul,
        }
    }
}

impl fmt::Display for CumulativeReduction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CumulativeReduction::Sum => write!(f, "sum"),
            CumulativeReduction::Prod => write!(f, "prod"),
        }
    }
}

/// Inclusive running sum or product along `dim`, optionally converting the
/// input to `dtype` first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cumulative {
    reduction: CumulativeReduction,
    dim: usize,
    dtype: Option<DType>,
}

impl Cumulative {
    pub fn new(reduction: CumulativeReduction, dim: usize, dtype: Option<DType>) -> Self {
        Cumulative {
            reduction,
            dim,
            dtype,
        }
    }

    pub fn reduction(&self) -> CumulativeReduction {
        self.reduction
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn dtype(&self) -> Option<DType> {
        self.dtype
    }
}

impl Operation for Cumulative {
    fn kind(&self) -> OpKind {
        match self.reduction {
            CumulativeReduction::Sum => kind::CUMSUM,
            CumulativeReduction::Prod => kind::CUMPROD,
        }
    }

    fn infer_shapes(&self, operands: &[ValueShape]) -> Result<Vec<ValueShape>> {
        expect_operands(self.kind(), operands, 1)?;
        check_dim(self.kind(), &operands[0], self.dim)?;
        Ok(vec![same_shape_with_dtype(self.kind(), &operands[0], self.dtype)?])
    }

    fn lower(&self, operands: &[TargetOp], builder: &mut dyn OpBuilder) -> Result<Vec<TargetOp>> {
        let mut input = operands[0];
        if let Some(dtype) = self.dtype {
            input = builder.convert(input, dtype)?;
        }
        let dtype = builder.shape_of(input)?.as_array()?.0;
        let reducer = self.reduction.reducer();
        let scan = builder.cumulative(input, self.dim, reducer, reducer.identity(dtype))?;
        Ok(vec![scan])
    }

    fn fingerprint_params(&self) -> Fingerprint {
        // The reduction is already part of the kind.
        Fingerprint::of(&(self.dim, self.dtype))
    }

    fn describe_params(&self) -> String {
        match self.dtype {
            Some(dtype) => format!(", dim={}, dtype={}", self.dim, dtype),
            None => format!(", dim={}, dtype=none", self.dim),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

pub fn cumsum(input: &Value, dim: usize, dtype: Option<DType>) -> Result<Value> {
    let op = Cumulative::new(CumulativeReduction::Sum, dim, dtype);
    Ok(Node::new(op, vec![input.clone()])?.output(0))
}

pub fn cumprod(input: &Value, dim: usize, dtype: Option<DType>) -> Result<Value> {
    let op = Cumulative::new(CumulativeReduction::Prod, dim, dtype);
    Ok(Node::new(op, vec![input.clone()])?.output(0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::parameter::parameter;
    use crate::ops::test_util::lower_into;
    use approx::assert_abs_diff_eq;
    use ir_tensor::{CpuBuilder, InstructionKind, Scalar, Shape, ShapeBuilder, Tensor};

    fn evaluate(value: &Value, input: Tensor) -> Vec<f64> {
        let mut builder = CpuBuilder::new();
        builder.bind_parameter(0, input);
        let outputs = lower_into(&mut builder, std::slice::from_ref(value));
        builder.output(outputs[0], 0).unwrap().to_f64_vec()
    }

    fn vector(values: &[f32]) -> (Value, Tensor) {
        let x = parameter(0, ValueShape::array(DType::F32, &[values.len()]), "x").unwrap();
        (x, Tensor::new(values.to_vec(), Shape::new(vec![values.len()])))
    }

    #[test]
    fn test_cumsum() {
        let (x, data) = vector(&[1.0, 2.0, 3.0]);
        let y = cumsum(&x, 0, None).unwrap();
        assert_eq!(y.shape(), x.shape());
        assert_eq!(evaluate(&y, data), vec![1.0, 3.0, 6.0]);
    }

    #[test]
    fn test_cumprod_of_ones() {
        let (x, data) = vector(&[1.0; 4]);
        let y = cumprod(&x, 0, None).unwrap();
        assert_eq!(evaluate(&y, data), vec![1.0; 4]);
    }

    #[test]
    fn test_cumprod_along_inner_dim() {
        let x = parameter(0, ValueShape::array(DType::F32, &[2, 3]), "x").unwrap();
        let data = Tensor::new(vec![1.0, 2.0, 3.0, 0.5, 4.0, 2.0], Shape::new(vec![2, 3]));
        let y = cumprod(&x, 1, None).unwrap();
        let out = evaluate(&y, data);
        let expected = [1.0, 2.0, 6.0, 0.5, 2.0, 4.0];
        for (got, want) in out.iter().zip(expected) {
            assert_abs_diff_eq!(*got, want, epsilon = 1e-6);
        }
    }

    #[test]
    fn test_dtype_converts_before_scanning() {
        let (x, data) = vector(&[0.5, 0.5, 0.5]);
        let y = cumsum(&x, 0, Some(DType::F64)).unwrap();
        assert_eq!(y.shape(), &ValueShape::array(DType::F64, &[3]));

        let mut builder = CpuBuilder::new();
        builder.bind_parameter(0, data);
        let outputs = lower_into(&mut builder, &[y]);
        assert_eq!(builder.program().count("convert"), 1);
        let out = builder.output(outputs[0], 0).unwrap();
        assert_eq!(out.dtype(), DType::F64);
        assert_eq!(out.to_f64_vec(), vec![0.5, 1.0, 1.5]);
    }

    #[test]
    fn test_integer_conversion_truncates_first() {
        let (x, data) = vector(&[1.5, 2.5, 3.5]);
        let y = cumsum(&x, 0, Some(DType::S32)).unwrap();
        assert_eq!(evaluate(&y, data), vec![1.0, 3.0, 6.0]);
    }

    #[test]
    fn test_no_convert_without_dtype() {
        let (x, data) = vector(&[1.0, 2.0]);
        let y = cumsum(&x, 0, None).unwrap();
        let mut builder = CpuBuilder::new();
        builder.bind_parameter(0, data);
        lower_into(&mut builder, &[y]);
        assert_eq!(builder.program().count("convert"), 0);
        assert_eq!(builder.program().count("cumulative"), 1);
    }

    #[test]
    fn test_dim_out_of_range() {
        let (x, _) = vector(&[1.0]);
        assert!(cumsum(&x, 1, None).unwrap_err().is_shape_error());
    }

    #[test]
    fn test_fingerprints() {
        let (x, _) = vector(&[1.0, 2.0]);
        let sum = cumsum(&x, 0, None).unwrap();
        let prod = cumprod(&x, 0, None).unwrap();
        let sum64 = cumsum(&x, 0, Some(DType::F64)).unwrap();
        assert_eq!(sum.fingerprint(), cumsum(&x, 0, None).unwrap().fingerprint());
        assert_ne!(sum.fingerprint(), prod.fingerprint());
        assert_ne!(sum.fingerprint(), sum64.fingerprint());
        assert_ne!(sum64.fingerprint(), cumsum(&x, 0, Some(DType::F32)).unwrap().fingerprint());

        let m = parameter(0, ValueShape::array(DType::F32, &[2, 2]), "m").unwrap();
        for scan in [cumsum, cumprod] {
            let rows = scan(&m, 0, None).unwrap();
            let cols = scan(&m, 1, None).unwrap();
            assert_eq!(rows.shape(), cols.shape());
            assert_ne!(rows.fingerprint(), cols.fingerprint());
        }
    }

    #[test]
    fn test_scan_seeded_with_reducer_identity() {
        let x = parameter(0, ValueShape::array(DType::S32, &[3]), "x").unwrap();
        let sum = cumsum(&x, 0, None).unwrap();
        let prod = cumprod(&x, 0, Some(DType::F64)).unwrap();
        let mut builder = ShapeBuilder::new();
        let lowered = lower_into(&mut builder, &[sum, prod]);

        let seed = |op| match &builder.program().instruction(op).unwrap().kind {
            InstructionKind::Cumulative { reducer, init, .. } => (*reducer, *init),
            other => panic!("expected a cumulative scan, got {:?}", other),
        };
        assert_eq!(seed(lowered[0]), (Reducer::Add, Scalar::Int(0)));
        assert_eq!(seed(lowered[1]), (Reducer::Mul, Scalar::Float(1.0)));
    }

    #[test]
    fn test_description() {
        let (x, _) = vector(&[1.0, 2.0]);
        let text = cumprod(&x, 0, Some(DType::F64)).unwrap().node().to_string();
        assert!(text.contains("f64[2] aten::cumprod("), "{}", text);
        assert!(text.ends_with(", dim=0, dtype=f64"), "{}", text);
    }
}
