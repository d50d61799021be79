use crate::dtype::DType;
use crate::error::{Result, TensorError};
use std::fmt;

/// A tensor shape, wrapping a vector of dimension sizes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Shape {
    dims: Vec<usize>,
}

impl Shape {
    /// Create a new shape from a vector of dimensions.
    pub fn new(dims: Vec<usize>) -> Self {
        Shape { dims }
    }

    /// Create a shape from a slice of dimensions.
    pub fn from_slice(dims: &[usize]) -> Self {
        Shape {
            dims: dims.to_vec(),
        }
    }

    /// Number of dimensions (rank).
    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    /// Total number of elements (product of all dimension sizes).
    ///
    /// # Panics
    /// Panics if the count overflows `usize`. Shapes that did not come from
    /// allocated data should go through [`Shape::try_numel`].
    pub fn numel(&self) -> usize {
        match self.try_numel() {
            Ok(n) => n,
            Err(err) => panic!("{}", err),
        }
    }

    /// Total number of elements, or an error if the count overflows `usize`.
    pub fn try_numel(&self) -> Result<usize> {
        self.dims
            .iter()
            .try_fold(1usize, |acc, &d| acc.checked_mul(d))
            .ok_or_else(|| TensorError::ElementCountOverflow(self.dims.clone()))
    }

    /// Returns the size of dimension `i`.
    ///
    /// # Panics
    /// Panics if `i >= ndim()`.
    pub fn dim(&self, i: usize) -> usize {
        self.dims[i]
    }

    /// Returns a reference to the underlying dimension sizes.
    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    /// Computes row-major contiguous strides for this shape.
    ///
    /// For a shape [d0, d1, d2], the strides are [d1*d2, d2, 1].
    pub fn strides(&self) -> Vec<usize> {
        if self.dims.is_empty() {
            return vec![];
        }
        let mut strides = vec![0usize; self.dims.len()];
        strides[self.dims.len() - 1] = 1;
        for i in (0..self.dims.len() - 1).rev() {
            strides[i] = strides[i + 1] * self.dims[i + 1];
        }
        strides
    }

    /// Returns the shape a transpose by `permutation` produces: output
    /// dimension `i` is input dimension `permutation[i]`.
    pub fn permute(&self, permutation: &[usize]) -> Result<Shape> {
        validate_permutation(permutation, self.ndim())?;
        Ok(Shape::new(
            permutation.iter().map(|&p| self.dims[p]).collect(),
        ))
    }

    /// Scatters the dimensions through `permutation`: output dimension
    /// `permutation[i]` is input dimension `i`. Undoes [`Shape::permute`].
    pub fn permute_inverse(&self, permutation: &[usize]) -> Result<Shape> {
        validate_permutation(permutation, self.ndim())?;
        let mut dims = vec![0usize; self.ndim()];
        for (i, &p) in permutation.iter().enumerate() {
            dims[p] = self.dims[i];
        }
        Ok(Shape::new(dims))
    }
}

/// Checks that `permutation` is a permutation of `0..rank`.
pub fn validate_permutation(permutation: &[usize], rank: usize) -> Result<()> {
    let mut seen = vec![false; rank];
    let valid = permutation.len() == rank
        && permutation.iter().all(|&p| {
            if p >= rank || seen[p] {
                return false;
            }
            seen[p] = true;
            true
        });
    if valid {
        Ok(())
    } else {
        Err(TensorError::InvalidPermutation {
            permutation: permutation.to_vec(),
            rank,
        })
    }
}

/// Returns `q` such that `q[p[i]] == i`.
///
/// The caller guarantees `permutation` is valid.
pub fn inverse_permutation(permutation: &[usize]) -> Vec<usize> {
    let mut inverse = vec![0usize; permutation.len()];
    for (i, &p) in permutation.iter().enumerate() {
        inverse[p] = i;
    }
    inverse
}

/// Returns true if `permutation[i] == i` for every position.
pub fn is_identity_permutation(permutation: &[usize]) -> bool {
    permutation.iter().enumerate().all(|(i, &p)| i == p)
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, d) in self.dims.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", d)?;
        }
        write!(f, "]")
    }
}

impl From<Vec<usize>> for Shape {
    fn from(dims: Vec<usize>) -> Self {
        Shape::new(dims)
    }
}

impl From<&[usize]> for Shape {
    fn from(dims: &[usize]) -> Self {
        Shape::from_slice(dims)
    }
}

/// The type of a value flowing between operations: either a dense array of
/// some element type, or an opaque sequencing token with no payload.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ValueShape {
    Array { dtype: DType, shape: Shape },
    Token,
}

impl ValueShape {
    /// Shorthand for an array value type.
    pub fn array(dtype: DType, dims: &[usize]) -> Self {
        ValueShape::Array {
            dtype,
            shape: Shape::from_slice(dims),
        }
    }

    pub fn is_token(&self) -> bool {
        matches!(self, ValueShape::Token)
    }

    /// Returns the element type and shape, or an error for tokens.
    pub fn as_array(&self) -> Result<(DType, &Shape)> {
        match self {
            ValueShape::Array { dtype, shape } => Ok((*dtype, shape)),
            ValueShape::Token => Err(TensorError::ExpectedArray(self.to_string())),
        }
    }

    /// Returns the element type, or `None` for tokens.
    pub fn dtype(&self) -> Option<DType> {
        match self {
            ValueShape::Array { dtype, .. } => Some(*dtype),
            ValueShape::Token => None,
        }
    }

    /// Returns the dimensions; tokens have none.
    pub fn dims(&self) -> &[usize] {
        match self {
            ValueShape::Array { shape, .. } => shape.dims(),
            ValueShape::Token => &[],
        }
    }

    /// Returns the same array shape with a different element type.
    pub fn with_dtype(&self, dtype: DType) -> Result<ValueShape> {
        let (_, shape) = self.as_array()?;
        Ok(ValueShape::Array {
            dtype,
            shape: shape.clone(),
        })
    }
}

impl fmt::Display for ValueShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValueShape::Array { dtype, shape } => write!(f, "{}{}", dtype, shape),
            ValueShape::Token => write!(f, "token[]"),
        }
    }
}
