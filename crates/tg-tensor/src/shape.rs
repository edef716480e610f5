use std::fmt;

/// A tensor shape, wrapping a vector of dimension sizes.
///
/// During shape inference a shape may be partially known: a dimension of
/// size `0` is unknown, and a shape with no dimensions at all is wholly
/// unknown (its rank is not known yet either).
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
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

    /// A wholly unknown shape (rank not yet known).
    pub fn unknown() -> Self {
        Shape { dims: Vec::new() }
    }

    /// Number of dimensions (rank).
    pub fn ndim(&self) -> usize {
        self.dims.len()
    }

    /// Total number of elements (product of all dimension sizes).
    ///
    /// Only meaningful for fully known shapes; unknown dimensions contribute 0.
    pub fn numel(&self) -> usize {
        if self.dims.is_empty() {
            return 0;
        }
        self.dims.iter().product()
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

    /// True when nothing about the shape is known, not even its rank.
    pub fn is_unknown(&self) -> bool {
        self.dims.is_empty()
    }

    /// True when the rank is known and every dimension is non-zero.
    pub fn is_known(&self) -> bool {
        !self.dims.is_empty() && self.dims.iter().all(|&d| d != 0)
    }

    /// Merge two partial descriptions of the same shape.
    ///
    /// Unknown dimensions are filled from the other side. Returns `None` when
    /// the ranks differ or two known dimensions disagree.
    pub fn unify(&self, other: &Shape) -> Option<Shape> {
        if self.is_unknown() {
            return Some(other.clone());
        }
        if other.is_unknown() {
            return Some(self.clone());
        }
        if self.ndim() != other.ndim() {
            return None;
        }
        let mut dims = Vec::with_capacity(self.ndim());
        for (&a, &b) in self.dims.iter().zip(other.dims.iter()) {
            match (a, b) {
                (0, b) => dims.push(b),
                (a, 0) => dims.push(a),
                (a, b) if a == b => dims.push(a),
                _ => return None,
            }
        }
        Some(Shape::new(dims))
    }

    /// `(dim 0, product of the rest)`: the matrix view used by dense kernels.
    pub fn flat_2d(&self) -> (usize, usize) {
        match self.dims.split_first() {
            Some((&n, rest)) => (n, rest.iter().product()),
            None => (0, 0),
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "(")?;
        for (i, d) in self.dims.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            if *d == 0 {
                write!(f, "?")?;
            } else {
                write!(f, "{}", d)?;
            }
        }
        write!(f, ")")
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

impl<const N: usize> From<[usize; N]> for Shape {
    fn from(dims: [usize; N]) -> Self {
        Shape::from_slice(&dims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_shape() {
        let s = Shape::new(vec![2, 3, 4]);
        assert_eq!(s.ndim(), 3);
        assert_eq!(s.numel(), 24);
        assert_eq!(s.dim(0), 2);
        assert_eq!(s.dim(2), 4);
        assert!(s.is_known());
    }

    #[test]
    fn test_unknown_shape() {
        let s = Shape::unknown();
        assert!(s.is_unknown());
        assert!(!s.is_known());
        assert_eq!(s.numel(), 0);

        let partial = Shape::from([4, 0]);
        assert!(!partial.is_unknown());
        assert!(!partial.is_known());
    }

    #[test]
    fn test_unify_fills_unknown_dims() {
        let a = Shape::from([4, 0]);
        let b = Shape::from([0, 8]);
        assert_eq!(a.unify(&b), Some(Shape::from([4, 8])));
        assert_eq!(Shape::unknown().unify(&a), Some(a.clone()));
        assert_eq!(a.unify(&Shape::unknown()), Some(a));
    }

    #[test]
    fn test_unify_conflict() {
        let a = Shape::from([4, 8]);
        assert_eq!(a.unify(&Shape::from([4, 9])), None);
        assert_eq!(a.unify(&Shape::from([4, 8, 1])), None);
    }

    #[test]
    fn test_flat_2d() {
        assert_eq!(Shape::from([2, 3, 4]).flat_2d(), (2, 12));
        assert_eq!(Shape::from([5]).flat_2d(), (5, 1));
    }

    #[test]
    fn test_display_marks_unknown() {
        assert_eq!(Shape::from([4, 0]).to_string(), "(4, ?)");
    }
}
