use std::fmt::Debug;

use crate::error::Result;

/// Trait for pluggable compute backends.
///
/// Operates on f32 slices. Data is passed in as slices and returned as owned
/// vectors; callers decide how results are written back (overwrite or
/// accumulate).
pub trait ComputeBackend: Send + Sync + Debug {
    /// Returns the name of this backend (e.g., "cpu").
    fn name(&self) -> &str;

    /// Matrix multiplication: C = A @ B.
    ///
    /// - `a`: row-major data of shape [m, k]
    /// - `b`: row-major data of shape [k, n]
    /// - Returns: row-major data of shape [m, n]
    fn matmul(&self, a: &[f32], b: &[f32], m: usize, k: usize, n: usize) -> Result<Vec<f32>>;

    /// Transpose a row-major [rows, cols] matrix into `out` ([cols, rows]).
    fn transpose_into(&self, a: &[f32], rows: usize, cols: usize, out: &mut [f32]) -> Result<()>;

    /// Sum a row-major [rows, cols] matrix over its rows: result has `cols` entries.
    fn sum_rows(&self, a: &[f32], rows: usize, cols: usize) -> Result<Vec<f32>>;

    /// Element-wise addition: result[i] = a[i] + b[i].
    fn add(&self, a: &[f32], b: &[f32]) -> Result<Vec<f32>>;

    /// Element-wise multiplication: result[i] = a[i] * b[i].
    fn mul(&self, a: &[f32], b: &[f32]) -> Result<Vec<f32>>;

    /// ReLU: max(x, 0).
    fn relu(&self, x: &[f32]) -> Result<Vec<f32>>;

    /// Logistic sigmoid: 1 / (1 + exp(-x)).
    fn sigmoid(&self, x: &[f32]) -> Result<Vec<f32>>;

    /// Hyperbolic tangent.
    fn tanh(&self, x: &[f32]) -> Result<Vec<f32>>;

    /// Gradient of ReLU expressed through its output `y`: grad * (y > 0).
    fn relu_grad(&self, y: &[f32], grad: &[f32]) -> Result<Vec<f32>>;

    /// Gradient of sigmoid through its output `y`: grad * y * (1 - y).
    fn sigmoid_grad(&self, y: &[f32], grad: &[f32]) -> Result<Vec<f32>>;

    /// Gradient of tanh through its output `y`: grad * (1 - y^2).
    fn tanh_grad(&self, y: &[f32], grad: &[f32]) -> Result<Vec<f32>>;
}
