pub mod matmul;
pub mod unary;

use crate::backend::ComputeBackend;
use crate::error::{Result, TensorError};

/// Pure-Rust CPU compute backend.
///
/// Implements all operations with straightforward loops optimized for
/// correctness rather than peak performance. Intended as a reference
/// implementation and fallback.
#[derive(Debug, Clone)]
pub struct CpuBackend;

impl CpuBackend {
    pub fn new() -> Self {
        CpuBackend
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn check_same_len(a: &[f32], b: &[f32]) -> Result<()> {
    if a.len() != b.len() {
        return Err(TensorError::ShapeMismatch {
            expected: vec![a.len()],
            got: vec![b.len()],
        });
    }
    Ok(())
}

fn check_matrix_len(op: &str, data: &[f32], rows: usize, cols: usize) -> Result<()> {
    if data.len() != rows * cols {
        return Err(TensorError::Other(format!(
            "{}: len()={} but expected {}x{}={}",
            op,
            data.len(),
            rows,
            cols,
            rows * cols
        )));
    }
    Ok(())
}

impl ComputeBackend for CpuBackend {
    fn name(&self) -> &str {
        "cpu"
    }

    fn matmul(&self, a: &[f32], b: &[f32], m: usize, k: usize, n: usize) -> Result<Vec<f32>> {
        check_matrix_len("matmul lhs", a, m, k)?;
        check_matrix_len("matmul rhs", b, k, n)?;
        Ok(matmul::matmul(a, b, m, k, n))
    }

    fn transpose_into(&self, a: &[f32], rows: usize, cols: usize, out: &mut [f32]) -> Result<()> {
        check_matrix_len("transpose", a, rows, cols)?;
        if out.len() < rows * cols {
            return Err(TensorError::Other(format!(
                "transpose: output holds {} elements, need {}",
                out.len(),
                rows * cols
            )));
        }
        matmul::transpose_into(a, rows, cols, out);
        Ok(())
    }

    fn sum_rows(&self, a: &[f32], rows: usize, cols: usize) -> Result<Vec<f32>> {
        check_matrix_len("sum_rows", a, rows, cols)?;
        Ok(matmul::sum_rows(a, rows, cols))
    }

    fn add(&self, a: &[f32], b: &[f32]) -> Result<Vec<f32>> {
        check_same_len(a, b)?;
        Ok(a.iter().zip(b.iter()).map(|(x, y)| x + y).collect())
    }

    fn mul(&self, a: &[f32], b: &[f32]) -> Result<Vec<f32>> {
        check_same_len(a, b)?;
        Ok(a.iter().zip(b.iter()).map(|(x, y)| x * y).collect())
    }

    fn relu(&self, x: &[f32]) -> Result<Vec<f32>> {
        Ok(unary::relu(x))
    }

    fn sigmoid(&self, x: &[f32]) -> Result<Vec<f32>> {
        Ok(unary::sigmoid(x))
    }

    fn tanh(&self, x: &[f32]) -> Result<Vec<f32>> {
        Ok(unary::tanh(x))
    }

    fn relu_grad(&self, y: &[f32], grad: &[f32]) -> Result<Vec<f32>> {
        check_same_len(y, grad)?;
        Ok(unary::relu_grad(y, grad))
    }

    fn sigmoid_grad(&self, y: &[f32], grad: &[f32]) -> Result<Vec<f32>> {
        check_same_len(y, grad)?;
        Ok(unary::sigmoid_grad(y, grad))
    }

    fn tanh_grad(&self, y: &[f32], grad: &[f32]) -> Result<Vec<f32>> {
        check_same_len(y, grad)?;
        Ok(unary::tanh_grad(y, grad))
    }
}
