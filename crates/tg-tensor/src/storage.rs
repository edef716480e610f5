use half::f16;

use crate::dtype::DType;
use crate::error::{Result, TensorError};

/// CPU-side tensor storage.
///
/// Kernels compute in f32; F16 storage is widened on read and narrowed on
/// write.
#[derive(Debug, Clone)]
pub enum CpuStorage {
    /// 32-bit floating point storage.
    F32(Vec<f32>),
    /// 16-bit floating point storage.
    F16(Vec<f16>),
}

impl CpuStorage {
    /// Number of elements in this storage.
    pub fn len(&self) -> usize {
        match self {
            CpuStorage::F32(v) => v.len(),
            CpuStorage::F16(v) => v.len(),
        }
    }

    /// Returns true if the storage contains no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copy the contents out as f32, widening if necessary.
    pub fn to_f32_vec(&self) -> Vec<f32> {
        match self {
            CpuStorage::F32(v) => v.clone(),
            CpuStorage::F16(v) => v.iter().map(|h| h.to_f32()).collect(),
        }
    }

    /// Overwrite every element from an f32 slice of the same length.
    pub fn copy_from_f32(&mut self, values: &[f32]) -> Result<()> {
        if values.len() != self.len() {
            return Err(TensorError::ShapeMismatch {
                expected: vec![self.len()],
                got: vec![values.len()],
            });
        }
        match self {
            CpuStorage::F32(v) => v.copy_from_slice(values),
            CpuStorage::F16(v) => {
                for (dst, &src) in v.iter_mut().zip(values) {
                    *dst = f16::from_f32(src);
                }
            }
        }
        Ok(())
    }

    /// Add an f32 slice of the same length into every element.
    pub fn add_from_f32(&mut self, values: &[f32]) -> Result<()> {
        if values.len() != self.len() {
            return Err(TensorError::ShapeMismatch {
                expected: vec![self.len()],
                got: vec![values.len()],
            });
        }
        match self {
            CpuStorage::F32(v) => {
                for (dst, &src) in v.iter_mut().zip(values) {
                    *dst += src;
                }
            }
            CpuStorage::F16(v) => {
                for (dst, &src) in v.iter_mut().zip(values) {
                    *dst = f16::from_f32(dst.to_f32() + src);
                }
            }
        }
        Ok(())
    }

    /// Create zero-filled storage for the given dtype and element count.
    pub fn zeros(dtype: DType, n: usize) -> Self {
        match dtype {
            DType::F32 => CpuStorage::F32(vec![0.0; n]),
            DType::F16 => CpuStorage::F16(vec![f16::ZERO; n]),
        }
    }

    /// Create storage from an f32 vector.
    pub fn from_f32_vec(data: Vec<f32>) -> Self {
        CpuStorage::F32(data)
    }

    /// Create half-precision storage by narrowing an f32 slice.
    pub fn from_f32_as_f16(data: &[f32]) -> Self {
        CpuStorage::F16(data.iter().map(|&v| f16::from_f32(v)).collect())
    }

    /// Returns the dtype of this storage.
    pub fn dtype(&self) -> DType {
        match self {
            CpuStorage::F32(_) => DType::F32,
            CpuStorage::F16(_) => DType::F16,
        }
    }
}
