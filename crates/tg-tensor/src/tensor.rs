use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::backend::ComputeBackend;
use crate::device::Device;
use crate::dtype::DType;
use crate::error::{Result, TensorError};
use crate::shape::Shape;
use crate::storage::CpuStorage;

/// A handle to a device buffer plus its shape.
///
/// Cloning a `Tensor` clones the handle, not the data: both clones share the
/// same storage. This is how an executor hands the same memory to an
/// operator as both an input and an in-place output.
#[derive(Debug, Clone)]
pub struct Tensor {
    storage: Arc<RwLock<CpuStorage>>,
    shape: Shape,
    dtype: DType,
    device: Device,
}

impl Tensor {
    /// Create a new f32 tensor from data and a shape.
    ///
    /// # Panics
    /// Panics if `data.len() != shape.numel()`.
    pub fn new(data: Vec<f32>, shape: Shape) -> Self {
        assert_eq!(
            data.len(),
            shape.numel(),
            "data length {} does not match shape {} (numel={})",
            data.len(),
            shape,
            shape.numel()
        );
        Tensor {
            storage: Arc::new(RwLock::new(CpuStorage::from_f32_vec(data))),
            shape,
            dtype: DType::F32,
            device: Device::cpu(),
        }
    }

    /// Create a zero-filled f32 tensor with the given shape.
    pub fn zeros(shape: Shape) -> Result<Self> {
        Self::zeros_with_dtype(shape, DType::F32)
    }

    /// Create a zero-filled tensor with the given shape and dtype.
    ///
    /// # Errors
    /// Returns an error if the shape still has unknown dimensions.
    pub fn zeros_with_dtype(shape: Shape, dtype: DType) -> Result<Self> {
        if !shape.is_known() {
            return Err(TensorError::UnknownShape(shape.to_string()));
        }
        let n = shape.numel();
        Ok(Tensor {
            storage: Arc::new(RwLock::new(CpuStorage::zeros(dtype, n))),
            shape,
            dtype,
            device: Device::cpu(),
        })
    }

    /// Returns a reference to the tensor's shape.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Returns the tensor's data type.
    pub fn dtype(&self) -> DType {
        self.dtype
    }

    /// Returns the device the tensor lives on.
    pub fn device(&self) -> Device {
        self.device
    }

    /// Number of elements.
    pub fn numel(&self) -> usize {
        self.shape.numel()
    }

    /// True when both handles refer to the same storage.
    pub fn shares_storage(&self, other: &Tensor) -> bool {
        Arc::ptr_eq(&self.storage, &other.storage)
    }

    /// Read access to the underlying storage.
    pub fn storage(&self) -> Result<RwLockReadGuard<'_, CpuStorage>> {
        self.storage.read().map_err(|_| TensorError::Poisoned)
    }

    /// Write access to the underlying storage.
    pub fn storage_mut(&self) -> Result<RwLockWriteGuard<'_, CpuStorage>> {
        self.storage.write().map_err(|_| TensorError::Poisoned)
    }

    /// Copy the contents out as f32.
    pub fn to_vec(&self) -> Result<Vec<f32>> {
        Ok(self.storage()?.to_f32_vec())
    }

    /// Overwrite the contents from an f32 slice of matching length.
    pub fn copy_from(&self, values: &[f32]) -> Result<()> {
        self.storage_mut()?.copy_from_f32(values)
    }

    /// Accumulate an f32 slice of matching length into the contents.
    pub fn add_from(&self, values: &[f32]) -> Result<()> {
        self.storage_mut()?.add_from_f32(values)
    }

    /// A handle over a fresh copy of the data.
    pub fn deep_copy(&self) -> Result<Tensor> {
        let storage = self.storage()?.clone();
        Ok(Tensor {
            storage: Arc::new(RwLock::new(storage)),
            shape: self.shape.clone(),
            dtype: self.dtype,
            device: self.device,
        })
    }

    /// Matrix multiplication of two 2D tensors using the given backend.
    ///
    /// self is [m, k], other is [k, n], result is [m, n].
    pub fn matmul(&self, other: &Tensor, backend: &dyn ComputeBackend) -> Result<Tensor> {
        if self.shape.ndim() != 2 || other.shape.ndim() != 2 {
            return Err(TensorError::Other(format!(
                "matmul requires 2D tensors, got {} @ {}",
                self.shape, other.shape
            )));
        }

        let m = self.shape.dim(0);
        let k = self.shape.dim(1);
        let k2 = other.shape.dim(0);
        let n = other.shape.dim(1);

        if k != k2 {
            return Err(TensorError::MatmulMismatch { m, k, k2, n });
        }

        let result_data = backend.matmul(&self.to_vec()?, &other.to_vec()?, m, k, n)?;
        Ok(Tensor::new(result_data, Shape::new(vec![m, n])))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cpu::CpuBackend;

    #[test]
    fn test_new_tensor() {
        let t = Tensor::new(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], Shape::new(vec![2, 3]));
        assert_eq!(t.shape().dims(), &[2, 3]);
        assert_eq!(t.dtype(), DType::F32);
        assert!(t.device().is_cpu());
        assert_eq!(t.to_vec().unwrap(), vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
    }

    #[test]
    fn test_zeros_requires_known_shape() {
        let z = Tensor::zeros(Shape::new(vec![2, 3])).unwrap();
        assert_eq!(z.to_vec().unwrap(), vec![0.0; 6]);
        assert!(Tensor::zeros(Shape::from([2, 0])).is_err());
        assert!(Tensor::zeros(Shape::unknown()).is_err());
    }

    #[test]
    fn test_clone_shares_storage() {
        let a = Tensor::new(vec![1.0, 2.0], Shape::from([2]));
        let alias = a.clone();
        alias.copy_from(&[5.0, 6.0]).unwrap();
        assert!(a.shares_storage(&alias));
        assert_eq!(a.to_vec().unwrap(), vec![5.0, 6.0]);
    }

    #[test]
    fn test_deep_copy_is_independent() {
        let a = Tensor::new(vec![1.0, 2.0], Shape::from([2]));
        let b = a.deep_copy().unwrap();
        b.add_from(&[1.0, 1.0]).unwrap();
        assert!(!a.shares_storage(&b));
        assert_eq!(a.to_vec().unwrap(), vec![1.0, 2.0]);
        assert_eq!(b.to_vec().unwrap(), vec![2.0, 3.0]);
    }

    #[test]
    fn test_f16_tensor_roundtrip() {
        let t = Tensor::zeros_with_dtype(Shape::from([3]), DType::F16).unwrap();
        t.copy_from(&[0.5, 1.5, -2.0]).unwrap();
        assert_eq!(t.dtype(), DType::F16);
        assert_eq!(t.to_vec().unwrap(), vec![0.5, 1.5, -2.0]);
    }

    #[test]
    #[should_panic]
    fn test_new_shape_mismatch_panics() {
        let _t = Tensor::new(vec![1.0, 2.0], Shape::new(vec![3]));
    }

    #[test]
    fn test_matmul() {
        let backend = CpuBackend::new();
        let a = Tensor::new(vec![1.0, 2.0, 3.0, 4.0], Shape::new(vec![2, 2]));
        let b = Tensor::new(vec![5.0, 6.0, 7.0, 8.0], Shape::new(vec![2, 2]));
        let c = a.matmul(&b, &backend).unwrap();
        assert_eq!(c.shape().dims(), &[2, 2]);
        assert_eq!(c.to_vec().unwrap(), vec![19.0, 22.0, 43.0, 50.0]);
    }

    #[test]
    fn test_matmul_dimension_mismatch() {
        let backend = CpuBackend::new();
        let a = Tensor::new(vec![1.0, 2.0, 3.0], Shape::new(vec![1, 3]));
        let b = Tensor::new(vec![1.0, 2.0, 3.0, 4.0], Shape::new(vec![2, 2]));
        assert!(a.matmul(&b, &backend).is_err());
    }
}
