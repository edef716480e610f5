//! `tg-tensor` - Tensor handles for the operator layer.
//!
//! This crate provides:
//! - A `Shape` type where a zero dimension means "unknown"
//! - A `Tensor` handle with shared, lock-protected CPU storage
//! - A `Device` identifying where a tensor lives and where kernels run
//! - A `ComputeBackend` trait plus the reference `CpuBackend`
//! - Data type definitions (F32, F16)

pub mod backend;
pub mod cpu;
pub mod device;
pub mod dtype;
pub mod error;
pub mod shape;
pub mod storage;
pub mod tensor;

// Re-export primary types at the crate root for convenience.
pub use backend::ComputeBackend;
pub use cpu::CpuBackend;
pub use device::{Device, DeviceKind};
pub use dtype::DType;
pub use error::{Result, TensorError};
pub use shape::Shape;
pub use storage::CpuStorage;
pub use tensor::Tensor;
