//! `tg-operator` - The operator layer of the tensor-graph engine.
//!
//! This crate provides:
//! - `OperatorProperty`: per-kind configuration, shape inference, resource,
//!   backward-dependency and in-place declarations
//! - `Operator`: the device-bound forward/backward compute unit
//! - `OpContext` and the `ResourcePool` that resolves declared resources
//! - `OperatorRegistry`: the explicit type-name to prototype table
//! - Helpers for shape refinement, typed parameters and planning checks

pub mod context;
pub mod error;
pub mod operator;
pub mod param;
pub mod planning;
pub mod property;
pub mod registry;
pub mod resource;
pub mod shape_infer;
pub mod write_mode;

pub use context::{OpContext, RunContext, StreamHandle};
pub use error::{OpError, Result};
pub use operator::{check_backward_args, check_forward_args, BackwardArgs, Operator};
pub use planning::{backward_dependency, check_backward_inplace, check_forward_inplace, BackwardIndexSpace};
pub use property::{InplaceOption, OperatorProperty};
pub use registry::OperatorRegistry;
pub use resource::{LocalResourcePool, Resource, ResourceKind, ResourcePool, ResourceRequest, Workspace};
pub use write_mode::{assign, WriteMode};
