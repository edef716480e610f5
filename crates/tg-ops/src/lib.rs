//! `tg-ops` - Reference operator kinds for the tensor-graph operator layer.
//!
//! Each kind exercises a different part of the operator contract:
//! - `FullyConnected`: weight shapes inferred from data, scratch space in backward
//! - `Activation`: in-place forward and backward, gradient from the output
//! - `Dropout`: auxiliary hidden return, random stream in forward
//! - `ElementWiseSum`: variadic arguments, backward needs no forward tensors

mod common;

pub mod activation;
pub mod dropout;
pub mod elementwise_sum;
pub mod fully_connected;

pub use activation::{ActType, ActivationProp};
pub use dropout::{DropoutParam, DropoutProp};
pub use elementwise_sum::ElementWiseSumProp;
pub use fully_connected::{FullyConnectedParam, FullyConnectedProp};

use tg_operator::{OperatorRegistry, Result};

/// Register an unconfigured prototype of every reference kind.
pub fn register_builtins(registry: &mut OperatorRegistry) -> Result<()> {
    registry.register(Box::new(FullyConnectedProp::default()))?;
    registry.register(Box::new(ActivationProp::default()))?;
    registry.register(Box::new(DropoutProp::default()))?;
    registry.register(Box::new(ElementWiseSumProp::default()))?;
    Ok(())
}

/// A registry holding only the reference kinds.
pub fn builtin_registry() -> Result<OperatorRegistry> {
    let mut registry = OperatorRegistry::new();
    register_builtins(&mut registry)?;
    Ok(registry)
}
