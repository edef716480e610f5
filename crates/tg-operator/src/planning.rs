//! Validated views of a property's memory-planning declarations.
//!
//! An executor reads these once per graph node, before any operator
//! exists, to decide which forward tensors to free early and which buffers
//! to share.

use std::collections::HashSet;
use std::ops::Range;

use log::debug;

use crate::error::{OpError, Result};
use crate::property::{InplaceOption, OperatorProperty};

/// Contiguous index layout for one node's backward pass:
/// `in_data`, then `out_grad`, then `out_data`, then `in_grad`.
///
/// `OperatorProperty::backward_inputs` flattens values in the same order,
/// so an index from `backward_dependency` addresses the same slot there.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackwardIndexSpace {
    pub out_grad: Vec<usize>,
    pub in_data: Vec<usize>,
    pub out_data: Vec<usize>,
    pub in_grad: Vec<usize>,
}

impl BackwardIndexSpace {
    pub fn new(num_args: usize, num_returns: usize, num_visible_returns: usize) -> Self {
        let mut next = 0;
        let mut take = |n: usize| {
            let r: Range<usize> = next..next + n;
            next += n;
            r.collect::<Vec<_>>()
        };
        let in_data = take(num_args);
        let out_grad = take(num_visible_returns);
        let out_data = take(num_returns);
        let in_grad = take(num_args);
        Self {
            out_grad,
            in_data,
            out_data,
            in_grad,
        }
    }

    pub fn for_property(prop: &dyn OperatorProperty) -> Self {
        Self::new(
            prop.list_arguments().len(),
            prop.num_returns(),
            prop.num_visible_returns(),
        )
    }

    /// Size of the part of the space `backward` may read.
    pub fn readable_len(&self) -> usize {
        self.out_grad.len() + self.in_data.len() + self.out_data.len()
    }
}

/// The declared backward dependency of `prop`, range-checked.
pub fn backward_dependency(prop: &dyn OperatorProperty) -> Result<Vec<usize>> {
    let space = BackwardIndexSpace::for_property(prop);
    let deps = prop.declare_backward_dependency(&space.out_grad, &space.in_data, &space.out_data);
    let len = space.readable_len();
    if let Some(&index) = deps.iter().find(|&&i| i >= len) {
        return Err(OpError::InvalidDependency {
            op: prop.type_string().to_string(),
            index,
            len,
        });
    }
    debug!(
        "{}: backward keeps {} of {} forward/gradient slots",
        prop.type_string(),
        deps.iter().collect::<HashSet<_>>().len(),
        len
    );
    Ok(deps)
}

fn invalid(prop: &dyn OperatorProperty, opt: InplaceOption, reason: &str) -> OpError {
    OpError::InvalidInplace {
        op: prop.type_string().to_string(),
        output: opt.output,
        input: opt.input,
        reason: reason.to_string(),
    }
}

/// Reject pairs that reuse one output or one input twice.
fn check_unique(prop: &dyn OperatorProperty, options: &[InplaceOption]) -> Result<()> {
    let mut outputs = HashSet::new();
    let mut inputs = HashSet::new();
    for &opt in options {
        if !outputs.insert(opt.output) {
            return Err(invalid(prop, opt, "output is already aliased"));
        }
        if !inputs.insert(opt.input) {
            return Err(invalid(prop, opt, "input is already shared with another output"));
        }
    }
    Ok(())
}

/// Forward in-place options over `in_data = 0..n_args`,
/// `out_data = n_args..n_args + n_returns`.
pub fn check_forward_inplace(prop: &dyn OperatorProperty) -> Result<Vec<InplaceOption>> {
    let num_args = prop.list_arguments().len();
    let in_data: Vec<usize> = (0..num_args).collect();
    let out_data: Vec<usize> = (num_args..num_args + prop.num_returns()).collect();

    let options = prop.forward_inplace_option(&in_data, &out_data);
    for &opt in &options {
        if !out_data.contains(&opt.output) {
            return Err(invalid(prop, opt, "output is not an out_data index"));
        }
        if !in_data.contains(&opt.input) {
            return Err(invalid(prop, opt, "input is not an in_data index"));
        }
    }
    check_unique(prop, &options)?;
    debug!("{}: {} forward in-place option(s)", prop.type_string(), options.len());
    Ok(options)
}

/// Backward in-place options over the layout of `BackwardIndexSpace`.
///
/// The aliased input must be something `backward` reads, so it also has to
/// be part of the declared backward dependency; a pruned tensor may already
/// be gone when the gradient pass runs.
pub fn check_backward_inplace(prop: &dyn OperatorProperty) -> Result<Vec<InplaceOption>> {
    let space = BackwardIndexSpace::for_property(prop);
    let deps: HashSet<usize> = backward_dependency(prop)?.into_iter().collect();

    let options = prop.backward_inplace_option(
        &space.out_grad,
        &space.in_data,
        &space.out_data,
        &space.in_grad,
    );
    for &opt in &options {
        if !space.in_grad.contains(&opt.output) {
            return Err(invalid(prop, opt, "output is not an in_grad index"));
        }
        if opt.input >= space.readable_len() {
            return Err(invalid(prop, opt, "input is not a backward input index"));
        }
        if !deps.contains(&opt.input) {
            return Err(invalid(prop, opt, "input is pruned from the backward dependency"));
        }
    }
    check_unique(prop, &options)?;
    debug!("{}: {} backward in-place option(s)", prop.type_string(), options.len());
    Ok(options)
}
