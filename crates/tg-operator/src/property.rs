use std::fmt::{self, Debug};

use tg_tensor::{Device, Shape};

use crate::error::{OpError, Result};
use crate::operator::Operator;
use crate::planning::BackwardIndexSpace;
use crate::resource::ResourceRequest;
use crate::shape_infer::check_arity;

/// Permission for the output slot `output` to share memory with the input
/// slot `input`. Both indices come from the index lists handed to the
/// declaring method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InplaceOption {
    pub output: usize,
    pub input: usize,
}

impl InplaceOption {
    pub fn new(output: usize, input: usize) -> Self {
        Self { output, input }
    }
}

impl fmt::Display for InplaceOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <- {}", self.output, self.input)
    }
}

/// Configuration and factory for one operator kind.
///
/// A property is obtained from an `OperatorRegistry`, configured through
/// `set_param`, asked to infer shapes, and finally asked to create one
/// `Operator` per device. Everything besides `infer_shape`, `copy`,
/// `create_operator` and `type_string` has a conservative default; kinds
/// override the declarations to let the executor save memory.
pub trait OperatorProperty: Send + Sync + Debug {
    /// Names of the input arguments, in slot order.
    fn list_arguments(&self) -> Vec<String> {
        vec!["data".to_string()]
    }

    /// Names of every return, visible ones first.
    fn list_returns(&self) -> Vec<String> {
        vec!["output".to_string()]
    }

    /// Number of returns, including auxiliary state for `backward`.
    fn num_returns(&self) -> usize {
        self.list_returns().len()
    }

    /// Number of returns exposed to the graph. The remaining
    /// `num_returns() - num_visible_returns()` are only seen by `backward`.
    fn num_visible_returns(&self) -> usize {
        self.num_returns()
    }

    /// Apply one string-keyed option.
    ///
    /// Unknown keys and unparsable values are rejected here; missing
    /// required keys are reported by `infer_shape` / `create_operator`.
    fn set_param(&mut self, key: &str, _value: &str) -> Result<()> {
        Err(OpError::UnknownParam {
            op: self.type_string().to_string(),
            key: key.to_string(),
        })
    }

    /// Fill unknown shapes and check known ones against the operator's rule.
    ///
    /// `in_shape` has one entry per argument; `out_shape` is either empty
    /// (it is then sized to `num_returns()`) or has one entry per return.
    /// Known dimensions are never overwritten.
    ///
    /// Returns `Ok(false)` when there is not yet enough information,
    /// `Ok(true)` once every shape is fully known, and
    /// `Err(OpError::ShapeInconsistency)` when known shapes contradict.
    fn infer_shape(&self, in_shape: &mut [Shape], out_shape: &mut Vec<Shape>) -> Result<bool>;

    /// An independent clone carrying the same configuration.
    fn copy(&self) -> Box<dyn OperatorProperty>;

    /// Instantiate a compute unit bound to `device`.
    fn create_operator(&self, device: Device) -> Result<Box<dyn Operator>>;

    /// Registry key of this kind.
    fn type_string(&self) -> &str;

    /// Resources needed by `forward`, in the order they appear in
    /// `OpContext::requested`.
    fn forward_resource(&self) -> Vec<ResourceRequest> {
        Vec::new()
    }

    /// Resources needed by `backward`, in the order they appear in
    /// `OpContext::requested`.
    fn backward_resource(&self) -> Vec<ResourceRequest> {
        Vec::new()
    }

    /// The subset of the given indices that `backward` actually reads.
    ///
    /// Every index not returned may be released right after `forward`. The
    /// default keeps everything.
    fn declare_backward_dependency(
        &self,
        out_grad: &[usize],
        in_data: &[usize],
        out_data: &[usize],
    ) -> Vec<usize> {
        let mut deps = Vec::with_capacity(out_grad.len() + in_data.len() + out_data.len());
        deps.extend_from_slice(out_grad);
        deps.extend_from_slice(in_data);
        deps.extend_from_slice(out_data);
        deps
    }

    /// Outputs of `forward` that may reuse an input's memory. Opt-in.
    fn forward_inplace_option(&self, _in_data: &[usize], _out_data: &[usize]) -> Vec<InplaceOption> {
        Vec::new()
    }

    /// Input gradients of `backward` that may reuse the memory of one of
    /// its inputs. Opt-in.
    fn backward_inplace_option(
        &self,
        _out_grad: &[usize],
        _in_data: &[usize],
        _out_data: &[usize],
        _in_grad: &[usize],
    ) -> Vec<InplaceOption> {
        Vec::new()
    }
}

impl<'a> dyn OperatorProperty + 'a {
    /// Select the values `backward` depends on.
    ///
    /// The three lists are laid out in one index space, `in_data` first,
    /// then `out_grad`, then `out_data` (the layout of `BackwardIndexSpace`).
    /// Each role keeps its own elements: an `out_grad` index always resolves
    /// to an `out_grad` value. The result follows the order of
    /// `declare_backward_dependency`.
    ///
    /// Lists whose lengths disagree with the signature are rejected with
    /// `OpError::ArityMismatch` before any declaration is consulted.
    pub fn backward_inputs<T: Clone>(
        &self,
        in_data: &[T],
        out_data: &[T],
        out_grad: &[T],
    ) -> Result<Vec<T>> {
        let op = self.type_string();
        check_arity(op, "argument", self.list_arguments().len(), in_data.len())?;
        check_arity(op, "output gradient", self.num_visible_returns(), out_grad.len())?;
        check_arity(op, "return", self.num_returns(), out_data.len())?;

        let space = BackwardIndexSpace::for_property(self);
        let total = space.readable_len();
        let all: Vec<&T> = in_data.iter().chain(out_grad).chain(out_data).collect();
        self.declare_backward_dependency(&space.out_grad, &space.in_data, &space.out_data)
            .into_iter()
            .map(|i| {
                all.get(i)
                    .map(|v| (*v).clone())
                    .ok_or_else(|| OpError::InvalidDependency {
                        op: op.to_string(),
                        index: i,
                        len: total,
                    })
            })
            .collect()
    }
}
