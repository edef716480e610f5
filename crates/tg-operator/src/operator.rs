use std::fmt::Debug;

use tg_tensor::Tensor;

use crate::context::OpContext;
use crate::error::{OpError, Result};
use crate::shape_infer::check_arity;
use crate::write_mode::WriteMode;

/// A device-bound compute unit for one graph node.
///
/// Operators read and write only the buffers they are handed; the caller
/// allocates every buffer from the shapes produced by
/// `OperatorProperty::infer_shape`. State kept on `self` survives from a
/// `forward` to the later `backward` on the same instance. Calls on one
/// instance are serialized by the caller.
pub trait Operator: Send + Debug {
    /// Compute `out_data` from `in_data`.
    ///
    /// `req` has one entry per output and only contains `WriteTo` or
    /// `WriteInplace`.
    fn forward(
        &mut self,
        ctx: &OpContext,
        in_data: &[Tensor],
        req: &[WriteMode],
        out_data: &[Tensor],
    ) -> Result<()>;

    /// Compute `in_grad` from `out_grad`.
    ///
    /// `out_grad` holds one gradient per visible return; `out_data` holds
    /// every return, including auxiliary state written by `forward`. `req`
    /// has one entry per input gradient and may use any write mode.
    fn backward(
        &mut self,
        ctx: &OpContext,
        out_grad: &[Tensor],
        in_data: &[Tensor],
        out_data: &[Tensor],
        req: &[WriteMode],
        in_grad: &[Tensor],
    ) -> Result<()>;
}

/// Validate the argument lists of a `forward` call.
pub fn check_forward_args(
    op: &str,
    num_args: usize,
    num_returns: usize,
    in_data: &[Tensor],
    req: &[WriteMode],
    out_data: &[Tensor],
) -> Result<()> {
    check_arity(op, "input", num_args, in_data.len())?;
    check_arity(op, "output", num_returns, out_data.len())?;
    check_arity(op, "write mode", num_returns, req.len())?;
    if let Some((slot, &mode)) = req.iter().enumerate().find(|(_, m)| !m.is_forward_valid()) {
        return Err(OpError::InvalidWriteMode {
            op: op.to_string(),
            pass: "forward",
            slot,
            mode,
        });
    }
    Ok(())
}

/// Validate the argument lists of a `backward` call.
pub fn check_backward_args(
    op: &str,
    num_args: usize,
    num_returns: usize,
    num_visible_returns: usize,
    lists: BackwardArgs<'_>,
) -> Result<()> {
    check_arity(op, "output gradient", num_visible_returns, lists.out_grad.len())?;
    check_arity(op, "input", num_args, lists.in_data.len())?;
    check_arity(op, "output", num_returns, lists.out_data.len())?;
    check_arity(op, "write mode", num_args, lists.req.len())?;
    check_arity(op, "input gradient", num_args, lists.in_grad.len())
}

/// The argument lists of one `backward` call, grouped for validation.
#[derive(Debug, Clone, Copy)]
pub struct BackwardArgs<'a> {
    pub out_grad: &'a [Tensor],
    pub in_data: &'a [Tensor],
    pub out_data: &'a [Tensor],
    pub req: &'a [WriteMode],
    pub in_grad: &'a [Tensor],
}

#[cfg(test)]
mod tests {
    use super::*;
    use tg_tensor::Shape;

    fn t() -> Tensor {
        Tensor::new(vec![0.0], Shape::from([1]))
    }

    #[test]
    fn test_forward_rejects_accumulate() {
        let err = check_forward_args("op", 1, 1, &[t()], &[WriteMode::AddTo], &[t()]).unwrap_err();
        assert!(matches!(
            err,
            OpError::InvalidWriteMode { pass: "forward", slot: 0, mode: WriteMode::AddTo, .. }
        ));
        assert!(check_forward_args("op", 1, 1, &[t()], &[WriteMode::Null], &[t()]).is_err());
        assert!(check_forward_args("op", 1, 1, &[t()], &[WriteMode::WriteInplace], &[t()]).is_ok());
    }

    #[test]
    fn test_forward_arity() {
        let err = check_forward_args("op", 2, 1, &[t()], &[WriteMode::WriteTo], &[t()]).unwrap_err();
        assert!(matches!(
            err,
            OpError::ArityMismatch { ref role, expected: 2, got: 1, .. } if role == "input"
        ));
        let err = check_forward_args("op", 1, 1, &[t()], &[], &[t()]).unwrap_err();
        assert!(matches!(err, OpError::ArityMismatch { ref role, .. } if role == "write mode"));
    }

    #[test]
    fn test_backward_arity_uses_visible_returns() {
        let (g, x, y, z) = ([t()], [t()], [t(), t()], [t()]);
        let ok = BackwardArgs {
            out_grad: &g,
            in_data: &x,
            out_data: &y,
            req: &[WriteMode::AddTo],
            in_grad: &z,
        };
        assert!(check_backward_args("dropout", 1, 2, 1, ok).is_ok());

        let two_grads = [t(), t()];
        let bad = BackwardArgs {
            out_grad: &two_grads,
            ..ok
        };
        assert!(check_backward_args("dropout", 1, 2, 1, bad).is_err());
    }
}
