use log::trace;
use tg_operator::shape_infer::{all_known, assign_shape, check_arity, check_rank, prepare_outputs};
use tg_operator::{
    assign, check_backward_args, check_forward_args, param, BackwardArgs, OpContext, Operator,
    OperatorProperty, ResourceRequest, Result, WriteMode,
};
use tg_tensor::{ComputeBackend, CpuBackend, Device, Shape, Tensor};

use crate::common::{require_cpu, KernelResult};

pub const TYPE_NAME: &str = "FullyConnected";

const DATA: usize = 0;
const WEIGHT: usize = 1;
const BIAS: usize = 2;

/// Validated configuration of a fully-connected layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FullyConnectedParam {
    pub num_hidden: usize,
    pub no_bias: bool,
}

impl FullyConnectedParam {
    pub fn new(num_hidden: usize, no_bias: bool) -> Result<Self> {
        if num_hidden == 0 {
            return Err(param::invalid_value(TYPE_NAME, "num_hidden", num_hidden, "must be positive"));
        }
        Ok(Self { num_hidden, no_bias })
    }
}

/// `output = data @ weight (+ bias)`.
///
/// Shapes: data `(n, k)`, weight `(k, num_hidden)`, bias `(num_hidden)`,
/// output `(n, num_hidden)`.
#[derive(Debug, Clone, Default)]
pub struct FullyConnectedProp {
    num_hidden: Option<usize>,
    no_bias: bool,
}

impl FullyConnectedProp {
    pub fn new(param: FullyConnectedParam) -> Self {
        Self {
            num_hidden: Some(param.num_hidden),
            no_bias: param.no_bias,
        }
    }

    fn param(&self) -> Result<FullyConnectedParam> {
        let num_hidden = param::require(TYPE_NAME, "num_hidden", self.num_hidden)?;
        FullyConnectedParam::new(num_hidden, self.no_bias)
    }
}

fn dim_or_unknown(shape: &Shape, i: usize) -> usize {
    if shape.is_unknown() {
        0
    } else {
        shape.dim(i)
    }
}

fn first_known(a: usize, b: usize) -> usize {
    if a != 0 {
        a
    } else {
        b
    }
}

impl OperatorProperty for FullyConnectedProp {
    fn list_arguments(&self) -> Vec<String> {
        let mut args = vec!["data".to_string(), "weight".to_string()];
        if !self.no_bias {
            args.push("bias".to_string());
        }
        args
    }

    fn set_param(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "num_hidden" => {
                let n = param::parse_usize(TYPE_NAME, key, value)?;
                self.num_hidden = Some(FullyConnectedParam::new(n, self.no_bias)?.num_hidden);
            }
            "no_bias" => self.no_bias = param::parse_bool(TYPE_NAME, key, value)?,
            _ => return Err(param::unknown_param(TYPE_NAME, key)),
        }
        Ok(())
    }

    fn infer_shape(&self, in_shape: &mut [Shape], out_shape: &mut Vec<Shape>) -> Result<bool> {
        let p = self.param()?;
        let args = self.list_arguments();
        check_arity(TYPE_NAME, "argument", args.len(), in_shape.len())?;
        prepare_outputs(TYPE_NAME, out_shape, 1)?;

        check_rank(TYPE_NAME, "argument", "data", &in_shape[DATA], 2)?;
        check_rank(TYPE_NAME, "argument", "weight", &in_shape[WEIGHT], 2)?;
        check_rank(TYPE_NAME, "return", "output", &out_shape[0], 2)?;

        let batch = first_known(
            dim_or_unknown(&in_shape[DATA], 0),
            dim_or_unknown(&out_shape[0], 0),
        );
        let input_dim = first_known(
            dim_or_unknown(&in_shape[DATA], 1),
            dim_or_unknown(&in_shape[WEIGHT], 0),
        );
        let hidden = p.num_hidden;

        assign_shape(TYPE_NAME, "argument", "data", &mut in_shape[DATA], &Shape::from([batch, input_dim]))?;
        assign_shape(TYPE_NAME, "argument", "weight", &mut in_shape[WEIGHT], &Shape::from([input_dim, hidden]))?;
        if !p.no_bias {
            assign_shape(TYPE_NAME, "argument", "bias", &mut in_shape[BIAS], &Shape::from([hidden]))?;
        }
        assign_shape(TYPE_NAME, "return", "output", &mut out_shape[0], &Shape::from([batch, hidden]))?;

        Ok(all_known(in_shape) && all_known(out_shape))
    }

    fn copy(&self) -> Box<dyn OperatorProperty> {
        Box::new(self.clone())
    }

    fn create_operator(&self, device: Device) -> Result<Box<dyn Operator>> {
        require_cpu(TYPE_NAME, device)?;
        Ok(Box::new(FullyConnectedOp {
            param: self.param()?,
            backend: CpuBackend::new(),
        }))
    }

    fn type_string(&self) -> &str {
        TYPE_NAME
    }

    fn backward_resource(&self) -> Vec<ResourceRequest> {
        vec![ResourceRequest::temp_space()]
    }

    fn declare_backward_dependency(
        &self,
        out_grad: &[usize],
        in_data: &[usize],
        _out_data: &[usize],
    ) -> Vec<usize> {
        vec![out_grad[0], in_data[DATA], in_data[WEIGHT]]
    }
}

#[derive(Debug)]
pub struct FullyConnectedOp {
    param: FullyConnectedParam,
    backend: CpuBackend,
}

impl FullyConnectedOp {
    fn num_args(&self) -> usize {
        if self.param.no_bias {
            2
        } else {
            3
        }
    }
}

impl Operator for FullyConnectedOp {
    fn forward(
        &mut self,
        _ctx: &OpContext,
        in_data: &[Tensor],
        req: &[WriteMode],
        out_data: &[Tensor],
    ) -> Result<()> {
        check_forward_args(TYPE_NAME, self.num_args(), 1, in_data, req, out_data)?;
        let (n, k) = in_data[DATA].shape().flat_2d();
        let h = self.param.num_hidden;

        let mut out = in_data[DATA]
            .matmul(&in_data[WEIGHT], &self.backend)
            .in_op(TYPE_NAME)?
            .to_vec()?;
        if !self.param.no_bias {
            let bias = in_data[BIAS].to_vec()?;
            for row in out.chunks_mut(h) {
                for (o, b) in row.iter_mut().zip(&bias) {
                    *o += b;
                }
            }
        }
        trace!(
            "{}: forward [{}x{}] @ [{}x{}] on {}",
            TYPE_NAME,
            n,
            k,
            k,
            h,
            self.backend.name()
        );
        assign(&out_data[0], req[0], &out)
    }

    fn backward(
        &mut self,
        ctx: &OpContext,
        out_grad: &[Tensor],
        in_data: &[Tensor],
        out_data: &[Tensor],
        req: &[WriteMode],
        in_grad: &[Tensor],
    ) -> Result<()> {
        let args = BackwardArgs {
            out_grad,
            in_data,
            out_data,
            req,
            in_grad,
        };
        check_backward_args(TYPE_NAME, self.num_args(), 1, 1, args)?;
        let (n, k) = in_data[DATA].shape().flat_2d();
        let h = self.param.num_hidden;

        let grad = out_grad[0].to_vec()?;
        let data = in_data[DATA].to_vec()?;
        let weight = in_data[WEIGHT].to_vec()?;
        let mut scratch = ctx.workspace(TYPE_NAME, 0, (k * h).max(k * n))?;

        // d(data) = grad @ weight^T
        self.backend
            .transpose_into(&weight, k, h, &mut scratch[..k * h])
            .in_op(TYPE_NAME)?;
        let grad_data = self
            .backend
            .matmul(&grad, &scratch[..h * k], n, h, k)
            .in_op(TYPE_NAME)?;

        // d(weight) = data^T @ grad
        self.backend
            .transpose_into(&data, n, k, &mut scratch[..k * n])
            .in_op(TYPE_NAME)?;
        let grad_weight = self
            .backend
            .matmul(&scratch[..k * n], &grad, k, n, h)
            .in_op(TYPE_NAME)?;
        drop(scratch);

        assign(&in_grad[DATA], req[DATA], &grad_data)?;
        assign(&in_grad[WEIGHT], req[WEIGHT], &grad_weight)?;
        if !self.param.no_bias {
            let grad_bias = self.backend.sum_rows(&grad, n, h).in_op(TYPE_NAME)?;
            assign(&in_grad[BIAS], req[BIAS], &grad_bias)?;
        }
        Ok(())
    }
}
