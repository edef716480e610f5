use log::trace;
use rand::Rng;
use tg_operator::shape_infer::{all_known, assign_shape, check_arity, prepare_outputs};
use tg_operator::{
    assign, check_backward_args, check_forward_args, param, BackwardArgs, InplaceOption, OpContext,
    OpError, Operator, OperatorProperty, ResourceRequest, Result, WriteMode,
};
use tg_tensor::{ComputeBackend, CpuBackend, Device, Shape, Tensor};

use crate::common::{require_cpu, KernelResult};

pub const TYPE_NAME: &str = "Dropout";

const OUTPUT: usize = 0;
const MASK: usize = 1;

/// Validated drop probability in `[0, 1)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DropoutParam {
    pub p: f32,
}

impl DropoutParam {
    pub fn new(p: f32) -> Result<Self> {
        if !(0.0..1.0).contains(&p) {
            return Err(param::invalid_value(TYPE_NAME, "p", p, "must be in [0, 1)"));
        }
        Ok(Self { p })
    }
}

impl Default for DropoutParam {
    fn default() -> Self {
        Self { p: 0.5 }
    }
}

/// Inverted dropout. Returns `[output, mask]` with only `output` visible;
/// the mask carries the kept/scaled pattern from `forward` to `backward`.
#[derive(Debug, Clone, Default)]
pub struct DropoutProp {
    param: DropoutParam,
}

impl DropoutProp {
    pub fn new(param: DropoutParam) -> Self {
        Self { param }
    }
}

impl OperatorProperty for DropoutProp {
    fn list_returns(&self) -> Vec<String> {
        vec!["output".to_string(), "mask".to_string()]
    }

    fn num_visible_returns(&self) -> usize {
        1
    }

    fn set_param(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "p" => self.param = DropoutParam::new(param::parse_f32(TYPE_NAME, key, value)?)?,
            _ => return Err(param::unknown_param(TYPE_NAME, key)),
        }
        Ok(())
    }

    fn infer_shape(&self, in_shape: &mut [Shape], out_shape: &mut Vec<Shape>) -> Result<bool> {
        check_arity(TYPE_NAME, "argument", 1, in_shape.len())?;
        prepare_outputs(TYPE_NAME, out_shape, 2)?;

        let mut merged = in_shape[0].clone();
        for (name, shape) in ["output", "mask"].iter().zip(out_shape.iter()) {
            merged = merged.unify(shape).ok_or_else(|| OpError::ShapeInconsistency {
                op: TYPE_NAME.to_string(),
                role: "return".to_string(),
                name: name.to_string(),
                expected: merged.clone(),
                got: shape.clone(),
            })?;
        }
        assign_shape(TYPE_NAME, "argument", "data", &mut in_shape[0], &merged)?;
        assign_shape(TYPE_NAME, "return", "output", &mut out_shape[OUTPUT], &merged)?;
        assign_shape(TYPE_NAME, "return", "mask", &mut out_shape[MASK], &merged)?;
        Ok(all_known(in_shape) && all_known(out_shape))
    }

    fn copy(&self) -> Box<dyn OperatorProperty> {
        Box::new(self.clone())
    }

    fn create_operator(&self, device: Device) -> Result<Box<dyn Operator>> {
        require_cpu(TYPE_NAME, device)?;
        Ok(Box::new(DropoutOp {
            param: self.param,
            backend: CpuBackend::new(),
        }))
    }

    fn type_string(&self) -> &str {
        TYPE_NAME
    }

    fn forward_resource(&self) -> Vec<ResourceRequest> {
        vec![ResourceRequest::random()]
    }

    fn declare_backward_dependency(
        &self,
        out_grad: &[usize],
        _in_data: &[usize],
        out_data: &[usize],
    ) -> Vec<usize> {
        vec![out_grad[OUTPUT], out_data[MASK]]
    }

    fn forward_inplace_option(&self, in_data: &[usize], out_data: &[usize]) -> Vec<InplaceOption> {
        vec![InplaceOption::new(out_data[OUTPUT], in_data[0])]
    }

    fn backward_inplace_option(
        &self,
        out_grad: &[usize],
        _in_data: &[usize],
        _out_data: &[usize],
        in_grad: &[usize],
    ) -> Vec<InplaceOption> {
        vec![InplaceOption::new(in_grad[0], out_grad[OUTPUT])]
    }
}

#[derive(Debug)]
pub struct DropoutOp {
    param: DropoutParam,
    backend: CpuBackend,
}

impl Operator for DropoutOp {
    fn forward(
        &mut self,
        ctx: &OpContext,
        in_data: &[Tensor],
        req: &[WriteMode],
        out_data: &[Tensor],
    ) -> Result<()> {
        check_forward_args(TYPE_NAME, 1, 2, in_data, req, out_data)?;
        let x = in_data[0].to_vec()?;
        let mask = if ctx.is_train && self.param.p > 0.0 {
            let keep = 1.0 / (1.0 - self.param.p);
            let mut rng = ctx.rng(TYPE_NAME, 0)?;
            (0..x.len())
                .map(|_| if rng.gen::<f32>() < self.param.p { 0.0 } else { keep })
                .collect::<Vec<f32>>()
        } else {
            vec![1.0; x.len()]
        };
        trace!(
            "{}: dropped {} of {} elements",
            TYPE_NAME,
            mask.iter().filter(|&&m| m == 0.0).count(),
            mask.len()
        );
        let y = self.backend.mul(&x, &mask).in_op(TYPE_NAME)?;
        assign(&out_data[OUTPUT], req[OUTPUT], &y)?;
        assign(&out_data[MASK], req[MASK], &mask)
    }

    fn backward(
        &mut self,
        _ctx: &OpContext,
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
        check_backward_args(TYPE_NAME, 1, 2, 1, args)?;
        let g = out_grad[OUTPUT].to_vec()?;
        let mask = out_data[MASK].to_vec()?;
        let dx = self.backend.mul(&g, &mask).in_op(TYPE_NAME)?;
        assign(&in_grad[0], req[0], &dx)
    }
}
