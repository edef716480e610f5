use std::fmt;
use std::str::FromStr;

use tg_operator::shape_infer::{all_known, assign_shape, check_arity, prepare_outputs};
use tg_operator::{
    assign, check_backward_args, check_forward_args, param, BackwardArgs, InplaceOption, OpContext,
    OpError, Operator, OperatorProperty, Result, WriteMode,
};
use tg_tensor::{ComputeBackend, CpuBackend, Device, Shape, Tensor};

use crate::common::{require_cpu, KernelResult};

pub const TYPE_NAME: &str = "Activation";

/// Supported element-wise non-linearities.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActType {
    Relu,
    Sigmoid,
    Tanh,
}

impl FromStr for ActType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "relu" => Ok(ActType::Relu),
            "sigmoid" => Ok(ActType::Sigmoid),
            "tanh" => Ok(ActType::Tanh),
            other => Err(format!("unknown activation '{}'", other)),
        }
    }
}

impl fmt::Display for ActType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActType::Relu => write!(f, "relu"),
            ActType::Sigmoid => write!(f, "sigmoid"),
            ActType::Tanh => write!(f, "tanh"),
        }
    }
}

/// Element-wise activation. The gradient is computed from the output alone,
/// so the input can be released (or overwritten) after `forward`.
#[derive(Debug, Clone, Default)]
pub struct ActivationProp {
    act_type: Option<ActType>,
}

impl ActivationProp {
    pub fn new(act_type: ActType) -> Self {
        Self {
            act_type: Some(act_type),
        }
    }

    fn act_type(&self) -> Result<ActType> {
        param::require(TYPE_NAME, "act_type", self.act_type)
    }
}

impl OperatorProperty for ActivationProp {
    fn set_param(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "act_type" => self.act_type = Some(param::parse_enum(TYPE_NAME, key, value)?),
            _ => return Err(param::unknown_param(TYPE_NAME, key)),
        }
        Ok(())
    }

    fn infer_shape(&self, in_shape: &mut [Shape], out_shape: &mut Vec<Shape>) -> Result<bool> {
        self.act_type()?;
        check_arity(TYPE_NAME, "argument", 1, in_shape.len())?;
        prepare_outputs(TYPE_NAME, out_shape, 1)?;

        let merged = in_shape[0]
            .unify(&out_shape[0])
            .ok_or_else(|| OpError::ShapeInconsistency {
                op: TYPE_NAME.to_string(),
                role: "return".to_string(),
                name: "output".to_string(),
                expected: in_shape[0].clone(),
                got: out_shape[0].clone(),
            })?;
        assign_shape(TYPE_NAME, "argument", "data", &mut in_shape[0], &merged)?;
        assign_shape(TYPE_NAME, "return", "output", &mut out_shape[0], &merged)?;
        Ok(all_known(in_shape) && all_known(out_shape))
    }

    fn copy(&self) -> Box<dyn OperatorProperty> {
        Box::new(self.clone())
    }

    fn create_operator(&self, device: Device) -> Result<Box<dyn Operator>> {
        require_cpu(TYPE_NAME, device)?;
        Ok(Box::new(ActivationOp {
            act_type: self.act_type()?,
            backend: CpuBackend::new(),
        }))
    }

    fn type_string(&self) -> &str {
        TYPE_NAME
    }

    fn declare_backward_dependency(
        &self,
        out_grad: &[usize],
        _in_data: &[usize],
        out_data: &[usize],
    ) -> Vec<usize> {
        vec![out_grad[0], out_data[0]]
    }

    fn forward_inplace_option(&self, in_data: &[usize], out_data: &[usize]) -> Vec<InplaceOption> {
        vec![InplaceOption::new(out_data[0], in_data[0])]
    }

    fn backward_inplace_option(
        &self,
        out_grad: &[usize],
        _in_data: &[usize],
        _out_data: &[usize],
        in_grad: &[usize],
    ) -> Vec<InplaceOption> {
        vec![InplaceOption::new(in_grad[0], out_grad[0])]
    }
}

#[derive(Debug)]
pub struct ActivationOp {
    act_type: ActType,
    backend: CpuBackend,
}

impl Operator for ActivationOp {
    fn forward(
        &mut self,
        _ctx: &OpContext,
        in_data: &[Tensor],
        req: &[WriteMode],
        out_data: &[Tensor],
    ) -> Result<()> {
        check_forward_args(TYPE_NAME, 1, 1, in_data, req, out_data)?;
        let x = in_data[0].to_vec()?;
        let y = match self.act_type {
            ActType::Relu => self.backend.relu(&x),
            ActType::Sigmoid => self.backend.sigmoid(&x),
            ActType::Tanh => self.backend.tanh(&x),
        }
        .in_op(TYPE_NAME)?;
        assign(&out_data[0], req[0], &y)
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
        check_backward_args(TYPE_NAME, 1, 1, 1, args)?;
        let y = out_data[0].to_vec()?;
        let g = out_grad[0].to_vec()?;
        let dx = match self.act_type {
            ActType::Relu => self.backend.relu_grad(&y, &g),
            ActType::Sigmoid => self.backend.sigmoid_grad(&y, &g),
            ActType::Tanh => self.backend.tanh_grad(&y, &g),
        }
        .in_op(TYPE_NAME)?;
        assign(&in_grad[0], req[0], &dx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_act_type_parsing() {
        assert_eq!("tanh".parse::<ActType>().unwrap(), ActType::Tanh);
        assert!("gelu".parse::<ActType>().is_err());
        assert_eq!(ActType::Sigmoid.to_string(), "sigmoid");
    }

    #[test]
    fn test_shape_flows_both_ways() {
        let p = ActivationProp::new(ActType::Relu);
        let mut in_shape = vec![Shape::unknown()];
        let mut out_shape = vec![Shape::from([3, 2])];
        assert!(p.infer_shape(&mut in_shape, &mut out_shape).unwrap());
        assert_eq!(in_shape[0], Shape::from([3, 2]));

        let mut in_shape = vec![Shape::from([3, 0])];
        let mut out_shape = vec![Shape::from([0, 2])];
        assert!(p.infer_shape(&mut in_shape, &mut out_shape).unwrap());
        assert_eq!(in_shape[0], Shape::from([3, 2]));
        assert_eq!(out_shape[0], Shape::from([3, 2]));
    }

    #[test]
    fn test_shape_conflict() {
        let p = ActivationProp::new(ActType::Relu);
        let mut in_shape = vec![Shape::from([3, 2])];
        let mut out_shape = vec![Shape::from([2, 3])];
        assert!(matches!(
            p.infer_shape(&mut in_shape, &mut out_shape),
            Err(OpError::ShapeInconsistency { .. })
        ));
    }

    #[test]
    fn test_declarations() {
        let p = ActivationProp::new(ActType::Sigmoid);
        assert_eq!(p.declare_backward_dependency(&[0], &[1], &[2]), vec![0, 2]);
        assert_eq!(p.forward_inplace_option(&[0], &[1]), vec![InplaceOption::new(1, 0)]);
        assert_eq!(
            p.backward_inplace_option(&[0], &[1], &[2], &[3]),
            vec![InplaceOption::new(3, 0)]
        );
    }

    #[test]
    fn test_inplace_forward_reads_before_writing() {
        let p = ActivationProp::new(ActType::Relu);
        let mut op = p.create_operator(Device::cpu()).unwrap();
        let x = Tensor::new(vec![-1.0, 2.0, -3.0], Shape::from([3]));
        let out = x.clone();
        let ctx = OpContext::new(false, Device::cpu());
        op.forward(&ctx, &[x.clone()], &[WriteMode::WriteInplace], &[out])
            .unwrap();
        assert_eq!(x.to_vec().unwrap(), vec![0.0, 2.0, 0.0]);
    }

    #[test]
    fn test_tanh_backward_accumulates() {
        let p = ActivationProp::new(ActType::Tanh);
        let mut op = p.create_operator(Device::cpu()).unwrap();
        let ctx = OpContext::new(true, Device::cpu());
        let x = Tensor::new(vec![0.0, 1.0], Shape::from([2]));
        let y = Tensor::zeros(Shape::from([2])).unwrap();
        op.forward(&ctx, &[x.clone()], &[WriteMode::WriteTo], &[y.clone()])
            .unwrap();

        let g = Tensor::new(vec![1.0, 1.0], Shape::from([2]));
        let dx = Tensor::new(vec![10.0, 10.0], Shape::from([2]));
        op.backward(&ctx, &[g], &[x], &[y.clone()], &[WriteMode::AddTo], &[dx.clone()])
            .unwrap();

        let yv = y.to_vec().unwrap();
        let dxv = dx.to_vec().unwrap();
        assert_abs_diff_eq!(dxv[0], 11.0, epsilon = 1e-6);
        assert_abs_diff_eq!(dxv[1], 10.0 + (1.0 - yv[1] * yv[1]), epsilon = 1e-6);
    }

    #[test]
    fn test_missing_act_type() {
        let p = ActivationProp::default();
        assert!(matches!(
            p.infer_shape(&mut [Shape::from([2])], &mut Vec::new()),
            Err(OpError::MissingParam { .. })
        ));
    }
}
