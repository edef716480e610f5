use tg_operator::shape_infer::{all_known, assign_shape, check_arity, prepare_outputs};
use tg_operator::{
    assign, check_backward_args, check_forward_args, param, BackwardArgs, InplaceOption, OpContext,
    OpError, Operator, OperatorProperty, Result, WriteMode,
};
use tg_tensor::{ComputeBackend, CpuBackend, Device, Shape, Tensor};

use crate::common::{require_cpu, KernelResult};

pub const TYPE_NAME: &str = "ElementWiseSum";

/// Sum of `num_args` tensors of one shape.
///
/// The gradient of every input is the output gradient itself, so no forward
/// tensor has to survive until `backward`.
#[derive(Debug, Clone, Default)]
pub struct ElementWiseSumProp {
    num_args: Option<usize>,
}

impl ElementWiseSumProp {
    pub fn new(num_args: usize) -> Result<Self> {
        if num_args == 0 {
            return Err(param::invalid_value(TYPE_NAME, "num_args", num_args, "must be positive"));
        }
        Ok(Self {
            num_args: Some(num_args),
        })
    }

    fn num_args(&self) -> Result<usize> {
        param::require(TYPE_NAME, "num_args", self.num_args)
    }
}

impl OperatorProperty for ElementWiseSumProp {
    fn list_arguments(&self) -> Vec<String> {
        (0..self.num_args.unwrap_or(0))
            .map(|i| format!("arg{}", i))
            .collect()
    }

    fn set_param(&mut self, key: &str, value: &str) -> Result<()> {
        match key {
            "num_args" => *self = Self::new(param::parse_usize(TYPE_NAME, key, value)?)?,
            _ => return Err(param::unknown_param(TYPE_NAME, key)),
        }
        Ok(())
    }

    fn infer_shape(&self, in_shape: &mut [Shape], out_shape: &mut Vec<Shape>) -> Result<bool> {
        let n = self.num_args()?;
        check_arity(TYPE_NAME, "argument", n, in_shape.len())?;
        prepare_outputs(TYPE_NAME, out_shape, 1)?;

        let mut merged = out_shape[0].clone();
        for (i, shape) in in_shape.iter().enumerate() {
            merged = merged.unify(shape).ok_or_else(|| OpError::ShapeInconsistency {
                op: TYPE_NAME.to_string(),
                role: "argument".to_string(),
                name: format!("arg{}", i),
                expected: merged.clone(),
                got: shape.clone(),
            })?;
        }
        for (i, shape) in in_shape.iter_mut().enumerate() {
            assign_shape(TYPE_NAME, "argument", &format!("arg{}", i), shape, &merged)?;
        }
        assign_shape(TYPE_NAME, "return", "output", &mut out_shape[0], &merged)?;
        Ok(all_known(in_shape) && all_known(out_shape))
    }

    fn copy(&self) -> Box<dyn OperatorProperty> {
        Box::new(self.clone())
    }

    fn create_operator(&self, device: Device) -> Result<Box<dyn Operator>> {
        require_cpu(TYPE_NAME, device)?;
        Ok(Box::new(ElementWiseSumOp {
            num_args: self.num_args()?,
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
        _out_data: &[usize],
    ) -> Vec<usize> {
        vec![out_grad[0]]
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
pub struct ElementWiseSumOp {
    num_args: usize,
    backend: CpuBackend,
}

impl Operator for ElementWiseSumOp {
    fn forward(
        &mut self,
        _ctx: &OpContext,
        in_data: &[Tensor],
        req: &[WriteMode],
        out_data: &[Tensor],
    ) -> Result<()> {
        check_forward_args(TYPE_NAME, self.num_args, 1, in_data, req, out_data)?;
        let mut acc = in_data[0].to_vec()?;
        for input in &in_data[1..] {
            acc = self.backend.add(&acc, &input.to_vec()?).in_op(TYPE_NAME)?;
        }
        assign(&out_data[0], req[0], &acc)
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
        check_backward_args(TYPE_NAME, self.num_args, 1, 1, args)?;
        let g = out_grad[0].to_vec()?;
        for (grad, &mode) in in_grad.iter().zip(req) {
            assign(grad, mode, &g)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_arguments_follow_num_args() {
        let p = ElementWiseSumProp::new(3).unwrap();
        assert_eq!(p.list_arguments(), vec!["arg0", "arg1", "arg2"]);
        assert!(ElementWiseSumProp::new(0).is_err());
        assert!(ElementWiseSumProp::default().list_arguments().is_empty());
    }

    #[test]
    fn test_any_known_shape_propagates() {
        let p = ElementWiseSumProp::new(3).unwrap();
        let mut in_shape = vec![Shape::unknown(), Shape::from([2, 0]), Shape::from([0, 7])];
        let mut out_shape = Vec::new();
        assert!(p.infer_shape(&mut in_shape, &mut out_shape).unwrap());
        for s in in_shape.iter().chain(out_shape.iter()) {
            assert_eq!(*s, Shape::from([2, 7]));
        }
    }

    #[test]
    fn test_conflicting_argument_is_named() {
        let p = ElementWiseSumProp::new(2).unwrap();
        let mut in_shape = vec![Shape::from([2]), Shape::from([3])];
        let err = p.infer_shape(&mut in_shape, &mut Vec::new()).unwrap_err();
        assert!(matches!(err, OpError::ShapeInconsistency { ref name, .. } if name == "arg1"));
    }

    #[test]
    fn test_backward_needs_only_the_gradient() {
        let p = ElementWiseSumProp::new(2).unwrap();
        assert_eq!(p.declare_backward_dependency(&[0], &[1, 2], &[3]), vec![0]);
    }

    #[test]
    fn test_forward_backward() {
        let p = ElementWiseSumProp::new(2).unwrap();
        let mut op = p.create_operator(Device::cpu()).unwrap();
        let ctx = OpContext::new(true, Device::cpu());
        let a = Tensor::new(vec![1.0, 2.0], Shape::from([2]));
        let b = Tensor::new(vec![10.0, 20.0], Shape::from([2]));
        // Output written over the first input's memory.
        op.forward(&ctx, &[a.clone(), b.clone()], &[WriteMode::WriteInplace], &[a.clone()])
            .unwrap();
        assert_eq!(a.to_vec().unwrap(), vec![11.0, 22.0]);

        let g = Tensor::new(vec![1.0, -1.0], Shape::from([2]));
        let ga = g.clone();
        let gb = Tensor::new(vec![5.0, 5.0], Shape::from([2]));
        op.backward(
            &ctx,
            &[g.clone()],
            &[a.clone(), b],
            &[a],
            &[WriteMode::WriteInplace, WriteMode::AddTo],
            &[ga.clone(), gb.clone()],
        )
        .unwrap();
        assert_eq!(ga.to_vec().unwrap(), vec![1.0, -1.0]);
        assert_eq!(gb.to_vec().unwrap(), vec![6.0, 4.0]);
    }
}
