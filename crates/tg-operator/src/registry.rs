use std::collections::HashMap;

use log::debug;

use crate::error::{OpError, Result};
use crate::property::OperatorProperty;

/// Type-name keyed table of operator prototypes.
///
/// The registry is an ordinary value: whoever builds graphs owns one,
/// fills it, and drops it when done.
#[derive(Debug, Default)]
pub struct OperatorRegistry {
    prototypes: HashMap<String, Box<dyn OperatorProperty>>,
}

impl OperatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an unconfigured prototype under its `type_string()`.
    pub fn register(&mut self, prototype: Box<dyn OperatorProperty>) -> Result<()> {
        let name = prototype.type_string().to_string();
        if self.prototypes.contains_key(&name) {
            return Err(OpError::DuplicateOperator(name));
        }
        debug!("registry: registered '{}'", name);
        self.prototypes.insert(name, prototype);
        Ok(())
    }

    /// A fresh, unconfigured property for `type_name`.
    pub fn create(&self, type_name: &str) -> Result<Box<dyn OperatorProperty>> {
        let prototype = self
            .prototypes
            .get(type_name)
            .ok_or_else(|| OpError::RegistryMiss(type_name.to_string()))?;
        debug!("registry: created '{}'", type_name);
        Ok(prototype.copy())
    }

    /// Create and configure a property from key/value strings, as read from
    /// a declarative graph description.
    pub fn create_with_params(
        &self,
        type_name: &str,
        params: &[(&str, &str)],
    ) -> Result<Box<dyn OperatorProperty>> {
        let mut prop = self.create(type_name)?;
        for (key, value) in params {
            prop.set_param(key, value)?;
        }
        Ok(prop)
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.prototypes.contains_key(type_name)
    }

    /// Registered type names, sorted.
    pub fn type_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.prototypes.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub fn len(&self) -> usize {
        self.prototypes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prototypes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::OpContext;
    use crate::operator::Operator;
    use crate::param;
    use crate::write_mode::WriteMode;
    use tg_tensor::{Device, Shape, Tensor};

    #[derive(Debug)]
    struct NoopOp;

    impl Operator for NoopOp {
        fn forward(&mut self, _: &OpContext, _: &[Tensor], _: &[WriteMode], _: &[Tensor]) -> Result<()> {
            Ok(())
        }

        fn backward(
            &mut self,
            _: &OpContext,
            _: &[Tensor],
            _: &[Tensor],
            _: &[Tensor],
            _: &[WriteMode],
            _: &[Tensor],
        ) -> Result<()> {
            Ok(())
        }
    }

    #[derive(Debug, Clone, Default)]
    struct Scale {
        factor: Option<f32>,
    }

    impl OperatorProperty for Scale {
        fn set_param(&mut self, key: &str, value: &str) -> Result<()> {
            match key {
                "factor" => self.factor = Some(param::parse_f32("scale", key, value)?),
                _ => return Err(param::unknown_param("scale", key)),
            }
            Ok(())
        }

        fn infer_shape(&self, _: &mut [Shape], _: &mut Vec<Shape>) -> Result<bool> {
            param::require("scale", "factor", self.factor)?;
            Ok(false)
        }

        fn copy(&self) -> Box<dyn OperatorProperty> {
            Box::new(self.clone())
        }

        fn create_operator(&self, _device: Device) -> Result<Box<dyn Operator>> {
            Ok(Box::new(NoopOp))
        }

        fn type_string(&self) -> &str {
            "scale"
        }
    }

    #[test]
    fn test_create_registered() {
        let _ = env_logger::builder().is_test(true).try_init();
        let mut reg = OperatorRegistry::new();
        reg.register(Box::new(Scale::default())).unwrap();
        assert!(reg.contains("scale"));
        assert_eq!(reg.type_names(), vec!["scale"]);
        assert_eq!(reg.create("scale").unwrap().type_string(), "scale");
    }

    #[test]
    fn test_registry_miss() {
        let reg = OperatorRegistry::new();
        assert!(reg.is_empty());
        let err = reg.create("nonexistent_kind").unwrap_err();
        assert!(matches!(err, OpError::RegistryMiss(ref name) if name == "nonexistent_kind"));
    }

    #[test]
    fn test_duplicate_registration() {
        let mut reg = OperatorRegistry::new();
        reg.register(Box::new(Scale::default())).unwrap();
        assert!(matches!(
            reg.register(Box::new(Scale::default())),
            Err(OpError::DuplicateOperator(_))
        ));
        assert_eq!(reg.len(), 1);
    }

    #[test]
    fn test_created_instances_are_unconfigured_and_independent() {
        let mut reg = OperatorRegistry::new();
        reg.register(Box::new(Scale::default())).unwrap();

        let configured = reg.create_with_params("scale", &[("factor", "2.5")]).unwrap();
        assert!(configured.infer_shape(&mut [], &mut Vec::new()).is_ok());

        let fresh = reg.create("scale").unwrap();
        assert!(matches!(
            fresh.infer_shape(&mut [], &mut Vec::new()),
            Err(OpError::MissingParam { .. })
        ));
    }

    #[test]
    fn test_create_with_bad_params() {
        let mut reg = OperatorRegistry::new();
        reg.register(Box::new(Scale::default())).unwrap();
        assert!(matches!(
            reg.create_with_params("scale", &[("bogus", "1")]),
            Err(OpError::UnknownParam { .. })
        ));
        assert!(matches!(
            reg.create_with_params("scale", &[("factor", "two")]),
            Err(OpError::Config { .. })
        ));
    }
}
