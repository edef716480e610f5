//! Building blocks for `OperatorProperty::infer_shape`.
//!
//! Inference only ever refines: an unknown dimension may become known, a
//! known dimension may only be confirmed. Anything else is reported as
//! `OpError::ShapeInconsistency` naming the offending slot.

use log::trace;
use tg_tensor::Shape;

use crate::error::{OpError, Result};

/// Check that `got` shapes were supplied for the `expected` names.
pub fn check_arity(op: &str, role: &str, expected: usize, got: usize) -> Result<()> {
    if expected != got {
        return Err(OpError::ArityMismatch {
            op: op.to_string(),
            role: role.to_string(),
            expected,
            got,
        });
    }
    Ok(())
}

/// Size an empty output list to `num_returns` unknown shapes, or check the
/// length of a list the caller already filled.
pub fn prepare_outputs(op: &str, out_shape: &mut Vec<Shape>, num_returns: usize) -> Result<()> {
    if out_shape.is_empty() {
        out_shape.resize(num_returns, Shape::unknown());
        return Ok(());
    }
    check_arity(op, "return", num_returns, out_shape.len())
}

/// Refine `slot` with what the operator's rule says it must be.
pub fn assign_shape(op: &str, role: &str, name: &str, slot: &mut Shape, expected: &Shape) -> Result<()> {
    match slot.unify(expected) {
        Some(merged) => {
            if merged != *slot {
                trace!("{}: {} '{}' refined {} -> {}", op, role, name, slot, merged);
                *slot = merged;
            }
            Ok(())
        }
        None => Err(OpError::ShapeInconsistency {
            op: op.to_string(),
            role: role.to_string(),
            name: name.to_string(),
            expected: expected.clone(),
            got: slot.clone(),
        }),
    }
}

/// Require a known rank for a slot, if anything is known about it.
pub fn check_rank(op: &str, role: &str, name: &str, slot: &Shape, rank: usize) -> Result<()> {
    if !slot.is_unknown() && slot.ndim() != rank {
        return Err(OpError::ShapeInconsistency {
            op: op.to_string(),
            role: role.to_string(),
            name: name.to_string(),
            expected: Shape::new(vec![0; rank]),
            got: slot.clone(),
        });
    }
    Ok(())
}

/// True once every shape is fully known.
pub fn all_known(shapes: &[Shape]) -> bool {
    shapes.iter().all(Shape::is_known)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_assign_fills_unknown() {
        let mut slot = Shape::unknown();
        assign_shape("fc", "argument", "weight", &mut slot, &Shape::from([8, 16])).unwrap();
        assert_eq!(slot, Shape::from([8, 16]));
    }

    #[test]
    fn test_assign_refines_partial() {
        let mut slot = Shape::from([4, 0]);
        assign_shape("fc", "return", "output", &mut slot, &Shape::from([0, 16])).unwrap();
        assert_eq!(slot, Shape::from([4, 16]));
    }

    #[test]
    fn test_assign_never_overwrites_known() {
        let mut slot = Shape::from([8, 15]);
        let err = assign_shape("fc", "argument", "weight", &mut slot, &Shape::from([8, 16]))
            .unwrap_err();
        match err {
            OpError::ShapeInconsistency { name, expected, got, .. } => {
                assert_eq!(name, "weight");
                assert_eq!(expected, Shape::from([8, 16]));
                assert_eq!(got, Shape::from([8, 15]));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(slot, Shape::from([8, 15]));
    }

    #[test]
    fn test_prepare_outputs() {
        let mut out = Vec::new();
        prepare_outputs("dropout", &mut out, 2).unwrap();
        assert_eq!(out, vec![Shape::unknown(), Shape::unknown()]);

        let mut wrong = vec![Shape::unknown()];
        assert!(prepare_outputs("dropout", &mut wrong, 2).is_err());
    }

    #[test]
    fn test_check_rank() {
        assert!(check_rank("fc", "argument", "data", &Shape::unknown(), 2).is_ok());
        assert!(check_rank("fc", "argument", "data", &Shape::from([4, 0]), 2).is_ok());
        assert!(check_rank("fc", "argument", "data", &Shape::from([4]), 2).is_err());
    }

    #[test]
    fn test_all_known() {
        assert!(all_known(&[Shape::from([1, 2]), Shape::from([3])]));
        assert!(!all_known(&[Shape::from([1, 0])]));
        assert!(!all_known(&[Shape::unknown()]));
    }
}
