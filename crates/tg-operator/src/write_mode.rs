use std::fmt;

use tg_tensor::Tensor;

use crate::error::Result;

/// How an operator must write one output (or gradient) slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WriteMode {
    /// Leave the slot untouched.
    Null,
    /// Overwrite the slot.
    WriteTo,
    /// Overwrite a slot that shares memory with one of the inputs.
    /// Kernels must finish reading the input before writing.
    WriteInplace,
    /// Add the result into the existing content of the slot.
    AddTo,
}

impl WriteMode {
    /// Only overwrite modes may reach `Operator::forward`.
    pub fn is_forward_valid(&self) -> bool {
        matches!(self, WriteMode::WriteTo | WriteMode::WriteInplace)
    }
}

impl fmt::Display for WriteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteMode::Null => write!(f, "null"),
            WriteMode::WriteTo => write!(f, "write"),
            WriteMode::WriteInplace => write!(f, "write_inplace"),
            WriteMode::AddTo => write!(f, "add_to"),
        }
    }
}

/// Store `values` into `out` following `mode`.
///
/// `values` must be fully computed before this call; with `WriteInplace`
/// the output storage may be the storage the values were read from.
pub fn assign(out: &Tensor, mode: WriteMode, values: &[f32]) -> Result<()> {
    match mode {
        WriteMode::Null => {}
        WriteMode::WriteTo | WriteMode::WriteInplace => out.copy_from(values)?,
        WriteMode::AddTo => out.add_from(values)?,
    }
    Ok(())
}
