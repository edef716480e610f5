use std::fmt;

/// Element type of a tensor's storage.
///
/// Kernels compute in f32; `F16` storage is widened on read and narrowed on
/// write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    F32,
    F16,
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DType::F32 => "f32",
            DType::F16 => "f16",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names() {
        assert_eq!(format!("{}/{}", DType::F32, DType::F16), "f32/f16");
    }
}
