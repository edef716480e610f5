use std::fmt;

/// Kind of device a tensor lives on or a kernel runs on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    Cpu,
    Gpu,
}

/// A concrete device: its kind plus an ordinal among devices of that kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Device {
    pub kind: DeviceKind,
    pub id: usize,
}

impl Device {
    pub fn cpu() -> Self {
        Device {
            kind: DeviceKind::Cpu,
            id: 0,
        }
    }

    pub fn gpu(id: usize) -> Self {
        Device {
            kind: DeviceKind::Gpu,
            id,
        }
    }

    pub fn is_cpu(&self) -> bool {
        self.kind == DeviceKind::Cpu
    }
}

impl Default for Device {
    fn default() -> Self {
        Self::cpu()
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            DeviceKind::Cpu => write!(f, "cpu({})", self.id),
            DeviceKind::Gpu => write!(f, "gpu({})", self.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_cpu() {
        assert!(Device::default().is_cpu());
        assert!(!Device::gpu(1).is_cpu());
    }

    #[test]
    fn test_display() {
        assert_eq!(Device::cpu().to_string(), "cpu(0)");
        assert_eq!(Device::gpu(2).to_string(), "gpu(2)");
    }
}
