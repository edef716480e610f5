use tg_operator::{OpError, Result};
use tg_tensor::Device;

/// The reference kernels only run on the host.
pub(crate) fn require_cpu(op: &str, device: Device) -> Result<()> {
    if !device.is_cpu() {
        return Err(OpError::UnsupportedDevice {
            op: op.to_string(),
            device,
        });
    }
    Ok(())
}

/// Report backend failures as compute failures of the calling operator.
pub(crate) trait KernelResult<T> {
    fn in_op(self, op: &str) -> Result<T>;
}

impl<T> KernelResult<T> for tg_tensor::Result<T> {
    fn in_op(self, op: &str) -> Result<T> {
        self.map_err(|e| OpError::compute(op, e.to_string()))
    }
}
