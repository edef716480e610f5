use rand::rngs::StdRng;
use std::sync::MutexGuard;

use tg_tensor::Device;

use crate::error::{OpError, Result};
use crate::resource::{Resource, ResourceKind, ResourcePool, ResourceRequest, Workspace};

/// Opaque identifier of the device stream a call is issued on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamHandle(pub u64);

/// Where a call runs: device plus optional stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunContext {
    pub device: Device,
    pub stream: Option<StreamHandle>,
}

impl RunContext {
    pub fn new(device: Device) -> Self {
        Self {
            device,
            stream: None,
        }
    }
}

/// Everything one `forward`/`backward` call may use.
///
/// `requested[i]` is the resolution of the i-th request the property
/// declared for that pass.
#[derive(Debug, Clone)]
pub struct OpContext {
    pub is_train: bool,
    pub run_ctx: RunContext,
    pub requested: Vec<Resource>,
}

impl OpContext {
    pub fn new(is_train: bool, device: Device) -> Self {
        Self {
            is_train,
            run_ctx: RunContext::new(device),
            requested: Vec::new(),
        }
    }

    /// Build a context whose resources are resolved from `pool`.
    pub fn resolve(
        is_train: bool,
        device: Device,
        reqs: &[ResourceRequest],
        pool: &dyn ResourcePool,
    ) -> Result<Self> {
        Ok(Self {
            is_train,
            run_ctx: RunContext::new(device),
            requested: pool.resolve(device, reqs)?,
        })
    }

    pub fn with_stream(mut self, stream: StreamHandle) -> Self {
        self.run_ctx.stream = Some(stream);
        self
    }

    pub fn device(&self) -> Device {
        self.run_ctx.device
    }

    /// Scratch space from the `index`-th requested resource.
    pub fn workspace(&self, op: &str, index: usize, len: usize) -> Result<Workspace<'_>> {
        self.requested
            .get(index)
            .and_then(|r| r.workspace(len))
            .unwrap_or_else(|| {
                Err(OpError::ResourceMismatch {
                    op: op.to_string(),
                    index,
                    expected: ResourceKind::TempSpace,
                })
            })
    }

    /// Random stream from the `index`-th requested resource.
    pub fn rng(&self, op: &str, index: usize) -> Result<MutexGuard<'_, StdRng>> {
        self.requested
            .get(index)
            .and_then(|r| r.rng())
            .unwrap_or_else(|| {
                Err(OpError::ResourceMismatch {
                    op: op.to_string(),
                    index,
                    expected: ResourceKind::Random,
                })
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::LocalResourcePool;

    #[test]
    fn test_resolve_from_pool() {
        let pool = LocalResourcePool::new(1);
        let reqs = [ResourceRequest::temp_space(), ResourceRequest::random()];
        let ctx = OpContext::resolve(true, Device::cpu(), &reqs, &pool)
            .unwrap()
            .with_stream(StreamHandle(3));
        assert!(ctx.is_train);
        assert_eq!(ctx.run_ctx.stream, Some(StreamHandle(3)));
        assert_eq!(ctx.workspace("test", 0, 8).unwrap().len(), 8);
        assert!(ctx.rng("test", 1).is_ok());
    }

    #[test]
    fn test_wrong_kind_or_missing_index() {
        let pool = LocalResourcePool::new(1);
        let ctx = OpContext::resolve(false, Device::cpu(), &[ResourceRequest::temp_space()], &pool)
            .unwrap();
        assert!(matches!(
            ctx.rng("test", 0),
            Err(OpError::ResourceMismatch { index: 0, .. })
        ));
        assert!(matches!(
            ctx.workspace("test", 5, 1),
            Err(OpError::ResourceMismatch { index: 5, .. })
        ));
    }

    #[test]
    fn test_two_workspaces_held_at_once() {
        let pool = LocalResourcePool::new(1);
        let reqs = [ResourceRequest::temp_space(), ResourceRequest::temp_space()];
        let ctx = OpContext::resolve(true, Device::cpu(), &reqs, &pool).unwrap();
        let mut a = ctx.workspace("test", 0, 4).unwrap();
        let mut b = ctx.workspace("test", 1, 4).unwrap();
        a[0] = 1.0;
        b[0] = 2.0;
        assert_eq!(a[0], 1.0);
        assert_eq!(b[0], 2.0);
    }
}
