use std::collections::HashMap;
use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};

use log::{debug, trace};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tg_tensor::Device;

use crate::error::{OpError, Result};

/// Kind of auxiliary resource an operator may ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Scratch memory valid for the duration of one call.
    TempSpace,
    /// A pseudo-random number stream.
    Random,
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResourceKind::TempSpace => write!(f, "temp_space"),
            ResourceKind::Random => write!(f, "random"),
        }
    }
}

/// A statically declared need for one resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceRequest {
    pub kind: ResourceKind,
}

impl ResourceRequest {
    pub fn new(kind: ResourceKind) -> Self {
        Self { kind }
    }

    pub fn temp_space() -> Self {
        Self::new(ResourceKind::TempSpace)
    }

    pub fn random() -> Self {
        Self::new(ResourceKind::Random)
    }
}

#[derive(Debug, Clone)]
enum ResourceHandle {
    TempSpace(Arc<Mutex<Vec<f32>>>),
    Random(Arc<Mutex<StdRng>>),
}

/// A request resolved by a pool into a concrete handle.
///
/// Handles are only valid for the call they were resolved for; operators
/// must not keep them once `forward`/`backward` returns.
#[derive(Debug, Clone)]
pub struct Resource {
    pub req: ResourceRequest,
    handle: ResourceHandle,
}

impl Resource {
    pub fn from_workspace(buffer: Arc<Mutex<Vec<f32>>>) -> Self {
        Resource {
            req: ResourceRequest::temp_space(),
            handle: ResourceHandle::TempSpace(buffer),
        }
    }

    pub fn from_rng(rng: Arc<Mutex<StdRng>>) -> Self {
        Resource {
            req: ResourceRequest::random(),
            handle: ResourceHandle::Random(rng),
        }
    }

    pub fn kind(&self) -> ResourceKind {
        self.req.kind
    }

    /// Borrow `len` zeroed f32 elements of scratch space.
    ///
    /// Returns `None` when this resource is not a workspace. A buffer that
    /// is already borrowed is reported as `ResourceUnavailable`.
    pub fn workspace(&self, len: usize) -> Option<Result<Workspace<'_>>> {
        let ResourceHandle::TempSpace(buffer) = &self.handle else {
            return None;
        };
        let mut guard = match buffer.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::WouldBlock) => {
                return Some(Err(OpError::ResourceUnavailable("workspace already borrowed".into())))
            }
            Err(TryLockError::Poisoned(_)) => {
                return Some(Err(OpError::ResourceUnavailable("workspace lock poisoned".into())))
            }
        };
        if guard.len() < len {
            guard.resize(len, 0.0);
        }
        guard[..len].fill(0.0);
        Some(Ok(Workspace { guard, len }))
    }

    /// Borrow the random stream. Returns `None` when this resource is not one.
    ///
    /// Requests on one device share a stream; a stream that is already
    /// borrowed is reported as `ResourceUnavailable`.
    pub fn rng(&self) -> Option<Result<MutexGuard<'_, StdRng>>> {
        let ResourceHandle::Random(rng) = &self.handle else {
            return None;
        };
        Some(rng.try_lock().map_err(|e| match e {
            TryLockError::WouldBlock => {
                OpError::ResourceUnavailable("random stream already borrowed".into())
            }
            TryLockError::Poisoned(_) => {
                OpError::ResourceUnavailable("random stream lock poisoned".into())
            }
        }))
    }
}

/// Scratch space borrowed from a `TempSpace` resource.
pub struct Workspace<'a> {
    guard: MutexGuard<'a, Vec<f32>>,
    len: usize,
}

impl Deref for Workspace<'_> {
    type Target = [f32];

    fn deref(&self) -> &[f32] {
        &self.guard[..self.len]
    }
}

impl DerefMut for Workspace<'_> {
    fn deref_mut(&mut self) -> &mut [f32] {
        &mut self.guard[..self.len]
    }
}

/// Resolves declared requests into handles, once per call.
pub trait ResourcePool: Send + Sync {
    fn request(&self, device: Device, req: &ResourceRequest) -> Result<Resource>;

    /// Resolve every request in declaration order.
    fn resolve(&self, device: Device, reqs: &[ResourceRequest]) -> Result<Vec<Resource>> {
        reqs.iter().map(|req| self.request(device, req)).collect()
    }
}

#[derive(Debug)]
struct DeviceResources {
    workspaces: Vec<Arc<Mutex<Vec<f32>>>>,
    rng: Arc<Mutex<StdRng>>,
}

impl DeviceResources {
    /// The `slot`-th scratch buffer of this device, created on first use.
    fn workspace(&mut self, slot: usize) -> Arc<Mutex<Vec<f32>>> {
        while self.workspaces.len() <= slot {
            self.workspaces.push(Arc::new(Mutex::new(Vec::new())));
        }
        Arc::clone(&self.workspaces[slot])
    }
}

/// In-process pool: one seeded random stream per device, and per device one
/// scratch buffer for each `TempSpace` position within a single call.
#[derive(Debug)]
pub struct LocalResourcePool {
    seed: u64,
    devices: Mutex<HashMap<Device, DeviceResources>>,
}

impl LocalResourcePool {
    pub fn new(seed: u64) -> Self {
        Self {
            seed,
            devices: Mutex::new(HashMap::new()),
        }
    }

    fn device_seed(&self, device: Device) -> u64 {
        let kind = if device.is_cpu() { 0 } else { 1u64 << 32 };
        self.seed
            .wrapping_mul(0x9E37_79B9_7F4A_7C15)
            .wrapping_add(kind | device.id as u64)
    }
}

impl Default for LocalResourcePool {
    fn default() -> Self {
        Self::new(0)
    }
}

impl LocalResourcePool {
    fn acquire(&self, device: Device, req: &ResourceRequest, slot: usize) -> Result<Resource> {
        let mut devices = self
            .devices
            .lock()
            .map_err(|_| OpError::ResourceUnavailable("pool lock poisoned".into()))?;
        let seed = self.device_seed(device);
        let entry = devices.entry(device).or_insert_with(|| {
            debug!("resource pool: initialising {} with seed {}", device, seed);
            DeviceResources {
                workspaces: Vec::new(),
                rng: Arc::new(Mutex::new(StdRng::seed_from_u64(seed))),
            }
        });
        trace!("resource pool: resolving {} #{} on {}", req.kind, slot, device);
        Ok(match req.kind {
            ResourceKind::TempSpace => Resource::from_workspace(entry.workspace(slot)),
            ResourceKind::Random => Resource::from_rng(Arc::clone(&entry.rng)),
        })
    }
}

impl ResourcePool for LocalResourcePool {
    fn request(&self, device: Device, req: &ResourceRequest) -> Result<Resource> {
        self.acquire(device, req, 0)
    }

    /// Scratch requests of one call get distinct buffers, numbered by how
    /// many `TempSpace` requests precede them.
    fn resolve(&self, device: Device, reqs: &[ResourceRequest]) -> Result<Vec<Resource>> {
        let mut temp_slot = 0;
        reqs.iter()
            .map(|req| {
                let slot = match req.kind {
                    ResourceKind::TempSpace => {
                        temp_slot += 1;
                        temp_slot - 1
                    }
                    ResourceKind::Random => 0,
                };
                self.acquire(device, req, slot)
            })
            .collect()
    }
}
