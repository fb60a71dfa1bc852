//! Per-clip pool of reusable backing resources.
//!
//! Resources move out of the pool on `rent` and back in on `return_resource`,
//! so a pooled resource is never reachable from an attached slot. Each clip
//! keeps at most `capacity_per_clip` idle resources; extras are destroyed.

use hashbrown::HashMap;

use crate::backend::{BackingResource, MixingBackend};
use crate::clip::Clip;
use crate::ids::ClipId;

/// Running counters, mostly useful for tests and diagnostics.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub created: usize,
    pub reused: usize,
    pub destroyed: usize,
    /// Resources currently rented out.
    pub outstanding: usize,
}

#[derive(Debug)]
pub struct ResourcePool<R> {
    capacity_per_clip: usize,
    stacks: HashMap<ClipId, Vec<R>>,
    stats: PoolStats,
}

impl<R: BackingResource> ResourcePool<R> {
    pub fn new(capacity_per_clip: usize) -> Self {
        Self {
            capacity_per_clip,
            stacks: HashMap::new(),
            stats: PoolStats::default(),
        }
    }

    #[inline]
    pub fn capacity_per_clip(&self) -> usize {
        self.capacity_per_clip
    }

    #[inline]
    pub fn stats(&self) -> PoolStats {
        self.stats
    }

    /// Idle resources held for `clip`.
    pub fn pooled(&self, clip: ClipId) -> usize {
        self.stacks.get(&clip).map_or(0, Vec::len)
    }

    /// Pop a valid resource for `clip`, or have the backend create one.
    /// Invalidated resources found on the stack are destroyed on the way.
    pub fn rent<B>(&mut self, clip: &Clip, backend: &mut B) -> R
    where
        B: MixingBackend<Resource = R>,
    {
        self.stats.outstanding += 1;
        if let Some(stack) = self.stacks.get_mut(&clip.id) {
            while let Some(mut resource) = stack.pop() {
                if resource.is_valid() {
                    resource.reset(clip.duration);
                    self.stats.reused += 1;
                    return resource;
                }
                log::warn!("pool: dropping invalidated resource for clip {:?}", clip.id);
                self.stats.destroyed += 1;
                backend.destroy_resource(resource);
            }
        }
        self.stats.created += 1;
        let mut resource = backend.create_resource(clip);
        resource.reset(clip.duration);
        resource
    }

    /// Take a resource back. It is reset and stacked if the clip has room,
    /// otherwise (or if the backend invalidated it) it is destroyed.
    pub fn return_resource<B>(&mut self, clip: ClipId, mut resource: R, backend: &mut B)
    where
        B: MixingBackend<Resource = R>,
    {
        self.stats.outstanding = self.stats.outstanding.saturating_sub(1);
        let stack = self.stacks.entry(clip).or_default();
        if resource.is_valid() && stack.len() < self.capacity_per_clip {
            resource.reset(0.0);
            stack.push(resource);
        } else {
            self.stats.destroyed += 1;
            backend.destroy_resource(resource);
        }
    }

    /// Eagerly create up to `count` resources, bounded by the clip's free
    /// capacity. Returns how many were created.
    pub fn prewarm<B>(&mut self, clip: &Clip, count: usize, backend: &mut B) -> usize
    where
        B: MixingBackend<Resource = R>,
    {
        let cap = self.capacity_per_clip;
        let stack = self.stacks.entry(clip.id).or_default();
        let n = count.min(cap.saturating_sub(stack.len()));
        for _ in 0..n {
            stack.push(backend.create_resource(clip));
        }
        self.stats.created += n;
        n
    }

    /// Destroy every idle resource. Outstanding rentals are untouched.
    pub fn clear<B>(&mut self, backend: &mut B)
    where
        B: MixingBackend<Resource = R>,
    {
        for (_, stack) in self.stacks.drain() {
            for resource in stack {
                self.stats.destroyed += 1;
                backend.destroy_resource(resource);
            }
        }
    }
}
