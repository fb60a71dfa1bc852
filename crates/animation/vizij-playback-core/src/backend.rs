//! Mixing backend seam.
//!
//! The scheduler owns slot bookkeeping; a backend owns whatever actually
//! composites clips onto the target (a Bevy animation graph, a web mixer, ...).
//! Adapters implement [`MixingBackend`] and hand it to `Scheduler::new`.

use std::cell::Cell;
use std::rc::Rc;

use hashbrown::HashMap;

use crate::clip::Clip;
use crate::ids::ClipId;

/// A per-clip playback object that can be attached to the backend.
pub trait BackingResource {
    /// False once the backend has torn the underlying object down.
    fn is_valid(&self) -> bool;
    /// Restore rent-time defaults: time 0, not done, speed 1, the given duration.
    fn reset(&mut self, duration: f32);
    fn set_time(&mut self, time: f32);
    fn set_speed(&mut self, speed: f32);
    fn set_done(&mut self, done: bool);
}

/// Backend that mixes attached resources onto one target.
pub trait MixingBackend {
    type Resource: BackingResource;

    fn create_resource(&mut self, clip: &Clip) -> Self::Resource;
    fn destroy_resource(&mut self, resource: Self::Resource);

    fn attach(&mut self, slot: usize, resource: &Self::Resource, weight: f32);
    fn detach(&mut self, slot: usize);
    fn set_weight(&mut self, slot: usize, weight: f32);

    fn suspend(&mut self);
    fn resume(&mut self);
}

/// Resource produced by [`HeadlessBackend`].
#[derive(Debug)]
pub struct HeadlessResource {
    pub serial: u64,
    pub clip: ClipId,
    pub time: f32,
    pub duration: f32,
    pub speed: f32,
    pub done: bool,
    valid: Rc<Cell<bool>>,
}

impl BackingResource for HeadlessResource {
    fn is_valid(&self) -> bool {
        self.valid.get()
    }

    fn reset(&mut self, duration: f32) {
        self.time = 0.0;
        self.done = false;
        self.speed = 1.0;
        self.duration = duration;
    }

    fn set_time(&mut self, time: f32) {
        self.time = time;
    }

    fn set_speed(&mut self, speed: f32) {
        self.speed = speed;
    }

    fn set_done(&mut self, done: bool) {
        self.done = done;
    }
}

/// Attachment as recorded by [`HeadlessBackend`].
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Attachment {
    pub serial: u64,
    pub clip: ClipId,
    pub weight: f32,
}

/// Backend with no renderer behind it. It records what the scheduler asks of
/// it, which makes it the reference backend for tests and headless hosts.
#[derive(Debug, Default)]
pub struct HeadlessBackend {
    next_serial: u64,
    live: HashMap<u64, Rc<Cell<bool>>>,
    attached: HashMap<usize, Attachment>,
    suspended: bool,
    pub created: usize,
    pub destroyed: usize,
    pub suspend_calls: usize,
    pub resume_calls: usize,
}

impl HeadlessBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn attachment(&self, slot: usize) -> Option<Attachment> {
        self.attached.get(&slot).copied()
    }

    pub fn attached_count(&self) -> usize {
        self.attached.len()
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended
    }

    /// Number of resources created and not yet destroyed.
    pub fn live_resources(&self) -> usize {
        self.live.len()
    }

    /// Simulate the host tearing down a resource behind the scheduler's back.
    pub fn invalidate(&mut self, serial: u64) -> bool {
        match self.live.get(&serial) {
            Some(flag) => {
                flag.set(false);
                true
            }
            None => false,
        }
    }
}

impl MixingBackend for HeadlessBackend {
    type Resource = HeadlessResource;

    fn create_resource(&mut self, clip: &Clip) -> HeadlessResource {
        let serial = self.next_serial;
        self.next_serial += 1;
        let valid = Rc::new(Cell::new(true));
        self.live.insert(serial, valid.clone());
        self.created += 1;
        HeadlessResource {
            serial,
            clip: clip.id,
            time: 0.0,
            duration: clip.duration,
            speed: 1.0,
            done: false,
            valid,
        }
    }

    fn destroy_resource(&mut self, resource: HeadlessResource) {
        self.live.remove(&resource.serial);
        self.destroyed += 1;
    }

    fn attach(&mut self, slot: usize, resource: &HeadlessResource, weight: f32) {
        self.attached.insert(
            slot,
            Attachment {
                serial: resource.serial,
                clip: resource.clip,
                weight,
            },
        );
    }

    fn detach(&mut self, slot: usize) {
        self.attached.remove(&slot);
    }

    fn set_weight(&mut self, slot: usize, weight: f32) {
        if let Some(a) = self.attached.get_mut(&slot) {
            a.weight = weight;
        }
    }

    fn suspend(&mut self) {
        self.suspended = true;
        self.suspend_calls += 1;
    }

    fn resume(&mut self) {
        self.suspended = false;
        self.resume_calls += 1;
    }
}
