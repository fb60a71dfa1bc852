//! Scheduler: slot ownership, play/stop/pause/queue orchestration and the
//! per-frame update.
//!
//! Methods:
//! - play family (`play`, `play_with_mode`, `play_with_crossfade`, `play_looped`, `play_with_options`)
//! - handle-scoped control (stop/pause/resume, speed/weight/time setters and getters)
//! - `tick(dt)`: advance → loops/completion → triggers → fades → auto-stop → queue gate → idle
//!
//! Completion and loop callbacks receive `&mut Scheduler` and may start or stop
//! clips. `tick` walks a snapshot of `(index, generation)` pairs taken on entry
//! and re-validates the pair after every callback.

use std::collections::{vec_deque, VecDeque};

use crate::backend::{BackingResource, MixingBackend};
use crate::clip::{ClipLibrary, ClipProvider};
use crate::config::Config;
use crate::error::PlaybackError;
use crate::events::{EventHub, EventKind, PlaybackEvent};
use crate::ids::{ClipId, Handle, IdAllocator, TriggerId};
use crate::options::{PlayMode, PlayOptions};
use crate::pool::ResourcePool;
use crate::slot::{AnimationState, Boundary, SlotTable};
use crate::triggers::{CurveSampler, SlotSample, TriggerHit, TriggerRegistry};

/// Invoked once when a play completes or is stopped without interruption.
pub type CompletionCallback<B, P = ClipLibrary> = Box<dyn FnOnce(&mut Scheduler<B, P>)>;
/// Invoked after every completed traversal of a looping play, with the new loop count.
pub type LoopCallback<B, P = ClipLibrary> = Box<dyn FnMut(&mut Scheduler<B, P>, u32)>;

/// Occupant of one slot.
struct SlotEntry<B: MixingBackend, P: ClipProvider> {
    state: AnimationState,
    resource: B::Resource,
    on_complete: Option<CompletionCallback<B, P>>,
    on_loop: Option<LoopCallback<B, P>>,
}

impl<B: MixingBackend, P: ClipProvider> AsRef<AnimationState> for SlotEntry<B, P> {
    fn as_ref(&self) -> &AnimationState {
        &self.state
    }
}

struct QueueEntry<B: MixingBackend, P: ClipProvider> {
    ticket: u32,
    clip: ClipId,
    options: PlayOptions,
    on_complete: Option<CompletionCallback<B, P>>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Release {
    /// Explicit stop or natural completion: End event and completion callback.
    Completed,
    /// Single-mode replacement, finished fade-out, eviction or shutdown.
    Interrupted,
}

/// Slot-based playback scheduler driving one mixing backend.
///
/// Clip metadata comes from `P`. The default [`ClipLibrary`] is an in-memory
/// registry; hosts that already own their clips plug in their own provider
/// with [`Scheduler::with_provider`].
pub struct Scheduler<B: MixingBackend, P: ClipProvider = ClipLibrary> {
    cfg: Config,
    clips: P,
    backend: B,
    pool: ResourcePool<B::Resource>,
    slots: SlotTable<SlotEntry<B, P>>,
    queue: VecDeque<QueueEntry<B, P>>,
    tickets: IdAllocator,
    events: EventHub,
    triggers: TriggerRegistry,
    global_speed: f32,
    idle_time: f32,
    suspended: bool,
    /// Reused snapshot buffer for `tick` and bulk operations.
    scratch: Vec<(usize, u32)>,
}

impl<B: MixingBackend, P: ClipProvider> std::fmt::Debug for Scheduler<B, P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scheduler")
            .field("cfg", &self.cfg)
            .field("active", &self.slots.len())
            .field("queued", &self.queue.len())
            .field("global_speed", &self.global_speed)
            .field("suspended", &self.suspended)
            .field("pool", &self.pool.stats())
            .field("triggers", &self.triggers)
            .finish()
    }
}

/// Push `speed * global_speed` (0 while paused) to the backing resource.
/// Sole writer of resource speed.
fn apply_speed<B: MixingBackend, P: ClipProvider>(
    global_speed: f32,
    index: usize,
    entry: &mut SlotEntry<B, P>,
) {
    let applied = if entry.state.is_paused() {
        0.0
    } else {
        entry.state.speed() * global_speed
    };
    if entry.resource.is_valid() {
        entry.resource.set_speed(applied);
    } else {
        log::debug!("scheduler: slot {index} resource invalidated; speed not applied");
    }
}

#[inline]
fn handle_for(index: usize, generation: u32, clip: ClipId) -> Handle {
    Handle {
        slot: index as u32,
        generation,
        clip,
    }
}

impl<B: MixingBackend> Scheduler<B> {
    /// Create a scheduler with an empty [`ClipLibrary`]. An invalid config is
    /// logged and replaced by defaults.
    pub fn new(cfg: Config, backend: B) -> Self {
        Self::with_provider(cfg, backend, ClipLibrary::new())
    }

    /// Create a scheduler, rejecting an invalid config.
    pub fn try_new(cfg: Config, backend: B) -> Result<Self, PlaybackError> {
        Self::try_with_provider(cfg, backend, ClipLibrary::new())
    }

    /// Shorthand for `clips_mut().load_clip(..)`.
    pub fn load_clip(&mut self, name: &str, duration: f32) -> ClipId {
        self.clips.load_clip(name, duration)
    }
}

impl<B: MixingBackend, P: ClipProvider> Scheduler<B, P> {
    /// Create a scheduler reading clips from `clips`. An invalid config is
    /// logged and replaced by defaults.
    pub fn with_provider(cfg: Config, backend: B, clips: P) -> Self {
        let cfg = match cfg.validate() {
            Ok(()) => cfg,
            Err(err) => {
                log::warn!("scheduler: {err}; falling back to default config");
                Config::default()
            }
        };
        Self::build(cfg, backend, clips)
    }

    pub fn try_with_provider(cfg: Config, backend: B, clips: P) -> Result<Self, PlaybackError> {
        cfg.validate()?;
        Ok(Self::build(cfg, backend, clips))
    }

    fn build(cfg: Config, backend: B, clips: P) -> Self {
        Self {
            clips,
            backend,
            pool: ResourcePool::new(cfg.pool_capacity_per_clip),
            slots: SlotTable::new(cfg.max_slots),
            queue: VecDeque::with_capacity(cfg.max_slots),
            tickets: IdAllocator::new(),
            events: EventHub::new(cfg.max_events_per_tick),
            triggers: TriggerRegistry::new(
                cfg.max_slots,
                cfg.max_time_triggers,
                cfg.max_curve_triggers,
            ),
            global_speed: 1.0,
            idle_time: 0.0,
            suspended: false,
            scratch: Vec::with_capacity(cfg.max_slots),
            cfg,
        }
    }

    /// Release every slot as interrupted, drop the queue and destroy all
    /// pooled resources. The scheduler stays usable afterwards.
    pub fn shutdown(&mut self) {
        self.queue.clear();
        self.release_all(Release::Interrupted);
        self.pool.clear(&mut self.backend);
        self.idle_time = 0.0;
        log::info!("scheduler: shut down");
    }

    // ----- accessors -------------------------------------------------------

    pub fn config(&self) -> &Config {
        &self.cfg
    }

    pub fn clips(&self) -> &P {
        &self.clips
    }

    pub fn clips_mut(&mut self) -> &mut P {
        &mut self.clips
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn pool(&self) -> &ResourcePool<B::Resource> {
        &self.pool
    }

    pub fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    pub fn active_count(&self) -> usize {
        self.slots.len()
    }

    pub fn is_backend_suspended(&self) -> bool {
        self.suspended
    }

    pub fn global_speed(&self) -> f32 {
        self.global_speed
    }

    fn try_entry(&self, handle: Handle) -> Result<&SlotEntry<B, P>, PlaybackError> {
        if handle.is_bound() {
            if let Some(entry) = self.slots.get(handle.slot as usize, handle.generation) {
                return Ok(entry);
            }
        }
        Err(PlaybackError::InvalidHandle {
            slot: handle.slot,
            generation: handle.generation,
        })
    }

    fn try_entry_mut(&mut self, handle: Handle) -> Result<&mut SlotEntry<B, P>, PlaybackError> {
        if handle.is_bound() {
            if let Some(entry) = self.slots.get_mut(handle.slot as usize, handle.generation) {
                return Ok(entry);
            }
        }
        Err(PlaybackError::InvalidHandle {
            slot: handle.slot,
            generation: handle.generation,
        })
    }

    /// Animation state behind a handle.
    pub fn try_state(&self, handle: Handle) -> Result<&AnimationState, PlaybackError> {
        self.try_entry(handle).map(|e| &e.state)
    }

    pub fn state(&self, handle: Handle) -> Option<&AnimationState> {
        self.try_state(handle).ok()
    }

    /// Backing resource currently attached for a handle.
    pub fn resource(&self, handle: Handle) -> Option<&B::Resource> {
        self.try_entry(handle).ok().map(|e| &e.resource)
    }

    pub fn is_handle_valid(&self, handle: Handle) -> bool {
        self.try_entry(handle).is_ok()
    }

    /// Clip currently playing behind a handle.
    pub fn clip_of(&self, handle: Handle) -> Option<ClipId> {
        self.try_entry(handle).ok().map(|e| e.state.clip)
    }

    // ----- play family -----------------------------------------------------

    pub fn play(
        &mut self,
        clip: ClipId,
        on_complete: Option<CompletionCallback<B, P>>,
    ) -> Handle {
        self.play_with_mode(clip, PlayMode::Single, on_complete)
    }

    pub fn play_with_mode(
        &mut self,
        clip: ClipId,
        mode: PlayMode,
        on_complete: Option<CompletionCallback<B, P>>,
    ) -> Handle {
        self.play_with_options(clip, PlayOptions::default().with_mode(mode), on_complete)
    }

    /// Loop `clip`. `loop_count > 0` completes after exactly that many
    /// traversals; `loop_count <= 0` loops until stopped.
    pub fn play_looped(
        &mut self,
        clip: ClipId,
        loop_count: i32,
        on_complete: Option<CompletionCallback<B, P>>,
    ) -> Handle {
        self.play_with_options(clip, PlayOptions::default().looped(loop_count), on_complete)
    }

    /// Fade out every active slot that is not already fading out, and fade
    /// `clip` in alongside them over the same duration.
    pub fn play_with_crossfade(
        &mut self,
        clip: ClipId,
        fade_time: f32,
        on_complete: Option<CompletionCallback<B, P>>,
    ) -> Handle {
        if self.clips.clip(clip).is_none() {
            log::debug!("scheduler: crossfade to unknown clip {clip:?} ignored");
            return Handle::INVALID;
        }
        for (index, _, entry) in self.slots.iter_mut() {
            if entry.state.is_finished() || entry.state.blend.is_fading_out() {
                continue;
            }
            entry.state.blend.start_fade_out(fade_time);
            log::debug!("scheduler: slot {index} fading out over {fade_time}s");
        }
        let options = PlayOptions::default()
            .with_mode(PlayMode::Additive)
            .with_fade_in(fade_time);
        self.play_with_options(clip, options, on_complete)
    }

    pub fn play_with_options(
        &mut self,
        clip: ClipId,
        options: PlayOptions,
        on_complete: Option<CompletionCallback<B, P>>,
    ) -> Handle {
        self.try_play(clip, options, on_complete)
            .unwrap_or_else(|err| {
                log::debug!("scheduler: play of {clip:?} refused: {err}");
                Handle::INVALID
            })
    }

    /// Like [`Scheduler::play_with_options`] but reports why nothing started.
    pub fn try_play(
        &mut self,
        clip: ClipId,
        options: PlayOptions,
        on_complete: Option<CompletionCallback<B, P>>,
    ) -> Result<Handle, PlaybackError> {
        if self.clips.clip(clip).is_none() {
            return Err(PlaybackError::MissingClip(clip));
        }
        match options.mode {
            PlayMode::Single => self.release_all(Release::Interrupted),
            PlayMode::Additive => {}
            PlayMode::Queue => {
                if !self.queue.is_empty() || self.has_primary() {
                    return self.enqueue(clip, options, on_complete);
                }
            }
        }
        self.allocate(clip, &options, on_complete)
    }

    fn enqueue(
        &mut self,
        clip: ClipId,
        options: PlayOptions,
        on_complete: Option<CompletionCallback<B, P>>,
    ) -> Result<Handle, PlaybackError> {
        if self.queue.len() >= self.cfg.max_slots {
            log::warn!("scheduler: queue full, dropping play of {clip:?}");
            return Err(PlaybackError::QueueFull {
                capacity: self.cfg.max_slots,
            });
        }
        let ticket = self.tickets.alloc_ticket();
        self.queue.push_back(QueueEntry {
            ticket,
            clip,
            options: options.with_mode(PlayMode::Additive),
            on_complete,
        });
        Ok(Handle::queued(ticket, clip))
    }

    fn allocate(
        &mut self,
        clip_id: ClipId,
        options: &PlayOptions,
        on_complete: Option<CompletionCallback<B, P>>,
    ) -> Result<Handle, PlaybackError> {
        if self.clips.clip(clip_id).is_none() {
            return Err(PlaybackError::MissingClip(clip_id));
        }
        self.wake_backend();
        let index = self.acquire_slot()?;
        let Some(clip) = self.clips.clip(clip_id) else {
            return Err(PlaybackError::MissingClip(clip_id));
        };
        let resource = self.pool.rent(clip, &mut self.backend);

        let (looping, max_loops) = options.loop_settings();
        let mut state = AnimationState::new(clip_id, clip.duration)
            .with_looping(looping, max_loops)
            .with_auto_stop(options.auto_stop.unwrap_or(self.cfg.auto_stop))
            .with_speed(options.speed);
        let weight = match options.fade_in {
            Some(seconds) => {
                state.blend.set_weight(0.0);
                state.blend.start_fade_in(seconds);
                0.0
            }
            None => 1.0,
        };

        let mut entry = SlotEntry {
            state,
            resource,
            on_complete,
            on_loop: None,
        };
        apply_speed(self.global_speed, index, &mut entry);
        if entry.resource.is_valid() {
            self.backend.attach(index, &entry.resource, weight);
        }
        let generation = match self.slots.occupy(index, entry) {
            Ok(generation) => generation,
            Err(entry) => {
                self.pool
                    .return_resource(clip_id, entry.resource, &mut self.backend);
                return Err(PlaybackError::NoFreeSlot {
                    capacity: self.slots.capacity(),
                });
            }
        };
        let handle = handle_for(index, generation, clip_id);
        self.events.emit(PlaybackEvent::Started {
            handle,
            clip: clip_id,
        });
        Ok(handle)
    }

    /// Find a free slot, evicting one if the table is full and eviction is
    /// enabled. See [`SlotTable::eviction_candidate`] for the policy.
    fn acquire_slot(&mut self) -> Result<usize, PlaybackError> {
        if let Some(index) = self.slots.find_free() {
            return Ok(index);
        }
        let full = PlaybackError::NoFreeSlot {
            capacity: self.slots.capacity(),
        };
        if !self.cfg.evict_when_full {
            return Err(full);
        }
        let Some(victim) = self.slots.eviction_candidate() else {
            return Err(full);
        };
        let Some(generation) = self.slots.generation(victim) else {
            return Err(full);
        };
        log::warn!("scheduler: slot table full, evicting slot {victim}");
        self.release_now(victim, generation, Release::Interrupted);
        self.slots.find_free().ok_or(full)
    }

    // ----- queue -----------------------------------------------------------

    pub fn queued_len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_queued(&self, handle: Handle) -> bool {
        handle.is_provisional() && self.queue.iter().any(|q| q.ticket == handle.generation)
    }

    /// Drop a queued play before it starts. Its callback is not invoked.
    pub fn cancel_queued(&mut self, handle: Handle) -> bool {
        if !handle.is_provisional() {
            return false;
        }
        match self.queue.iter().position(|q| q.ticket == handle.generation) {
            Some(pos) => self.queue.remove(pos).is_some(),
            None => false,
        }
    }

    pub fn clear_queue(&mut self) {
        self.queue.clear();
    }

    /// Any occupied slot that has not finished and is not fading out.
    fn has_primary(&self) -> bool {
        self.slots.iter().any(|(_, _, e)| e.state.is_primary())
    }

    /// Start queued plays while the queue gate is open.
    fn drain_queue(&mut self) {
        while !self.queue.is_empty() && !self.has_primary() {
            let Some(next) = self.queue.pop_front() else {
                break;
            };
            if let Err(err) = self.allocate(next.clip, &next.options, next.on_complete) {
                log::debug!("scheduler: queued play of {:?} dropped: {err}", next.clip);
            }
        }
    }

    // ----- stop / release --------------------------------------------------

    /// Stop one play: End event plus its completion callback, then the queue
    /// gate is re-evaluated. Stale handles are ignored.
    pub fn stop(&mut self, handle: Handle) {
        if !self.is_handle_valid(handle) {
            log::debug!("scheduler: stop ignored for stale handle {handle:?}");
            return;
        }
        self.release_now(handle.slot as usize, handle.generation, Release::Completed);
        self.drain_queue();
    }

    pub fn stop_all(&mut self) {
        self.release_all(Release::Completed);
        self.drain_queue();
    }

    /// Vacate a slot: detach, return the resource to the pool, report the
    /// terminal event. Hands back the completion callback so the caller can
    /// run it once the table is consistent.
    fn release(
        &mut self,
        index: usize,
        generation: u32,
        reason: Release,
    ) -> Option<CompletionCallback<B, P>> {
        let mut entry = self.slots.release(index, generation)?;
        let clip = entry.state.clip;
        if entry.resource.is_valid() {
            entry.resource.set_done(true);
            self.backend.detach(index);
        } else {
            log::warn!("scheduler: slot {index} released with an invalidated resource");
        }
        self.pool
            .return_resource(clip, entry.resource, &mut self.backend);

        let handle = handle_for(index, generation, clip);
        let report = entry.state.take_report();
        match reason {
            Release::Completed => {
                if report {
                    self.events.emit(PlaybackEvent::Ended { handle, clip });
                }
                entry.on_complete.take()
            }
            Release::Interrupted => {
                if report {
                    self.events.emit(PlaybackEvent::Interrupted { handle, clip });
                }
                None
            }
        }
    }

    fn release_now(&mut self, index: usize, generation: u32, reason: Release) {
        if let Some(callback) = self.release(index, generation, reason) {
            callback(self);
        }
    }

    /// Release every slot occupied at call time. Slots filled by callbacks
    /// during the sweep are left alone.
    fn release_all(&mut self, reason: Release) {
        let mut snapshot = std::mem::take(&mut self.scratch);
        snapshot.clear();
        snapshot.extend(self.slots.iter().map(|(i, g, _)| (i, g)));
        for &(index, generation) in &snapshot {
            self.release_now(index, generation, reason);
        }
        snapshot.clear();
        self.scratch = snapshot;
    }

    // ----- pause / resume --------------------------------------------------

    pub fn pause(&mut self, handle: Handle) {
        let global = self.global_speed;
        match self.try_entry_mut(handle) {
            Ok(entry) => {
                if entry.state.pause() {
                    apply_speed(global, handle.slot as usize, entry);
                }
            }
            Err(err) => log::debug!("scheduler: pause ignored: {err}"),
        }
    }

    pub fn resume(&mut self, handle: Handle) {
        let global = self.global_speed;
        match self.try_entry_mut(handle) {
            Ok(entry) => {
                if entry.state.resume() {
                    apply_speed(global, handle.slot as usize, entry);
                }
            }
            Err(err) => log::debug!("scheduler: resume ignored: {err}"),
        }
    }

    pub fn pause_all(&mut self) {
        let global = self.global_speed;
        for (index, _, entry) in self.slots.iter_mut() {
            if entry.state.pause() {
                apply_speed(global, index, entry);
            }
        }
    }

    pub fn resume_all(&mut self) {
        let global = self.global_speed;
        for (index, _, entry) in self.slots.iter_mut() {
            if entry.state.resume() {
                apply_speed(global, index, entry);
            }
        }
    }

    // ----- per-handle setters / getters ------------------------------------

    /// Per-clip speed (clamped to >= 0). The resource runs at `speed * global_speed`.
    pub fn set_speed(&mut self, handle: Handle, speed: f32) {
        let global = self.global_speed;
        match self.try_entry_mut(handle) {
            Ok(entry) => {
                entry.state.set_speed(speed);
                apply_speed(global, handle.slot as usize, entry);
            }
            Err(err) => log::debug!("scheduler: set_speed ignored: {err}"),
        }
    }

    pub fn get_speed(&self, handle: Handle) -> f32 {
        self.try_entry(handle).map_or(0.0, |e| e.state.speed())
    }

    /// Set the weight immediately (clamped to [0, 1]), cancelling any fade.
    pub fn set_weight(&mut self, handle: Handle, weight: f32) {
        let index = handle.slot as usize;
        let Some(entry) = self.slots.get_mut(index, handle.generation) else {
            log::debug!("scheduler: set_weight ignored for stale handle {handle:?}");
            return;
        };
        entry.state.blend.set_weight(weight);
        if entry.resource.is_valid() {
            self.backend.set_weight(index, entry.state.blend.weight());
        }
    }

    /// Ramp the weight toward `target` at a rate of `1 / duration` per second.
    /// Reaching 0 this way releases the slot like a crossfade would.
    pub fn fade_weight(&mut self, handle: Handle, target: f32, duration: f32) {
        match self.try_entry_mut(handle) {
            Ok(entry) => entry.state.blend.fade_to(target, duration),
            Err(err) => log::debug!("scheduler: fade_weight ignored: {err}"),
        }
    }

    pub fn get_weight(&self, handle: Handle) -> f32 {
        self.try_entry(handle).map_or(0.0, |e| e.state.blend.weight())
    }

    pub fn set_looping(&mut self, handle: Handle, looping: bool) {
        match self.try_entry_mut(handle) {
            Ok(entry) => entry.state.set_looping(looping),
            Err(err) => log::debug!("scheduler: set_looping ignored: {err}"),
        }
    }

    /// Seek within the current traversal (seconds, clamped to the clip length).
    pub fn set_time(&mut self, handle: Handle, time: f32) {
        match self.try_entry_mut(handle) {
            Ok(entry) => {
                entry.state.set_time(time);
                if entry.resource.is_valid() {
                    entry.resource.set_time(entry.state.time());
                }
            }
            Err(err) => log::debug!("scheduler: set_time ignored: {err}"),
        }
    }

    /// Seek by normalized progress in [0, 1].
    pub fn set_progress(&mut self, handle: Handle, progress: f32) {
        match self.try_entry_mut(handle) {
            Ok(entry) => {
                entry.state.set_progress(progress);
                if entry.resource.is_valid() {
                    entry.resource.set_time(entry.state.time());
                }
            }
            Err(err) => log::debug!("scheduler: set_progress ignored: {err}"),
        }
    }

    /// Normalized time within the current traversal; 0 for stale handles.
    pub fn get_progress(&self, handle: Handle) -> f32 {
        self.try_entry(handle)
            .map_or(0.0, |e| e.state.normalized_time())
    }

    pub fn get_time(&self, handle: Handle) -> f32 {
        self.try_entry(handle).map_or(0.0, |e| e.state.time())
    }

    pub fn loop_count(&self, handle: Handle) -> u32 {
        self.try_entry(handle).map_or(0, |e| e.state.loop_count())
    }

    /// Playing and not paused.
    pub fn is_playing(&self, handle: Handle) -> bool {
        self.try_entry(handle).is_ok_and(|e| e.state.is_playing())
    }

    pub fn is_paused(&self, handle: Handle) -> bool {
        self.try_entry(handle).is_ok_and(|e| e.state.is_paused())
    }

    /// Replace the loop callback for a play. Returns false for stale handles.
    pub fn set_loop_callback(&mut self, handle: Handle, callback: LoopCallback<B, P>) -> bool {
        match self.try_entry_mut(handle) {
            Ok(entry) => {
                entry.on_loop = Some(callback);
                true
            }
            Err(_) => false,
        }
    }

    // ----- batch -----------------------------------------------------------

    pub fn active_handles(&self) -> Vec<Handle> {
        let mut out = Vec::with_capacity(self.slots.len());
        self.active_handles_into(&mut out);
        out
    }

    /// Allocation-free variant of [`Scheduler::active_handles`].
    pub fn active_handles_into(&self, out: &mut Vec<Handle>) {
        out.clear();
        out.extend(
            self.slots
                .iter()
                .map(|(i, g, e)| handle_for(i, g, e.state.clip)),
        );
    }

    pub fn batch_set_speed(&mut self, handles: &[Handle], speed: f32) {
        for &handle in handles {
            self.set_speed(handle, speed);
        }
    }

    /// Progress for each handle, in order; stale handles yield 0.
    pub fn batch_get_progress(&self, handles: &[Handle], out: &mut Vec<f32>) {
        out.clear();
        out.extend(handles.iter().map(|&h| self.get_progress(h)));
    }

    // ----- global ----------------------------------------------------------

    /// Scale every play's speed. Clamped to >= 0 and re-applied immediately.
    pub fn set_global_speed(&mut self, speed: f32) {
        self.global_speed = if speed.is_nan() { 0.0 } else { speed.max(0.0) };
        let global = self.global_speed;
        for (index, _, entry) in self.slots.iter_mut() {
            if entry.state.is_playing() {
                apply_speed(global, index, entry);
            }
        }
    }

    /// Create up to `count` pooled resources for `clip` ahead of time.
    pub fn prewarm_clip(&mut self, clip: ClipId, count: usize) -> usize {
        match self.clips.clip(clip) {
            Some(c) => self.pool.prewarm(c, count, &mut self.backend),
            None => {
                log::debug!("scheduler: prewarm of unknown clip {clip:?} ignored");
                0
            }
        }
    }

    // ----- events & triggers -----------------------------------------------

    pub fn on_animation_start(&mut self, listener: impl FnMut(&PlaybackEvent) + 'static) {
        self.events.subscribe(EventKind::Start, Box::new(listener));
    }

    pub fn on_animation_end(&mut self, listener: impl FnMut(&PlaybackEvent) + 'static) {
        self.events.subscribe(EventKind::End, Box::new(listener));
    }

    pub fn on_animation_interrupted(&mut self, listener: impl FnMut(&PlaybackEvent) + 'static) {
        self.events.subscribe(EventKind::Interrupted, Box::new(listener));
    }

    pub fn on_animation_loop(&mut self, listener: impl FnMut(&PlaybackEvent) + 'static) {
        self.events.subscribe(EventKind::Loop, Box::new(listener));
    }

    /// Events emitted since the last drain, oldest first.
    pub fn drain_events(&mut self) -> vec_deque::Drain<'_, PlaybackEvent> {
        self.events.drain()
    }

    pub fn add_time_trigger(
        &mut self,
        clip: ClipId,
        normalized_time: f32,
        callback: impl FnMut(&TriggerHit) + 'static,
    ) -> Result<TriggerId, PlaybackError> {
        self.triggers
            .add_time_trigger(clip, normalized_time, Box::new(callback))
    }

    pub fn add_curve_trigger(
        &mut self,
        clip: ClipId,
        threshold: f32,
        sampler: CurveSampler,
        callback: impl FnMut(&TriggerHit, f32) + 'static,
    ) -> Result<TriggerId, PlaybackError> {
        self.triggers
            .add_curve_trigger(clip, threshold, sampler, Box::new(callback))
    }

    pub fn remove_trigger(&mut self, id: TriggerId) -> bool {
        self.triggers.remove(id)
    }

    // ----- frame update ----------------------------------------------------

    /// Advance every playing slot by `dt` seconds. Call once per frame.
    pub fn tick(&mut self, dt: f32) {
        let dt = if dt.is_finite() && dt > 0.0 { dt } else { 0.0 };

        let mut snapshot = std::mem::take(&mut self.scratch);
        snapshot.clear();
        snapshot.extend(
            self.slots
                .iter()
                .filter(|(_, _, e)| e.state.needs_tick())
                .map(|(i, g, _)| (i, g)),
        );
        for &(index, generation) in &snapshot {
            self.tick_slot(index, generation, dt);
        }
        snapshot.clear();
        self.scratch = snapshot;

        self.drain_queue();
        self.update_idle(dt);
    }

    fn tick_slot(&mut self, index: usize, generation: u32, dt: f32) {
        let global = self.global_speed;
        let min_weight = self.cfg.min_weight;

        let handle = {
            let Some(entry) = self.slots.get_mut(index, generation) else {
                return;
            };
            // An earlier callback this tick may have paused it.
            if !entry.state.needs_tick() {
                return;
            }
            if entry.state.is_playing() {
                let delta = dt * entry.state.speed() * global;
                entry.state.advance(delta);
            }
            handle_for(index, generation, entry.state.clip)
        };

        // Loop / completion processing, one boundary per iteration so every
        // traversal is reported exactly once.
        let mut completed = false;
        loop {
            let Some(entry) = self.slots.get_mut(index, generation) else {
                return;
            };
            match entry.state.cross_boundary() {
                Boundary::Inside => break,
                Boundary::Looped { loop_count, last } => {
                    self.events.emit(PlaybackEvent::Looped {
                        handle,
                        clip: handle.clip,
                        loop_count,
                    });
                    self.run_loop_callback(index, generation, loop_count);
                    if last {
                        self.complete(index, generation);
                        completed = true;
                        break;
                    }
                }
                Boundary::Ended => {
                    self.complete(index, generation);
                    completed = true;
                    break;
                }
            }
        }

        let sample = {
            let Some(entry) = self.slots.get_mut(index, generation) else {
                return;
            };
            if entry.resource.is_valid() {
                entry.resource.set_time(entry.state.time());
            } else {
                log::debug!("scheduler: slot {index} resource invalidated; backend sync skipped");
            }
            SlotSample {
                slot: index,
                handle,
                time: entry.state.time(),
                normalized_time: entry.state.normalized_time(),
                loop_count: entry.state.loop_count(),
            }
        };
        self.triggers.evaluate(&sample);

        let Some(entry) = self.slots.get_mut(index, generation) else {
            return;
        };
        if entry.state.blend.is_fading() {
            let fading_out = entry.state.blend.is_fading_out();
            entry.state.blend.update(dt, min_weight);
            let weight = entry.state.blend.weight();
            if entry.resource.is_valid() {
                self.backend.set_weight(index, weight);
            }
            if fading_out && weight <= min_weight {
                self.release_now(index, generation, Release::Interrupted);
                return;
            }
        }

        if completed
            && self
                .slots
                .get(index, generation)
                .is_some_and(|e| e.state.auto_stop())
        {
            self.release_now(index, generation, Release::Completed);
        }
    }

    /// Natural end of a play: mark it finished, report End and run the
    /// completion callback. The slot stays occupied until released.
    fn complete(&mut self, index: usize, generation: u32) {
        let Some(entry) = self.slots.get_mut(index, generation) else {
            return;
        };
        entry.state.finish();
        if entry.resource.is_valid() {
            entry.resource.set_done(true);
        }
        let clip = entry.state.clip;
        let report = entry.state.take_report();
        let callback = entry.on_complete.take();
        if report {
            self.events.emit(PlaybackEvent::Ended {
                handle: handle_for(index, generation, clip),
                clip,
            });
        }
        if let Some(callback) = callback {
            callback(self);
        }
    }

    fn run_loop_callback(&mut self, index: usize, generation: u32, loop_count: u32) {
        let Some(mut callback) = self
            .slots
            .get_mut(index, generation)
            .and_then(|e| e.on_loop.take())
        else {
            return;
        };
        callback(self, loop_count);
        // Put it back unless the slot changed hands or the callback installed a new one.
        if let Some(entry) = self.slots.get_mut(index, generation) {
            if entry.on_loop.is_none() {
                entry.on_loop = Some(callback);
            }
        }
    }

    fn update_idle(&mut self, dt: f32) {
        if !self.slots.is_empty() {
            self.idle_time = 0.0;
            return;
        }
        self.idle_time += dt;
        if !self.suspended && self.idle_time > self.cfg.idle_suspend_after {
            self.backend.suspend();
            self.suspended = true;
            log::info!(
                "scheduler: idle for {:.3}s, backend suspended",
                self.idle_time
            );
        }
    }

    fn wake_backend(&mut self) {
        self.idle_time = 0.0;
        if self.suspended {
            self.backend.resume();
            self.suspended = false;
            log::info!("scheduler: backend resumed");
        }
    }
}
