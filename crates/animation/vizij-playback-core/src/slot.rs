//! Slot table (generational arena) and the per-slot animation state.

use serde::{Deserialize, Serialize};

use crate::blend::BlendState;
use crate::ids::ClipId;

/// Lengths at or below zero are stepped as if they were this long, so the
/// loop-processing never divides by zero or spins forever.
pub const MIN_LENGTH: f32 = 1e-4;

/// Playback phase of an occupied slot. Fades are tracked separately in
/// [`BlendState`], so a slot can be `Playing` and fading out at once.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    Playing,
    Paused,
    /// Reached its end; waits for release (AutoStop or explicit stop).
    Finished,
}

/// What happened when the time crossed the end of the clip.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Boundary {
    /// Time is within the clip.
    Inside,
    /// One traversal completed on a looping clip. `last` is set when that was
    /// the final permitted loop and the state is now finished.
    Looped { loop_count: u32, last: bool },
    /// Non-looping clip reached its end.
    Ended,
}

/// Everything the scheduler tracks about one playing clip.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnimationState {
    pub clip: ClipId,
    time: f32,
    length: f32,
    speed: f32,
    pub blend: BlendState,
    loop_count: u32,
    /// 0 means loop until stopped.
    max_loops: u32,
    phase: Phase,
    looping: bool,
    auto_stop: bool,
    /// Set once End or Interrupted has been reported for this play.
    reported: bool,
    /// Traversals already wrapped out of `time` but not yet reported.
    #[serde(default)]
    pending_loops: u32,
}

impl AnimationState {
    pub fn new(clip: ClipId, length: f32) -> Self {
        Self {
            clip,
            time: 0.0,
            length,
            speed: 1.0,
            blend: BlendState::full(),
            loop_count: 0,
            max_loops: 0,
            phase: Phase::Playing,
            looping: false,
            auto_stop: true,
            reported: false,
            pending_loops: 0,
        }
    }

    pub fn with_looping(mut self, looping: bool, max_loops: u32) -> Self {
        self.looping = looping;
        self.max_loops = max_loops;
        self
    }

    pub fn with_auto_stop(mut self, auto_stop: bool) -> Self {
        self.auto_stop = auto_stop;
        self
    }

    pub fn with_speed(mut self, speed: f32) -> Self {
        self.set_speed(speed);
        self
    }

    #[inline]
    pub fn time(&self) -> f32 {
        self.time
    }

    #[inline]
    pub fn length(&self) -> f32 {
        self.length
    }

    #[inline]
    fn stepping_length(&self) -> f32 {
        self.length.max(MIN_LENGTH)
    }

    /// Time within the current traversal, in [0, 1]. Degenerate clips report 0.
    pub fn normalized_time(&self) -> f32 {
        if self.length <= 0.0 {
            return 0.0;
        }
        (self.time / self.length).clamp(0.0, 1.0)
    }

    /// Total time played across all completed loops plus the current one.
    pub fn elapsed(&self) -> f32 {
        self.loop_count as f32 * self.stepping_length() + self.time
    }

    #[inline]
    pub fn speed(&self) -> f32 {
        self.speed
    }

    /// Per-clip speed; negative and NaN speeds are clamped to 0.
    pub fn set_speed(&mut self, speed: f32) {
        self.speed = if speed.is_nan() { 0.0 } else { speed.max(0.0) };
    }

    #[inline]
    pub fn loop_count(&self) -> u32 {
        self.loop_count
    }

    #[inline]
    pub fn max_loops(&self) -> u32 {
        self.max_loops
    }

    #[inline]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    #[inline]
    pub fn is_playing(&self) -> bool {
        self.phase == Phase::Playing
    }

    #[inline]
    pub fn is_paused(&self) -> bool {
        self.phase == Phase::Paused
    }

    #[inline]
    pub fn is_finished(&self) -> bool {
        self.phase == Phase::Finished
    }

    #[inline]
    pub fn is_looping(&self) -> bool {
        self.looping
    }

    #[inline]
    pub fn auto_stop(&self) -> bool {
        self.auto_stop
    }

    /// Started and not yet finished, and not on its way out. Used by the queue gate.
    pub fn is_primary(&self) -> bool {
        !self.is_finished() && !self.blend.is_fading_out()
    }

    /// Whether `Scheduler::tick` has work to do for this slot.
    pub fn needs_tick(&self) -> bool {
        match self.phase {
            Phase::Playing => true,
            Phase::Paused => false,
            Phase::Finished => self.blend.is_fading(),
        }
    }

    pub fn pause(&mut self) -> bool {
        if self.phase == Phase::Playing {
            self.phase = Phase::Paused;
            true
        } else {
            false
        }
    }

    pub fn resume(&mut self) -> bool {
        if self.phase == Phase::Paused {
            self.phase = Phase::Playing;
            true
        } else {
            false
        }
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    /// Seek within the current traversal; clamped to [0, length].
    pub fn set_time(&mut self, time: f32) {
        let t = if time.is_nan() { 0.0 } else { time };
        self.time = t.clamp(0.0, self.length.max(0.0));
    }

    pub fn set_progress(&mut self, progress: f32) {
        let p = if progress.is_nan() { 0.0 } else { progress.clamp(0.0, 1.0) };
        self.set_time(p * self.length.max(0.0));
    }

    /// Move time forward by an already-scaled delta.
    pub(crate) fn advance(&mut self, delta: f32) {
        if delta.is_finite() && delta > 0.0 {
            self.time = (self.time + delta).min(f32::MAX);
        }
    }

    /// Resolve at most one end-of-clip crossing. Callers loop until `Inside`
    /// (or a finishing variant) so every traversal is counted exactly once.
    ///
    /// When time has run past the end of a looping clip, all traversals it
    /// covers are counted up front (capped at the loops still permitted) and
    /// time is wrapped once. Each following call then reports one of them.
    pub(crate) fn cross_boundary(&mut self) -> Boundary {
        if self.phase == Phase::Finished {
            return Boundary::Inside;
        }
        if self.pending_loops == 0 {
            let len = self.stepping_length();
            if self.time < len {
                return Boundary::Inside;
            }
            if !self.looping {
                self.time = self.length.max(0.0);
                self.phase = Phase::Finished;
                return Boundary::Ended;
            }
            // `as` saturates, so a huge ratio cannot wrap.
            let mut traversals = ((self.time / len).floor() as u32).max(1);
            if self.max_loops > 0 {
                let remaining = self.max_loops.saturating_sub(self.loop_count).max(1);
                traversals = traversals.min(remaining);
            }
            self.time = self.time.rem_euclid(len);
            self.pending_loops = traversals;
        }

        self.pending_loops -= 1;
        self.loop_count = self.loop_count.saturating_add(1);
        let last = self.max_loops > 0 && self.loop_count >= self.max_loops;
        if last {
            self.time = self.length.max(0.0);
            self.phase = Phase::Finished;
            self.pending_loops = 0;
        }
        Boundary::Looped {
            loop_count: self.loop_count,
            last,
        }
    }

    /// Mark the terminal event as reported; returns false if it already was.
    pub(crate) fn take_report(&mut self) -> bool {
        !std::mem::replace(&mut self.reported, true)
    }

    pub(crate) fn finish(&mut self) {
        self.phase = Phase::Finished;
        self.pending_loops = 0;
    }
}

impl AsRef<AnimationState> for AnimationState {
    fn as_ref(&self) -> &AnimationState {
        self
    }
}

#[derive(Debug)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Fixed-capacity generational arena.
///
/// Each slot carries a generation counter that is bumped on every release, so
/// an `(index, generation)` pair identifies one occupancy of one slot.
#[derive(Debug)]
pub struct SlotTable<T> {
    slots: Vec<Slot<T>>,
    occupied: usize,
}

impl<T> SlotTable<T> {
    pub fn new(capacity: usize) -> Self {
        let mut slots = Vec::with_capacity(capacity);
        slots.resize_with(capacity, || Slot {
            generation: 0,
            value: None,
        });
        Self { slots, occupied: 0 }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.occupied
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.occupied == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.occupied == self.slots.len()
    }

    pub fn find_free(&self) -> Option<usize> {
        self.slots.iter().position(|s| s.value.is_none())
    }

    /// Place `value` in a free slot and return the slot's current generation.
    /// The value is handed back if the slot is out of range or already occupied.
    pub fn occupy(&mut self, index: usize, value: T) -> Result<u32, T> {
        match self.slots.get_mut(index) {
            Some(slot) if slot.value.is_none() => {
                slot.value = Some(value);
                self.occupied += 1;
                Ok(slot.generation)
            }
            _ => Err(value),
        }
    }

    /// Vacate a slot and invalidate its handles.
    pub fn release(&mut self, index: usize, generation: u32) -> Option<T> {
        let slot = self.slots.get_mut(index)?;
        if slot.generation != generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.occupied -= 1;
        Some(value)
    }

    #[inline]
    pub fn is_valid(&self, index: usize, generation: u32) -> bool {
        self.get(index, generation).is_some()
    }

    pub fn get(&self, index: usize, generation: u32) -> Option<&T> {
        self.slots
            .get(index)
            .filter(|s| s.generation == generation)
            .and_then(|s| s.value.as_ref())
    }

    pub fn get_mut(&mut self, index: usize, generation: u32) -> Option<&mut T> {
        self.slots
            .get_mut(index)
            .filter(|s| s.generation == generation)
            .and_then(|s| s.value.as_mut())
    }

    pub fn generation(&self, index: usize) -> Option<u32> {
        self.slots.get(index).map(|s| s.generation)
    }

    /// Occupied slots as `(index, generation, value)`.
    pub fn iter(&self) -> impl Iterator<Item = (usize, u32, &T)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.value.as_ref().map(|v| (i, s.generation, v)))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (usize, u32, &mut T)> {
        self.slots.iter_mut().enumerate().filter_map(|(i, s)| {
            let generation = s.generation;
            s.value.as_mut().map(|v| (i, generation, v))
        })
    }
}

impl<T: AsRef<AnimationState>> SlotTable<T> {
    /// Pick the slot to evict when the table is full.
    ///
    /// Policy, first match wins, ties go to the lowest index:
    /// 1. a slot that is fading out;
    /// 2. a slot that is not playing (paused or finished);
    /// 3. the playing slot with the least elapsed time (loops included).
    pub fn eviction_candidate(&self) -> Option<usize> {
        if let Some((i, _, _)) = self
            .iter()
            .find(|(_, _, v)| v.as_ref().blend.is_fading_out())
        {
            return Some(i);
        }
        if let Some((i, _, _)) = self.iter().find(|(_, _, v)| !v.as_ref().is_playing()) {
            return Some(i);
        }
        let mut best: Option<(usize, f32)> = None;
        for (i, _, v) in self.iter() {
            let elapsed = v.as_ref().elapsed();
            if best.map_or(true, |(_, e)| elapsed < e) {
                best = Some((i, elapsed));
            }
        }
        best.map(|(i, _)| i)
    }
}
