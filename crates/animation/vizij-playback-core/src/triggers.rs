//! Time- and threshold-based triggers sampled from slot state each tick.

use crate::error::PlaybackError;
use crate::ids::{ClipId, Handle, IdAllocator, TriggerId};

/// Passed to trigger callbacks.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct TriggerHit {
    pub trigger: TriggerId,
    pub handle: Handle,
    pub clip: ClipId,
    /// Clip-local time in seconds at the sample that fired.
    pub time: f32,
    pub normalized_time: f32,
}

pub type TimeTriggerFn = Box<dyn FnMut(&TriggerHit)>;
/// External per-frame scalar function: `(clip, clip_time) -> value`.
pub type CurveSampler = Box<dyn Fn(ClipId, f32) -> f32>;
pub type CurveTriggerFn = Box<dyn FnMut(&TriggerHit, f32)>;

/// Snapshot of one slot handed to [`TriggerRegistry::evaluate`].
#[derive(Copy, Clone, Debug)]
pub struct SlotSample {
    pub slot: usize,
    pub handle: Handle,
    pub time: f32,
    pub normalized_time: f32,
    pub loop_count: u32,
}

struct TimeTrigger {
    id: TriggerId,
    clip: ClipId,
    at: f32,
    callback: TimeTriggerFn,
    /// Per slot: the (generation, loop_count) cycle this trigger last fired in.
    fired: Vec<Option<(u32, u32)>>,
}

struct CurveTrigger {
    id: TriggerId,
    clip: ClipId,
    threshold: f32,
    sampler: CurveSampler,
    callback: CurveTriggerFn,
    /// Per slot: previous sample, tagged with the slot generation it belongs to.
    previous: Vec<Option<(u32, f32)>>,
}

pub struct TriggerRegistry {
    ids: IdAllocator,
    slots: usize,
    time: Vec<TimeTrigger>,
    time_capacity: usize,
    curve: Vec<CurveTrigger>,
    curve_capacity: usize,
}

impl std::fmt::Debug for TriggerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriggerRegistry")
            .field("time", &self.time.len())
            .field("curve", &self.curve.len())
            .finish()
    }
}

impl TriggerRegistry {
    pub fn new(slots: usize, time_capacity: usize, curve_capacity: usize) -> Self {
        Self {
            ids: IdAllocator::new(),
            slots,
            time: Vec::with_capacity(time_capacity),
            time_capacity,
            curve: Vec::with_capacity(curve_capacity),
            curve_capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.time.len() + self.curve.len()
    }

    pub fn is_empty(&self) -> bool {
        self.time.is_empty() && self.curve.is_empty()
    }

    /// Fire `callback` once per play cycle when the clip's normalized time
    /// reaches `at` (clamped to [0, 1]).
    pub fn add_time_trigger(
        &mut self,
        clip: ClipId,
        at: f32,
        callback: TimeTriggerFn,
    ) -> Result<TriggerId, PlaybackError> {
        if self.time.len() >= self.time_capacity {
            return Err(PlaybackError::TriggerRegistryFull {
                capacity: self.time_capacity,
            });
        }
        let id = self.ids.alloc_trigger();
        self.time.push(TimeTrigger {
            id,
            clip,
            at: if at.is_nan() { 0.0 } else { at.clamp(0.0, 1.0) },
            callback,
            fired: vec![None; self.slots],
        });
        Ok(id)
    }

    /// Fire `callback` with the sampled value whenever `sampler` rises from
    /// below `threshold` to at or above it between two consecutive ticks.
    pub fn add_curve_trigger(
        &mut self,
        clip: ClipId,
        threshold: f32,
        sampler: CurveSampler,
        callback: CurveTriggerFn,
    ) -> Result<TriggerId, PlaybackError> {
        if self.curve.len() >= self.curve_capacity {
            return Err(PlaybackError::TriggerRegistryFull {
                capacity: self.curve_capacity,
            });
        }
        let id = self.ids.alloc_trigger();
        self.curve.push(CurveTrigger {
            id,
            clip,
            threshold,
            sampler,
            callback,
            previous: vec![None; self.slots],
        });
        Ok(id)
    }

    pub fn remove(&mut self, id: TriggerId) -> bool {
        let before = self.len();
        self.time.retain(|t| t.id != id);
        self.curve.retain(|c| c.id != id);
        self.len() != before
    }

    pub fn clear(&mut self) {
        self.time.clear();
        self.curve.clear();
    }

    pub fn evaluate(&mut self, s: &SlotSample) {
        let clip = s.handle.clip;
        for t in self.time.iter_mut().filter(|t| t.clip == clip) {
            let Some(fired) = t.fired.get_mut(s.slot) else {
                continue;
            };
            // Rewound well before the trigger (seek or restart): rearm.
            if fired.is_some() && s.normalized_time < t.at * 0.5 {
                *fired = None;
            }
            let cycle = (s.handle.generation, s.loop_count);
            if s.normalized_time >= t.at && *fired != Some(cycle) {
                *fired = Some(cycle);
                (t.callback)(&TriggerHit {
                    trigger: t.id,
                    handle: s.handle,
                    clip,
                    time: s.time,
                    normalized_time: s.normalized_time,
                });
            }
        }

        for c in self.curve.iter_mut().filter(|c| c.clip == clip) {
            let Some(previous) = c.previous.get_mut(s.slot) else {
                continue;
            };
            let value = (c.sampler)(clip, s.time);
            if let Some((generation, prev)) = *previous {
                if generation == s.handle.generation && prev < c.threshold && value >= c.threshold
                {
                    (c.callback)(
                        &TriggerHit {
                            trigger: c.id,
                            handle: s.handle,
                            clip,
                            time: s.time,
                            normalized_time: s.normalized_time,
                        },
                        value,
                    );
                }
            }
            *previous = Some((s.handle.generation, value));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    fn sample(generation: u32, normalized: f32, loop_count: u32) -> SlotSample {
        SlotSample {
            slot: 0,
            handle: Handle {
                slot: 0,
                generation,
                clip: ClipId(1),
            },
            time: normalized * 2.0,
            normalized_time: normalized,
            loop_count,
        }
    }

    #[test]
    fn time_trigger_fires_once_per_cycle() {
        let mut reg = TriggerRegistry::new(1, 4, 4);
        let hits = Rc::new(RefCell::new(Vec::new()));
        let h = hits.clone();
        reg.add_time_trigger(
            ClipId(1),
            0.5,
            Box::new(move |hit| h.borrow_mut().push(hit.normalized_time)),
        )
        .unwrap();

        reg.evaluate(&sample(0, 0.2, 0));
        reg.evaluate(&sample(0, 0.6, 0));
        reg.evaluate(&sample(0, 0.9, 0));
        assert_eq!(hits.borrow().len(), 1);

        // Next loop cycle fires again.
        reg.evaluate(&sample(0, 0.1, 1));
        reg.evaluate(&sample(0, 0.7, 1));
        assert_eq!(hits.borrow().len(), 2);

        // Seek back below half the trigger time rearms within the same cycle.
        reg.evaluate(&sample(0, 0.2, 1));
        reg.evaluate(&sample(0, 0.55, 1));
        assert_eq!(hits.borrow().len(), 3);
    }

    #[test]
    fn other_clips_are_ignored() {
        let mut reg = TriggerRegistry::new(1, 4, 4);
        let hits = Rc::new(RefCell::new(0));
        let h = hits.clone();
        reg.add_time_trigger(ClipId(9), 0.0, Box::new(move |_| *h.borrow_mut() += 1))
            .unwrap();
        reg.evaluate(&sample(0, 0.5, 0));
        assert_eq!(*hits.borrow(), 0);
    }

    #[test]
    fn curve_trigger_fires_on_rising_edge_only() {
        let mut reg = TriggerRegistry::new(1, 4, 4);
        let values = Rc::new(RefCell::new(Vec::new()));
        let v = values.clone();
        // value == clip time
        reg.add_curve_trigger(
            ClipId(1),
            1.0,
            Box::new(|_, t| t),
            Box::new(move |_, value| v.borrow_mut().push(value)),
        )
        .unwrap();

        reg.evaluate(&sample(0, 0.25, 0)); // 0.5, baseline
        reg.evaluate(&sample(0, 0.6, 0)); // 1.2, rising edge
        reg.evaluate(&sample(0, 0.9, 0)); // 1.8, still above
        reg.evaluate(&sample(0, 0.1, 1)); // 0.2, falls
        reg.evaluate(&sample(0, 0.5, 1)); // 1.0, rising edge again
        assert_eq!(values.borrow().len(), 2);
        assert!((values.borrow()[1] - 1.0).abs() < 1e-6);

        // A new occupant of the slot starts from a fresh baseline.
        reg.evaluate(&sample(1, 0.9, 0));
        assert_eq!(values.borrow().len(), 2);
    }

    #[test]
    fn capacity_and_removal() {
        let mut reg = TriggerRegistry::new(1, 1, 0);
        let id = reg.add_time_trigger(ClipId(1), 0.5, Box::new(|_| {})).unwrap();
        assert!(matches!(
            reg.add_time_trigger(ClipId(1), 0.5, Box::new(|_| {})),
            Err(PlaybackError::TriggerRegistryFull { capacity: 1 })
        ));
        assert!(reg
            .add_curve_trigger(ClipId(1), 0.5, Box::new(|_, _| 0.0), Box::new(|_, _| {}))
            .is_err());
        assert!(reg.remove(id));
        assert!(!reg.remove(id));
        assert!(reg.is_empty());
    }
}
