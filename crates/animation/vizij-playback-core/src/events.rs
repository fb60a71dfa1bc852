//! Playback events.
//!
//! Events are delivered two ways: synchronously to registered listeners, and
//! into a bounded log the host drains once per frame (the same shape as the
//! animation engine's per-tick `Outputs.events`).

use std::collections::vec_deque::{self, VecDeque};

use serde::{Deserialize, Serialize};

use crate::ids::{ClipId, Handle};

/// Discrete lifecycle signals emitted by the scheduler.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[non_exhaustive]
pub enum PlaybackEvent {
    Started {
        handle: Handle,
        clip: ClipId,
    },
    /// Finished naturally or stopped explicitly.
    Ended {
        handle: Handle,
        clip: ClipId,
    },
    /// Cut short by a Single play, a completed fade-out, eviction or shutdown.
    Interrupted {
        handle: Handle,
        clip: ClipId,
    },
    Looped {
        handle: Handle,
        clip: ClipId,
        loop_count: u32,
    },
}

impl PlaybackEvent {
    pub fn handle(&self) -> Handle {
        match self {
            Self::Started { handle, .. }
            | Self::Ended { handle, .. }
            | Self::Interrupted { handle, .. }
            | Self::Looped { handle, .. } => *handle,
        }
    }

    pub fn kind(&self) -> EventKind {
        match self {
            Self::Started { .. } => EventKind::Start,
            Self::Ended { .. } => EventKind::End,
            Self::Interrupted { .. } => EventKind::Interrupted,
            Self::Looped { .. } => EventKind::Loop,
        }
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Start,
    End,
    Interrupted,
    Loop,
}

pub type EventListener = Box<dyn FnMut(&PlaybackEvent)>;

/// Listener lists plus the pull-model event log.
#[derive(Default)]
pub struct EventHub {
    on_start: Vec<EventListener>,
    on_end: Vec<EventListener>,
    on_interrupted: Vec<EventListener>,
    on_loop: Vec<EventListener>,
    log: VecDeque<PlaybackEvent>,
    log_capacity: usize,
    dropped: usize,
}

impl std::fmt::Debug for EventHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventHub")
            .field("listeners", &self.listener_count())
            .field("log", &self.log)
            .field("dropped", &self.dropped)
            .finish()
    }
}

impl EventHub {
    pub fn new(log_capacity: usize) -> Self {
        Self {
            log: VecDeque::with_capacity(log_capacity),
            log_capacity,
            ..Self::default()
        }
    }

    pub fn subscribe(&mut self, kind: EventKind, listener: EventListener) {
        match kind {
            EventKind::Start => self.on_start.push(listener),
            EventKind::End => self.on_end.push(listener),
            EventKind::Interrupted => self.on_interrupted.push(listener),
            EventKind::Loop => self.on_loop.push(listener),
        }
    }

    pub fn listener_count(&self) -> usize {
        self.on_start.len() + self.on_end.len() + self.on_interrupted.len() + self.on_loop.len()
    }

    pub fn emit(&mut self, event: PlaybackEvent) {
        let listeners = match event.kind() {
            EventKind::Start => &mut self.on_start,
            EventKind::End => &mut self.on_end,
            EventKind::Interrupted => &mut self.on_interrupted,
            EventKind::Loop => &mut self.on_loop,
        };
        for listener in listeners.iter_mut() {
            listener(&event);
        }
        if self.log_capacity == 0 {
            return;
        }
        if self.log.len() >= self.log_capacity {
            if self.dropped == 0 {
                log::warn!(
                    "events: log full ({} entries), dropping oldest until drained",
                    self.log_capacity
                );
            }
            self.dropped += 1;
            self.log.pop_front();
        }
        self.log.push_back(event);
    }

    /// Events since the last drain, oldest first.
    pub fn drain(&mut self) -> vec_deque::Drain<'_, PlaybackEvent> {
        self.dropped = 0;
        self.log.drain(..)
    }

    #[inline]
    pub fn pending(&self) -> &VecDeque<PlaybackEvent> {
        &self.log
    }

    /// Events discarded since the last drain because the log was full.
    #[inline]
    pub fn dropped(&self) -> usize {
        self.dropped
    }
}
