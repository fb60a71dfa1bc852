//! Identifiers, generational handles and simple allocators.

use serde::{Deserialize, Serialize};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct ClipId(pub u32);

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct TriggerId(pub u32);

/// Opaque reference to a playback slot.
///
/// A handle is valid while the slot it names is occupied and still carries the
/// same generation. Releasing a slot bumps its generation, so every handle
/// issued for the previous occupant goes stale.
///
/// Handles returned for queued plays are provisional: they name
/// [`Handle::INVALID_SLOT`] and carry the queue ticket in `generation`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct Handle {
    pub slot: u32,
    pub generation: u32,
    pub clip: ClipId,
}

impl Handle {
    pub const INVALID_SLOT: u32 = u32::MAX;

    pub const INVALID: Handle = Handle {
        slot: Self::INVALID_SLOT,
        generation: 0,
        clip: ClipId(u32::MAX),
    };

    #[inline]
    pub(crate) fn queued(ticket: u32, clip: ClipId) -> Self {
        Self {
            slot: Self::INVALID_SLOT,
            generation: ticket,
            clip,
        }
    }

    /// True when the handle names a slot index (it may still be stale).
    #[inline]
    pub fn is_bound(&self) -> bool {
        self.slot != Self::INVALID_SLOT
    }

    /// True for handles handed out by `PlayMode::Queue` that wait for a slot.
    #[inline]
    pub fn is_provisional(&self) -> bool {
        !self.is_bound() && self.generation != 0
    }
}

impl Default for Handle {
    fn default() -> Self {
        Self::INVALID
    }
}

/// Monotonic allocator for ClipId, TriggerId and queue tickets.
/// Tickets start at 1 so that a zero generation never looks provisional.
#[derive(Debug)]
pub struct IdAllocator {
    next_clip: u32,
    next_trigger: u32,
    next_ticket: u32,
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self {
            next_clip: 0,
            next_trigger: 0,
            next_ticket: 1,
        }
    }
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn alloc_clip(&mut self) -> ClipId {
        let id = ClipId(self.next_clip);
        self.next_clip = self.next_clip.wrapping_add(1);
        id
    }

    #[inline]
    pub fn alloc_trigger(&mut self) -> TriggerId {
        let id = TriggerId(self.next_trigger);
        self.next_trigger = self.next_trigger.wrapping_add(1);
        id
    }

    #[inline]
    pub fn alloc_ticket(&mut self) -> u32 {
        let ticket = self.next_ticket;
        self.next_ticket = self.next_ticket.wrapping_add(1).max(1);
        ticket
    }

    #[inline]
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_monotonic() {
        let mut alloc = IdAllocator::new();
        assert_eq!(alloc.alloc_clip(), ClipId(0));
        assert_eq!(alloc.alloc_clip(), ClipId(1));
        assert_eq!(alloc.alloc_trigger(), TriggerId(0));
        assert_eq!(alloc.alloc_ticket(), 1);
        assert_eq!(alloc.alloc_ticket(), 2);
        alloc.reset();
        assert_eq!(alloc.alloc_clip(), ClipId(0));
    }

    #[test]
    fn tickets_skip_zero_on_wrap() {
        let mut alloc = IdAllocator {
            next_ticket: u32::MAX,
            ..IdAllocator::default()
        };
        assert_eq!(alloc.alloc_ticket(), u32::MAX);
        assert_eq!(alloc.alloc_ticket(), 1);
    }

    #[test]
    fn invalid_and_queued_handles() {
        assert!(!Handle::INVALID.is_bound());
        assert!(!Handle::INVALID.is_provisional());
        let q = Handle::queued(7, ClipId(3));
        assert!(q.is_provisional());
        assert_eq!(q.clip, ClipId(3));
    }
}
