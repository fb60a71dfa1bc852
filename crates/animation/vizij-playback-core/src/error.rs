//! Error types for the playback scheduler.
//!
//! None of these are fatal. The public playback surface absorbs them (default
//! value, no-op, or `Handle::INVALID`); the `try_*` entry points return them.

use crate::ids::ClipId;

#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum PlaybackError {
    /// Stale generation or out-of-range slot index.
    #[error("Invalid handle: slot {slot}, generation {generation}")]
    InvalidHandle { slot: u32, generation: u32 },

    /// Every slot is occupied and eviction is disabled.
    #[error("No free slot (capacity {capacity})")]
    NoFreeSlot { capacity: usize },

    /// Clip id not known to the clip provider.
    #[error("Clip not found: {0:?}")]
    MissingClip(ClipId),

    #[error("Playback queue is full (capacity {capacity})")]
    QueueFull { capacity: usize },

    #[error("Trigger registry is full (capacity {capacity})")]
    TriggerRegistryFull { capacity: usize },

    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("Config parse error: {0}")]
    ConfigParse(#[from] serde_json::Error),
}

impl PlaybackError {
    /// Check if this error only means "the handle no longer refers to anything".
    #[inline]
    pub fn is_stale_handle(&self) -> bool {
        matches!(self, Self::InvalidHandle { .. })
    }
}
