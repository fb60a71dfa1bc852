//! Vizij Playback Core (engine-agnostic)
//!
//! A slot-based playback scheduler for a small, bounded set of clips driving
//! one target: generational slot handles, a per-clip resource pool, weight
//! fades and crossfades, queued sequencing, loop counting and lifecycle
//! events, all advanced by one `Scheduler::tick(dt)` per frame.
//!
//! The renderer side is abstracted behind [`MixingBackend`]; adapters
//! implement it for their engine. [`HeadlessBackend`] records calls and is
//! what tests and benches run against.

pub mod backend;
pub mod blend;
pub mod clip;
pub mod config;
pub mod error;
pub mod events;
pub mod ids;
pub mod options;
pub mod pool;
pub mod scheduler;
pub mod slot;
pub mod triggers;

// Re-exports for consumers (adapters)
pub use backend::{Attachment, BackingResource, HeadlessBackend, HeadlessResource, MixingBackend};
pub use blend::{BlendState, Fade};
pub use clip::{Clip, ClipLibrary, ClipProvider};
pub use config::Config;
pub use error::PlaybackError;
pub use events::{EventKind, PlaybackEvent};
pub use ids::{ClipId, Handle, TriggerId};
pub use options::{PlayMode, PlayOptions};
pub use pool::{PoolStats, ResourcePool};
pub use scheduler::{CompletionCallback, LoopCallback, Scheduler};
pub use slot::{AnimationState, Phase};
pub use triggers::{CurveSampler, TriggerHit};
