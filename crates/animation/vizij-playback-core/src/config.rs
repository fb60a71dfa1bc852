//! Scheduler configuration.

use serde::{Deserialize, Serialize};

use crate::error::PlaybackError;

/// Sizing and tuning knobs for the scheduler.
/// Every field has a default, so partial JSON documents are accepted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Number of concurrent playback slots.
    pub max_slots: usize,
    /// Backing resources kept per clip once returned.
    pub pool_capacity_per_clip: usize,

    /// Fades snap to their target once closer than this; fading-out slots are
    /// released at or below it.
    pub min_weight: f32,

    /// Seconds with no occupied slot before the backend is suspended.
    pub idle_suspend_after: f32,

    pub max_time_triggers: usize,
    pub max_curve_triggers: usize,

    /// Default AutoStop flag for new plays.
    pub auto_stop: bool,
    /// Evict a slot when the table is full instead of refusing the play.
    pub evict_when_full: bool,

    /// Maximum events retained in the pull log before older ones are dropped.
    pub max_events_per_tick: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_slots: 8,
            pool_capacity_per_clip: 4,
            min_weight: 0.001,
            idle_suspend_after: 0.5,
            max_time_triggers: 16,
            max_curve_triggers: 16,
            auto_stop: true,
            evict_when_full: true,
            max_events_per_tick: 256,
        }
    }
}

impl Config {
    /// Parse a (possibly partial) JSON config and validate it.
    pub fn from_json_str(json: &str) -> Result<Self, PlaybackError> {
        let cfg: Config = serde_json::from_str(json)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<(), PlaybackError> {
        if self.max_slots == 0 {
            return Err(PlaybackError::InvalidConfig {
                reason: "max_slots must be at least 1".into(),
            });
        }
        if !(self.min_weight > 0.0 && self.min_weight < 0.5) {
            return Err(PlaybackError::InvalidConfig {
                reason: format!("min_weight must be in (0, 0.5), got {}", self.min_weight),
            });
        }
        if !self.idle_suspend_after.is_finite() || self.idle_suspend_after < 0.0 {
            return Err(PlaybackError::InvalidConfig {
                reason: format!(
                    "idle_suspend_after must be finite and >= 0, got {}",
                    self.idle_suspend_after
                ),
            });
        }
        Ok(())
    }
}
