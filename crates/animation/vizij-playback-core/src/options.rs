//! Play modes and per-play options.

use serde::{Deserialize, Serialize};

/// How a new play interacts with what is already playing.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlayMode {
    /// Interrupt every active slot, then play.
    Single,
    /// Play alongside the active slots.
    Additive,
    /// Wait until no primary slot is playing, in FIFO order.
    Queue,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PlayOptions {
    pub mode: PlayMode,
    /// Start at weight 0 and fade in over this many seconds.
    #[serde(default)]
    pub fade_in: Option<f32>,
    /// `None` plays once. `Some(n)` loops; `n <= 0` loops until stopped,
    /// `n > 0` completes after exactly `n` traversals.
    #[serde(default)]
    pub loops: Option<i32>,
    /// Overrides `Config::auto_stop` for this play.
    #[serde(default)]
    pub auto_stop: Option<bool>,
    #[serde(default = "default_speed")]
    pub speed: f32,
}

fn default_speed() -> f32 {
    1.0
}

impl Default for PlayOptions {
    fn default() -> Self {
        Self {
            mode: PlayMode::Single,
            fade_in: None,
            loops: None,
            auto_stop: None,
            speed: 1.0,
        }
    }
}

impl PlayOptions {
    pub fn with_mode(mut self, mode: PlayMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_fade_in(mut self, seconds: f32) -> Self {
        self.fade_in = Some(seconds);
        self
    }

    pub fn looped(mut self, loops: i32) -> Self {
        self.loops = Some(loops);
        self
    }

    pub fn with_auto_stop(mut self, auto_stop: bool) -> Self {
        self.auto_stop = Some(auto_stop);
        self
    }

    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed = speed;
        self
    }

    /// `(looping, max_loops)` with 0 meaning unbounded.
    pub(crate) fn loop_settings(&self) -> (bool, u32) {
        match self.loops {
            None => (false, 0),
            Some(n) if n <= 0 => (true, 0),
            Some(n) => (true, n as u32),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loop_settings_mapping() {
        assert_eq!(PlayOptions::default().loop_settings(), (false, 0));
        assert_eq!(PlayOptions::default().looped(0).loop_settings(), (true, 0));
        assert_eq!(PlayOptions::default().looped(-3).loop_settings(), (true, 0));
        assert_eq!(PlayOptions::default().looped(4).loop_settings(), (true, 4));
    }

    #[test]
    fn options_deserialize_with_defaults() {
        let opts: PlayOptions =
            serde_json::from_str(r#"{ "mode": "Additive", "fade_in": 0.25 }"#).unwrap();
        assert_eq!(opts.mode, PlayMode::Additive);
        assert_eq!(opts.fade_in, Some(0.25));
        assert_eq!(opts.speed, 1.0);
        assert_eq!(opts.loops, None);
    }
}
