//! Weight fader shared by every slot.

use serde::{Deserialize, Serialize};

/// Direction of an in-progress fade.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Fade {
    None,
    In,
    Out,
}

/// Current/target weight pair with a linear ramp between them.
#[derive(Copy, Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BlendState {
    weight: f32,
    target: f32,
    /// Weight units per second. Infinite means "snap on next update".
    rate: f32,
    fade: Fade,
}

impl Default for BlendState {
    fn default() -> Self {
        Self::full()
    }
}

impl BlendState {
    pub fn full() -> Self {
        Self {
            weight: 1.0,
            target: 1.0,
            rate: 0.0,
            fade: Fade::None,
        }
    }

    #[inline]
    pub fn weight(&self) -> f32 {
        self.weight
    }

    #[inline]
    pub fn target(&self) -> f32 {
        self.target
    }

    #[inline]
    pub fn fade(&self) -> Fade {
        self.fade
    }

    #[inline]
    pub fn is_fading(&self) -> bool {
        self.fade != Fade::None
    }

    #[inline]
    pub fn is_fading_out(&self) -> bool {
        self.fade == Fade::Out
    }

    /// Set the weight immediately, cancelling any fade.
    pub fn set_weight(&mut self, weight: f32) {
        let w = clamp_weight(weight);
        self.weight = w;
        self.target = w;
        self.rate = 0.0;
        self.fade = Fade::None;
    }

    pub fn start_fade_in(&mut self, duration: f32) {
        self.fade_to(1.0, duration);
    }

    /// Always marks the state as fading out, even when the weight is already 0.
    pub fn start_fade_out(&mut self, duration: f32) {
        self.fade_to(0.0, duration);
        self.fade = Fade::Out;
    }

    /// Ramp toward `target` over `duration` seconds of full-rate weight travel.
    /// A non-positive duration snaps on the next update. A target of 0 is
    /// always a fade-out.
    pub fn fade_to(&mut self, target: f32, duration: f32) {
        self.target = clamp_weight(target);
        self.rate = if duration > 0.0 {
            1.0 / duration
        } else {
            f32::INFINITY
        };
        self.fade = if self.target < self.weight || self.target == 0.0 {
            Fade::Out
        } else {
            Fade::In
        };
    }

    /// Advance the ramp by `dt`. Returns true when the fade finished this call.
    pub fn update(&mut self, dt: f32, min_weight: f32) -> bool {
        if self.fade == Fade::None {
            return false;
        }
        let dist = self.target - self.weight;
        let step = self.rate * dt.max(0.0);
        // Infinite rate with dt == 0 would produce NaN, so snap explicitly.
        if !self.rate.is_finite() || dist.abs() <= step {
            self.weight = self.target;
        } else {
            self.weight = clamp_weight(self.weight + step.copysign(dist));
        }
        if (self.target - self.weight).abs() < min_weight {
            self.weight = self.target;
            self.fade = Fade::None;
            self.rate = 0.0;
            return true;
        }
        false
    }
}

#[inline]
fn clamp_weight(w: f32) -> f32 {
    if w.is_nan() {
        0.0
    } else {
        w.clamp(0.0, 1.0)
    }
}
