use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

/// Easing curves used by tweens and camera pans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Ease {
    #[default]
    Linear,
    SineInOut,
    QuadOut,
    /// Decelerating cubic; the player movement curve.
    CubicOut,
}

impl Ease {
    /// Map normalized time `t` (clamped to `[0, 1]`) to eased progress.
    pub fn apply(self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Self::Linear => t,
            Self::SineInOut => -((PI * t).cos() - 1.0) / 2.0,
            Self::QuadOut => 1.0 - (1.0 - t) * (1.0 - t),
            Self::CubicOut => 1.0 - (1.0 - t).powi(3),
        }
    }
}
