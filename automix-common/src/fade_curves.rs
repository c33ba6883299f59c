//! Gain laws for the crossfader
//!
//! A crossfade is driven by a single ratio `r` in [0, 1]. The outgoing
//! side of deck A receives `calculate_fade_out(r)` and deck B receives
//! `calculate_fade_in(r)`.
//!
//! - Linear: `1 - r` / `r`, gains always sum to 1 (baseline law)
//! - SCurve: `0.5 × (1 ± cos(π × r))`, gains also sum to 1
//! - EqualPower: `cos(r × π/2)` / `sin(r × π/2)`, squared gains sum to 1

use serde::{Deserialize, Serialize};
use std::f32::consts::{FRAC_PI_2, PI};

/// Crossfade gain law
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FadeCurve {
    /// Linear: v(r) = r
    /// Constant rate of change, precise and predictable
    #[default]
    Linear,

    /// S-Curve: v(r) = 0.5 × (1 - cos(π × r))
    /// Smooth acceleration and deceleration
    SCurve,

    /// Equal-Power: v(r) = sin(r × π/2)
    /// Constant perceived loudness; gains no longer sum to 1
    EqualPower,
}

impl FadeCurve {
    /// Gain of the incoming side at ratio `position`
    ///
    /// # Arguments
    /// * `position` - Normalized position through fade (0.0 to 1.0)
    ///
    /// # Returns
    /// Volume multiplier (0.0 = silence, 1.0 = full volume)
    pub fn calculate_fade_in(&self, position: f32) -> f32 {
        let t = position.clamp(0.0, 1.0);

        match self {
            FadeCurve::Linear => t,
            FadeCurve::SCurve => 0.5 * (1.0 - (PI * t).cos()),
            FadeCurve::EqualPower => (t * FRAC_PI_2).sin(),
        }
    }

    /// Gain of the outgoing side at ratio `position`
    ///
    /// Exact at the ends: 1.0 at `position == 0.0` and 0.0 at
    /// `position == 1.0`, so a finished fade leaves the silent deck at
    /// exactly zero gain.
    pub fn calculate_fade_out(&self, position: f32) -> f32 {
        let t = position.clamp(0.0, 1.0);
        if t >= 1.0 {
            return 0.0;
        }

        match self {
            FadeCurve::Linear => 1.0 - t,
            FadeCurve::SCurve => 0.5 * (1.0 + (PI * t).cos()),
            FadeCurve::EqualPower => (t * FRAC_PI_2).cos(),
        }
    }

    /// Whether `fade_in + fade_out == 1` holds at every ratio
    pub fn preserves_sum(&self) -> bool {
        !matches!(self, FadeCurve::EqualPower)
    }

    /// Parse curve from a config string
    ///
    /// Accepts `linear`, `s_curve` (`scurve`, `s-curve`, `cosine`) and
    /// `equal_power` (`equalpower`, `constant_power`).
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "linear" => Some(FadeCurve::Linear),
            "cosine" | "scurve" | "s-curve" | "s_curve" => Some(FadeCurve::SCurve),
            "equal_power" | "equalpower" | "constant_power" => Some(FadeCurve::EqualPower),
            _ => None,
        }
    }

    /// Canonical config value
    pub fn as_str(&self) -> &'static str {
        match self {
            FadeCurve::Linear => "linear",
            FadeCurve::SCurve => "s_curve",
            FadeCurve::EqualPower => "equal_power",
        }
    }

    /// Get human-readable display name
    pub fn display_name(&self) -> &'static str {
        match self {
            FadeCurve::Linear => "Linear",
            FadeCurve::SCurve => "S-Curve",
            FadeCurve::EqualPower => "Equal Power",
        }
    }

    /// Get all available fade curve variants
    pub fn all_variants() -> &'static [FadeCurve] {
        &[FadeCurve::Linear, FadeCurve::SCurve, FadeCurve::EqualPower]
    }
}

impl std::fmt::Display for FadeCurve {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}
