//! Chroma-key tuning parameters.

use serde::{Deserialize, Serialize};

/// Range of the exponent accepted by [`MatteCurve::Power`].
pub const POWER_EXPONENT_RANGE: (f32, f32) = (0.25, 4.0);

/// Shape of the ramp between "inside the key cluster" and "outside it".
///
/// Both shapes map 0 to 0 and 1 to 1 and are monotonic in between.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatteCurve {
    /// Hermite smoothstep `t²(3 - 2t)`.
    #[default]
    Smoothstep,
    /// `t^exponent`; 1.0 is a linear ramp, 1.5 a gentle ease-in.
    Power(f32),
}

impl MatteCurve {
    /// Evaluate the curve for `t` already clamped to [0, 1].
    #[inline]
    pub fn apply(self, t: f32) -> f32 {
        if t <= 0.0 {
            return 0.0;
        }
        if t >= 1.0 {
            return 1.0;
        }
        match self {
            Self::Smoothstep => t * t * (3.0 - 2.0 * t),
            Self::Power(e) => t.powf(e),
        }
    }

    fn clamped(self) -> Self {
        match self {
            Self::Smoothstep => Self::Smoothstep,
            Self::Power(e) if e.is_nan() => Self::Power(1.0),
            Self::Power(e) => Self::Power(e.clamp(POWER_EXPONENT_RANGE.0, POWER_EXPONENT_RANGE.1)),
        }
    }
}

/// Parameters for chroma-key extraction.
///
/// Values outside their documented ranges are clamped by [`clamped`], never
/// rejected.
///
/// [`clamped`]: ChromaKeyParams::clamped
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChromaKeyParams {
    /// Background color to remove, RGB in [0, 1].
    pub key_color: [f32; 3],
    /// Chroma distance below which a pixel is background (0.0-1.0).
    pub similarity: f32,
    /// Width of the transition band past `similarity` (0.0-1.0).
    pub smoothness: f32,
    /// Width of the desaturation band past `similarity` (0.0-1.0).
    pub spill: f32,
    /// Show the raw frame at full opacity.
    pub bypass: bool,
    /// Ramp shape used for both the mask and the spill band.
    pub curve: MatteCurve,
}

impl Default for ChromaKeyParams {
    fn default() -> Self {
        Self::green_screen()
    }
}

#[inline]
fn unit(v: f32) -> f32 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

impl ChromaKeyParams {
    /// Green screen default.
    pub fn green_screen() -> Self {
        Self {
            key_color: [0.0, 1.0, 0.0],
            similarity: 0.4,
            smoothness: 0.08,
            spill: 0.15,
            bypass: false,
            curve: MatteCurve::Smoothstep,
        }
    }

    /// Blue screen default.
    pub fn blue_screen() -> Self {
        Self {
            key_color: [0.0, 0.0, 1.0],
            similarity: 0.35,
            smoothness: 0.1,
            spill: 0.2,
            ..Self::green_screen()
        }
    }

    /// Copy with every numeric field clamped into its documented range.
    /// NaN becomes the lower bound (1.0 for the curve exponent).
    pub fn clamped(self) -> Self {
        Self {
            key_color: self.key_color.map(unit),
            similarity: unit(self.similarity),
            smoothness: unit(self.smoothness),
            spill: unit(self.spill),
            bypass: self.bypass,
            curve: self.curve.clamped(),
        }
    }

    /// Whether every numeric field already lies in its documented range.
    pub fn is_in_range(&self) -> bool {
        let in_unit = |v: f32| (0.0..=1.0).contains(&v);
        let curve_ok = match self.curve {
            MatteCurve::Smoothstep => true,
            MatteCurve::Power(e) => (POWER_EXPONENT_RANGE.0..=POWER_EXPONENT_RANGE.1).contains(&e),
        };
        self.key_color.iter().all(|&c| in_unit(c))
            && in_unit(self.similarity)
            && in_unit(self.smoothness)
            && in_unit(self.spill)
            && curve_ok
    }
}
