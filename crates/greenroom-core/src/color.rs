//! Color types and the chroma projection used for keying.

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

/// Projection of RGB onto the blue-difference chroma axis (offset by 0.5).
pub const CHROMA_U: Vec3 = Vec3::new(-0.169, -0.331, 0.5);
/// Projection of RGB onto the red-difference chroma axis (offset by 0.5).
pub const CHROMA_V: Vec3 = Vec3::new(0.5, -0.419, -0.081);
/// Rec. 709 luma weights.
pub const LUMA: Vec3 = Vec3::new(0.2126, 0.7152, 0.0722);

/// RGBA color with 32-bit float components.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, Pod, Zeroable)]
#[repr(C)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    /// Create a new color from RGBA components.
    #[inline]
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Create a color from RGB with alpha = 1.0.
    #[inline]
    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Create a color from 8-bit RGBA values.
    #[inline]
    pub fn from_rgba8(rgba: [u8; 4]) -> Self {
        Self {
            r: rgba[0] as f32 / 255.0,
            g: rgba[1] as f32 / 255.0,
            b: rgba[2] as f32 / 255.0,
            a: rgba[3] as f32 / 255.0,
        }
    }

    /// Convert to 8-bit RGBA with rounding.
    #[inline]
    pub fn to_rgba8(self) -> [u8; 4] {
        let q = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        [q(self.r), q(self.g), q(self.b), q(self.a)]
    }

    /// RGB components as a vector.
    #[inline]
    pub fn rgb_vec(self) -> Vec3 {
        Vec3::new(self.r, self.g, self.b)
    }

    /// Luminance (perceived brightness), clamped to [0, 1].
    #[inline]
    pub fn luminance(self) -> f32 {
        self.rgb_vec().dot(LUMA).clamp(0.0, 1.0)
    }

    pub const BLACK: Self = Self::new(0.0, 0.0, 0.0, 1.0);
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0, 1.0);
    pub const TRANSPARENT: Self = Self::new(0.0, 0.0, 0.0, 0.0);
    pub const RED: Self = Self::new(1.0, 0.0, 0.0, 1.0);
    pub const GREEN: Self = Self::new(0.0, 1.0, 0.0, 1.0);
    pub const BLUE: Self = Self::new(0.0, 0.0, 1.0, 1.0);
}

/// Project an RGB color onto the luminance-free chroma plane.
///
/// Both components land in [0, 1] for RGB in [0, 1]. Two colors that differ
/// only in brightness along the gray axis map to the same point.
#[inline]
pub fn chroma(rgb: Vec3) -> Vec2 {
    Vec2::new(rgb.dot(CHROMA_U) + 0.5, rgb.dot(CHROMA_V) + 0.5)
}

/// Chroma-plane distance between two RGB colors.
#[inline]
pub fn chroma_distance(a: Vec3, b: Vec3) -> f32 {
    chroma(a).distance(chroma(b))
}
