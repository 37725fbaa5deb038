//! Chroma keying on the CPU.
//!
//! The math here is the reference for `shaders/chroma_key.wgsl`: both
//! compute the mask and the spill blend the same way, step for step.

use glam::{Vec2, Vec3};
use greenroom_core::color::LUMA;
use greenroom_core::{chroma, ChromaKeyParams, MatteCurve};
use rayon::prelude::*;

/// Widths at or below this are treated as a hard edge.
pub const EPSILON: f32 = 1e-6;

/// Map how far a pixel lies past the key cluster (`base`) onto [0, 1].
#[inline]
pub fn ramp(base: f32, width: f32, curve: MatteCurve) -> f32 {
    if width <= EPSILON {
        return if base > 0.0 { 1.0 } else { 0.0 };
    }
    curve.apply((base / width).clamp(0.0, 1.0))
}

/// Chroma key processor for one parameter set.
#[derive(Debug, Clone)]
pub struct ChromaKeyProcessor {
    params: ChromaKeyParams,
    key_uv: Vec2,
}

impl ChromaKeyProcessor {
    /// Build a processor. Parameters are clamped first.
    pub fn new(params: &ChromaKeyParams) -> Self {
        let params = params.clamped();
        Self {
            key_uv: chroma(Vec3::from_array(params.key_color)),
            params,
        }
    }

    pub fn params(&self) -> &ChromaKeyParams {
        &self.params
    }

    /// Opacity for one pixel: 0 is background, 1 is foreground.
    #[inline]
    pub fn mask(&self, rgb: Vec3) -> f32 {
        if self.params.bypass {
            return 1.0;
        }
        ramp(self.base(rgb), self.params.smoothness, self.params.curve)
    }

    #[inline]
    fn base(&self, rgb: Vec3) -> f32 {
        chroma(rgb).distance(self.key_uv) - self.params.similarity
    }

    /// Key one pixel in normalized RGB. Returns the spill-corrected color and
    /// the mask.
    #[inline]
    pub fn shade(&self, rgb: Vec3) -> (Vec3, f32) {
        if self.params.bypass {
            return (rgb, 1.0);
        }
        let base = self.base(rgb);
        let mask = ramp(base, self.params.smoothness, self.params.curve);
        let s = ramp(base, self.params.spill, self.params.curve);
        let luma = rgb.dot(LUMA).clamp(0.0, 1.0);
        let color = Vec3::splat(luma) * (1.0 - s) + rgb * s;
        (color, mask)
    }

    /// Key one RGBA8 pixel. The input alpha is replaced by the mask.
    #[inline]
    pub fn shade_pixel(&self, px: [u8; 4]) -> [u8; 4] {
        if self.params.bypass {
            return [px[0], px[1], px[2], 255];
        }
        let (color, mask) = self.shade(rgb_of(px));
        [quantize(color.x), quantize(color.y), quantize(color.z), quantize(mask)]
    }

    /// Key packed RGBA8 rows of `width` pixels from `src` into `dst`.
    pub fn apply(&self, src: &[u8], dst: &mut [u8], width: u32) {
        let row_bytes = width as usize * 4;
        if row_bytes == 0 {
            return;
        }
        dst.par_chunks_exact_mut(row_bytes)
            .zip(src.par_chunks_exact(row_bytes))
            .for_each(|(out, row)| {
                for (o, px) in out.chunks_exact_mut(4).zip(row.chunks_exact(4)) {
                    o.copy_from_slice(&self.shade_pixel([px[0], px[1], px[2], px[3]]));
                }
            });
    }

    /// Extract the matte (alpha mask) of a packed RGBA8 frame.
    pub fn extract_matte(frame: &[u8], w: u32, h: u32, params: &ChromaKeyParams) -> Vec<f32> {
        let keyer = Self::new(params);
        let size = w as usize * h as usize;
        frame
            .par_chunks_exact(4)
            .take(size)
            .map(|px| keyer.mask(rgb_of([px[0], px[1], px[2], px[3]])))
            .collect()
    }

    /// Composite a keyed foreground over an opaque background.
    /// All buffers are packed RGBA8 of the same size.
    pub fn composite_over(fg: &[u8], bg: &[u8], out: &mut [u8]) {
        out.par_chunks_exact_mut(4)
            .zip(fg.par_chunks_exact(4))
            .zip(bg.par_chunks_exact(4))
            .for_each(|((o, f), b)| {
                let alpha = f[3] as f32 / 255.0;
                for c in 0..3 {
                    o[c] = (f[c] as f32 * alpha + b[c] as f32 * (1.0 - alpha)).round() as u8;
                }
                o[3] = 255;
            });
    }
}

#[inline]
fn rgb_of(px: [u8; 4]) -> Vec3 {
    Vec3::new(px[0] as f32, px[1] as f32, px[2] as f32) / 255.0
}

#[inline]
fn quantize(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0).round() as u8
}
