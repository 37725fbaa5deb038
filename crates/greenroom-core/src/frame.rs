//! Decoded video frames in CPU memory.
//!
//! A [`VideoFrame`] is produced by a frame source, moved to the render loop,
//! borrowed by exactly one upload call and then dropped.

use crate::error::{GreenroomError, Result};
use crate::memory_budget::MAX_FRAME_DIMENSION;
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::time::Duration;

/// Pixel format enumeration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum PixelFormat {
    /// 8-bit RGBA (32 bits per pixel)
    #[default]
    Rgba8,
    /// 8-bit BGRA, common for capture devices. Swizzled on upload.
    Bgra8,
    /// 8-bit grayscale. Not accepted by the keyer.
    Gray8,
}

impl PixelFormat {
    /// Bytes per pixel.
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            Self::Rgba8 | Self::Bgra8 => 4,
            Self::Gray8 => 1,
        }
    }

    /// Whether the upload stage can consume this format (natively or by
    /// conversion).
    pub fn is_uploadable(self) -> bool {
        matches!(self, Self::Rgba8 | Self::Bgra8)
    }
}

/// A plane of pixel data with stride information.
#[derive(Debug, Clone)]
pub struct FramePlane {
    /// Raw pixel data
    pub data: Vec<u8>,
    /// Bytes per row (may include padding)
    pub stride: usize,
}

impl FramePlane {
    /// Create a zeroed plane with a 64-byte aligned stride.
    pub fn new(width: u32, height: u32, bytes_per_pixel: usize) -> Self {
        let min_stride = (width as usize) * bytes_per_pixel;
        let stride = (min_stride + 63) & !63;
        Self {
            data: vec![0u8; stride * height as usize],
            stride,
        }
    }

    /// Wrap tightly packed pixel data.
    pub fn packed(data: Vec<u8>, width: u32, bytes_per_pixel: usize) -> Self {
        Self {
            data,
            stride: width as usize * bytes_per_pixel,
        }
    }
}

/// A decoded video frame for one presentation instant.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    /// Pixel format
    pub format: PixelFormat,
    /// Frame width in pixels
    pub width: u32,
    /// Frame height in pixels
    pub height: u32,
    /// Presentation timestamp relative to the start of the stream
    pub pts: Duration,
    /// Pixel data
    pub plane: FramePlane,
}

/// RGBA8 pixel rows ready for upload.
#[derive(Debug)]
pub struct RgbaView<'a> {
    pub data: Cow<'a, [u8]>,
    /// Bytes per row in `data`
    pub stride: usize,
    pub width: u32,
    pub height: u32,
}

impl RgbaView<'_> {
    /// Pixel at (x, y).
    #[inline]
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = y as usize * self.stride + x as usize * 4;
        [self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]]
    }

    /// One row without trailing padding.
    #[inline]
    pub fn row(&self, y: u32) -> &[u8] {
        let start = y as usize * self.stride;
        &self.data[start..start + self.width as usize * 4]
    }
}

impl VideoFrame {
    /// Create a zeroed frame with the given dimensions and format.
    pub fn new(width: u32, height: u32, format: PixelFormat, pts: Duration) -> Self {
        Self {
            format,
            width,
            height,
            pts,
            plane: FramePlane::new(width, height, format.bytes_per_pixel()),
        }
    }

    /// Wrap tightly packed RGBA8 bytes.
    pub fn from_rgba(width: u32, height: u32, data: Vec<u8>, pts: Duration) -> Self {
        Self {
            format: PixelFormat::Rgba8,
            width,
            height,
            pts,
            plane: FramePlane::packed(data, width, 4),
        }
    }

    /// A frame filled with one RGBA color.
    pub fn solid(width: u32, height: u32, rgba: [u8; 4], pts: Duration) -> Self {
        let mut frame = Self::new(width, height, PixelFormat::Rgba8, pts);
        for y in 0..height {
            for px in frame.row_mut(y).chunks_exact_mut(4) {
                px.copy_from_slice(&rgba);
            }
        }
        frame
    }

    /// Create a test pattern frame (color bars).
    pub fn test_pattern(width: u32, height: u32, pts: Duration) -> Self {
        const BARS: [[u8; 4]; 8] = [
            [255, 255, 255, 255], // White
            [255, 255, 0, 255],   // Yellow
            [0, 255, 255, 255],   // Cyan
            [0, 255, 0, 255],     // Green
            [255, 0, 255, 255],   // Magenta
            [255, 0, 0, 255],     // Red
            [0, 0, 255, 255],     // Blue
            [0, 0, 0, 255],       // Black
        ];
        let mut frame = Self::new(width, height, PixelFormat::Rgba8, pts);
        for y in 0..height {
            let row = frame.row_mut(y);
            for x in 0..width {
                let i = (x * 4) as usize;
                let bar = (x * 8 / width.max(1)) as usize;
                row[i..i + 4].copy_from_slice(&BARS[bar.min(7)]);
            }
        }
        frame
    }

    /// Get a mutable row of pixel data (without padding).
    #[inline]
    pub fn row_mut(&mut self, y: u32) -> &mut [u8] {
        let start = y as usize * self.plane.stride;
        let end = start + self.width as usize * self.format.bytes_per_pixel();
        &mut self.plane.data[start..end]
    }

    /// Total memory usage of this frame in bytes.
    pub fn memory_size(&self) -> usize {
        self.plane.data.len()
    }

    /// Check the upload preconditions: non-zero dimensions, a supported
    /// format and a plane large enough for `stride * height`.
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(GreenroomError::FrameFormat(format!(
                "zero-sized frame {}x{}",
                self.width, self.height
            )));
        }
        if self.width > MAX_FRAME_DIMENSION || self.height > MAX_FRAME_DIMENSION {
            return Err(GreenroomError::FrameFormat(format!(
                "frame {}x{} exceeds the {MAX_FRAME_DIMENSION} pixel limit",
                self.width, self.height
            )));
        }
        if !self.format.is_uploadable() {
            return Err(GreenroomError::FrameFormat(format!(
                "pixel format {:?} cannot be uploaded",
                self.format
            )));
        }
        let min_stride = self.width as usize * self.format.bytes_per_pixel();
        if self.plane.stride < min_stride {
            return Err(GreenroomError::FrameFormat(format!(
                "stride {} shorter than row of {} bytes",
                self.plane.stride, min_stride
            )));
        }
        let needed = self.plane.stride * (self.height as usize - 1) + min_stride;
        if self.plane.data.len() < needed {
            return Err(GreenroomError::FrameFormat(format!(
                "plane holds {} bytes, {}x{} needs {}",
                self.plane.data.len(),
                self.width,
                self.height,
                needed
            )));
        }
        Ok(())
    }

    /// Validate and expose the frame as RGBA8 rows.
    ///
    /// RGBA frames are borrowed; BGRA frames are swizzled into a packed copy.
    pub fn to_rgba(&self) -> Result<RgbaView<'_>> {
        self.validate()?;
        let data = match self.format {
            PixelFormat::Rgba8 => {
                return Ok(RgbaView {
                    data: Cow::Borrowed(&self.plane.data),
                    stride: self.plane.stride,
                    width: self.width,
                    height: self.height,
                })
            }
            PixelFormat::Bgra8 => {
                let row_bytes = self.width as usize * 4;
                let mut out = Vec::with_capacity(row_bytes * self.height as usize);
                for y in 0..self.height as usize {
                    let start = y * self.plane.stride;
                    for px in self.plane.data[start..start + row_bytes].chunks_exact(4) {
                        out.extend_from_slice(&[px[2], px[1], px[0], px[3]]);
                    }
                }
                out
            }
            PixelFormat::Gray8 => {
                return Err(GreenroomError::FrameFormat(
                    "grayscale frames carry no chroma".to_string(),
                ))
            }
        };
        Ok(RgbaView {
            data: Cow::Owned(data),
            stride: self.width as usize * 4,
            width: self.width,
            height: self.height,
        })
    }
}
