//! Greenroom Core - Foundation types for the chroma-key compositor
//!
//! This crate provides the types shared by every stage of the pipeline:
//! - Video frames and pixel formats
//! - Colors and the chroma projection
//! - Chroma-key parameters
//! - The error taxonomy

pub mod color;
pub mod error;
pub mod frame;
pub mod params;

pub use color::{chroma, chroma_distance, Color};
pub use error::{GreenroomError, Result};
pub use frame::{FramePlane, PixelFormat, RgbaView, VideoFrame};
pub use params::{ChromaKeyParams, MatteCurve};

/// Memory budget constants.
pub mod memory_budget {
    /// Largest frame edge the upload stage accepts (matches the device limit).
    pub const MAX_FRAME_DIMENSION: u32 = 8192;

    /// Default number of undelivered frames a source may hold.
    pub const FRAME_QUEUE_CAPACITY: usize = 2;
}
