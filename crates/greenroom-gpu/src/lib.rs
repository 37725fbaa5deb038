//! Greenroom GPU - device setup and frame upload
//!
//! The upload surface is generic over its slot type so the wgpu backend and
//! the CPU backend share the same double-buffering rules.

pub mod context;
pub mod surface;
pub mod texture;

pub use context::{GpuConfig, GpuContext, PowerPreference};
pub use surface::{SurfaceSlots, UploadOutcome};
pub use texture::{GpuTexture, FRAME_FORMAT};

/// Upload surface backed by GPU textures.
pub type GpuSurface = SurfaceSlots<GpuTexture>;

/// Upload surface backed by packed RGBA bytes.
pub type CpuSurface = SurfaceSlots<Vec<u8>>;
