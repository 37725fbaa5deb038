//! Greenroom Keyer - the chroma-key shader stage
//!
//! Provides the WGSL keying program, its wgpu pipeline, a CPU reference
//! implementation with identical math, and the two render backends the
//! compositor drives.

pub mod backend;
pub mod chroma_key;
pub mod cpu;
pub mod gpu;
pub mod pipeline;
pub mod shader;

pub use backend::{KeyedImage, RenderBackend};
pub use chroma_key::ChromaKeyProcessor;
pub use cpu::CpuKeyer;
pub use gpu::GpuKeyer;
pub use pipeline::ChromaKeyPipeline;
pub use shader::{validate_wgsl, KeyUniforms, CHROMA_KEY_WGSL};
