//! WGSL keying program and its uniform block.

use bytemuck::{Pod, Zeroable};
use greenroom_core::{ChromaKeyParams, GreenroomError, MatteCurve, Result};
use naga::valid::{Capabilities, ValidationFlags, Validator};

/// Vertex and fragment stages of the keyer.
pub const CHROMA_KEY_WGSL: &str = include_str!("../shaders/chroma_key.wgsl");

pub const VERTEX_ENTRY: &str = "vs_main";
pub const FRAGMENT_ENTRY: &str = "fs_main";

const CURVE_SMOOTHSTEP: u32 = 0;
const CURVE_POWER: u32 = 1;

/// Mirror of `KeyUniforms` in the shader. 48 bytes, std140 compatible.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct KeyUniforms {
    pub key_color: [f32; 3],
    pub similarity: f32,
    pub smoothness: f32,
    pub spill: f32,
    pub curve_exponent: f32,
    pub curve_mode: u32,
    pub bypass: u32,
    pub _pad: [u32; 3],
}

impl KeyUniforms {
    /// Pack clamped parameters for upload.
    pub fn from_params(params: &ChromaKeyParams) -> Self {
        let p = params.clamped();
        let (curve_mode, curve_exponent) = match p.curve {
            MatteCurve::Smoothstep => (CURVE_SMOOTHSTEP, 1.0),
            MatteCurve::Power(e) => (CURVE_POWER, e),
        };
        Self {
            key_color: p.key_color,
            similarity: p.similarity,
            smoothness: p.smoothness,
            spill: p.spill,
            curve_exponent,
            curve_mode,
            bypass: u32::from(p.bypass),
            _pad: [0; 3],
        }
    }
}

/// Parse and validate WGSL without a device.
///
/// Returns the error text as [`GreenroomError::PipelineInit`], so a broken
/// program is reported before any GPU object is created.
pub fn validate_wgsl(source: &str) -> Result<naga::Module> {
    let module = naga::front::wgsl::parse_str(source).map_err(|e| {
        GreenroomError::PipelineInit(format!("shader parse error: {}", e.emit_to_string(source)))
    })?;

    Validator::new(ValidationFlags::all(), Capabilities::all())
        .validate(&module)
        .map_err(|e| GreenroomError::PipelineInit(format!("shader validation error: {:?}", e)))?;

    for entry in [VERTEX_ENTRY, FRAGMENT_ENTRY] {
        if !module.entry_points.iter().any(|ep| ep.name == entry) {
            return Err(GreenroomError::PipelineInit(format!(
                "shader has no `{entry}` entry point"
            )));
        }
    }

    Ok(module)
}
