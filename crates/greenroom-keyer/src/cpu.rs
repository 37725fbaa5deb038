//! Keying on the CPU, for hosts without a usable GPU.

use crate::backend::{KeyedImage, RenderBackend};
use crate::chroma_key::ChromaKeyProcessor;
use greenroom_core::{ChromaKeyParams, GreenroomError, Result, VideoFrame};
use greenroom_gpu::{CpuSurface, UploadOutcome};
use tracing::debug;

/// [`RenderBackend`] running [`ChromaKeyProcessor`] over a byte surface.
#[derive(Debug, Default)]
pub struct CpuKeyer {
    surface: CpuSurface,
    output: Option<KeyedImage>,
    scratch: Vec<u8>,
    prepared: bool,
    presents: u64,
}

impl CpuKeyer {
    pub fn new() -> Self {
        Self::default()
    }

    /// The most recently rendered image.
    pub fn output(&self) -> Option<&KeyedImage> {
        self.output.as_ref()
    }

    /// The image on screen after the last `present`.
    pub fn presented(&self) -> Option<&KeyedImage> {
        if self.presents == 0 {
            return None;
        }
        self.output.as_ref()
    }

    /// Number of `present` calls that had something to show.
    pub fn presents(&self) -> u64 {
        self.presents
    }
}

impl RenderBackend for CpuKeyer {
    fn name(&self) -> &'static str {
        "cpu"
    }

    fn prepare(&mut self) -> Result<()> {
        self.prepared = true;
        Ok(())
    }

    fn upload(&mut self, frame: &VideoFrame) -> Result<UploadOutcome> {
        self.surface.upload_bytes(frame)
    }

    fn render(&mut self, params: &ChromaKeyParams) -> Result<()> {
        if !self.prepared {
            return Err(GreenroomError::InvalidState(
                "render before prepare".to_string(),
            ));
        }
        let (Some((width, height)), Some(src)) = (self.surface.extent(), self.surface.front())
        else {
            return Err(GreenroomError::Render("no frame uploaded".to_string()));
        };

        self.scratch.resize(src.len(), 0);
        ChromaKeyProcessor::new(params).apply(src, &mut self.scratch, width);

        match self.output.as_mut() {
            Some(out) if out.width == width && out.height == height => {
                std::mem::swap(&mut out.data, &mut self.scratch);
            }
            _ => {
                self.output = Some(KeyedImage {
                    width,
                    height,
                    data: std::mem::take(&mut self.scratch),
                });
            }
        }
        debug!(width, height, "CPU frame keyed");
        Ok(())
    }

    fn present(&mut self) -> Result<()> {
        if self.output.is_some() {
            self.presents += 1;
        }
        Ok(())
    }

    fn check_context(&self) -> Result<()> {
        Ok(())
    }

    fn release(&mut self) {
        self.surface.clear();
        self.output = None;
        self.scratch = Vec::new();
        self.prepared = false;
    }

    fn surface_extent(&self) -> Option<(u32, u32)> {
        self.surface.extent()
    }

    fn allocations(&self) -> u64 {
        self.surface.allocations()
    }

    fn snapshot(&self) -> Result<KeyedImage> {
        self.output
            .clone()
            .ok_or_else(|| GreenroomError::Render("nothing rendered yet".to_string()))
    }
}
