//! Keying on the GPU with wgpu.

use crate::backend::{KeyedImage, RenderBackend};
use crate::pipeline::ChromaKeyPipeline;
use crate::shader::CHROMA_KEY_WGSL;
use greenroom_core::{ChromaKeyParams, GreenroomError, Result, VideoFrame};
use greenroom_gpu::{GpuConfig, GpuContext, GpuSurface, GpuTexture, UploadOutcome};
use std::borrow::Cow;
use tracing::{debug, info};

/// [`RenderBackend`] that owns a device, the double-buffered frame
/// textures, the keying pipeline and the output target.
pub struct GpuKeyer {
    ctx: Option<GpuContext>,
    shader: Cow<'static, str>,
    pipeline: Option<ChromaKeyPipeline>,
    surface: GpuSurface,
    output: Option<GpuTexture>,
    rendered: bool,
    presents: u64,
}

impl GpuKeyer {
    /// Acquire a device and wrap it.
    pub fn new(config: &GpuConfig) -> Result<Self> {
        Ok(Self::with_context(GpuContext::new_blocking(config)?))
    }

    pub fn with_context(ctx: GpuContext) -> Self {
        Self {
            ctx: Some(ctx),
            shader: Cow::Borrowed(CHROMA_KEY_WGSL),
            pipeline: None,
            surface: GpuSurface::new(),
            output: None,
            rendered: false,
            presents: 0,
        }
    }

    /// Replace the keying program compiled by `prepare`.
    pub fn with_shader(mut self, wgsl: impl Into<Cow<'static, str>>) -> Self {
        self.shader = wgsl.into();
        self
    }

    pub fn context(&self) -> Option<&GpuContext> {
        self.ctx.as_ref()
    }

    /// View of the keyed output, for layering into a UI.
    pub fn output_view(&self) -> Option<&wgpu::TextureView> {
        self.output.as_ref().filter(|_| self.rendered).map(|t| &t.view)
    }

    pub fn presents(&self) -> u64 {
        self.presents
    }

    fn live_context(&self) -> Result<&GpuContext> {
        let ctx = self
            .ctx
            .as_ref()
            .ok_or_else(|| GreenroomError::InvalidState("GPU resources released".to_string()))?;
        ctx.ensure_alive()?;
        Ok(ctx)
    }

    /// Copy the keyed output back to packed RGBA8. Blocks until the GPU is
    /// done; meant for diagnostics and snapshots, not the frame loop.
    pub fn read_output(&self) -> Result<Vec<u8>> {
        let ctx = self.live_context()?;
        let output = self
            .output
            .as_ref()
            .filter(|_| self.rendered)
            .ok_or_else(|| GreenroomError::Render("nothing rendered yet".to_string()))?;

        let row_bytes = output.width * 4;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded_row = row_bytes.div_ceil(align) * align;

        let buffer = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Keyed Output Readback"),
            size: padded_row as u64 * output.height as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Readback Encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture: &output.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &buffer,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_row),
                    rows_per_image: Some(output.height),
                },
            },
            output.extent(),
        );
        ctx.queue.submit(std::iter::once(encoder.finish()));

        let slice = buffer.slice(..);
        let (tx, rx) = std::sync::mpsc::channel();
        slice.map_async(wgpu::MapMode::Read, move |result| {
            let _ = tx.send(result);
        });
        ctx.device.poll(wgpu::Maintain::Wait);
        rx.recv()
            .map_err(|e| GreenroomError::Render(format!("readback channel closed: {e}")))?
            .map_err(|e| GreenroomError::Render(format!("readback failed: {e}")))?;

        let mapped = slice.get_mapped_range();
        let mut data = Vec::with_capacity(row_bytes as usize * output.height as usize);
        for row in mapped.chunks_exact(padded_row as usize) {
            data.extend_from_slice(&row[..row_bytes as usize]);
        }
        drop(mapped);
        buffer.unmap();
        Ok(data)
    }
}

impl RenderBackend for GpuKeyer {
    fn name(&self) -> &'static str {
        "gpu"
    }

    fn prepare(&mut self) -> Result<()> {
        let ctx = self.live_context()?;
        let pipeline = ChromaKeyPipeline::with_source(ctx, &self.shader)?;
        self.pipeline = Some(pipeline);
        Ok(())
    }

    fn upload(&mut self, frame: &VideoFrame) -> Result<UploadOutcome> {
        let ctx = self
            .ctx
            .as_ref()
            .ok_or_else(|| GreenroomError::InvalidState("GPU resources released".to_string()))?;
        let outcome = self.surface.upload_texture(ctx, frame)?;
        let current = self.output.as_ref().map(|t| (t.width, t.height));
        if output_is_stale(current, &outcome) {
            info!(
                width = outcome.width,
                height = outcome.height,
                "Allocating keyed output target"
            );
            self.output = Some(GpuTexture::render_target(
                &ctx.device,
                outcome.width,
                outcome.height,
            ));
            self.rendered = false;
        }
        Ok(outcome)
    }

    fn render(&mut self, params: &ChromaKeyParams) -> Result<()> {
        let ctx = self.live_context()?;
        let pipeline = self
            .pipeline
            .as_ref()
            .ok_or_else(|| GreenroomError::InvalidState("render before prepare".to_string()))?;
        let (Some(input), Some(output)) = (self.surface.front(), self.output.as_ref()) else {
            return Err(GreenroomError::Render("no frame uploaded".to_string()));
        };
        pipeline.render(ctx, input, output, params)?;
        debug!(width = output.width, height = output.height, "GPU frame keyed");
        self.rendered = true;
        Ok(())
    }

    fn present(&mut self) -> Result<()> {
        if self.rendered {
            self.presents += 1;
        }
        Ok(())
    }

    fn check_context(&self) -> Result<()> {
        match &self.ctx {
            Some(ctx) => ctx.ensure_alive(),
            None => Ok(()),
        }
    }

    fn release(&mut self) {
        self.pipeline = None;
        self.output = None;
        self.surface.clear();
        self.rendered = false;
        if self.ctx.take().is_some() {
            info!("GPU resources released");
        }
    }

    fn surface_extent(&self) -> Option<(u32, u32)> {
        self.surface.extent()
    }

    fn allocations(&self) -> u64 {
        self.surface.allocations()
    }

    fn snapshot(&self) -> Result<KeyedImage> {
        let data = self.read_output()?;
        let (width, height) = self
            .output
            .as_ref()
            .map(|t| (t.width, t.height))
            .unwrap_or_default();
        Ok(KeyedImage {
            width,
            height,
            data,
        })
    }
}

/// The output target must always match the front frame, whatever path
/// the surface took to get there.
fn output_is_stale(current: Option<(u32, u32)>, outcome: &UploadOutcome) -> bool {
    current != Some((outcome.width, outcome.height))
}
