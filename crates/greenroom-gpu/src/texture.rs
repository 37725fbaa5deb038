//! Frame and output textures.

use greenroom_core::{GreenroomError, Result, RgbaView};

/// Format of uploaded frames and of the keyed output. Linear so the GPU
/// and CPU keyers see the same numbers.
pub const FRAME_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;

/// A single-level 2D texture in [`FRAME_FORMAT`].
pub struct GpuTexture {
    pub texture: wgpu::Texture,
    pub view: wgpu::TextureView,
    pub width: u32,
    pub height: u32,
}

impl GpuTexture {
    fn allocate(
        device: &wgpu::Device,
        width: u32,
        height: u32,
        usage: wgpu::TextureUsages,
        label: &str,
    ) -> Self {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: FRAME_FORMAT,
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        Self {
            texture,
            view,
            width,
            height,
        }
    }

    /// Sampled texture that camera frames are copied into.
    pub fn for_video_frame(device: &wgpu::Device, width: u32, height: u32) -> Self {
        Self::allocate(
            device,
            width,
            height,
            wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            "Camera Frame",
        )
    }

    /// Target the keying pass draws into. Readable so snapshots can copy it
    /// back.
    pub fn render_target(device: &wgpu::Device, width: u32, height: u32) -> Self {
        Self::allocate(
            device,
            width,
            height,
            wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::RENDER_ATTACHMENT
                | wgpu::TextureUsages::COPY_SRC,
            "Keyed Output",
        )
    }

    /// Queue a copy of `rgba` into this texture.
    ///
    /// The write lands before the next submitted command buffer, so a draw
    /// already in flight never sees a half-written frame.
    pub fn upload_rgba(&self, queue: &wgpu::Queue, rgba: &RgbaView<'_>) -> Result<()> {
        if (rgba.width, rgba.height) != (self.width, self.height) {
            return Err(GreenroomError::Upload(format!(
                "frame is {}x{} but texture is {}x{}",
                rgba.width, rgba.height, self.width, self.height
            )));
        }
        let bytes_per_row = u32::try_from(rgba.stride)
            .map_err(|_| GreenroomError::Upload(format!("stride {} too large", rgba.stride)))?;

        queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &self.texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &rgba.data,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(bytes_per_row),
                rows_per_image: Some(self.height),
            },
            self.extent(),
        );
        Ok(())
    }

    pub fn extent(&self) -> wgpu::Extent3d {
        wgpu::Extent3d {
            width: self.width,
            height: self.height,
            depth_or_array_layers: 1,
        }
    }
}
