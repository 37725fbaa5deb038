//! The seam between the render loop and whatever does the keying.

use greenroom_core::{ChromaKeyParams, Result, VideoFrame};
use greenroom_gpu::UploadOutcome;

/// A keyed RGBA8 image.
#[derive(Debug, Clone, PartialEq)]
pub struct KeyedImage {
    pub width: u32,
    pub height: u32,
    /// Packed RGBA8, alpha is the mask.
    pub data: Vec<u8>,
}

impl KeyedImage {
    pub fn pixel(&self, x: u32, y: u32) -> [u8; 4] {
        let i = (y as usize * self.width as usize + x as usize) * 4;
        [self.data[i], self.data[i + 1], self.data[i + 2], self.data[i + 3]]
    }
}

/// One session's keying resources: upload surface, compiled program and
/// output target.
///
/// The render loop calls these in order: `prepare` once, then per refresh
/// `check_context`, `upload` when a frame arrived, `render` when the frame or
/// the parameters changed, and `present` always. `release` may be called at
/// any point and more than once.
pub trait RenderBackend: Send {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Compile the keying program. Failure is
    /// [`GreenroomError::PipelineInit`](greenroom_core::GreenroomError::PipelineInit).
    fn prepare(&mut self) -> Result<()>;

    /// Copy a frame into the surface, reallocating it on a size change.
    fn upload(&mut self, frame: &VideoFrame) -> Result<UploadOutcome>;

    /// Key the most recent upload into the output target.
    fn render(&mut self, params: &ChromaKeyParams) -> Result<()>;

    /// Show the most recent output.
    fn present(&mut self) -> Result<()>;

    /// Fail with `ContextLost` if the graphics context went away.
    fn check_context(&self) -> Result<()>;

    /// Drop every resource. Idempotent.
    fn release(&mut self);

    /// Dimensions of the upload surface, once allocated.
    fn surface_extent(&self) -> Option<(u32, u32)>;

    /// Times the upload surface has been (re)allocated.
    fn allocations(&self) -> u64;

    /// Copy of the most recent output, for diagnostics.
    fn snapshot(&self) -> Result<KeyedImage>;
}

impl<B: RenderBackend + ?Sized> RenderBackend for Box<B> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn prepare(&mut self) -> Result<()> {
        (**self).prepare()
    }

    fn upload(&mut self, frame: &VideoFrame) -> Result<UploadOutcome> {
        (**self).upload(frame)
    }

    fn render(&mut self, params: &ChromaKeyParams) -> Result<()> {
        (**self).render(params)
    }

    fn present(&mut self) -> Result<()> {
        (**self).present()
    }

    fn check_context(&self) -> Result<()> {
        (**self).check_context()
    }

    fn release(&mut self) {
        (**self).release()
    }

    fn surface_extent(&self) -> Option<(u32, u32)> {
        (**self).surface_extent()
    }

    fn allocations(&self) -> u64 {
        (**self).allocations()
    }

    fn snapshot(&self) -> Result<KeyedImage> {
        (**self).snapshot()
    }
}
