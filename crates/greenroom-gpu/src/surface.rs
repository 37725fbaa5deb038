//! Double-buffered upload surface.
//!
//! Uploads always land in the back slot and become visible with a swap, so
//! the slot the keyer is reading is never written. Both slots are sized for
//! the last uploaded frame and are only reallocated when the frame
//! dimensions change.

use crate::context::GpuContext;
use crate::texture::GpuTexture;
use greenroom_core::{GreenroomError, Result, VideoFrame};
use tracing::{debug, info};

/// Result of a successful upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadOutcome {
    pub width: u32,
    pub height: u32,
    /// Whether the slots had to be reallocated for a new frame size.
    pub reallocated: bool,
}

/// A front/back pair of frame slots.
#[derive(Debug)]
pub struct SurfaceSlots<T> {
    slots: Option<[T; 2]>,
    front: usize,
    extent: Option<(u32, u32)>,
    allocations: u64,
}

impl<T> Default for SurfaceSlots<T> {
    fn default() -> Self {
        Self {
            slots: None,
            front: 0,
            extent: None,
            allocations: 0,
        }
    }
}

impl<T> SurfaceSlots<T> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write the next frame: fill the back slot with `write` and swap it to
    /// the front.
    ///
    /// On a size change a new pair is allocated with `alloc` and only
    /// replaces the current one once the write succeeded. On error the
    /// front slot, the extent and the allocation count are left untouched.
    pub fn upload_with<E>(
        &mut self,
        width: u32,
        height: u32,
        mut alloc: impl FnMut(u32, u32) -> T,
        write: impl FnOnce(&mut T) -> std::result::Result<(), E>,
    ) -> std::result::Result<UploadOutcome, E> {
        if let (Some(slots), Some((w, h))) = (self.slots.as_mut(), self.extent) {
            if (w, h) == (width, height) {
                write(&mut slots[1 - self.front])?;
                self.front = 1 - self.front;
                return Ok(UploadOutcome {
                    width,
                    height,
                    reallocated: false,
                });
            }
        }

        let mut pair = [alloc(width, height), alloc(width, height)];
        write(&mut pair[1])?;
        if let Some((old_w, old_h)) = self.extent {
            info!(old_w, old_h, width, height, "Frame size changed, reallocated surface");
        }
        self.slots = Some(pair);
        self.front = 1;
        self.extent = Some((width, height));
        self.allocations += 1;
        Ok(UploadOutcome {
            width,
            height,
            reallocated: true,
        })
    }

    /// The slot readers should use.
    pub fn front(&self) -> Option<&T> {
        self.slots.as_ref().map(|s| &s[self.front])
    }

    /// The slot the next upload will write.
    pub fn back_mut(&mut self) -> Option<&mut T> {
        let back = 1 - self.front;
        self.slots.as_mut().map(|s| &mut s[back])
    }

    /// Dimensions the slots are allocated for.
    pub fn extent(&self) -> Option<(u32, u32)> {
        self.extent
    }

    /// How many times the slots have been (re)allocated.
    pub fn allocations(&self) -> u64 {
        self.allocations
    }

    pub fn is_allocated(&self) -> bool {
        self.slots.is_some()
    }

    /// Drop both slots. The allocation count is kept.
    pub fn clear(&mut self) {
        self.slots = None;
        self.extent = None;
        self.front = 0;
    }
}

impl SurfaceSlots<Vec<u8>> {
    /// Copy a frame into packed RGBA bytes.
    pub fn upload_bytes(&mut self, frame: &VideoFrame) -> Result<UploadOutcome> {
        let rgba = frame.to_rgba()?;
        let row_bytes = rgba.width as usize * 4;
        self.upload_with(
            rgba.width,
            rgba.height,
            |w, h| vec![0u8; w as usize * h as usize * 4],
            |slot| {
                for (y, dst) in slot.chunks_exact_mut(row_bytes).enumerate() {
                    dst.copy_from_slice(rgba.row(y as u32));
                }
                Ok::<(), GreenroomError>(())
            },
        )
    }
}

impl SurfaceSlots<GpuTexture> {
    /// Stage a frame into the back texture.
    ///
    /// Copy validation errors are captured and returned as
    /// [`GreenroomError::Upload`].
    pub fn upload_texture(&mut self, ctx: &GpuContext, frame: &VideoFrame) -> Result<UploadOutcome> {
        let rgba = frame.to_rgba()?;
        let outcome = self.upload_with(
            rgba.width,
            rgba.height,
            |w, h| GpuTexture::for_video_frame(&ctx.device, w, h),
            |tex| {
                let (res, err) = ctx.validation_scope(|_| tex.upload_rgba(&ctx.queue, &rgba));
                res?;
                match err {
                    Some(e) => Err(GreenroomError::Upload(e.to_string())),
                    None => Ok(()),
                }
            },
        )?;
        debug!(width = outcome.width, height = outcome.height, "Frame staged");
        Ok(outcome)
    }
}
