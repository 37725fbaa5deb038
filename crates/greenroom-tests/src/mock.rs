//! A scripted [`RenderBackend`] that records every call.

use greenroom_core::{ChromaKeyParams, GreenroomError, Result, VideoFrame};
use greenroom_gpu::{CpuSurface, UploadOutcome};
use greenroom_keyer::{validate_wgsl, KeyedImage, RenderBackend, CHROMA_KEY_WGSL};
use parking_lot::{Mutex, MutexGuard};
use std::sync::Arc;

#[derive(Debug, Default)]
pub struct MockLog {
    pub prepares: u32,
    pub uploads: u32,
    pub rendered: Vec<ChromaKeyParams>,
    pub presents: u32,
    pub releases: u32,
    pub failing_renders: u32,
    pub failing_uploads: u32,
    pub lost: Option<String>,
}

/// Test-side handle to a [`MockBackend`] after it has been boxed away.
#[derive(Debug, Clone, Default)]
pub struct MockHandle(Arc<Mutex<MockLog>>);

impl MockHandle {
    pub fn log(&self) -> MutexGuard<'_, MockLog> {
        self.0.lock()
    }

    pub fn lose_context(&self, reason: &str) {
        self.0.lock().lost = Some(reason.to_string());
    }

    pub fn fail_next_renders(&self, n: u32) {
        self.0.lock().failing_renders = n;
    }

    pub fn fail_next_uploads(&self, n: u32) {
        self.0.lock().failing_uploads = n;
    }
}

/// Uploads into a real byte surface and "compiles" by validating WGSL.
pub struct MockBackend {
    surface: CpuSurface,
    shader: String,
    handle: MockHandle,
}

impl MockBackend {
    pub fn new() -> (Self, MockHandle) {
        Self::with_shader(CHROMA_KEY_WGSL)
    }

    pub fn with_shader(wgsl: &str) -> (Self, MockHandle) {
        let handle = MockHandle::default();
        let backend = Self {
            surface: CpuSurface::new(),
            shader: wgsl.to_string(),
            handle: handle.clone(),
        };
        (backend, handle)
    }
}

impl RenderBackend for MockBackend {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn prepare(&mut self) -> Result<()> {
        self.handle.log().prepares += 1;
        validate_wgsl(&self.shader)?;
        Ok(())
    }

    fn upload(&mut self, frame: &VideoFrame) -> Result<UploadOutcome> {
        let mut log = self.handle.log();
        if log.failing_uploads > 0 {
            log.failing_uploads -= 1;
            return Err(GreenroomError::Upload("scripted copy failure".to_string()));
        }
        log.uploads += 1;
        drop(log);
        self.surface.upload_bytes(frame)
    }

    fn render(&mut self, params: &ChromaKeyParams) -> Result<()> {
        let mut log = self.handle.log();
        if log.failing_renders > 0 {
            log.failing_renders -= 1;
            return Err(GreenroomError::Render("scripted draw failure".to_string()));
        }
        log.rendered.push(*params);
        Ok(())
    }

    fn present(&mut self) -> Result<()> {
        self.handle.log().presents += 1;
        Ok(())
    }

    fn check_context(&self) -> Result<()> {
        match &self.handle.log().lost {
            Some(reason) => Err(GreenroomError::ContextLost(reason.clone())),
            None => Ok(()),
        }
    }

    fn release(&mut self) {
        self.handle.log().releases += 1;
        self.surface.clear();
    }

    fn surface_extent(&self) -> Option<(u32, u32)> {
        self.surface.extent()
    }

    fn allocations(&self) -> u64 {
        self.surface.allocations()
    }

    fn snapshot(&self) -> Result<KeyedImage> {
        let (Some((width, height)), Some(data)) = (self.surface.extent(), self.surface.front())
        else {
            return Err(GreenroomError::Render("nothing uploaded".to_string()));
        };
        Ok(KeyedImage {
            width,
            height,
            data: data.clone(),
        })
    }
}
