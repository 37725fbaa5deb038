//! One keying session: a source, a backend and the loop between them.

use crate::params::ParameterController;
use crate::state::{FirstFrame, FrameStats, PrimingPolicy, RefreshOutcome, SessionId, SessionState};
use greenroom_core::{GreenroomError, Result};
use greenroom_gpu::UploadOutcome;
use greenroom_keyer::RenderBackend;
use greenroom_source::FrameSource;
use std::time::Duration;
use tracing::{debug, error, info, warn};

type FirstFrameCallback = Box<dyn FnOnce(FirstFrame) + Send>;

/// Drives one backend from one source, once per display refresh.
///
/// The session owns every resource it uses. Dropping it tears it down.
pub struct CompositorSession<B: RenderBackend = Box<dyn RenderBackend>> {
    id: SessionId,
    backend: B,
    source: Option<Box<dyn FrameSource>>,
    params: ParameterController,
    state: SessionState,
    priming: PrimingPolicy,
    priming_attempts: u32,
    rendered_version: Option<u64>,
    extent: Option<(u32, u32)>,
    first_frame: Option<FirstFrame>,
    on_first_frame: Option<FirstFrameCallback>,
    stats: FrameStats,
    released: bool,
}

impl<B: RenderBackend> CompositorSession<B> {
    pub fn new(backend: B, params: ParameterController) -> Self {
        Self {
            id: SessionId::new(),
            backend,
            source: None,
            params,
            state: SessionState::Idle,
            priming: PrimingPolicy::default(),
            priming_attempts: 0,
            rendered_version: None,
            extent: None,
            first_frame: None,
            on_first_frame: None,
            stats: FrameStats::default(),
            released: false,
        }
    }

    pub fn with_priming(mut self, policy: PrimingPolicy) -> Self {
        self.priming = PrimingPolicy {
            max_refreshes: policy.max_refreshes.max(1),
        };
        self
    }

    /// Register the callback fired when the first keyed frame is presented.
    /// It runs at most once, on the thread calling `on_refresh`.
    pub fn on_first_frame(&mut self, callback: impl FnOnce(FirstFrame) + Send + 'static) {
        self.on_first_frame = Some(Box::new(callback));
    }

    pub fn id(&self) -> SessionId {
        self.id
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn stats(&self) -> FrameStats {
        self.stats
    }

    pub fn params(&self) -> &ParameterController {
        &self.params
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Dimensions of the current output, taken from the latest frame.
    pub fn output_extent(&self) -> Option<(u32, u32)> {
        self.extent
    }

    pub fn first_frame(&self) -> Option<FirstFrame> {
        self.first_frame
    }

    /// Whether the attached source has finished. True when there is none.
    pub fn source_ended(&self) -> bool {
        self.source.as_ref().map_or(true, |s| s.is_ended())
    }

    /// Compile the keying program and start priming from `source`.
    ///
    /// A compile failure stops the session and is returned as
    /// [`GreenroomError::PipelineInit`].
    pub fn attach_source<S: FrameSource + 'static>(&mut self, source: S) -> Result<()> {
        if self.state != SessionState::Idle {
            return Err(GreenroomError::InvalidState(format!(
                "cannot attach a source while {}",
                self.state
            )));
        }

        if let Err(e) = self.backend.prepare() {
            let e = match e {
                GreenroomError::PipelineInit(_) | GreenroomError::ContextLost(_) => e,
                other => GreenroomError::PipelineInit(other.to_string()),
            };
            return Err(self.fail(e));
        }

        self.source = Some(Box::new(source));
        self.priming_attempts = 0;
        self.state = SessionState::Priming;
        info!(
            session = %self.id,
            backend = self.backend.name(),
            max_refreshes = self.priming.max_refreshes,
            "Source attached, priming"
        );
        Ok(())
    }

    /// Run one refresh. Call from the host's display-refresh signal.
    ///
    /// Recoverable per-frame errors are counted in [`FrameStats`]. A fatal
    /// error stops the session and is returned from this call only; later
    /// calls return [`RefreshOutcome::Inactive`].
    pub fn on_refresh(&mut self) -> Result<RefreshOutcome> {
        match self.state {
            SessionState::Idle | SessionState::Stopped => Ok(RefreshOutcome::Inactive),
            SessionState::Priming => self.prime(),
            SessionState::Running => self.run_frame(),
        }
    }

    /// Stop the loop, drop the source and release the backend.
    ///
    /// Later refreshes do no work. Safe to call any number of times.
    pub fn teardown(&mut self) {
        if self.released {
            return;
        }
        self.released = true;
        let from = self.state;
        self.state = SessionState::Stopped;
        self.source = None;
        self.on_first_frame = None;
        self.backend.release();
        info!(session = %self.id, from = %from, "Session torn down");
    }

    fn prime(&mut self) -> Result<RefreshOutcome> {
        self.stats.refreshes += 1;
        self.check_context()?;

        let Some((outcome, pts)) = self.poll_and_upload()? else {
            return self.consume_priming_attempt();
        };

        let snapshot = self.params.snapshot();
        match self.backend.render(&snapshot.params) {
            Ok(()) => {
                self.rendered_version = Some(snapshot.version);
                self.stats.rendered_frames += 1;
            }
            Err(e) if e.is_fatal() => return Err(self.fail(e)),
            Err(e) => {
                warn!(session = %self.id, error = %e, "First render failed");
                self.stats.failed_renders += 1;
                return self.consume_priming_attempt();
            }
        }
        self.present()?;

        self.state = SessionState::Running;
        let first = FirstFrame {
            session: self.id,
            width: outcome.width,
            height: outcome.height,
            pts,
        };
        self.first_frame = Some(first);
        info!(
            session = %self.id,
            width = outcome.width,
            height = outcome.height,
            refreshes = self.stats.refreshes,
            "First frame presented"
        );
        if let Some(callback) = self.on_first_frame.take() {
            callback(first);
        }
        Ok(RefreshOutcome::FirstFrame)
    }

    fn consume_priming_attempt(&mut self) -> Result<RefreshOutcome> {
        self.priming_attempts += 1;
        if self.priming_attempts >= self.priming.max_refreshes {
            return Err(self.fail(GreenroomError::PipelineInit(format!(
                "no usable frame after {} refreshes",
                self.priming_attempts
            ))));
        }
        debug!(session = %self.id, attempt = self.priming_attempts, "Waiting for first frame");
        Ok(RefreshOutcome::Priming {
            attempt: self.priming_attempts,
        })
    }

    fn run_frame(&mut self) -> Result<RefreshOutcome> {
        self.stats.refreshes += 1;
        self.check_context()?;

        let new_frame = self.poll_and_upload()?.is_some();
        let snapshot = self.params.snapshot();
        let mut rendered = false;

        if new_frame || self.rendered_version != Some(snapshot.version) {
            match self.backend.render(&snapshot.params) {
                Ok(()) => {
                    self.rendered_version = Some(snapshot.version);
                    self.stats.rendered_frames += 1;
                    rendered = true;
                }
                Err(e) if e.is_fatal() => return Err(self.fail(e)),
                Err(e) => {
                    warn!(session = %self.id, error = %e, "Render failed, keeping previous output");
                    self.stats.failed_renders += 1;
                    self.rendered_version = None;
                }
            }
        }

        self.present()?;
        Ok(if rendered {
            RefreshOutcome::Rendered
        } else {
            RefreshOutcome::Presented
        })
    }

    fn check_context(&mut self) -> Result<()> {
        match self.backend.check_context() {
            Ok(()) => Ok(()),
            Err(e) => Err(self.fail(e)),
        }
    }

    /// Take at most one frame from the source and upload it. `None` when
    /// there was no frame or it was skipped.
    fn poll_and_upload(&mut self) -> Result<Option<(UploadOutcome, Duration)>> {
        let Some(frame) = self.source.as_mut().and_then(|s| s.next_frame()) else {
            return Ok(None);
        };

        match self.backend.upload(&frame) {
            Ok(outcome) => {
                self.stats.uploaded_frames += 1;
                if outcome.reallocated && self.extent.is_some() {
                    self.stats.reallocations += 1;
                    info!(
                        session = %self.id,
                        width = outcome.width,
                        height = outcome.height,
                        "Output resized"
                    );
                }
                self.extent = Some((outcome.width, outcome.height));
                Ok(Some((outcome, frame.pts)))
            }
            Err(e) if e.is_fatal() => Err(self.fail(e)),
            Err(e @ GreenroomError::FrameFormat(_)) => {
                warn!(session = %self.id, error = %e, "Skipping frame");
                self.stats.skipped_frames += 1;
                Ok(None)
            }
            Err(e) => {
                warn!(session = %self.id, error = %e, "Upload failed, skipping frame");
                self.stats.failed_uploads += 1;
                Ok(None)
            }
        }
    }

    fn present(&mut self) -> Result<()> {
        match self.backend.present() {
            Ok(()) => {
                self.stats.presented_frames += 1;
                Ok(())
            }
            Err(e) if e.is_fatal() => Err(self.fail(e)),
            Err(e) => {
                warn!(session = %self.id, error = %e, "Present failed");
                Ok(())
            }
        }
    }

    fn fail(&mut self, err: GreenroomError) -> GreenroomError {
        error!(session = %self.id, state = %self.state, error = %err, "Session stopped");
        self.teardown();
        err
    }
}

impl<B: RenderBackend> Drop for CompositorSession<B> {
    fn drop(&mut self) {
        self.teardown();
    }
}
