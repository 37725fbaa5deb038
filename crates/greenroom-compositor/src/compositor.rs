//! Several independent sessions driven from one refresh signal.
//!
//! A host usually runs a local preview next to one session per remote
//! participant. Each session owns its own backend, source and parameters; a
//! failure in one never touches the others.

use crate::config::CompositorConfig;
use crate::params::ParameterController;
use crate::session::CompositorSession;
use crate::state::{FirstFrame, FrameStats, RefreshOutcome, SessionId, SessionState};
use greenroom_core::{GreenroomError, Result};
use greenroom_keyer::RenderBackend;
use greenroom_source::FrameSource;
use std::collections::BTreeMap;
use tracing::info;

/// Something a host should react to after a [`Compositor::tick`].
#[derive(Debug)]
pub enum SessionEvent {
    /// The session put its first keyed frame on screen.
    FirstFrame(FirstFrame),
    /// The session hit a fatal error and is now stopped.
    Failed {
        session: SessionId,
        error: GreenroomError,
    },
}

/// Registry of sessions keyed by [`SessionId`].
#[derive(Default)]
pub struct Compositor {
    config: CompositorConfig,
    sessions: BTreeMap<SessionId, CompositorSession>,
}

impl Compositor {
    pub fn new(config: CompositorConfig) -> Self {
        Self {
            config: config.validated(),
            sessions: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &CompositorConfig {
        &self.config
    }

    /// Register a session on `backend`, starting from the configured
    /// default parameters.
    pub fn create_session(&mut self, backend: Box<dyn RenderBackend>) -> SessionId {
        let params = ParameterController::new(self.config.default_params);
        let session = CompositorSession::new(backend, params).with_priming(self.config.priming);
        let id = session.id();
        info!(session = %id, backend = session.backend().name(), "Session created");
        self.sessions.insert(id, session);
        id
    }

    pub fn session(&self, id: SessionId) -> Option<&CompositorSession> {
        self.sessions.get(&id)
    }

    pub fn session_mut(&mut self, id: SessionId) -> Option<&mut CompositorSession> {
        self.sessions.get_mut(&id)
    }

    /// Parameter handle for one session, to hand to a UI or control channel.
    pub fn params(&self, id: SessionId) -> Option<ParameterController> {
        self.sessions.get(&id).map(|s| s.params().clone())
    }

    pub fn stats(&self, id: SessionId) -> Option<FrameStats> {
        self.sessions.get(&id).map(|s| s.stats())
    }

    pub fn state(&self, id: SessionId) -> Option<SessionState> {
        self.sessions.get(&id).map(|s| s.state())
    }

    pub fn attach_source<S: FrameSource + 'static>(&mut self, id: SessionId, source: S) -> Result<()> {
        self.sessions
            .get_mut(&id)
            .ok_or_else(|| GreenroomError::InvalidState(format!("unknown session {id}")))?
            .attach_source(source)
    }

    /// Refresh every active session once.
    ///
    /// Returns first-frame notifications and fatal failures. A failed session
    /// stays registered in the `Stopped` state until torn down.
    pub fn tick(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        for (&id, session) in self.sessions.iter_mut() {
            if !session.state().is_active() {
                continue;
            }
            match session.on_refresh() {
                Ok(RefreshOutcome::FirstFrame) => {
                    if let Some(first) = session.first_frame() {
                        events.push(SessionEvent::FirstFrame(first));
                    }
                }
                Ok(_) => {}
                Err(error) => events.push(SessionEvent::Failed { session: id, error }),
            }
        }
        events
    }

    /// Stop and remove one session. Returns whether it existed.
    pub fn teardown(&mut self, id: SessionId) -> bool {
        match self.sessions.remove(&id) {
            Some(mut session) => {
                session.teardown();
                true
            }
            None => false,
        }
    }

    pub fn teardown_all(&mut self) {
        for (_, mut session) in std::mem::take(&mut self.sessions) {
            session.teardown();
        }
    }

    pub fn session_ids(&self) -> impl Iterator<Item = SessionId> + '_ {
        self.sessions.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

impl Drop for Compositor {
    fn drop(&mut self) {
        self.teardown_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use greenroom_core::{ChromaKeyParams, VideoFrame};
    use greenroom_keyer::CpuKeyer;
    use greenroom_source::ScriptedSource;
    use std::time::Duration;

    fn frames(n: usize, rgba: [u8; 4]) -> ScriptedSource {
        ScriptedSource::new((0..n).map(|i| {
            Some(VideoFrame::solid(4, 4, rgba, Duration::from_millis(i as u64 * 33)))
        }))
    }

    #[test]
    fn sessions_start_from_configured_defaults() {
        let mut compositor = Compositor::new(CompositorConfig {
            default_params: ChromaKeyParams::blue_screen(),
            ..Default::default()
        });
        let id = compositor.create_session(Box::new(CpuKeyer::new()));
        assert_eq!(
            compositor.params(id).unwrap().get_parameters(),
            ChromaKeyParams::blue_screen()
        );
        assert_eq!(compositor.state(id), Some(SessionState::Idle));
    }

    #[test]
    fn tick_reports_first_frames() {
        let mut compositor = Compositor::default();
        let a = compositor.create_session(Box::new(CpuKeyer::new()));
        let b = compositor.create_session(Box::new(CpuKeyer::new()));
        compositor.attach_source(a, frames(3, [0, 255, 0, 255])).unwrap();
        compositor.attach_source(b, frames(3, [255, 0, 0, 255])).unwrap();

        let events = compositor.tick();
        assert_eq!(events.len(), 2);
        assert!(events.iter().all(|e| matches!(e, SessionEvent::FirstFrame(_))));
        assert!(compositor.tick().is_empty());
    }

    #[test]
    fn priming_failure_is_reported_once() {
        let mut compositor = Compositor::new(CompositorConfig {
            priming: crate::PrimingPolicy { max_refreshes: 2 },
            ..Default::default()
        });
        let id = compositor.create_session(Box::new(CpuKeyer::new()));
        compositor.attach_source(id, ScriptedSource::new([None])).unwrap();

        assert!(compositor.tick().is_empty());
        let events = compositor.tick();
        assert!(matches!(
            events.as_slice(),
            [SessionEvent::Failed { error: GreenroomError::PipelineInit(_), .. }]
        ));
        assert!(compositor.tick().is_empty());
        assert_eq!(compositor.state(id), Some(SessionState::Stopped));
    }

    #[test]
    fn teardown_removes_session_once() {
        let mut compositor = Compositor::default();
        let id = compositor.create_session(Box::new(CpuKeyer::new()));
        assert!(compositor.teardown(id));
        assert!(!compositor.teardown(id));
        assert!(compositor.is_empty());
        assert!(compositor.attach_source(id, frames(1, [0; 4])).is_err());
    }
}
