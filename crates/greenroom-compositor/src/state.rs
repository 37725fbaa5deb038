//! Session lifecycle types.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use uuid::Uuid;

/// Identifies one session within a [`Compositor`](crate::Compositor).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SessionId(Uuid);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Where a session is in its life.
///
/// `Idle` until a source is attached, `Priming` until the first frame is on
/// screen, `Running` after that. `Stopped` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    #[default]
    Idle,
    Priming,
    Running,
    Stopped,
}

impl SessionState {
    /// Whether a refresh does any work in this state.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Priming | Self::Running)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Priming => "priming",
            Self::Running => "running",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// How long a session waits for its first usable frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrimingPolicy {
    /// Refreshes without a usable frame before the session gives up.
    pub max_refreshes: u32,
}

impl Default for PrimingPolicy {
    fn default() -> Self {
        Self { max_refreshes: 120 }
    }
}

/// What one call to `on_refresh` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// The session is idle or stopped.
    Inactive,
    /// Still waiting for a first frame; `attempt` refreshes used so far.
    Priming { attempt: u32 },
    /// The first frame was rendered and presented.
    FirstFrame,
    /// A new frame or new parameters were rendered and presented.
    Rendered,
    /// Nothing changed; the previous output was presented again.
    Presented,
}

/// Reported once per session when its first frame reaches the screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirstFrame {
    pub session: SessionId,
    pub width: u32,
    pub height: u32,
    pub pts: Duration,
}

/// Per-session counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameStats {
    /// Active refreshes (priming or running).
    pub refreshes: u64,
    pub uploaded_frames: u64,
    pub rendered_frames: u64,
    pub presented_frames: u64,
    /// Frames the upload stage rejected as unsupported.
    pub skipped_frames: u64,
    pub failed_uploads: u64,
    pub failed_renders: u64,
    /// Surface reallocations after the first allocation.
    pub reallocations: u64,
}
