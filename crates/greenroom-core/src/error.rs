//! Error types for Greenroom.

use thiserror::Error;

/// Main error type for compositor operations.
#[derive(Error, Debug)]
pub enum GreenroomError {
    /// Shader compile/link failure, no usable GPU, or a session that never
    /// produced a first frame. Fatal to starting a session.
    #[error("Pipeline initialization failed: {0}")]
    PipelineInit(String),

    /// A single frame cannot be uploaded. The frame is skipped.
    #[error("Unsupported frame: {0}")]
    FrameFormat(String),

    /// The graphics context was invalidated externally. Fatal to the session.
    #[error("GPU context lost: {0}")]
    ContextLost(String),

    /// A single texture copy failed. The frame is skipped.
    #[error("Upload error: {0}")]
    Upload(String),

    /// A single draw failed. The previous output stays on screen.
    #[error("Render error: {0}")]
    Render(String),

    #[error("Invalid session state: {0}")]
    InvalidState(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GreenroomError {
    /// Whether this error ends the session that produced it.
    ///
    /// Fatal errors are surfaced to the session owner; everything else is
    /// logged, counted and skipped by the render loop.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::PipelineInit(_) | Self::ContextLost(_))
    }
}

/// Result type alias for Greenroom operations.
pub type Result<T> = std::result::Result<T, GreenroomError>;
