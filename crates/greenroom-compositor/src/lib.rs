//! Greenroom Compositor - the render loop around the keyer
//!
//! - [`CompositorSession`]: one source, one backend, driven per refresh
//! - [`Compositor`]: several isolated sessions behind one `tick`
//! - [`ParameterController`]: live key parameters, writable from any thread
//! - [`CompositorConfig`]: JSON configuration

pub mod compositor;
pub mod config;
pub mod params;
pub mod session;
pub mod state;

pub use compositor::{Compositor, SessionEvent};
pub use config::CompositorConfig;
pub use params::{ParameterController, VersionedParams};
pub use session::CompositorSession;
pub use state::{FirstFrame, FrameStats, PrimingPolicy, RefreshOutcome, SessionId, SessionState};
