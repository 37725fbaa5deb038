//! Live parameter control.
//!
//! A [`ParameterController`] is a cheap, cloneable handle. The host (a UI
//! slider, a remote control channel) writes through one clone while the
//! render loop reads a versioned snapshot through another on every refresh.

use greenroom_core::ChromaKeyParams;
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::debug;

/// Parameters together with the version they were published under.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VersionedParams {
    pub version: u64,
    pub params: ChromaKeyParams,
}

#[derive(Debug)]
struct Published {
    version: u64,
    params: ChromaKeyParams,
}

/// Shared, thread-safe holder of the current [`ChromaKeyParams`].
#[derive(Debug, Clone)]
pub struct ParameterController {
    inner: Arc<RwLock<Published>>,
}

impl Default for ParameterController {
    fn default() -> Self {
        Self::new(ChromaKeyParams::default())
    }
}

impl ParameterController {
    /// Start at version 0 with `defaults` (clamped).
    pub fn new(defaults: ChromaKeyParams) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Published {
                version: 0,
                params: defaults.clamped(),
            })),
        }
    }

    /// Replace every parameter at once. Returns the new version.
    pub fn set_parameters(&self, params: ChromaKeyParams) -> u64 {
        let mut inner = self.inner.write();
        inner.params = params.clamped();
        inner.version += 1;
        debug!(version = inner.version, "Key parameters replaced");
        inner.version
    }

    pub fn get_parameters(&self) -> ChromaKeyParams {
        self.inner.read().params
    }

    /// Parameters and version read under one lock.
    pub fn snapshot(&self) -> VersionedParams {
        let inner = self.inner.read();
        VersionedParams {
            version: inner.version,
            params: inner.params,
        }
    }

    /// Read-modify-write under the write lock, so concurrent partial updates
    /// do not lose each other's fields.
    pub fn update(&self, f: impl FnOnce(&mut ChromaKeyParams)) -> u64 {
        let mut inner = self.inner.write();
        let mut params = inner.params;
        f(&mut params);
        inner.params = params.clamped();
        inner.version += 1;
        debug!(version = inner.version, "Key parameters updated");
        inner.version
    }

    pub fn version(&self) -> u64 {
        self.inner.read().version
    }
}
