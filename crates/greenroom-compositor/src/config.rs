//! Compositor configuration, loaded from JSON.

use crate::state::PrimingPolicy;
use greenroom_core::memory_budget::FRAME_QUEUE_CAPACITY;
use greenroom_core::{ChromaKeyParams, GreenroomError, Result};
use greenroom_gpu::GpuConfig;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Highest refresh rate the host loop will pace to.
pub const MAX_REFRESH_RATE_HZ: u32 = 240;

/// Settings shared by every session a [`Compositor`](crate::Compositor) hosts.
///
/// Every field has a default, so a partial file (or `{}`) is valid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompositorConfig {
    /// Parameters new sessions start with.
    pub default_params: ChromaKeyParams,
    pub priming: PrimingPolicy,
    /// Display refresh rate the demo host paces `tick` to.
    pub refresh_rate_hz: u32,
    /// Undelivered frames a source mailbox may hold.
    pub frame_queue_capacity: usize,
    pub gpu: GpuConfig,
}

impl Default for CompositorConfig {
    fn default() -> Self {
        Self {
            default_params: ChromaKeyParams::default(),
            priming: PrimingPolicy::default(),
            refresh_rate_hz: 60,
            frame_queue_capacity: FRAME_QUEUE_CAPACITY,
            gpu: GpuConfig::default(),
        }
    }
}

impl CompositorConfig {
    /// Read and validate a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        let config = Self::from_json_str(&data)?;
        info!(path = %path.display(), "Loaded compositor config");
        Ok(config)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| GreenroomError::Config(format!("invalid config: {e}")))?;
        Ok(config.validated())
    }

    /// Write the config as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| GreenroomError::Config(format!("serialize config: {e}")))?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// `<config dir>/greenroom/config.json`.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("greenroom")
            .join("config.json")
    }

    /// Load from [`default_path`](Self::default_path), falling back to
    /// defaults when the file is missing or unreadable.
    pub fn load_or_default() -> Self {
        let path = Self::default_path();
        if !path.exists() {
            return Self::default();
        }
        match Self::load(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring config file");
                Self::default()
            }
        }
    }

    /// Copy with every value clamped into a usable range.
    pub fn validated(self) -> Self {
        Self {
            default_params: self.default_params.clamped(),
            priming: PrimingPolicy {
                max_refreshes: self.priming.max_refreshes.max(1),
            },
            refresh_rate_hz: self.refresh_rate_hz.clamp(1, MAX_REFRESH_RATE_HZ),
            frame_queue_capacity: self.frame_queue_capacity.max(1),
            gpu: self.gpu,
        }
    }

    /// Time between two refreshes.
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(1) / self.refresh_rate_hz.clamp(1, MAX_REFRESH_RATE_HZ)
    }
}
