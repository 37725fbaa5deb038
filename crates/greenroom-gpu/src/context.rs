//! GPU context management.

use greenroom_core::memory_budget::MAX_FRAME_DIMENSION;
use greenroom_core::{GreenroomError, Result};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Adapter preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerPreference {
    #[default]
    HighPerformance,
    LowPower,
}

impl From<PowerPreference> for wgpu::PowerPreference {
    fn from(p: PowerPreference) -> Self {
        match p {
            PowerPreference::HighPerformance => wgpu::PowerPreference::HighPerformance,
            PowerPreference::LowPower => wgpu::PowerPreference::LowPower,
        }
    }
}

/// How to pick the adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct GpuConfig {
    pub power_preference: PowerPreference,
    /// Use the software adapter, if the platform has one.
    pub force_fallback_adapter: bool,
}

/// State shared with the device callbacks.
#[derive(Debug, Default)]
struct DeviceHealth {
    lost: AtomicBool,
    lost_reason: Mutex<Option<String>>,
    uncaptured_errors: AtomicU64,
}

/// GPU context holding device and queue.
///
/// The context is headless: the compositor renders into its own target and
/// the host decides how to display it.
pub struct GpuContext {
    pub instance: wgpu::Instance,
    pub adapter: wgpu::Adapter,
    pub device: Arc<wgpu::Device>,
    pub queue: Arc<wgpu::Queue>,
    health: Arc<DeviceHealth>,
}

impl GpuContext {
    /// Create a new GPU context.
    ///
    /// Fails with [`GreenroomError::PipelineInit`] when no adapter or device
    /// is available.
    pub async fn new(config: &GpuConfig) -> Result<Self> {
        // Prefer Metal on macOS, Vulkan on others
        #[cfg(target_os = "macos")]
        let backends = wgpu::Backends::METAL;
        #[cfg(not(target_os = "macos"))]
        let backends = wgpu::Backends::VULKAN | wgpu::Backends::DX12 | wgpu::Backends::GL;

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends,
            ..Default::default()
        });

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: config.power_preference.into(),
                compatible_surface: None,
                force_fallback_adapter: config.force_fallback_adapter,
            })
            .await
            .ok_or_else(|| {
                GreenroomError::PipelineInit("No suitable GPU adapter found".to_string())
            })?;

        info!("Using GPU adapter: {:?}", adapter.get_info());

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Greenroom Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits {
                        max_texture_dimension_2d: MAX_FRAME_DIMENSION,
                        ..wgpu::Limits::downlevel_defaults()
                    },
                    memory_hints: wgpu::MemoryHints::Performance,
                },
                None,
            )
            .await
            .map_err(|e| GreenroomError::PipelineInit(format!("Failed to create device: {}", e)))?;

        let health = Arc::new(DeviceHealth::default());

        let lost = health.clone();
        device.set_device_lost_callback(move |reason, message| {
            error!(?reason, %message, "GPU device lost");
            *lost.lost_reason.lock() = Some(format!("{reason:?}: {message}"));
            lost.lost.store(true, Ordering::Release);
        });

        let uncaptured = health.clone();
        device.on_uncaptured_error(Box::new(move |err| {
            uncaptured.uncaptured_errors.fetch_add(1, Ordering::Relaxed);
            warn!("Uncaptured GPU error: {}", err);
        }));

        Ok(Self {
            instance,
            adapter,
            device: Arc::new(device),
            queue: Arc::new(queue),
            health,
        })
    }

    /// Create a new GPU context (blocking version).
    pub fn new_blocking(config: &GpuConfig) -> Result<Self> {
        pollster::block_on(Self::new(config))
    }

    /// Whether the device has been lost. Once set this never clears.
    pub fn is_lost(&self) -> bool {
        self.health.lost.load(Ordering::Acquire)
    }

    /// The reason reported with the loss, if any.
    pub fn lost_reason(&self) -> Option<String> {
        self.health.lost_reason.lock().clone()
    }

    /// Fail with [`GreenroomError::ContextLost`] if the device is gone.
    pub fn ensure_alive(&self) -> Result<()> {
        if self.is_lost() {
            let reason = self
                .lost_reason()
                .unwrap_or_else(|| "device lost".to_string());
            return Err(GreenroomError::ContextLost(reason));
        }
        Ok(())
    }

    /// Validation errors raised outside any error scope so far.
    pub fn uncaptured_errors(&self) -> u64 {
        self.health.uncaptured_errors.load(Ordering::Relaxed)
    }

    /// Run `f` inside a validation error scope and return the first error
    /// it raised, if any.
    pub fn validation_scope<T>(&self, f: impl FnOnce(&wgpu::Device) -> T) -> (T, Option<wgpu::Error>) {
        self.device.push_error_scope(wgpu::ErrorFilter::Validation);
        let value = f(&self.device);
        let err = pollster::block_on(self.device.pop_error_scope());
        (value, err)
    }
}
