//! Platform surface: device metrics, video decoding hooks and display capture
//!
//! This module contains the public types and traits the capture pipeline
//! consumes from its host. Hosts that lack a surface (most notably display
//! capture) report it as absent instead of failing.

pub mod device;
pub mod display;
pub mod media;

use std::sync::Arc;

pub use device::DeviceMetrics;
pub use display::{DisplayCapture, MediaStream, StaticDisplay, StreamGuard};
pub use media::{MediaState, StillVideo, TaintedVideo, VideoFrameSource};

/// A small composite trait that hosts implement to hand platform primitives
/// to the capture pipeline in a typed way.
pub trait PlatformApi: Send + Sync {
    fn device_metrics(&self) -> DeviceMetrics;

    /// `None` when the host has no display-capture API at all.
    fn display_capture(&self) -> Option<Arc<dyn DisplayCapture>>;
}

/// A platform without display capture, used in tests and as a safe default.
pub struct NoopPlatform {
    metrics: DeviceMetrics,
}

impl NoopPlatform {
    pub fn new() -> Self {
        NoopPlatform {
            metrics: DeviceMetrics::default(),
        }
    }

    pub fn with_metrics(metrics: DeviceMetrics) -> Self {
        NoopPlatform { metrics }
    }
}

impl Default for NoopPlatform {
    fn default() -> Self {
        Self::new()
    }
}

impl PlatformApi for NoopPlatform {
    fn device_metrics(&self) -> DeviceMetrics {
        self.metrics
    }

    fn display_capture(&self) -> Option<Arc<dyn DisplayCapture>> {
        None
    }
}

/// A platform with a display-capture backend.
pub struct HostPlatform {
    metrics: DeviceMetrics,
    display: Arc<dyn DisplayCapture>,
}

impl HostPlatform {
    pub fn new(metrics: DeviceMetrics, display: Arc<dyn DisplayCapture>) -> Self {
        HostPlatform { metrics, display }
    }
}

impl PlatformApi for HostPlatform {
    fn device_metrics(&self) -> DeviceMetrics {
        self.metrics
    }

    fn display_capture(&self) -> Option<Arc<dyn DisplayCapture>> {
        Some(self.display.clone())
    }
}
