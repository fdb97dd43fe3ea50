//! Annocap
//!
//! Capture a region of a document, rasterize the annotation layer drawn over
//! it, and flatten both into one image.
//!
//! # Features
//!
//! - **Three capture strategies** behind one call: display capture, a
//!   structural snapshot of the live tree, and a normalized DOM clone
//! - **Automatic fallback**: any non-default strategy that fails is retried
//!   with the DOM clone
//! - **Scoped mutations**: video substitution, overlay hiding and color
//!   probes are always undone, including on error paths
//!
//! # Example
//!
//! ```no_run
//! use annocap::annotation::{AnnotationCanvas, AnnotationObject};
//! use annocap::dom::Document;
//! use annocap::platform::DeviceMetrics;
//! use annocap::CaptureConfig;
//!
//! # async fn run() -> annocap::Result<()> {
//! let html = std::fs::read_to_string("page.html")?;
//! let mut doc = Document::parse_html(&html, DeviceMetrics::new(1280, 720, 2.0));
//! let root = doc.find_by_id("content").expect("region");
//!
//! let mut canvas = AnnotationCanvas::new(1280.0, 720.0, 2.0);
//! canvas.add(AnnotationObject::Stroke {
//!     points: vec![[10.0, 10.0], [200.0, 80.0]],
//!     color: "#e11d48".into(),
//!     width: 4.0,
//! });
//!
//! let mut orchestrator = annocap::new_orchestrator(CaptureConfig::default())?;
//! let merged = orchestrator.export_merged(&mut doc, root, &mut canvas, None).await?;
//! println!("{}x{}", merged.width, merged.height);
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

pub mod error;
pub use error::{Error, Result};

pub mod annotation;
pub mod capture;
pub mod color;
pub mod composite;
pub mod dom;
pub mod loader;
pub mod platform;
pub mod rendering;

// Display capture through headless Chrome screenshots
#[cfg(feature = "cdp")]
pub mod cdp;

pub use annotation::{AnnotationCanvas, AnnotationDocument, AnnotationLayerExporter, AnnotationObject};
pub use capture::{
    CaptureOrchestrator, CaptureRegion, CaptureResult, CaptureState, SnapshotMap, StrategyKind,
};
pub use composite::{CompositeResult, CompositingEngine};

/// Configuration for a capture pipeline
///
/// Every timing constant the pipeline waits on lives here rather than in
/// code. The defaults match what interactive use needs:
/// - video frames get 500ms to arrive before the current frame is read
/// - image decoding for compositing is bounded at 5s
///
/// # Examples
///
/// ```
/// let cfg = annocap::CaptureConfig::default();
/// assert_eq!(cfg.video_marker_attribute, "data-capture-video-id");
/// assert!(cfg.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// Preferred capture strategy
    pub strategy: StrategyKind,
    /// How long to wait for a video's next decoded frame
    pub frame_wait_timeout_ms: u64,
    /// Fixed wait for sources that cannot signal frame readiness
    pub fallback_frame_delay_ms: u64,
    /// Upper bound on decoding each image during compositing
    pub image_load_timeout_ms: u64,
    /// Delay standing in for one display refresh between annotation renders
    pub refresh_interval_ms: u64,
    /// Attribute correlating videos with their snapshots
    pub video_marker_attribute: String,
    /// Hide the annotation overlay while a display frame is grabbed
    pub hide_overlay_during_screen_capture: bool,
    /// Backdrop for opaque exports (any CSS color)
    pub background: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            strategy: StrategyKind::DomClone,
            frame_wait_timeout_ms: 500,
            fallback_frame_delay_ms: 100,
            image_load_timeout_ms: 5000,
            refresh_interval_ms: 16,
            video_marker_attribute: "data-capture-video-id".to_string(),
            hide_overlay_during_screen_capture: true,
            background: "white".to_string(),
        }
    }
}

impl CaptureConfig {
    /// Load a JSON config file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::ConfigError(format!("{}: {}", path.as_ref().display(), e)))?;
        let config: CaptureConfig = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.frame_wait_timeout_ms == 0 {
            return Err(Error::ConfigError("frame_wait_timeout_ms must be positive".into()));
        }
        if self.image_load_timeout_ms == 0 {
            return Err(Error::ConfigError("image_load_timeout_ms must be positive".into()));
        }
        let marker = self.video_marker_attribute.trim();
        if marker.is_empty() || marker.contains(char::is_whitespace) {
            return Err(Error::ConfigError(format!(
                "invalid video marker attribute {:?}",
                self.video_marker_attribute
            )));
        }
        if color::parse_color(&self.background).is_none() {
            return Err(Error::ConfigError(format!("unsupported background color {:?}", self.background)));
        }
        Ok(())
    }

    /// The backdrop as RGBA, white when unparseable.
    pub fn background_rgba(&self) -> [u8; 4] {
        color::parse_color(&self.background)
            .map(|c| c.to_rgba8())
            .unwrap_or([255, 255, 255, 255])
    }
}

/// Viewport dimensions in CSS px
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
        }
    }
}

/// Create an orchestrator for a host without display capture.
///
/// Screen-capture preferences still work: they fail as capability-absent
/// and fall back to the DOM clone. Use [`CaptureOrchestrator::new`] with a
/// [`platform::HostPlatform`] to supply a real display.
pub fn new_orchestrator(config: CaptureConfig) -> Result<CaptureOrchestrator> {
    CaptureOrchestrator::new(config, &platform::NoopPlatform::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = CaptureConfig::default();
        assert_eq!(config.strategy, StrategyKind::DomClone);
        assert_eq!(config.frame_wait_timeout_ms, 500);
        assert_eq!(config.fallback_frame_delay_ms, 100);
        assert_eq!(config.image_load_timeout_ms, 5000);
        assert!(config.hide_overlay_during_screen_capture);
        assert_eq!(config.background_rgba(), [255, 255, 255, 255]);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: CaptureConfig = serde_json::from_str(r##"{"strategy":"structural","background":"#000"}"##).unwrap();
        assert_eq!(config.strategy, StrategyKind::Structural);
        assert_eq!(config.frame_wait_timeout_ms, 500);
        assert_eq!(config.background_rgba(), [0, 0, 0, 255]);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let zero = CaptureConfig { frame_wait_timeout_ms: 0, ..CaptureConfig::default() };
        assert!(matches!(zero.validate(), Err(Error::ConfigError(_))));
        let marker = CaptureConfig { video_marker_attribute: " ".into(), ..CaptureConfig::default() };
        assert!(marker.validate().is_err());
        let bg = CaptureConfig { background: "oklch(nope)".into(), ..CaptureConfig::default() };
        assert!(bg.validate().is_err());
        assert!(new_orchestrator(zero).is_err());
    }

    #[test]
    fn test_viewport() {
        let viewport = Viewport { width: 1920, height: 1080 };
        assert_eq!(viewport, Viewport { width: 1920, height: 1080 });
        assert_eq!(Viewport::default().width, 1280);
    }
}
