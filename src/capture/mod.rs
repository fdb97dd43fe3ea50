//! Raster acquisition for one document region.
//!
//! Three strategies turn a [`CaptureRegion`] into a [`CaptureResult`]:
//!
//! - [`SystemScreenCapture`]: crops a frame grabbed from a display-capture stream
//! - [`StructuralDomSnapshot`]: paints the live document, videos swapped for stills
//! - [`DomCloneRasterizer`]: paints a normalized, stylesheet-free clone
//!
//! All of them size their output from the region's content (scroll) size and
//! anchor rendering at the region's top-left, whatever the scroll offset.

pub mod dom_clone;
pub mod normalize;
pub mod orchestrator;
pub mod screen;
pub mod structural;
pub mod video;

pub use dom_clone::DomCloneRasterizer;
pub use normalize::{ColorSpaceNormalizer, NormalizeReport};
pub use orchestrator::{CaptureOrchestrator, CaptureState};
pub use screen::SystemScreenCapture;
pub use structural::StructuralDomSnapshot;
pub use video::{VideoFrameSubstitutionManager, VideoSubstitution};

use crate::dom::{Document, NodeId};
use crate::rendering::layout::{layout_document, Rect};
use crate::rendering::{decode_data_url, digest, encode_png_data_url};
use crate::{CaptureConfig, Error, Result};
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Snapshot data URLs keyed by the marker written onto each video.
pub type SnapshotMap = BTreeMap<String, String>;

/// The subtree being captured, measured against the live layout.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptureRegion {
    pub root: NodeId,
    /// Border box in document coordinates.
    pub document_rect: Rect,
    /// Border box relative to the viewport (document rect minus scroll).
    pub bounding_rect: Rect,
    /// Full scroll size, including overflow outside the viewport.
    pub content_width: f32,
    pub content_height: f32,
    /// Content width of the root's parent; percentages on the root resolve
    /// against it.
    pub containing_width: f32,
    pub dpr: f32,
}

impl CaptureRegion {
    /// Measure `root` in `doc`. Fails for regions that are not rendered or
    /// have no area.
    pub fn measure(doc: &Document, root: NodeId) -> Result<Self> {
        let layout = layout_document(doc);
        let b = layout
            .get(root)
            .ok_or_else(|| Error::RenderError(format!("capture region {} is not rendered", root.index())))?;
        if b.scroll_width <= 0.0 || b.scroll_height <= 0.0 {
            return Err(Error::RenderError(format!(
                "zero-size capture region ({}x{})",
                b.scroll_width, b.scroll_height
            )));
        }
        let containing_width = doc
            .parent(root)
            .and_then(|p| layout.get(p))
            .map(|p| p.content_width())
            .unwrap_or(doc.viewport().width as f32);
        let (sx, sy) = doc.scroll();
        Ok(CaptureRegion {
            root,
            document_rect: b.rect,
            bounding_rect: b.rect.translate(-sx, -sy),
            content_width: b.scroll_width,
            content_height: b.scroll_height,
            containing_width,
            dpr: doc.metrics().dpr,
        })
    }

    /// Output raster size at `scale` physical pixels per CSS pixel.
    pub fn pixel_size(&self, scale: f32) -> Result<(u32, u32)> {
        let w = (self.content_width * scale).round();
        let h = (self.content_height * scale).round();
        if !(w >= 1.0 && h >= 1.0) {
            return Err(Error::RenderError(format!("zero-size raster at scale {}", scale)));
        }
        Ok((w as u32, h as u32))
    }
}

/// An encoded raster plus its pixel dimensions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaptureResult {
    /// `data:image/png;base64,...`
    pub image_data: String,
    pub width: u32,
    pub height: u32,
}

impl CaptureResult {
    pub fn from_image(img: &RgbaImage) -> Result<Self> {
        Ok(CaptureResult {
            image_data: encode_png_data_url(img)?,
            width: img.width(),
            height: img.height(),
        })
    }

    pub fn decode(&self) -> Result<RgbaImage> {
        decode_data_url(&self.image_data)
    }

    /// sha256 of the decoded pixels.
    pub fn digest(&self) -> Result<String> {
        Ok(digest(&self.decode()?))
    }
}

/// Per-call inputs shared by every strategy.
#[derive(Debug, Clone, Copy)]
pub struct CaptureOptions<'a> {
    pub config: &'a CaptureConfig,
    /// Stills for the region's videos, prepared before the strategy runs.
    pub snapshots: &'a SnapshotMap,
    /// The annotation canvas layered over the region, if any.
    pub overlay: Option<NodeId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum StrategyKind {
    SystemScreen,
    Structural,
    #[default]
    DomClone,
}

impl StrategyKind {
    /// Only the DOM-clone path has no fallback.
    pub fn is_default(self) -> bool {
        self == StrategyKind::DomClone
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StrategyKind::SystemScreen => "system-screen",
            StrategyKind::Structural => "structural",
            StrategyKind::DomClone => "dom-clone",
        })
    }
}

/// One capture mechanism behind the shared `capture(region, options)` call.
pub enum CaptureStrategy {
    SystemScreen(SystemScreenCapture),
    Structural(StructuralDomSnapshot),
    DomClone(DomCloneRasterizer),
}

impl CaptureStrategy {
    pub fn kind(&self) -> StrategyKind {
        match self {
            CaptureStrategy::SystemScreen(_) => StrategyKind::SystemScreen,
            CaptureStrategy::Structural(_) => StrategyKind::Structural,
            CaptureStrategy::DomClone(_) => StrategyKind::DomClone,
        }
    }

    pub async fn capture(
        &self,
        doc: &mut Document,
        region: &CaptureRegion,
        options: &CaptureOptions<'_>,
    ) -> Result<CaptureResult> {
        match self {
            CaptureStrategy::SystemScreen(s) => s.capture(doc, region, options).await,
            CaptureStrategy::Structural(s) => s.capture(doc, region, options).await,
            CaptureStrategy::DomClone(s) => s.capture(doc, region, options).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::DeviceMetrics;

    const PAGE: &str = r#"<html><body style="margin:0">
        <div id="a" style="width:200px;height:100px;margin:10px;padding:5px"></div>
        <div id="tall" style="width:100px;height:50px"><div style="height:300px"></div></div>
        <div id="empty" style="height:0"></div>
    </body></html>"#;

    #[test]
    fn region_uses_scroll_offset_for_bounding_rect() {
        let mut doc = Document::parse_html(PAGE, DeviceMetrics::new(800, 600, 2.0));
        doc.set_scroll(0.0, 4.0);
        let a = doc.find_by_id("a").unwrap();
        let region = CaptureRegion::measure(&doc, a).unwrap();
        assert_eq!(region.document_rect, Rect::new(10.0, 10.0, 210.0, 110.0));
        assert_eq!(region.bounding_rect, Rect::new(10.0, 6.0, 210.0, 110.0));
        assert_eq!(region.containing_width, 800.0);
        assert_eq!(region.pixel_size(region.dpr).unwrap(), (420, 220));
    }

    #[test]
    fn region_content_size_includes_overflow() {
        let doc = Document::parse_html(PAGE, DeviceMetrics::default());
        let tall = doc.find_by_id("tall").unwrap();
        let region = CaptureRegion::measure(&doc, tall).unwrap();
        assert_eq!(region.document_rect.height, 50.0);
        assert_eq!(region.content_height, 300.0);
    }

    #[test]
    fn zero_size_region_is_rejected() {
        let doc = Document::parse_html(PAGE, DeviceMetrics::default());
        let empty = doc.find_by_id("empty").unwrap();
        assert!(matches!(CaptureRegion::measure(&doc, empty), Err(Error::RenderError(_))));
    }

    #[test]
    fn strategy_kind_serializes_kebab_case() {
        let s = serde_json::to_string(&StrategyKind::SystemScreen).unwrap();
        assert_eq!(s, "\"system-screen\"");
        let k: StrategyKind = serde_json::from_str("\"dom-clone\"").unwrap();
        assert!(k.is_default());
        assert_eq!(StrategyKind::Structural.to_string(), "structural");
    }
}
