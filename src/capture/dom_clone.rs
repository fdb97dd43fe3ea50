//! Rasterize an off-document clone of the region.
//!
//! The clone loses every stylesheet; the normalizer then writes resolved
//! colors and spacing inline, snapshots replace videos, and the painter runs
//! with legacy color support only.

use crate::capture::normalize::ColorSpaceNormalizer;
use crate::capture::video::replace_in_clone;
use crate::capture::{CaptureOptions, CaptureRegion, CaptureResult};
use crate::dom::Document;
use crate::rendering::layout::{font_size, layout_subtree};
use crate::rendering::paint::{build_display_list, ColorSupport};
use crate::rendering::raster::rasterize;
use crate::{Error, Result};
use log::debug;

#[derive(Debug, Default)]
pub struct DomCloneRasterizer {
    normalizer: ColorSpaceNormalizer,
}

impl DomCloneRasterizer {
    pub fn new() -> Self {
        DomCloneRasterizer::default()
    }

    pub async fn capture(
        &self,
        doc: &mut Document,
        region: &CaptureRegion,
        options: &CaptureOptions<'_>,
    ) -> Result<CaptureResult> {
        let (width, height) = region.pixel_size(region.dpr)?;

        let mut clone = doc.clone_subtree(region.root)?;
        clone.strip_stylesheets();
        self.normalizer.normalize(doc, &mut clone);

        let root = clone.root();
        let fs = font_size(doc, region.root);
        if let Err(e) = clone.set_style(root, "font-size", &format!("{}px", fs)) {
            debug!("dom clone: root font-size left unpinned: {}", e);
        }
        let available = region.containing_width;
        let layout = layout_subtree(&clone, root, 0.0, 0.0, available);
        let replaced = replace_in_clone(&mut clone, &layout, options.snapshots, &options.config.video_marker_attribute);
        debug!("dom clone: {} videos replaced by snapshots", replaced);

        let layout = layout_subtree(&clone, root, 0.0, 0.0, available);
        let origin = layout
            .get(root)
            .map(|b| (b.rect.x, b.rect.y))
            .ok_or_else(|| Error::RenderError("cloned region produced no layout".into()))?;
        let commands = build_display_list(&clone, root, &layout, ColorSupport::Legacy);
        let img = rasterize(
            &commands,
            origin,
            width,
            height,
            region.dpr,
            Some(options.config.background_rgba()),
        );
        CaptureResult::from_image(&img)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::SnapshotMap;
    use crate::platform::DeviceMetrics;
    use crate::rendering::layout::layout_document;
    use crate::rendering::paint::build_display_list;
    use crate::CaptureConfig;

    const PAGE: &str = r#"<html><head><style>
        #region { margin: 8px; padding: 4px; background-color: oklch(0.628 0.2577 29.23); }
        .band { height: 10px; background-color: lab(100 0 0); }
        </style></head><body>
        <div id="region"><div class="band"></div><canvas width="50" height="50"></canvas></div>
        </body></html>"#;

    fn region(doc: &Document) -> CaptureRegion {
        CaptureRegion::measure(doc, doc.find_by_id("region").unwrap()).unwrap()
    }

    #[tokio::test]
    async fn clone_renders_perceptual_colors_in_legacy_painter() {
        let mut doc = Document::parse_html(PAGE, DeviceMetrics::new(200, 100, 1.0));
        let region = region(&doc);
        let config = CaptureConfig::default();
        let snapshots = SnapshotMap::new();
        let options = CaptureOptions { config: &config, snapshots: &snapshots, overlay: None };

        let result = DomCloneRasterizer::new().capture(&mut doc, &region, &options).await.unwrap();
        assert_eq!((result.width, result.height), (168, 68));
        let img = result.decode().unwrap();
        assert_eq!(img.get_pixel(1, 1).0, [255, 0, 0, 255]);
        assert_eq!(img.get_pixel(10, 8).0, [255, 255, 255, 255]);
    }

    #[tokio::test]
    async fn clone_output_ignores_scroll_and_leaves_live_page_alone() {
        let mut doc = Document::parse_html(PAGE, DeviceMetrics::new(200, 100, 2.0));
        let config = CaptureConfig::default();
        let snapshots = SnapshotMap::new();
        let options = CaptureOptions { config: &config, snapshots: &snapshots, overlay: None };

        let r = region(&doc);
        let unscrolled = DomCloneRasterizer::new().capture(&mut doc, &r, &options).await.unwrap();
        doc.set_scroll(0.0, 40.0);
        let before = doc.structure_signature(doc.root());
        let r = region(&doc);
        let scrolled = DomCloneRasterizer::new().capture(&mut doc, &r, &options).await.unwrap();
        assert_eq!(unscrolled, scrolled);
        assert_eq!(doc.structure_signature(doc.root()), before);
    }

    #[tokio::test]
    async fn repeated_captures_keep_the_arena_flat() {
        let mut doc = Document::parse_html(PAGE, DeviceMetrics::new(200, 100, 1.0));
        let r = region(&doc);
        let config = CaptureConfig::default();
        let snapshots = SnapshotMap::new();
        let options = CaptureOptions { config: &config, snapshots: &snapshots, overlay: None };
        let rasterizer = DomCloneRasterizer::new();

        rasterizer.capture(&mut doc, &r, &options).await.unwrap();
        let slots = doc.slot_count();
        for _ in 0..200 {
            rasterizer.capture(&mut doc, &r, &options).await.unwrap();
        }
        assert_eq!(doc.slot_count(), slots);
    }

    #[test]
    fn legacy_painter_drops_unresolved_colors() {
        let doc = Document::parse_html(PAGE, DeviceMetrics::default());
        let layout = layout_document(&doc);
        let root = doc.find_by_id("region").unwrap();
        assert!(build_display_list(&doc, root, &layout, ColorSupport::Legacy).is_empty());
    }
}
