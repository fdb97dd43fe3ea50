//! Paint the live document directly, with videos temporarily swapped for
//! their snapshots.

use crate::capture::video::VideoFrameSubstitutionManager;
use crate::capture::{CaptureOptions, CaptureRegion, CaptureResult};
use crate::dom::Document;
use crate::rendering::layout::layout_document;
use crate::rendering::paint::{build_display_list, ColorSupport};
use crate::rendering::raster::rasterize;
use crate::Result;
use log::debug;

#[derive(Debug, Default)]
pub struct StructuralDomSnapshot;

impl StructuralDomSnapshot {
    pub fn new() -> Self {
        StructuralDomSnapshot
    }

    /// Reads computed styles straight from the live tree, so every color
    /// syntax the document accepts is painted as-is. The only mutation is
    /// the video substitution, undone before returning.
    pub async fn capture(
        &self,
        doc: &mut Document,
        region: &CaptureRegion,
        options: &CaptureOptions<'_>,
    ) -> Result<CaptureResult> {
        let videos = VideoFrameSubstitutionManager::new(options.config);
        let substituted = videos.substitute(doc, region.root, options.snapshots);
        let result = paint_region(&substituted, region, options);
        substituted.restore();
        result
    }
}

fn paint_region(doc: &Document, region: &CaptureRegion, options: &CaptureOptions<'_>) -> Result<CaptureResult> {
    let (width, height) = region.pixel_size(region.dpr)?;
    let layout = layout_document(doc);
    let commands = build_display_list(doc, region.root, &layout, ColorSupport::Full);
    debug!("structural snapshot: {} paint commands", commands.len());
    let origin = (region.document_rect.x, region.document_rect.y);
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::SnapshotMap;
    use crate::platform::DeviceMetrics;
    use crate::CaptureConfig;

    const PAGE: &str = r##"<html><body style="margin:0">
        <div id="region" style="width:100px;background-color:oklch(0.628 0.2577 29.23)">
          <video width="40" height="20" data-still="#00ff00"></video>
        </div>
        <canvas id="overlay" width="100" height="20"></canvas>
        </body></html>"##;

    #[tokio::test]
    async fn paints_snapshots_and_restores_the_page() {
        let mut doc = Document::parse_html(PAGE, DeviceMetrics::new(400, 300, 2.0));
        doc.set_scroll(0.0, 10.0);
        let config = CaptureConfig { frame_wait_timeout_ms: 10, ..CaptureConfig::default() };
        let root = doc.find_by_id("region").unwrap();
        let snapshots: SnapshotMap = VideoFrameSubstitutionManager::new(&config)
            .prepare_all_snapshots(&mut doc, root)
            .await;
        let before = doc.structure_signature(doc.root());
        let region = CaptureRegion::measure(&doc, root).unwrap();
        let options = CaptureOptions { config: &config, snapshots: &snapshots, overlay: doc.find_by_id("overlay") };

        let result = StructuralDomSnapshot::new().capture(&mut doc, &region, &options).await.unwrap();
        assert_eq!((result.width, result.height), (200, 40));
        let img = result.decode().unwrap();
        assert_eq!(img.get_pixel(10, 10).0, [0, 255, 0, 255]);
        assert_eq!(img.get_pixel(150, 10).0, [255, 0, 0, 255]);
        assert_eq!(doc.structure_signature(doc.root()), before);

        let slots = doc.slot_count();
        for _ in 0..20 {
            StructuralDomSnapshot::new().capture(&mut doc, &region, &options).await.unwrap();
        }
        assert_eq!(doc.slot_count(), slots);
    }
}
