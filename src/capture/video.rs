//! Still-frame snapshots for `<video>` elements.
//!
//! Videos paint as blank regions in every DOM-based strategy. Before a capture
//! each video in the region is tagged with a stable marker and its current
//! frame is encoded as a PNG data URL. Strategies then either swap the live
//! video for an image ([`VideoSubstitution`]) or build the image directly in
//! their clone.

use crate::capture::SnapshotMap;
use crate::dom::{Document, NodeId};
use crate::platform::VideoFrameSource;
use crate::rendering::encode_png_data_url;
use crate::rendering::layout::{layout_document, LayoutTree};
use crate::{CaptureConfig, Result};
use image::imageops::{self, FilterType};
use log::{debug, warn};
use std::collections::HashSet;
use std::ops::Deref;
use std::sync::Arc;
use std::time::Duration;

pub struct VideoFrameSubstitutionManager {
    marker: String,
    frame_wait: Duration,
    fallback_delay: Duration,
}

impl VideoFrameSubstitutionManager {
    pub fn new(config: &CaptureConfig) -> Self {
        VideoFrameSubstitutionManager {
            marker: config.video_marker_attribute.clone(),
            frame_wait: Duration::from_millis(config.frame_wait_timeout_ms),
            fallback_delay: Duration::from_millis(config.fallback_frame_delay_ms),
        }
    }

    /// Attribute correlating a video with its snapshot.
    pub fn marker(&self) -> &str {
        &self.marker
    }

    /// Tag `video` with `id` and snapshot its current frame. Returns `None`
    /// when the video has no decoder, no size, or refuses the pixel read.
    pub async fn capture_first_frame(&self, doc: &mut Document, video: NodeId, id: &str) -> Option<String> {
        if let Err(e) = self.tag(doc, video, id) {
            warn!("cannot tag video {}: {}", video.index(), e);
            return None;
        }
        let source = doc.video_source(video)?;
        self.grab(source).await
    }

    /// Snapshot every video under `root` concurrently. Videos that fail are
    /// left out of the map.
    pub async fn prepare_all_snapshots(&self, doc: &mut Document, root: NodeId) -> SnapshotMap {
        let videos = doc.elements_by_tag(root, "video");
        let mut used: HashSet<String> = doc
            .elements_by_tag(doc.root(), "video")
            .into_iter()
            .filter_map(|v| doc.attribute(v, &self.marker).map(str::to_string))
            .collect();
        let mut next = 0usize;

        let mut jobs = Vec::with_capacity(videos.len());
        for video in videos {
            let id = match doc.attribute(video, &self.marker) {
                Some(existing) => existing.to_string(),
                None => loop {
                    let candidate = next.to_string();
                    next += 1;
                    if used.insert(candidate.clone()) {
                        break candidate;
                    }
                },
            };
            if let Err(e) = self.tag(doc, video, &id) {
                warn!("cannot tag video {}: {}", video.index(), e);
                continue;
            }
            match doc.video_source(video) {
                Some(source) => jobs.push(async move { (id, self.grab(source).await) }),
                None => debug!("video {} has no decoder; skipping snapshot", id),
            }
        }

        let total = jobs.len();
        let snapshots: SnapshotMap = futures::future::join_all(jobs)
            .await
            .into_iter()
            .filter_map(|(id, url)| url.map(|u| (id, u)))
            .collect();
        debug!("prepared {}/{} video snapshots", snapshots.len(), total);
        snapshots
    }

    /// Put a same-size image carrying the snapshot in front of every tagged
    /// video under `root` and hide the video. Undone when the guard drops.
    pub fn substitute<'d>(
        &self,
        doc: &'d mut Document,
        root: NodeId,
        snapshots: &SnapshotMap,
    ) -> VideoSubstitution<'d> {
        let layout = layout_document(doc);
        let mut pairs = Vec::new();
        for video in doc.elements_by_tag(root, "video") {
            let Some(url) = doc.attribute(video, &self.marker).and_then(|id| snapshots.get(id)) else {
                continue;
            };
            let url = url.clone();
            match stand_in(doc, &layout, video, &url) {
                Ok(Some(img)) => pairs.push((video, img)),
                Ok(None) => {}
                Err(e) => warn!("failed to substitute video {}: {}", video.index(), e),
            }
        }
        debug!("substituted {} videos", pairs.len());
        VideoSubstitution { doc, pairs }
    }

    fn tag(&self, doc: &mut Document, video: NodeId, id: &str) -> Result<()> {
        if !doc.has_attribute(video, "crossorigin") {
            doc.set_attribute(video, "crossorigin", "anonymous")?;
        }
        doc.set_attribute(video, &self.marker, id)
    }

    async fn grab(&self, source: Arc<dyn VideoFrameSource>) -> Option<String> {
        if source.supports_frame_callback() {
            if tokio::time::timeout(self.frame_wait, source.next_frame()).await.is_err() {
                debug!("no frame within {:?}; reading current frame", self.frame_wait);
            }
        } else {
            tokio::time::sleep(self.fallback_delay).await;
        }

        let (w, h) = source.intrinsic_size();
        if w == 0 || h == 0 {
            debug!("video has no intrinsic size yet");
            return None;
        }
        let frame = match source.read_frame() {
            Ok(f) => f,
            Err(e) => {
                warn!("video frame read failed: {}", e);
                return None;
            }
        };
        let surface = if frame.dimensions() == (w, h) {
            frame
        } else {
            imageops::resize(&frame, w, h, FilterType::Triangle)
        };
        match encode_png_data_url(&surface) {
            Ok(url) => Some(url),
            Err(e) => {
                warn!("video snapshot encode failed: {}", e);
                None
            }
        }
    }
}

/// Build the image that stands in for `video` and insert it just before it.
/// The video is hidden; `None` when the video is not rendered.
fn stand_in(doc: &mut Document, layout: &LayoutTree, video: NodeId, url: &str) -> Result<Option<NodeId>> {
    let Some(content) = layout.get(video).map(|b| b.content_rect()) else {
        return Ok(None);
    };
    let img = doc.create_element("img");
    if let Err(e) = place_stand_in(doc, video, img, url, content.width, content.height) {
        if let Err(cleanup) = doc.remove(img) {
            warn!("failed to discard stand-in image {}: {}", img.index(), cleanup);
        }
        return Err(e);
    }
    Ok(Some(img))
}

fn place_stand_in(doc: &mut Document, video: NodeId, img: NodeId, url: &str, width: f32, height: f32) -> Result<()> {
    doc.copy_styles(video, img)?;
    for (name, value) in copied_attributes(doc, video) {
        doc.set_attribute(img, &name, &value)?;
    }
    doc.set_attribute(img, "src", url)?;
    doc.set_style(img, "width", &format!("{}px", width))?;
    doc.set_style(img, "height", &format!("{}px", height))?;
    doc.set_hidden(video, true)?;
    if let Err(e) = doc.insert_before(img, video) {
        doc.set_hidden(video, false)?;
        return Err(e);
    }
    Ok(())
}

/// Presentation attributes a stand-in image keeps from its video.
fn copied_attributes(doc: &Document, video: NodeId) -> Vec<(String, String)> {
    ["class", "width", "height"]
        .into_iter()
        .filter_map(|name| doc.attribute(video, name).map(|v| (name.to_string(), v.to_string())))
        .collect()
}

/// Replace each marked video in an off-document clone with an image built
/// from its snapshot. Returns the number of videos replaced.
pub fn replace_in_clone(clone: &mut Document, layout: &LayoutTree, snapshots: &SnapshotMap, marker: &str) -> usize {
    let mut replaced = 0;
    for video in clone.elements_by_tag(clone.root(), "video") {
        let Some(url) = clone.attribute(video, marker).and_then(|id| snapshots.get(id)).cloned() else {
            continue;
        };
        let result = stand_in(clone, layout, video, &url).and_then(|img| match img {
            Some(_) => clone.remove(video).map(|_| true),
            None => Ok(false),
        });
        match result {
            Ok(true) => replaced += 1,
            Ok(false) => {}
            Err(e) => warn!("failed to replace cloned video {}: {}", video.index(), e),
        }
    }
    replaced
}

/// Live-document video substitution. Dropping the guard un-hides every
/// video and removes its stand-in image.
pub struct VideoSubstitution<'d> {
    doc: &'d mut Document,
    pairs: Vec<(NodeId, NodeId)>,
}

impl<'d> VideoSubstitution<'d> {
    /// `(video, image)` pairs currently substituted.
    pub fn pairs(&self) -> &[(NodeId, NodeId)] {
        &self.pairs
    }

    pub fn restore(mut self) {
        self.release();
    }

    fn release(&mut self) {
        for (video, img) in self.pairs.drain(..).rev() {
            if let Err(e) = self.doc.set_hidden(video, false) {
                warn!("failed to un-hide video {}: {}", video.index(), e);
            }
            if let Err(e) = self.doc.remove(img) {
                warn!("failed to remove stand-in image {}: {}", img.index(), e);
            }
        }
    }
}

impl Deref for VideoSubstitution<'_> {
    type Target = Document;

    fn deref(&self) -> &Document {
        self.doc
    }
}

impl Drop for VideoSubstitution<'_> {
    fn drop(&mut self) {
        self.release();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::{DeviceMetrics, StillVideo};

    const PAGE: &str = r##"<html><head><style>.clip { border: 2px solid #000; }</style></head><body>
        <div id="region">
          <video id="v1" class="clip" width="160" height="90" data-still="#ff0000"></video>
          <video id="v2" width="64" height="36" data-tainted="true"></video>
          <video id="v3" width="32" height="18"></video>
        </div>
        <video id="outside" data-still="#00ff00"></video>
        </body></html>"##;

    fn config() -> CaptureConfig {
        CaptureConfig {
            frame_wait_timeout_ms: 20,
            fallback_frame_delay_ms: 5,
            ..CaptureConfig::default()
        }
    }

    fn setup() -> (Document, NodeId) {
        let doc = Document::parse_html(PAGE, DeviceMetrics::default());
        let region = doc.find_by_id("region").unwrap();
        (doc, region)
    }

    #[tokio::test]
    async fn snapshots_skip_failing_videos() {
        let (mut doc, region) = setup();
        let mgr = VideoFrameSubstitutionManager::new(&config());
        let snaps = mgr.prepare_all_snapshots(&mut doc, region).await;

        assert_eq!(snaps.len(), 1);
        let v1 = doc.find_by_id("v1").unwrap();
        let id = doc.attribute(v1, mgr.marker()).unwrap();
        assert!(snaps[id].starts_with("data:image/png;base64,"));

        // every video in the region is tagged, even those without a snapshot
        for v in ["v1", "v2", "v3"] {
            let node = doc.find_by_id(v).unwrap();
            assert!(doc.has_attribute(node, mgr.marker()));
            assert_eq!(doc.attribute(node, "crossorigin"), Some("anonymous"));
        }
        let outside = doc.find_by_id("outside").unwrap();
        assert!(!doc.has_attribute(outside, mgr.marker()));
    }

    #[tokio::test]
    async fn markers_are_stable_across_captures() {
        let (mut doc, region) = setup();
        let mgr = VideoFrameSubstitutionManager::new(&config());
        let v1 = doc.find_by_id("v1").unwrap();
        mgr.prepare_all_snapshots(&mut doc, region).await;
        let first = doc.attribute(v1, mgr.marker()).unwrap().to_string();
        mgr.prepare_all_snapshots(&mut doc, region).await;
        assert_eq!(doc.attribute(v1, mgr.marker()), Some(first.as_str()));
    }

    #[tokio::test]
    async fn existing_markers_are_not_reissued() {
        let (mut doc, region) = setup();
        let v2 = doc.find_by_id("v2").unwrap();
        doc.set_attribute(v2, "data-capture-video-id", "0").unwrap();
        let mgr = VideoFrameSubstitutionManager::new(&config());
        mgr.prepare_all_snapshots(&mut doc, region).await;
        let v1 = doc.find_by_id("v1").unwrap();
        assert_ne!(doc.attribute(v1, mgr.marker()), Some("0"));
    }

    #[tokio::test]
    async fn paused_video_falls_back_to_current_frame() {
        let (mut doc, _) = setup();
        let v3 = doc.find_by_id("v3").unwrap();
        let still = StillVideo::solid(32, 18, [0, 0, 255, 255]);
        still.pause();
        doc.bind_video(v3, Arc::new(still)).unwrap();
        let mgr = VideoFrameSubstitutionManager::new(&config());
        let url = mgr.capture_first_frame(&mut doc, v3, "paused").await.unwrap();
        let img = crate::rendering::decode_data_url(&url).unwrap();
        assert_eq!(img.dimensions(), (32, 18));
        assert_eq!(doc.attribute(v3, mgr.marker()), Some("paused"));
    }

    #[tokio::test(start_paused = true)]
    async fn snapshot_waits_overlap() {
        let (mut doc, region) = setup();
        for (v, rgba) in [("v1", [255, 0, 0, 255]), ("v2", [0, 255, 0, 255]), ("v3", [0, 0, 255, 255])] {
            let node = doc.find_by_id(v).unwrap();
            let still = StillVideo::solid(16, 9, rgba);
            still.pause();
            doc.bind_video(node, Arc::new(still)).unwrap();
        }
        let mgr = VideoFrameSubstitutionManager::new(&CaptureConfig {
            frame_wait_timeout_ms: 100,
            ..config()
        });

        let started = tokio::time::Instant::now();
        let snaps = mgr.prepare_all_snapshots(&mut doc, region).await;
        let elapsed = started.elapsed();

        assert_eq!(snaps.len(), 3);
        // three paused videos each hit the frame timeout, but in parallel
        assert!(elapsed >= Duration::from_millis(100), "{:?}", elapsed);
        assert!(elapsed < Duration::from_millis(200), "{:?}", elapsed);
    }

    #[tokio::test]
    async fn source_without_frame_callback_uses_fixed_delay() {
        let (mut doc, _) = setup();
        let v3 = doc.find_by_id("v3").unwrap();
        let still = StillVideo::solid(8, 8, [1, 2, 3, 255]).without_frame_callback();
        doc.bind_video(v3, Arc::new(still)).unwrap();
        let mgr = VideoFrameSubstitutionManager::new(&config());
        assert!(mgr.capture_first_frame(&mut doc, v3, "x").await.is_some());
    }

    #[tokio::test]
    async fn substitute_then_restore_is_identity() {
        let (mut doc, region) = setup();
        let mgr = VideoFrameSubstitutionManager::new(&config());
        let snaps = mgr.prepare_all_snapshots(&mut doc, region).await;
        let before = doc.structure_signature(doc.root());
        let v1 = doc.find_by_id("v1").unwrap();

        let guard = mgr.substitute(&mut doc, region, &snaps);
        assert_eq!(guard.pairs().len(), 1);
        let (video, img) = guard.pairs()[0];
        assert_eq!(video, v1);
        assert!(guard.is_hidden(v1));
        assert_eq!(guard.tag(img), Some("img"));
        assert_eq!(guard.attribute(img, "class"), Some("clip"));
        assert_eq!(guard.computed_style(img, "border-top-width"), "2px");
        assert_eq!(guard.inline_style(img, "width"), Some("160px"));
        guard.restore();

        assert_eq!(doc.structure_signature(doc.root()), before);
    }

    #[tokio::test]
    async fn substitution_is_restored_on_early_exit() {
        fn failing(doc: &mut Document, mgr: &VideoFrameSubstitutionManager, region: NodeId, snaps: &SnapshotMap) -> Result<()> {
            let _guard = mgr.substitute(doc, region, snaps);
            Err(crate::Error::RenderError("boom".into()))
        }
        let (mut doc, region) = setup();
        let mgr = VideoFrameSubstitutionManager::new(&config());
        let snaps = mgr.prepare_all_snapshots(&mut doc, region).await;
        let before = doc.structure_signature(doc.root());
        assert!(failing(&mut doc, &mgr, region, &snaps).is_err());
        assert_eq!(doc.structure_signature(doc.root()), before);
    }

    #[tokio::test]
    async fn failed_insertion_leaves_no_stand_in_behind() {
        let (mut doc, region) = setup();
        let mgr = VideoFrameSubstitutionManager::new(&config());
        let snaps = mgr.prepare_all_snapshots(&mut doc, region).await;
        // a clone rooted at the video itself has no parent to insert into
        let v1 = doc.find_by_id("v1").unwrap();
        let mut clone = doc.clone_subtree(v1).unwrap();
        let layout = layout_document(&clone);
        let before = clone.structure_signature(clone.root());

        assert_eq!(replace_in_clone(&mut clone, &layout, &snaps, mgr.marker()), 0);
        assert_eq!(clone.structure_signature(clone.root()), before);
        assert!(!clone.is_hidden(clone.root()));
        let img = clone.create_element("img");
        assert_eq!(clone.slot_count(), 2);
        assert_eq!(clone.tag(img), Some("img"));
    }
}
