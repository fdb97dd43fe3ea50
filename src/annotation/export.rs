//! Rasterize the annotation layer at the source capture's resolution.

use crate::annotation::AnnotationCanvas;
use crate::capture::CaptureResult;
use crate::{CaptureConfig, Error, Result};
use log::debug;
use std::time::Duration;

/// Exports [`AnnotationCanvas`] contents without touching its on-screen buffer.
///
/// The exported width is `target_display_width * dpr`. Callers compositing
/// onto a source capture must pass that capture's content width as
/// `target_display_width`; the compositor stretches the annotation to the
/// source size and a different width distorts it silently.
pub struct AnnotationLayerExporter {
    refresh_interval: Duration,
}

impl AnnotationLayerExporter {
    pub fn new(config: &CaptureConfig) -> Self {
        AnnotationLayerExporter {
            refresh_interval: Duration::from_millis(config.refresh_interval_ms),
        }
    }

    /// Pixels per CSS px of the canvas's own display space.
    pub fn multiplier(canvas: &AnnotationCanvas, target_display_width: f32, dpr: f32) -> Result<f32> {
        let (display_width, display_height) = canvas.display_size();
        if !(display_width > 0.0 && display_height > 0.0) {
            return Err(Error::ExportError(format!(
                "no rendering context for a {}x{} annotation layer",
                display_width, display_height
            )));
        }
        let multiplier = target_display_width * dpr / display_width;
        if !(multiplier.is_finite() && multiplier > 0.0) {
            return Err(Error::ExportError(format!(
                "invalid export scale for target width {} at dpr {}",
                target_display_width, dpr
            )));
        }
        Ok(multiplier)
    }

    /// Render, wait one refresh, render again, then paint offscreen.
    pub async fn export(
        &self,
        canvas: &mut AnnotationCanvas,
        target_display_width: f32,
        dpr: f32,
    ) -> Result<CaptureResult> {
        let multiplier = Self::multiplier(canvas, target_display_width, dpr)?;

        canvas.render_all();
        tokio::time::sleep(self.refresh_interval).await;
        canvas.render_all();

        let img = canvas
            .render_offscreen(multiplier)
            .ok_or_else(|| Error::ExportError("no rendering context for the export surface".into()))?;
        debug!(
            "exported {} annotation objects at {}x{}",
            canvas.document().len(),
            img.width(),
            img.height()
        );
        CaptureResult::from_image(&img).map_err(|e| Error::ExportError(format!("export returned no data: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::AnnotationObject;

    fn exporter() -> AnnotationLayerExporter {
        AnnotationLayerExporter::new(&CaptureConfig {
            refresh_interval_ms: 1,
            ..CaptureConfig::default()
        })
    }

    #[tokio::test]
    async fn export_width_follows_target_and_dpr() {
        let mut canvas = AnnotationCanvas::new(400.0, 300.0, 1.0);
        let out = exporter().export(&mut canvas, 800.0, 2.0).await.unwrap();
        assert_eq!((out.width, out.height), (1600, 1200));
    }

    #[tokio::test]
    async fn empty_layer_exports_transparent() {
        let mut canvas = AnnotationCanvas::new(100.0, 80.0, 2.0);
        let out = exporter().export(&mut canvas, 100.0, 2.0).await.unwrap();
        assert_eq!((out.width, out.height), (200, 160));
        assert!(out.decode().unwrap().pixels().all(|p| p.0[3] == 0));
    }

    #[tokio::test]
    async fn pending_edits_are_included() {
        let mut canvas = AnnotationCanvas::new(50.0, 50.0, 1.0);
        canvas.add(AnnotationObject::Rect {
            x: 0.0,
            y: 0.0,
            width: 50.0,
            height: 50.0,
            stroke: "#000".into(),
            stroke_width: 1.0,
            fill: Some("#00f".into()),
        });
        let out = exporter().export(&mut canvas, 50.0, 1.0).await.unwrap();
        assert_eq!(out.decode().unwrap().get_pixel(25, 25).0, [0, 0, 255, 255]);
        assert_eq!(canvas.pending_edits(), 0);
    }

    #[tokio::test]
    async fn export_does_not_touch_the_screen_buffer_size() {
        let mut canvas = AnnotationCanvas::new(60.0, 40.0, 1.0);
        exporter().export(&mut canvas, 600.0, 1.0).await.unwrap();
        assert_eq!(canvas.screen().dimensions(), (60, 40));
    }

    #[tokio::test]
    async fn zero_size_layer_is_an_export_error() {
        let mut canvas = AnnotationCanvas::new(0.0, 40.0, 1.0);
        let err = exporter().export(&mut canvas, 100.0, 1.0).await.unwrap_err();
        assert!(matches!(err, Error::ExportError(_)));
    }
}
