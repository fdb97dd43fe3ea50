//! Capture through the platform's display-capture prompt.

use crate::capture::{CaptureOptions, CaptureRegion, CaptureResult};
use crate::dom::{Document, HideGuard};
use crate::platform::{DisplayCapture, StreamGuard};
use crate::{Error, Result};
use image::imageops;
use image::{Rgba, RgbaImage};
use log::debug;
use std::sync::Arc;

pub struct SystemScreenCapture {
    display: Option<Arc<dyn DisplayCapture>>,
}

impl SystemScreenCapture {
    pub fn new(display: Option<Arc<dyn DisplayCapture>>) -> Self {
        SystemScreenCapture { display }
    }

    pub fn is_available(&self) -> bool {
        self.display.is_some()
    }

    /// Grab one frame from a fresh display stream and crop it to `region`.
    /// The stream's tracks are stopped before this returns, on every path.
    pub async fn capture(
        &self,
        doc: &mut Document,
        region: &CaptureRegion,
        options: &CaptureOptions<'_>,
    ) -> Result<CaptureResult> {
        let display = self
            .display
            .clone()
            .ok_or_else(|| Error::CapabilityUnavailable("display capture is not supported here".into()))?;
        let viewport_width = doc.viewport().width;

        let frame = {
            let _overlay = match options.overlay {
                Some(node) if options.config.hide_overlay_during_screen_capture => {
                    Some(HideGuard::hide(doc, node)?)
                }
                _ => None,
            };
            let mut stream = StreamGuard::new(display.request_display_media().await?);
            stream.grab_frame().await?
        };
        debug!("grabbed {}x{} display frame", frame.width(), frame.height());

        let background = options.config.background_rgba();
        let cropped = crop_to_region(&frame, region, viewport_width, background)?;
        CaptureResult::from_image(&cropped)
    }
}

/// Crop a viewport-sized frame to the region. The frame's scale is its pixel
/// width over the viewport's CSS width; parts of the region outside the
/// frame are filled with `background`.
pub fn crop_to_region(
    frame: &RgbaImage,
    region: &CaptureRegion,
    viewport_width: u32,
    background: [u8; 4],
) -> Result<RgbaImage> {
    if viewport_width == 0 {
        return Err(Error::RenderError("viewport has zero width".into()));
    }
    let scale = frame.width() as f32 / viewport_width as f32;
    let (out_w, out_h) = region.pixel_size(scale)?;
    let sx = (region.bounding_rect.x * scale).round() as i64;
    let sy = (region.bounding_rect.y * scale).round() as i64;

    let x0 = sx.max(0);
    let y0 = sy.max(0);
    let x1 = (sx + out_w as i64).min(frame.width() as i64);
    let y1 = (sy + out_h as i64).min(frame.height() as i64);
    if x1 <= x0 || y1 <= y0 {
        return Err(Error::RenderError("capture region lies outside the captured frame".into()));
    }

    let mut out = RgbaImage::from_pixel(out_w, out_h, Rgba(background));
    let visible = imageops::crop_imm(frame, x0 as u32, y0 as u32, (x1 - x0) as u32, (y1 - y0) as u32).to_image();
    imageops::replace(&mut out, &visible, x0 - sx, y0 - sy);
    Ok(out)
}
