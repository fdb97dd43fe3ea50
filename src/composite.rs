//! Flatten a source raster and an annotation raster into one image.

use crate::rendering::raster::overlay;
use crate::rendering::{decode_data_url, encode_png_data_url};
use crate::{CaptureConfig, Error, Result};
use image::imageops::{self, FilterType};
use image::{Rgba, RgbaImage};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The flattened output. Always the size of the background input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositeResult {
    pub image_data: String,
    pub width: u32,
    pub height: u32,
}

impl CompositeResult {
    pub fn decode(&self) -> Result<RgbaImage> {
        decode_data_url(&self.image_data)
    }
}

pub struct CompositingEngine {
    load_timeout: Duration,
    backdrop: [u8; 4],
}

impl CompositingEngine {
    pub fn new(config: &CaptureConfig) -> Self {
        CompositingEngine {
            load_timeout: Duration::from_millis(config.image_load_timeout_ms),
            backdrop: config.background_rgba(),
        }
    }

    /// Decode both data URLs and draw `annotation` over `background`.
    pub async fn composite(&self, background: &str, annotation: &str) -> Result<CompositeResult> {
        let (bg, fg) = futures::future::try_join(self.load(background), self.load(annotation)).await?;
        let out = self.composite_images(&bg, &fg);
        Ok(CompositeResult {
            image_data: encode_png_data_url(&out)?,
            width: out.width(),
            height: out.height(),
        })
    }

    /// Background at native size, then annotation stretched to the same
    /// size. Empty pixels get the configured backdrop.
    pub fn composite_images(&self, background: &RgbaImage, annotation: &RgbaImage) -> RgbaImage {
        let (w, h) = background.dimensions();
        let mut out = RgbaImage::from_pixel(w, h, Rgba(self.backdrop));
        overlay(&mut out, background, 0, 0);
        if annotation.dimensions() == (w, h) {
            overlay(&mut out, annotation, 0, 0);
        } else if annotation.width() > 0 && annotation.height() > 0 {
            let stretched = imageops::resize(annotation, w, h, FilterType::Triangle);
            overlay(&mut out, &stretched, 0, 0);
        }
        out
    }

    async fn load(&self, src: &str) -> Result<RgbaImage> {
        if src.trim().is_empty() {
            return Err(Error::ImageLoadError("empty image source".into()));
        }
        let owned = src.to_string();
        let decode = tokio::task::spawn_blocking(move || decode_data_url(&owned));
        match tokio::time::timeout(self.load_timeout, decode).await {
            Ok(Ok(result)) => result,
            Ok(Err(join)) => Err(Error::ImageLoadError(format!("decoder task failed: {}", join))),
            Err(_) => Err(Error::Timeout(self.load_timeout.as_millis() as u64)),
        }
    }
}
