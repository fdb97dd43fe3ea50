//! Rendering: layout, display list, rasterization and raster encoding

pub mod layout;
pub mod paint;
pub mod raster;

use crate::{Error, Result};
use base64::Engine as Base64Engine;
use image::{ImageFormat, RgbaImage};
use sha2::{Digest, Sha256};
use std::io::Cursor;

const PNG_DATA_URL_PREFIX: &str = "data:image/png;base64,";

/// Encode a surface as a lossless `data:image/png;base64,...` URL.
pub fn encode_png_data_url(img: &RgbaImage) -> Result<String> {
    let mut buf = Vec::new();
    img.write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| Error::RenderError(format!("PNG encoding failed: {}", e)))?;
    if buf.is_empty() {
        return Err(Error::RenderError("PNG encoder produced no data".into()));
    }
    let b64 = base64::engine::general_purpose::STANDARD.encode(&buf);
    Ok(format!("{}{}", PNG_DATA_URL_PREFIX, b64))
}

/// Decode a base64 `data:` URL (any raster mime type the `image` crate reads).
pub fn decode_data_url(url: &str) -> Result<RgbaImage> {
    let url = url.trim();
    if url.is_empty() {
        return Err(Error::ImageLoadError("empty image source".into()));
    }
    let payload = url
        .strip_prefix("data:")
        .and_then(|rest| rest.split_once(";base64,"))
        .map(|(_, b64)| b64)
        .ok_or_else(|| Error::ImageLoadError("not a base64 data URL".into()))?;
    let bytes = base64::engine::general_purpose::STANDARD.decode(payload.trim())?;
    Ok(image::load_from_memory(&bytes)?.to_rgba8())
}

/// Content digest of a surface (dimensions + raw pixels), hex encoded.
pub fn digest(img: &RgbaImage) -> String {
    let mut hasher = Sha256::new();
    hasher.update(img.width().to_be_bytes());
    hasher.update(img.height().to_be_bytes());
    hasher.update(img.as_raw());
    hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[test]
    fn data_url_survives_encode_decode() {
        let img = RgbaImage::from_pixel(3, 2, Rgba([1, 2, 3, 4]));
        let url = encode_png_data_url(&img).unwrap();
        assert!(url.starts_with("data:image/png;base64,"));
        let back = decode_data_url(&url).unwrap();
        assert_eq!(digest(&back), digest(&img));
    }

    #[test]
    fn rejects_empty_and_foreign_sources() {
        assert!(matches!(decode_data_url(""), Err(Error::ImageLoadError(_))));
        assert!(matches!(
            decode_data_url("https://example.com/a.png"),
            Err(Error::ImageLoadError(_))
        ));
    }
}
