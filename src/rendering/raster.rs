/// Rasterizer: display list -> RGBA surface

use crate::rendering::layout::{GLYPH_ADVANCE_EM, Rect};
use crate::rendering::paint::PaintCommand;
use image::imageops::{self, FilterType};
use image::{Pixel, Rgba, RgbaImage};

/// Rasterize `commands` onto a `width` x `height` surface. Document-space
/// point `origin` maps to pixel (0, 0) and every length is multiplied by
/// `scale`. `background` fills the surface first; `None` leaves it transparent.
pub fn rasterize(
    commands: &[PaintCommand],
    origin: (f32, f32),
    width: u32,
    height: u32,
    scale: f32,
    background: Option<[u8; 4]>,
) -> RgbaImage {
    let mut img = match background {
        Some(bg) => RgbaImage::from_pixel(width, height, Rgba(bg)),
        None => RgbaImage::new(width, height),
    };
    let to_px = |r: &Rect| r.translate(-origin.0, -origin.1);
    for cmd in commands {
        match cmd {
            PaintCommand::SolidRect { rect, rgba } => fill_rect(&mut img, &to_px(rect), scale, *rgba),
            PaintCommand::Text {
                x,
                y,
                text,
                font_size,
                line_height,
                rgba,
                underline,
            } => {
                let (x, y) = (x - origin.0, y - origin.1);
                draw_text_run(&mut img, x, y, text, *font_size, *line_height, *rgba, scale);
                if let Some(u) = underline {
                    let w = text.chars().count() as f32 * font_size * GLYPH_ADVANCE_EM;
                    let base = y + (line_height + font_size) / 2.0;
                    let thickness = (font_size / 14.0).max(1.0 / scale);
                    fill_rect(&mut img, &Rect::new(x, base, w, thickness), scale, *u);
                }
            }
            PaintCommand::Image { rect, image } => draw_image(&mut img, &to_px(rect), scale, image),
        }
    }
    img
}

/// Blend a solid rectangle given in unscaled coordinates.
pub fn fill_rect(img: &mut RgbaImage, rect: &Rect, scale: f32, rgba: [u8; 4]) {
    if rect.is_empty() || rgba[3] == 0 {
        return;
    }
    let (x0, x1) = pixel_span(rect.x * scale, rect.right() * scale, img.width());
    let (y0, y1) = pixel_span(rect.y * scale, rect.bottom() * scale, img.height());
    let src = Rgba(rgba);
    for y in y0..y1 {
        for x in x0..x1 {
            blend_pixel(img.get_pixel_mut(x, y), src);
        }
    }
}

/// Source-over. Opaque and fully transparent sources are exact.
pub fn blend_pixel(dst: &mut Rgba<u8>, src: Rgba<u8>) {
    match src.0[3] {
        0 => {}
        255 => *dst = src,
        _ => dst.blend(&src),
    }
}

/// Draw `top` over `bottom` with its top-left at (`x`, `y`).
pub fn overlay(bottom: &mut RgbaImage, top: &RgbaImage, x: i64, y: i64) {
    for (tx, ty, p) in top.enumerate_pixels() {
        let (bx, by) = (x + tx as i64, y + ty as i64);
        if bx < 0 || by < 0 || bx >= bottom.width() as i64 || by >= bottom.height() as i64 {
            continue;
        }
        blend_pixel(bottom.get_pixel_mut(bx as u32, by as u32), *p);
    }
}

/// Rounded pixel range for a span; spans thinner than a pixel still cover one.
fn pixel_span(start: f32, end: f32, limit: u32) -> (u32, u32) {
    let mut a = start.round();
    let mut b = end.round();
    if b <= a && end > start {
        b = a + 1.0;
    }
    a = a.clamp(0.0, limit as f32);
    b = b.clamp(0.0, limit as f32);
    (a as u32, b as u32)
}

/// Draw a line of text as one filled box per glyph, vertically centred in
/// the line box.
#[allow(clippy::too_many_arguments)]
pub fn draw_text_run(
    img: &mut RgbaImage,
    x: f32,
    y: f32,
    text: &str,
    font_size: f32,
    line_height: f32,
    rgba: [u8; 4],
    scale: f32,
) {
    let advance = font_size * GLYPH_ADVANCE_EM;
    let top = y + (line_height - font_size) / 2.0 + font_size * 0.25;
    let glyph_h = font_size * 0.7;
    for (i, ch) in text.chars().enumerate() {
        if ch.is_whitespace() {
            continue;
        }
        let gx = x + i as f32 * advance + advance * 0.1;
        fill_rect(img, &Rect::new(gx, top, advance * 0.8, glyph_h), scale, rgba);
    }
}

fn draw_image(img: &mut RgbaImage, rect: &Rect, scale: f32, src: &RgbaImage) {
    let w = (rect.width * scale).round();
    let h = (rect.height * scale).round();
    if w < 1.0 || h < 1.0 || src.width() == 0 || src.height() == 0 {
        return;
    }
    let scaled = if (w as u32, h as u32) == src.dimensions() {
        src.clone()
    } else {
        imageops::resize(src, w as u32, h as u32, FilterType::Triangle)
    };
    overlay(
        img,
        &scaled,
        (rect.x * scale).round() as i64,
        (rect.y * scale).round() as i64,
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn solid_rect_scales_and_translates() {
        let cmds = vec![PaintCommand::SolidRect {
            rect: Rect::new(10.0, 10.0, 5.0, 5.0),
            rgba: [255, 0, 0, 255],
        }];
        let img = rasterize(&cmds, (10.0, 10.0), 20, 20, 2.0, Some([255, 255, 255, 255]));
        assert_eq!(img.get_pixel(0, 0).0, [255, 0, 0, 255]);
        assert_eq!(img.get_pixel(9, 9).0, [255, 0, 0, 255]);
        assert_eq!(img.get_pixel(10, 10).0, [255, 255, 255, 255]);
    }

    #[test]
    fn transparent_background_stays_transparent() {
        let img = rasterize(&[], (0.0, 0.0), 4, 4, 1.0, None);
        assert!(img.pixels().all(|p| p.0[3] == 0));
    }

    #[test]
    fn images_are_stretched_into_their_rect() {
        let src = RgbaImage::from_pixel(2, 2, Rgba([0, 0, 255, 255]));
        let cmds = vec![PaintCommand::Image {
            rect: Rect::new(0.0, 0.0, 8.0, 4.0),
            image: Arc::new(src),
        }];
        let img = rasterize(&cmds, (0.0, 0.0), 8, 8, 1.0, Some([255, 255, 255, 255]));
        assert_eq!(img.get_pixel(7, 3).0, [0, 0, 255, 255]);
        assert_eq!(img.get_pixel(7, 4).0, [255, 255, 255, 255]);
    }

    #[test]
    fn text_runs_leave_ink() {
        let mut img = RgbaImage::from_pixel(40, 20, Rgba([255, 255, 255, 255]));
        draw_text_run(&mut img, 0.0, 0.0, "ab c", 16.0, 19.2, [0, 0, 0, 255], 1.0);
        assert!(img.pixels().any(|p| p.0 == [0, 0, 0, 255]));
    }
}
