//! Anti-aliased shape drawing for annotation objects.
//!
//! Each object is drawn into its own [`Layer`] and blended onto the target
//! once, so overlapping parts of one stroke never double up alpha.

use crate::rendering::raster::blend_pixel;
use image::{Rgba, RgbaImage};
use tiny_skia::{FillRule, LineCap, LineJoin, Paint, Path, PathBuilder, Pixmap, Rect, Stroke, Transform};

/// A transparent surface the size of the target, drawn in CSS px.
pub struct Layer {
    pixmap: Pixmap,
    transform: Transform,
}

impl Layer {
    /// `None` when the target has no pixels.
    pub fn for_target(img: &RgbaImage, scale: f32) -> Option<Self> {
        let pixmap = Pixmap::new(img.width(), img.height())?;
        Some(Layer { pixmap, transform: Transform::from_scale(scale, scale) })
    }

    /// Round-capped, round-joined polyline of `width` CSS px.
    pub fn stroke_polyline(&mut self, points: &[[f32; 2]], width: f32, rgba: [u8; 4]) {
        let Some(path) = polyline_path(&[points]) else {
            return;
        };
        self.stroke(&path, width, rgba);
    }

    /// Several open polylines stroked as one path.
    pub fn stroke_polylines(&mut self, lines: &[&[[f32; 2]]], width: f32, rgba: [u8; 4]) {
        if let Some(path) = polyline_path(lines) {
            self.stroke(&path, width, rgba);
        }
    }

    pub fn fill_rect(&mut self, x: f32, y: f32, w: f32, h: f32, rgba: [u8; 4]) {
        if let Some(rect) = Rect::from_xywh(x, y, w, h) {
            self.fill(&PathBuilder::from_rect(rect), rgba);
        }
    }

    pub fn stroke_rect(&mut self, x: f32, y: f32, w: f32, h: f32, width: f32, rgba: [u8; 4]) {
        if let Some(rect) = Rect::from_xywh(x, y, w, h) {
            self.stroke(&PathBuilder::from_rect(rect), width, rgba);
        }
    }

    pub fn fill_ellipse(&mut self, cx: f32, cy: f32, rx: f32, ry: f32, rgba: [u8; 4]) {
        if let Some(path) = oval(cx, cy, rx, ry) {
            self.fill(&path, rgba);
        }
    }

    pub fn stroke_ellipse(&mut self, cx: f32, cy: f32, rx: f32, ry: f32, width: f32, rgba: [u8; 4]) {
        if let Some(path) = oval(cx, cy, rx, ry) {
            self.stroke(&path, width, rgba);
        }
    }

    /// Source-over blend of the layer onto `img`.
    pub fn composite_onto(&self, img: &mut RgbaImage) {
        let width = self.pixmap.width();
        for (i, p) in self.pixmap.pixels().iter().enumerate() {
            if p.alpha() == 0 {
                continue;
            }
            let c = p.demultiply();
            let (x, y) = (i as u32 % width, i as u32 / width);
            blend_pixel(
                img.get_pixel_mut(x, y),
                Rgba([c.red(), c.green(), c.blue(), c.alpha()]),
            );
        }
    }

    fn fill(&mut self, path: &Path, rgba: [u8; 4]) {
        let paint = paint(rgba);
        self.pixmap.fill_path(path, &paint, FillRule::Winding, self.transform, None);
    }

    fn stroke(&mut self, path: &Path, width: f32, rgba: [u8; 4]) {
        let stroke = Stroke {
            width: width.max(0.0),
            line_cap: LineCap::Round,
            line_join: LineJoin::Round,
            ..Stroke::default()
        };
        self.pixmap.stroke_path(path, &paint(rgba), &stroke, self.transform, None);
    }
}

fn paint(rgba: [u8; 4]) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(rgba[0], rgba[1], rgba[2], rgba[3]);
    paint.anti_alias = true;
    paint
}

fn oval(cx: f32, cy: f32, rx: f32, ry: f32) -> Option<Path> {
    if !(rx > 0.0 && ry > 0.0) {
        return None;
    }
    PathBuilder::from_oval(Rect::from_xywh(cx - rx, cy - ry, rx * 2.0, ry * 2.0)?)
}

fn polyline_path(lines: &[&[[f32; 2]]]) -> Option<Path> {
    let mut pb = PathBuilder::new();
    for points in lines {
        let Some((first, rest)) = points.split_first() else {
            continue;
        };
        pb.move_to(first[0], first[1]);
        if rest.is_empty() {
            // zero-length segment so the round cap leaves a dot
            pb.line_to(first[0], first[1]);
        }
        for p in rest {
            pb.line_to(p[0], p[1]);
        }
    }
    pb.finish()
}

/// Start points of the two barbs of an arrow ending at `to`.
pub fn arrow_head(from: [f32; 2], to: [f32; 2], width: f32) -> [[f32; 2]; 2] {
    let len = (width * 3.0).max(10.0);
    let angle = (to[1] - from[1]).atan2(to[0] - from[0]);
    let spread = 25f32.to_radians();
    let barb = |a: f32| [to[0] - len * a.cos(), to[1] - len * a.sin()];
    [barb(angle + spread), barb(angle - spread)]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draw(img: &mut RgbaImage, scale: f32, f: impl FnOnce(&mut Layer)) {
        let mut layer = Layer::for_target(img, scale).unwrap();
        f(&mut layer);
        layer.composite_onto(img);
    }

    #[test]
    fn translucent_stroke_blends_once() {
        let pts = [[2.0, 10.0], [10.0, 10.0], [2.0, 10.0]];
        let mut back_and_forth = RgbaImage::from_pixel(20, 20, Rgba([255, 255, 255, 255]));
        draw(&mut back_and_forth, 1.0, |l| l.stroke_polyline(&pts, 4.0, [0, 0, 0, 128]));
        let mut single = RgbaImage::from_pixel(20, 20, Rgba([255, 255, 255, 255]));
        draw(&mut single, 1.0, |l| l.stroke_polyline(&pts[..2], 4.0, [0, 0, 0, 128]));
        assert_eq!(back_and_forth.get_pixel(6, 10).0, single.get_pixel(6, 10).0);
        assert!(single.get_pixel(6, 10).0[0] < 255);
    }

    #[test]
    fn ellipse_fill_stays_inside_bounds() {
        let mut img = RgbaImage::new(40, 40);
        draw(&mut img, 1.0, |l| l.fill_ellipse(20.0, 20.0, 10.0, 5.0, [0, 255, 0, 255]));
        assert_eq!(img.get_pixel(20, 20).0, [0, 255, 0, 255]);
        assert_eq!(img.get_pixel(27, 20).0, [0, 255, 0, 255]);
        assert_eq!(img.get_pixel(20, 10).0, [0, 0, 0, 0]);
        assert_eq!(img.get_pixel(35, 20).0, [0, 0, 0, 0]);
    }

    #[test]
    fn shapes_clip_at_the_edges() {
        let mut img = RgbaImage::new(10, 10);
        draw(&mut img, 1.0, |l| {
            l.fill_rect(-5.0, -5.0, 100.0, 100.0, [1, 2, 3, 255]);
            l.stroke_polyline(&[[-50.0, -50.0], [50.0, 50.0]], 2.0, [9, 9, 9, 255]);
        });
        assert_eq!(img.get_pixel(9, 0).0, [1, 2, 3, 255]);
        assert_eq!(img.get_pixel(5, 5).0, [9, 9, 9, 255]);
    }

    #[test]
    fn scale_maps_css_px_to_pixels() {
        let mut img = RgbaImage::new(40, 40);
        draw(&mut img, 2.0, |l| l.fill_rect(5.0, 5.0, 5.0, 5.0, [255, 0, 0, 255]));
        assert_eq!(img.get_pixel(12, 12).0, [255, 0, 0, 255]);
        assert_eq!(img.get_pixel(8, 12).0, [0, 0, 0, 0]);
        assert_eq!(img.get_pixel(21, 12).0, [0, 0, 0, 0]);
    }

    #[test]
    fn empty_target_has_no_layer() {
        assert!(Layer::for_target(&RgbaImage::new(0, 5), 1.0).is_none());
    }

    #[test]
    fn arrow_barbs_point_back_along_the_line() {
        let [a, b] = arrow_head([0.0, 0.0], [100.0, 0.0], 2.0);
        assert!(a[0] < 100.0 && b[0] < 100.0);
        assert!((a[1] + b[1]).abs() < 1e-4);
    }
}
