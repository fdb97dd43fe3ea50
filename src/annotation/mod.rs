//! Vector annotation layer drawn over the captured region.
//!
//! [`AnnotationCanvas`] is the live canvas: committed objects, edits queued
//! until the next render, and the on-screen pixel buffer. Export never
//! touches that buffer; it paints into a fresh image at the requested scale.

pub mod export;
mod draw;

pub use export::AnnotationLayerExporter;

use crate::color::parse_color;
use draw::Layer;
use crate::{Error, Result};
use image::RgbaImage;
use log::warn;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One vector drawing object. Coordinates are CSS px in the layer's own
/// display space.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum AnnotationObject {
    Stroke {
        points: Vec<[f32; 2]>,
        color: String,
        width: f32,
    },
    Rect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        stroke: String,
        #[serde(default = "default_stroke_width")]
        stroke_width: f32,
        #[serde(default)]
        fill: Option<String>,
    },
    Ellipse {
        cx: f32,
        cy: f32,
        rx: f32,
        ry: f32,
        stroke: String,
        #[serde(default = "default_stroke_width")]
        stroke_width: f32,
        #[serde(default)]
        fill: Option<String>,
    },
    Line {
        from: [f32; 2],
        to: [f32; 2],
        color: String,
        #[serde(default = "default_stroke_width")]
        width: f32,
        #[serde(default)]
        arrow: bool,
    },
    Text {
        x: f32,
        y: f32,
        content: String,
        color: String,
        #[serde(default = "default_font_size")]
        font_size: f32,
    },
}

fn default_stroke_width() -> f32 {
    2.0
}

fn default_font_size() -> f32 {
    16.0
}

/// Ordered drawing objects; later objects paint on top.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnnotationDocument {
    pub objects: Vec<AnnotationObject>,
}

impl AnnotationDocument {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Paint every object into `target`, `scale` physical pixels per CSS px.
    pub fn paint(&self, target: &mut RgbaImage, scale: f32) {
        for obj in &self.objects {
            if let Err(e) = paint_object(target, obj, scale) {
                warn!("skipping annotation object: {}", e);
            }
        }
    }
}

fn rgba(value: &str) -> Result<[u8; 4]> {
    parse_color(value)
        .map(|c| c.to_rgba8())
        .ok_or_else(|| Error::ExportError(format!("unsupported annotation color {:?}", value)))
}

fn paint_object(img: &mut RgbaImage, obj: &AnnotationObject, scale: f32) -> Result<()> {
    if let AnnotationObject::Text { x, y, content, color, font_size } = obj {
        let line_height = font_size * crate::rendering::layout::NORMAL_LINE_HEIGHT_EM;
        crate::rendering::raster::draw_text_run(img, *x, *y, content, *font_size, line_height, rgba(color)?, scale);
        return Ok(());
    }
    let Some(mut layer) = Layer::for_target(img, scale) else {
        return Ok(());
    };
    match obj {
        AnnotationObject::Stroke { points, color, width } => {
            layer.stroke_polyline(points, *width, rgba(color)?);
        }
        AnnotationObject::Rect { x, y, width, height, stroke, stroke_width, fill } => {
            if let Some(f) = fill {
                layer.fill_rect(*x, *y, *width, *height, rgba(f)?);
            }
            layer.stroke_rect(*x, *y, *width, *height, *stroke_width, rgba(stroke)?);
        }
        AnnotationObject::Ellipse { cx, cy, rx, ry, stroke, stroke_width, fill } => {
            if let Some(f) = fill {
                layer.fill_ellipse(*cx, *cy, *rx, *ry, rgba(f)?);
            }
            layer.stroke_ellipse(*cx, *cy, *rx, *ry, *stroke_width, rgba(stroke)?);
        }
        AnnotationObject::Line { from, to, color, width, arrow } => {
            let c = rgba(color)?;
            if *arrow {
                let [a, b] = draw::arrow_head(*from, *to, *width);
                layer.stroke_polylines(&[&[*from, *to][..], &[a, *to, b][..]], *width, c);
            } else {
                layer.stroke_polyline(&[*from, *to], *width, c);
            }
        }
        AnnotationObject::Text { .. } => {}
    }
    layer.composite_onto(img);
    Ok(())
}

#[derive(Debug, Clone)]
enum Edit {
    Add(AnnotationObject),
    Undo,
    Clear,
}

/// The live, on-screen annotation canvas.
#[derive(Debug, Clone)]
pub struct AnnotationCanvas {
    document: AnnotationDocument,
    pending: Vec<Edit>,
    display_width: f32,
    display_height: f32,
    dpr: f32,
    screen: RgbaImage,
    renders: u64,
}

impl AnnotationCanvas {
    pub fn new(display_width: f32, display_height: f32, dpr: f32) -> Self {
        let w = (display_width * dpr).round().max(0.0) as u32;
        let h = (display_height * dpr).round().max(0.0) as u32;
        AnnotationCanvas {
            document: AnnotationDocument::default(),
            pending: Vec::new(),
            display_width,
            display_height,
            dpr,
            screen: RgbaImage::new(w, h),
            renders: 0,
        }
    }

    /// A canvas whose objects arrive as pending edits, shown on next render.
    pub fn with_document(document: AnnotationDocument, display_width: f32, display_height: f32, dpr: f32) -> Self {
        let mut canvas = Self::new(display_width, display_height, dpr);
        for obj in document.objects {
            canvas.add(obj);
        }
        canvas
    }

    pub fn add(&mut self, obj: AnnotationObject) {
        self.pending.push(Edit::Add(obj));
    }

    pub fn undo(&mut self) {
        self.pending.push(Edit::Undo);
    }

    pub fn clear(&mut self) {
        self.pending.push(Edit::Clear);
    }

    /// Objects as of the last render.
    pub fn document(&self) -> &AnnotationDocument {
        &self.document
    }

    pub fn pending_edits(&self) -> usize {
        self.pending.len()
    }

    /// Nominal size in CSS px.
    pub fn display_size(&self) -> (f32, f32) {
        (self.display_width, self.display_height)
    }

    pub fn dpr(&self) -> f32 {
        self.dpr
    }

    /// The on-screen pixel buffer.
    pub fn screen(&self) -> &RgbaImage {
        &self.screen
    }

    pub fn render_count(&self) -> u64 {
        self.renders
    }

    /// Apply queued edits and repaint the on-screen buffer.
    pub fn render_all(&mut self) {
        for edit in self.pending.drain(..) {
            match edit {
                Edit::Add(obj) => self.document.objects.push(obj),
                Edit::Undo => {
                    self.document.objects.pop();
                }
                Edit::Clear => self.document.objects.clear(),
            }
        }
        let (w, h) = self.screen.dimensions();
        self.screen = RgbaImage::new(w, h);
        self.document.paint(&mut self.screen, self.dpr);
        self.renders += 1;
    }

    /// Paint committed objects into a new image at `multiplier` pixels per
    /// CSS px. `None` when the result would have no pixels.
    pub fn render_offscreen(&self, multiplier: f32) -> Option<RgbaImage> {
        let w = (self.display_width * multiplier).round();
        let h = (self.display_height * multiplier).round();
        if !(w >= 1.0 && h >= 1.0) {
            return None;
        }
        let mut img = RgbaImage::new(w as u32, h as u32);
        self.document.paint(&mut img, multiplier);
        Some(img)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stroke() -> AnnotationObject {
        AnnotationObject::Stroke {
            points: vec![[10.0, 10.0], [90.0, 10.0]],
            color: "#ff0000".into(),
            width: 4.0,
        }
    }

    #[test]
    fn edits_apply_on_render() {
        let mut canvas = AnnotationCanvas::new(100.0, 50.0, 2.0);
        canvas.add(stroke());
        assert!(canvas.document().is_empty());
        canvas.render_all();
        assert_eq!(canvas.document().len(), 1);
        assert_eq!(canvas.screen().get_pixel(100, 20).0, [255, 0, 0, 255]);

        canvas.add(stroke());
        canvas.undo();
        canvas.render_all();
        assert_eq!(canvas.document().len(), 1);
        canvas.clear();
        canvas.render_all();
        assert!(canvas.document().is_empty());
        assert_eq!(canvas.screen().get_pixel(100, 20).0, [0, 0, 0, 0]);
    }

    #[test]
    fn offscreen_render_leaves_screen_untouched() {
        let mut canvas = AnnotationCanvas::new(100.0, 50.0, 1.0);
        canvas.add(stroke());
        canvas.render_all();
        let screen = canvas.screen().clone();
        let big = canvas.render_offscreen(3.0).unwrap();
        assert_eq!(big.dimensions(), (300, 150));
        assert_eq!(big.get_pixel(150, 30).0, [255, 0, 0, 255]);
        assert_eq!(canvas.screen(), &screen);
        assert!(canvas.render_offscreen(0.0).is_none());
    }

    #[test]
    fn document_json_uses_type_tags() {
        let json = r##"{"objects":[
            {"type":"rect","x":1,"y":2,"width":3,"height":4,"stroke":"blue"},
            {"type":"line","from":[0,0],"to":[5,5],"color":"#000","arrow":true},
            {"type":"text","x":0,"y":0,"content":"hi","color":"black"}
        ]}"##;
        let doc = AnnotationDocument::from_json(json).unwrap();
        assert_eq!(doc.len(), 3);
        assert!(matches!(doc.objects[0], AnnotationObject::Rect { stroke_width, .. } if stroke_width == 2.0));
        assert!(matches!(doc.objects[1], AnnotationObject::Line { arrow: true, .. }));
        assert!(AnnotationDocument::from_json("{\"objects\":[{\"type\":\"blob\"}]}").is_err());
    }

    #[test]
    fn bad_colors_skip_only_that_object() {
        let mut doc = AnnotationDocument::default();
        doc.objects.push(AnnotationObject::Text {
            x: 0.0,
            y: 0.0,
            content: "x".into(),
            color: "not-a-color".into(),
            font_size: 16.0,
        });
        doc.objects.push(AnnotationObject::Rect {
            x: 0.0,
            y: 0.0,
            width: 10.0,
            height: 10.0,
            stroke: "#00ff00".into(),
            stroke_width: 4.0,
            fill: Some("#0000ff".into()),
        });
        let mut img = RgbaImage::new(20, 20);
        doc.paint(&mut img, 1.0);
        assert_eq!(img.get_pixel(5, 5).0, [0, 0, 255, 255]);
        assert_eq!(img.get_pixel(0, 5).0, [0, 255, 0, 255]);
    }
}
