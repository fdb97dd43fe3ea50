/// Display list construction

use crate::color::{parse_color, parse_legacy_color, Color};
use crate::dom::{Document, NodeId};
use crate::rendering::layout::{LayoutTree, Rect};
use std::sync::Arc;

use image::RgbaImage;

/// Which color syntaxes the painter understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColorSupport {
    /// Every syntax the document model accepts.
    Full,
    /// sRGB channel syntax only; perceptual color functions are unparseable.
    Legacy,
}

impl ColorSupport {
    pub fn parse(self, value: &str) -> Option<Color> {
        match self {
            ColorSupport::Full => parse_color(value),
            ColorSupport::Legacy => parse_legacy_color(value),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum PaintCommand {
    SolidRect {
        rect: Rect,
        rgba: [u8; 4],
    },
    Text {
        x: f32,
        y: f32,
        text: String,
        font_size: f32,
        line_height: f32,
        rgba: [u8; 4],
        underline: Option<[u8; 4]>,
    },
    Image {
        rect: Rect,
        image: Arc<RgbaImage>,
    },
}

/// Walk the subtree at `root` and emit paint commands in document order.
/// `<canvas>` subtrees are skipped, `<video>` paints nothing, and colors the
/// painter cannot parse are dropped.
pub fn build_display_list(
    doc: &Document,
    root: NodeId,
    layout: &LayoutTree,
    support: ColorSupport,
) -> Vec<PaintCommand> {
    let mut out = Vec::new();
    paint_node(doc, root, layout, support, &mut out);
    out
}

fn paint_node(doc: &Document, id: NodeId, layout: &LayoutTree, support: ColorSupport, out: &mut Vec<PaintCommand>) {
    if doc.text(id).is_some() {
        paint_text(doc, id, layout, support, out);
        return;
    }
    let Some(lb) = layout.get(id) else {
        return;
    };
    let tag = doc.tag(id).unwrap_or_default();
    if tag == "canvas" {
        return;
    }
    let visible = doc.computed_style(id, "visibility") != "hidden";

    if visible {
        let color_of = |prop: &str| {
            support
                .parse(&doc.computed_style(id, prop))
                .filter(|c| !c.is_transparent())
                .map(Color::to_rgba8)
        };

        if let Some(rgba) = color_of("background-color") {
            out.push(PaintCommand::SolidRect { rect: lb.rect, rgba });
        }

        let b = lb.box_model.border;
        let r = lb.rect;
        let sides = [
            ("top", Rect::new(r.x, r.y, r.width, b.top)),
            ("right", Rect::new(r.right() - b.right, r.y, b.right, r.height)),
            ("bottom", Rect::new(r.x, r.bottom() - b.bottom, r.width, b.bottom)),
            ("left", Rect::new(r.x, r.y, b.left, r.height)),
        ];
        for (side, rect) in sides {
            if rect.is_empty() {
                continue;
            }
            if let Some(rgba) = color_of(&format!("border-{}-color", side)) {
                out.push(PaintCommand::SolidRect { rect, rgba });
            }
        }

        if doc.computed_style(id, "outline-style") != "none" {
            let w = crate::dom::style::parse_length(&doc.computed_style(id, "outline-width"), lb.font_size, 0.0)
                .unwrap_or(0.0);
            if w > 0.0 {
                if let Some(rgba) = color_of("outline-color") {
                    let o = Rect::new(r.x - w, r.y - w, r.width + 2.0 * w, r.height + 2.0 * w);
                    for rect in [
                        Rect::new(o.x, o.y, o.width, w),
                        Rect::new(o.x, o.bottom() - w, o.width, w),
                        Rect::new(o.x, o.y, w, o.height),
                        Rect::new(o.right() - w, o.y, w, o.height),
                    ] {
                        out.push(PaintCommand::SolidRect { rect, rgba });
                    }
                }
            }
        }

        if tag == "img" {
            if let Some(src) = doc.attribute(id, "src") {
                match super::decode_data_url(src) {
                    Ok(image) => out.push(PaintCommand::Image {
                        rect: lb.content_rect(),
                        image: Arc::new(image),
                    }),
                    Err(e) => log::debug!("skipping <img> that failed to decode: {}", e),
                }
            }
        }
    }

    if matches!(tag, "img" | "video") {
        return;
    }
    for child in doc.children(id) {
        paint_node(doc, *child, layout, support, out);
    }
}

fn paint_text(doc: &Document, id: NodeId, layout: &LayoutTree, support: ColorSupport, out: &mut Vec<PaintCommand>) {
    let lines = layout.lines(id);
    if lines.is_empty() {
        return;
    }
    let Some(parent) = doc.parent(id) else {
        return;
    };
    if doc.computed_style(parent, "visibility") == "hidden" {
        return;
    }
    let Some(color) = support.parse(&doc.computed_style(parent, "color")) else {
        return;
    };
    let underline = if doc.computed_style(parent, "text-decoration-line") == "underline" {
        support
            .parse(&doc.computed_style(parent, "text-decoration-color"))
            .map(Color::to_rgba8)
    } else {
        None
    };
    for line in lines {
        out.push(PaintCommand::Text {
            x: line.x,
            y: line.y,
            text: line.text.clone(),
            font_size: line.font_size,
            line_height: line.line_height,
            rgba: color.to_rgba8(),
            underline,
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::DeviceMetrics;
    use crate::rendering::layout::layout_document;

    const PAGE: &str = r#"<html><body style="margin:0">
        <div id="box" style="height:10px;background-color:oklch(0.628 0.2577 29.23);border:2px solid #0000ff"></div>
        <p id="t" style="margin:0;color:#112233">hi</p>
        <canvas id="c" style="background-color:red"></canvas>
        <video id="v" style="background-color:transparent"></video>
    </body></html>"#;

    #[test]
    fn full_support_paints_perceptual_colors() {
        let doc = Document::parse_html(PAGE, DeviceMetrics::new(100, 100, 1.0));
        let layout = layout_document(&doc);
        let list = build_display_list(&doc, doc.root(), &layout, ColorSupport::Full);
        let rects: Vec<_> = list
            .iter()
            .filter_map(|c| match c {
                PaintCommand::SolidRect { rgba, .. } => Some(*rgba),
                _ => None,
            })
            .collect();
        // background + four border sides, nothing from the canvas
        assert_eq!(rects.len(), 5);
        assert!(rects[0][0] > 250 && rects[0][1] < 5);
        assert!(list.iter().any(|c| matches!(c, PaintCommand::Text { text, .. } if text == "hi")));
    }

    #[test]
    fn legacy_support_drops_perceptual_colors() {
        let doc = Document::parse_html(PAGE, DeviceMetrics::new(100, 100, 1.0));
        let layout = layout_document(&doc);
        let list = build_display_list(&doc, doc.root(), &layout, ColorSupport::Legacy);
        let solid = list
            .iter()
            .filter(|c| matches!(c, PaintCommand::SolidRect { .. }))
            .count();
        assert_eq!(solid, 4);
    }
}
