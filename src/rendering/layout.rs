/// Block-flow layout over the document model

use crate::dom::style::parse_length;
use crate::dom::{Document, NodeId};
use std::collections::HashMap;

/// Horizontal advance of one glyph, in em.
pub const GLYPH_ADVANCE_EM: f32 = 0.5;
/// Line height used for `line-height: normal`, in em.
pub const NORMAL_LINE_HEIGHT_EM: f32 = 1.2;

/// Default size of replaced elements without explicit dimensions.
const REPLACED_DEFAULT: (f32, f32) = (300.0, 150.0);

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    pub fn translate(&self, dx: f32, dy: f32) -> Rect {
        Rect { x: self.x + dx, y: self.y + dy, ..*self }
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Edges {
    pub top: f32,
    pub right: f32,
    pub bottom: f32,
    pub left: f32,
}

impl Edges {
    pub fn horizontal(&self) -> f32 {
        self.left + self.right
    }

    pub fn vertical(&self) -> f32 {
        self.top + self.bottom
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BoxModel {
    pub margin: Edges,
    pub border: Edges,
    pub padding: Edges,
}

/// Geometry of one element. `rect` is the border box in document space.
#[derive(Debug, Clone, PartialEq)]
pub struct LayoutBox {
    pub rect: Rect,
    pub box_model: BoxModel,
    /// Extent of the border box including overflowing descendants.
    pub scroll_width: f32,
    pub scroll_height: f32,
    pub font_size: f32,
}

impl LayoutBox {
    pub fn content_width(&self) -> f32 {
        let bm = &self.box_model;
        (self.rect.width - bm.border.horizontal() - bm.padding.horizontal()).max(0.0)
    }

    pub fn content_rect(&self) -> Rect {
        let bm = &self.box_model;
        Rect {
            x: self.rect.x + bm.border.left + bm.padding.left,
            y: self.rect.y + bm.border.top + bm.padding.top,
            width: self.content_width(),
            height: (self.rect.height - bm.border.vertical() - bm.padding.vertical()).max(0.0),
        }
    }
}

/// One wrapped line of a text node.
#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub x: f32,
    pub y: f32,
    pub text: String,
    pub font_size: f32,
    pub line_height: f32,
}

impl TextLine {
    pub fn width(&self) -> f32 {
        self.text.chars().count() as f32 * self.font_size * GLYPH_ADVANCE_EM
    }
}

#[derive(Debug, Clone, Default)]
pub struct LayoutTree {
    boxes: HashMap<NodeId, LayoutBox>,
    lines: HashMap<NodeId, Vec<TextLine>>,
}

impl LayoutTree {
    pub fn get(&self, id: NodeId) -> Option<&LayoutBox> {
        self.boxes.get(&id)
    }

    pub fn lines(&self, id: NodeId) -> &[TextLine] {
        self.lines.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.boxes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boxes.is_empty()
    }
}

/// Lay out the whole document against its viewport width.
pub fn layout_document(doc: &Document) -> LayoutTree {
    let width = doc.viewport().width as f32;
    layout_subtree(doc, doc.root(), 0.0, 0.0, width)
}

/// Lay out `root` with its margin box starting at (`x`, `y`).
pub fn layout_subtree(doc: &Document, root: NodeId, x: f32, y: f32, available_width: f32) -> LayoutTree {
    let mut tree = LayoutTree::default();
    let parent_fs = doc
        .parent(root)
        .map(|p| font_size(doc, p))
        .unwrap_or(16.0);
    layout_element(doc, root, x, y, available_width, parent_fs, &mut tree);
    tree
}

/// Resolved font-size of an element in px.
pub fn font_size(doc: &Document, id: NodeId) -> f32 {
    let parent_fs = doc.parent(id).map(|p| font_size(doc, p)).unwrap_or(16.0);
    parse_length(&doc.computed_style(id, "font-size"), parent_fs, parent_fs).unwrap_or(parent_fs)
}

/// Resolved line-height of an element in px.
pub fn line_height(doc: &Document, id: NodeId, font_size: f32) -> f32 {
    let v = doc.computed_style(id, "line-height");
    if v == "normal" {
        return font_size * NORMAL_LINE_HEIGHT_EM;
    }
    if let Ok(n) = v.trim().parse::<f32>() {
        return n * font_size;
    }
    parse_length(&v, font_size, font_size).unwrap_or(font_size * NORMAL_LINE_HEIGHT_EM)
}

fn own_display_none(doc: &Document, id: NodeId) -> bool {
    doc.is_hidden(id) || doc.computed_style(id, "display") == "none"
}

fn edges(doc: &Document, id: NodeId, prefix: &str, suffix: &str, fs: f32, base: f32) -> Edges {
    let side = |s: &str| {
        let prop = format!("{}{}{}", prefix, s, suffix);
        parse_length(&doc.computed_style(id, &prop), fs, base).unwrap_or(0.0)
    };
    Edges {
        top: side("top"),
        right: side("right"),
        bottom: side("bottom"),
        left: side("left"),
    }
}

fn border_edges(doc: &Document, id: NodeId, fs: f32) -> Edges {
    let mut e = edges(doc, id, "border-", "-width", fs, 0.0);
    let styled = |s: &str| {
        let style = doc.computed_style(id, &format!("border-{}-style", s));
        style != "none" && style != "hidden"
    };
    if !styled("top") {
        e.top = 0.0;
    }
    if !styled("right") {
        e.right = 0.0;
    }
    if !styled("bottom") {
        e.bottom = 0.0;
    }
    if !styled("left") {
        e.left = 0.0;
    }
    e
}

fn dimension(doc: &Document, id: NodeId, prop: &str, fs: f32, base: Option<f32>) -> Option<f32> {
    let v = doc.computed_style(id, prop);
    if v.ends_with('%') && base.is_none() {
        return None;
    }
    parse_length(&v, fs, base.unwrap_or(0.0))
}

fn attr_dimension(doc: &Document, id: NodeId, name: &str) -> Option<f32> {
    doc.attribute(id, name)
        .and_then(|v| v.trim().trim_end_matches("px").parse::<f32>().ok())
}

/// Lay out one element; returns the height of its margin box.
fn layout_element(
    doc: &Document,
    id: NodeId,
    x: f32,
    y: f32,
    available_width: f32,
    parent_fs: f32,
    tree: &mut LayoutTree,
) -> f32 {
    if !doc.is_element(id) || own_display_none(doc, id) {
        return 0.0;
    }
    let fs = parse_length(&doc.computed_style(id, "font-size"), parent_fs, parent_fs).unwrap_or(parent_fs);
    let tag = doc.tag(id).unwrap_or_default().to_string();
    let replaced = matches!(tag.as_str(), "img" | "video" | "canvas");

    let box_model = BoxModel {
        margin: edges(doc, id, "margin-", "", fs, available_width),
        border: border_edges(doc, id, fs),
        padding: edges(doc, id, "padding-", "", fs, available_width),
    };
    let chrome_w = box_model.border.horizontal() + box_model.padding.horizontal();
    let chrome_h = box_model.border.vertical() + box_model.padding.vertical();

    let explicit_w = dimension(doc, id, "width", fs, Some(available_width));
    let explicit_h = dimension(doc, id, "height", fs, None);

    let content_w = match (explicit_w, replaced) {
        (Some(w), _) => w,
        (None, true) => attr_dimension(doc, id, "width").unwrap_or(REPLACED_DEFAULT.0),
        (None, false) => (available_width - box_model.margin.horizontal() - chrome_w).max(0.0),
    };

    let border_x = x + box_model.margin.left;
    let border_y = y + box_model.margin.top;
    let content_x = border_x + box_model.border.left + box_model.padding.left;
    let content_y = border_y + box_model.border.top + box_model.padding.top;

    let mut cursor = content_y;
    let mut max_right = content_x + content_w;
    if !replaced {
        let lh = line_height(doc, id, fs);
        for child in doc.children(id).to_vec() {
            if let Some(text) = doc.text(child) {
                let lines = wrap_text(text, content_w, fs);
                let mut laid = Vec::with_capacity(lines.len());
                for line in lines {
                    let tl = TextLine {
                        x: content_x,
                        y: cursor,
                        text: line,
                        font_size: fs,
                        line_height: lh,
                    };
                    max_right = max_right.max(tl.x + tl.width());
                    cursor += lh;
                    laid.push(tl);
                }
                if !laid.is_empty() {
                    tree.lines.insert(child, laid);
                }
            } else {
                let h = layout_element(doc, child, content_x, cursor, content_w, fs, tree);
                if let Some(b) = tree.boxes.get(&child) {
                    max_right = max_right.max(b.rect.x + b.scroll_width + b.box_model.margin.right);
                }
                cursor += h;
            }
        }
    }
    let flow_h = cursor - content_y;

    let content_h = match (explicit_h, replaced) {
        (Some(h), _) => h,
        (None, true) => attr_dimension(doc, id, "height").unwrap_or(REPLACED_DEFAULT.1),
        (None, false) => flow_h,
    };

    let rect = Rect::new(border_x, border_y, content_w + chrome_w, content_h + chrome_h);
    let scroll_width = rect
        .width
        .max(max_right - border_x + box_model.padding.right + box_model.border.right);
    let scroll_height = rect.height.max(flow_h + chrome_h);

    tree.boxes.insert(
        id,
        LayoutBox {
            rect,
            box_model,
            scroll_width,
            scroll_height,
            font_size: fs,
        },
    );
    rect.height + box_model.margin.vertical()
}

/// Collapse whitespace and wrap by glyph advance.
fn wrap_text(text: &str, width: f32, font_size: f32) -> Vec<String> {
    let advance = (font_size * GLYPH_ADVANCE_EM).max(1.0);
    let per_line = ((width / advance).floor() as usize).max(1);
    let mut lines = Vec::new();
    let mut cur = String::new();
    for word in text.split_whitespace() {
        if !cur.is_empty() && cur.chars().count() + 1 + word.chars().count() > per_line {
            lines.push(std::mem::take(&mut cur));
        }
        if !cur.is_empty() {
            cur.push(' ');
        }
        cur.push_str(word);
    }
    if !cur.is_empty() {
        lines.push(cur);
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::DeviceMetrics;

    #[test]
    fn layout_stacks_blocks_and_wraps_text() {
        let html = r#"<html><body style="margin:0"><div id="a" style="height:40px;margin:5px"></div>
            <p id="p" style="margin:0;width:80px;font-size:10px;line-height:10px">aaaa bbbb cccc dddd</p></body></html>"#;
        let doc = Document::parse_html(html, DeviceMetrics::new(200, 100, 1.0));
        let tree = layout_document(&doc);
        let a = tree.get(doc.find_by_id("a").unwrap()).unwrap();
        assert_eq!(a.rect, Rect::new(5.0, 5.0, 190.0, 40.0));
        let p_id = doc.find_by_id("p").unwrap();
        let p = tree.get(p_id).unwrap();
        assert_eq!(p.rect.y, 50.0);
        // 80px / 5px glyphs = 16 chars per line -> "aaaa bbbb cccc" + "dddd"
        let text = doc.children(p_id)[0];
        let lines = tree.lines(text);
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].text, "aaaa bbbb cccc");
        assert_eq!(p.rect.height, 20.0);
    }

    #[test]
    fn overflow_extends_scroll_size() {
        let html = r#"<html><body style="margin:0"><div id="outer" style="height:100px;width:300px">
            <div style="height:250px"></div><div style="height:50px"></div></div></body></html>"#;
        let doc = Document::parse_html(html, DeviceMetrics::new(400, 120, 1.0));
        let tree = layout_document(&doc);
        let outer = tree.get(doc.find_by_id("outer").unwrap()).unwrap();
        assert_eq!(outer.rect.height, 100.0);
        assert_eq!(outer.scroll_height, 300.0);
        assert_eq!(outer.scroll_width, 300.0);
    }

    #[test]
    fn replaced_elements_use_attributes_then_defaults() {
        let html = r#"<html><body style="margin:0"><video id="v" width="64" height="32"></video><canvas id="c"></canvas></body></html>"#;
        let doc = Document::parse_html(html, DeviceMetrics::default());
        let tree = layout_document(&doc);
        let v = tree.get(doc.find_by_id("v").unwrap()).unwrap();
        assert_eq!((v.rect.width, v.rect.height), (64.0, 32.0));
        let c = tree.get(doc.find_by_id("c").unwrap()).unwrap();
        assert_eq!((c.rect.width, c.rect.height), (300.0, 150.0));
    }

    #[test]
    fn hidden_elements_take_no_space() {
        let html = r#"<html><body style="margin:0"><div id="a" style="height:10px"></div><div id="b" style="height:10px"></div></body></html>"#;
        let mut doc = Document::parse_html(html, DeviceMetrics::default());
        doc.set_hidden(doc.find_by_id("a").unwrap(), true).unwrap();
        let tree = layout_document(&doc);
        assert!(tree.get(doc.find_by_id("a").unwrap()).is_none());
        assert_eq!(tree.get(doc.find_by_id("b").unwrap()).unwrap().rect.y, 0.0);
    }
}
