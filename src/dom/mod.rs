//! Live document model.
//!
//! An arena-allocated element tree built from HTML with `scraper`. Styles from
//! `<style>` sheets are cascaded once at parse time and stored per element next
//! to its inline declarations, so later mutations (probe elements, clones,
//! substitutions) never need to re-run selector matching. Removed nodes become
//! tombstones and their slots are recycled by later insertions, so scoped
//! mutations leave the arena the size they found it.

pub mod style;

use crate::platform::media::source_from_attributes;
use crate::platform::{DeviceMetrics, VideoFrameSource};
use crate::{Error, Result, Viewport};
use scraper::{ElementRef, Html, Selector};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use style::{Declarations, INHERITED_PROPERTIES};

/// Handle to a node in a [`Document`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(usize);

impl NodeId {
    pub fn index(self) -> usize {
        self.0
    }
}

#[derive(Debug, Clone)]
pub struct ElementData {
    tag: String,
    attrs: Vec<(String, String)>,
    inline: Declarations,
    /// User-agent defaults plus matched stylesheet rules.
    sheet: Declarations,
    hidden: bool,
    /// For cloned elements, the element they were copied from.
    origin: Option<NodeId>,
}

#[derive(Debug, Clone)]
pub enum NodeData {
    Element(ElementData),
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    data: NodeData,
    removed: bool,
}

/// One entry of [`Document::structure_signature`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeSignature {
    pub id: NodeId,
    pub parent: Option<NodeId>,
    pub tag: String,
    pub hidden: bool,
}

pub struct Document {
    nodes: Vec<Node>,
    root: NodeId,
    metrics: DeviceMetrics,
    scroll: (f32, f32),
    stylesheets: Vec<String>,
    videos: HashMap<NodeId, Arc<dyn VideoFrameSource>>,
    /// Tombstoned slots available to `push`.
    free: Vec<NodeId>,
}

impl fmt::Debug for Document {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Document")
            .field("nodes", &self.nodes.iter().filter(|n| !n.removed).count())
            .field("metrics", &self.metrics)
            .field("scroll", &self.scroll)
            .field("videos", &self.videos.len())
            .finish()
    }
}

struct CompiledRule {
    selector: Selector,
    specificity: (u32, u32, u32),
    order: usize,
    declarations: Declarations,
}

impl Document {
    /// Parse an HTML document. `<style>` elements are cascaded; `<video>`
    /// elements carrying `data-still` / `data-tainted` get a bound decoder.
    pub fn parse_html(html: &str, metrics: DeviceMetrics) -> Self {
        Self::parse_html_with_styles(html, &[], metrics)
    }

    /// Like [`Document::parse_html`], with extra stylesheets appended after
    /// the document's own (e.g. fetched `<link rel="stylesheet">` targets).
    pub fn parse_html_with_styles(html: &str, extra_sheets: &[String], metrics: DeviceMetrics) -> Self {
        let parsed = Html::parse_document(html);

        let mut stylesheets: Vec<String> = Vec::new();
        if let Ok(style_sel) = Selector::parse("style") {
            for node in parsed.select(&style_sel) {
                let txt = node.text().collect::<String>();
                if !txt.trim().is_empty() {
                    stylesheets.push(txt);
                }
            }
        }
        stylesheets.extend(extra_sheets.iter().cloned());

        let mut rules = Vec::new();
        for sheet in &stylesheets {
            for rule in style::parse_stylesheet(sheet) {
                match Selector::parse(&rule.selector) {
                    Ok(selector) => rules.push(CompiledRule {
                        specificity: style::specificity(&rule.selector),
                        order: rules.len(),
                        selector,
                        declarations: rule.declarations,
                    }),
                    Err(_) => log::debug!("skipping unsupported selector {:?}", rule.selector),
                }
            }
        }

        let mut doc = Document {
            nodes: Vec::new(),
            root: NodeId(0),
            metrics,
            scroll: (0.0, 0.0),
            stylesheets,
            videos: HashMap::new(),
            free: Vec::new(),
        };
        doc.root = doc.import_element(parsed.root_element(), None, &rules);

        let videos: Vec<NodeId> = doc.elements_by_tag(doc.root, "video");
        for v in videos {
            if let Some(src) = source_from_attributes(|name| doc.attribute(v, name).map(str::to_string)) {
                doc.videos.insert(v, src);
            }
        }
        doc
    }

    fn import_element(&mut self, el: ElementRef<'_>, parent: Option<NodeId>, rules: &[CompiledRule]) -> NodeId {
        let tag = el.value().name().to_ascii_lowercase();
        let mut sheet = style::user_agent_defaults(&tag);
        let mut matched: Vec<&CompiledRule> = rules.iter().filter(|r| r.selector.matches(&el)).collect();
        matched.sort_by_key(|r| (r.specificity, r.order));
        for r in matched {
            sheet.extend(r.declarations.iter().map(|(k, v)| (k.clone(), v.clone())));
        }

        let mut attrs = Vec::new();
        let mut inline = Declarations::new();
        for (name, value) in el.value().attrs() {
            if name.eq_ignore_ascii_case("style") {
                inline = style::parse_declarations(value);
            } else {
                attrs.push((name.to_ascii_lowercase(), value.to_string()));
            }
        }

        let id = self.push(
            parent,
            NodeData::Element(ElementData {
                tag,
                attrs,
                inline,
                sheet,
                hidden: false,
                origin: None,
            }),
        );

        for child in el.children() {
            if let Some(child_el) = ElementRef::wrap(child) {
                let cid = self.import_element(child_el, Some(id), rules);
                self.nodes[id.0].children.push(cid);
            } else if let scraper::Node::Text(t) = child.value() {
                let cid = self.push(Some(id), NodeData::Text(t.to_string()));
                self.nodes[id.0].children.push(cid);
            }
        }
        id
    }

    fn push(&mut self, parent: Option<NodeId>, data: NodeData) -> NodeId {
        let node = Node {
            parent,
            children: Vec::new(),
            data,
            removed: false,
        };
        match self.free.pop() {
            Some(id) => {
                self.nodes[id.0] = node;
                id
            }
            None => {
                self.nodes.push(node);
                NodeId(self.nodes.len() - 1)
            }
        }
    }

    /// Arena slots in use, live nodes and recyclable tombstones alike.
    pub fn slot_count(&self) -> usize {
        self.nodes.len()
    }

    fn node(&self, id: NodeId) -> Result<&Node> {
        self.nodes
            .get(id.0)
            .filter(|n| !n.removed)
            .ok_or_else(|| Error::DomError(format!("unknown node {}", id.0)))
    }

    fn element(&self, id: NodeId) -> Option<&ElementData> {
        match self.nodes.get(id.0) {
            Some(Node { data: NodeData::Element(e), removed: false, .. }) => Some(e),
            _ => None,
        }
    }

    fn element_mut(&mut self, id: NodeId) -> Result<&mut ElementData> {
        match self.nodes.get_mut(id.0) {
            Some(Node { data: NodeData::Element(e), removed: false, .. }) => Ok(e),
            _ => Err(Error::DomError(format!("node {} is not a live element", id.0))),
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn metrics(&self) -> DeviceMetrics {
        self.metrics
    }

    pub fn set_metrics(&mut self, metrics: DeviceMetrics) {
        self.metrics = metrics;
    }

    pub fn viewport(&self) -> Viewport {
        self.metrics.viewport()
    }

    pub fn scroll(&self) -> (f32, f32) {
        self.scroll
    }

    pub fn set_scroll(&mut self, x: f32, y: f32) {
        self.scroll = (x.max(0.0), y.max(0.0));
    }

    pub fn stylesheets(&self) -> &[String] {
        &self.stylesheets
    }

    pub fn body(&self) -> Option<NodeId> {
        self.elements_by_tag(self.root, "body").into_iter().next()
    }

    pub fn tag(&self, id: NodeId) -> Option<&str> {
        self.element(id).map(|e| e.tag.as_str())
    }

    pub fn is_element(&self, id: NodeId) -> bool {
        self.element(id).is_some()
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match self.nodes.get(id.0) {
            Some(Node { data: NodeData::Text(t), removed: false, .. }) => Some(t.as_str()),
            _ => None,
        }
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.node(id).ok().and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.node(id).map(|n| n.children.as_slice()).unwrap_or(&[])
    }

    /// Pre-order traversal of `id` and everything below it.
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack = vec![id];
        while let Some(n) = stack.pop() {
            if self.node(n).is_err() {
                continue;
            }
            out.push(n);
            for c in self.children(n).iter().rev() {
                stack.push(*c);
            }
        }
        out
    }

    /// Elements with `tag` at or below `root`, in document order.
    pub fn elements_by_tag(&self, root: NodeId, tag: &str) -> Vec<NodeId> {
        self.descendants(root)
            .into_iter()
            .filter(|n| self.tag(*n).is_some_and(|t| t.eq_ignore_ascii_case(tag)))
            .collect()
    }

    pub fn find_by_id(&self, id_attr: &str) -> Option<NodeId> {
        self.descendants(self.root)
            .into_iter()
            .find(|n| self.attribute(*n, "id") == Some(id_attr))
    }

    pub fn is_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut cur = self.parent(node);
        while let Some(p) = cur {
            if p == ancestor {
                return true;
            }
            cur = self.parent(p);
        }
        false
    }

    /// The element a clone was copied from.
    pub fn origin(&self, id: NodeId) -> Option<NodeId> {
        self.element(id).and_then(|e| e.origin)
    }

    // --- attributes ---

    pub fn attribute(&self, id: NodeId, name: &str) -> Option<&str> {
        self.element(id)?
            .attrs
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn has_attribute(&self, id: NodeId, name: &str) -> bool {
        self.attribute(id, name).is_some()
    }

    pub fn set_attribute(&mut self, id: NodeId, name: &str, value: &str) -> Result<()> {
        let el = self.element_mut(id)?;
        match el.attrs.iter_mut().find(|(k, _)| k == name) {
            Some((_, v)) => *v = value.to_string(),
            None => el.attrs.push((name.to_string(), value.to_string())),
        }
        Ok(())
    }

    pub fn remove_attribute(&mut self, id: NodeId, name: &str) -> Result<()> {
        self.element_mut(id)?.attrs.retain(|(k, _)| k != name);
        Ok(())
    }

    // --- styles ---

    pub fn inline_style(&self, id: NodeId, prop: &str) -> Option<&str> {
        self.element(id)?.inline.get(prop).map(String::as_str)
    }

    /// Set an inline declaration (shorthands are expanded).
    pub fn set_style(&mut self, id: NodeId, prop: &str, value: &str) -> Result<()> {
        let el = self.element_mut(id)?;
        style::set_property(&mut el.inline, prop, value);
        Ok(())
    }

    pub fn remove_style(&mut self, id: NodeId, prop: &str) -> Result<()> {
        self.element_mut(id)?.inline.remove(prop);
        Ok(())
    }

    /// The cascaded value of `prop`: inline, then stylesheet, then the
    /// parent's value for inherited properties, then the initial value.
    ///
    /// Colors are reported as declared; a perceptual color function stays in
    /// its original syntax (see [`Document::resolved_color`]).
    pub fn computed_style(&self, id: NodeId, prop: &str) -> String {
        let Some(el) = self.element(id) else {
            return self
                .parent(id)
                .map(|p| self.computed_style(p, prop))
                .unwrap_or_else(|| initial_value(prop).to_string());
        };
        if let Some(v) = el.inline.get(prop).or_else(|| el.sheet.get(prop)) {
            if v != "inherit" && !v.eq_ignore_ascii_case("currentcolor") {
                return v.clone();
            }
            if v.eq_ignore_ascii_case("currentcolor") {
                return self.computed_style(id, "color");
            }
            if let Some(p) = self.parent(id) {
                return self.computed_style(p, prop);
            }
        }
        if INHERITED_PROPERTIES.contains(&prop) {
            if let Some(p) = self.parent(id) {
                return self.computed_style(p, prop);
            }
        }
        if is_current_color_default(prop) {
            return self.computed_style(id, "color");
        }
        initial_value(prop).to_string()
    }

    /// Resolve a color property to `rgb()`/`rgba()`, whatever syntax it was
    /// declared in.
    pub fn resolved_color(&self, id: NodeId, prop: &str) -> Result<String> {
        let value = self.computed_style(id, prop);
        crate::color::resolve_to_srgb(&value)
            .ok_or_else(|| Error::DomError(format!("cannot resolve {} value {:?}", prop, value)))
    }

    /// Whether the element takes part in rendering (not removed, hidden or
    /// `display: none`, and neither is any ancestor).
    pub fn is_displayed(&self, id: NodeId) -> bool {
        let mut cur = Some(id);
        while let Some(n) = cur {
            if self.node(n).is_err() {
                return false;
            }
            if let Some(el) = self.element(n) {
                if el.hidden || self.computed_style(n, "display") == "none" {
                    return false;
                }
            }
            cur = self.parent(n);
        }
        true
    }

    pub fn is_hidden(&self, id: NodeId) -> bool {
        self.element(id).is_some_and(|e| e.hidden)
    }

    /// Toggle `display: none` without detaching the element.
    pub fn set_hidden(&mut self, id: NodeId, hidden: bool) -> Result<()> {
        self.element_mut(id)?.hidden = hidden;
        Ok(())
    }

    /// Give `to` the declarations of `from`, both stylesheet-matched and
    /// inline, as if it carried the same classes and `style` attribute.
    pub fn copy_styles(&mut self, from: NodeId, to: NodeId) -> Result<()> {
        let (sheet, inline) = self
            .element(from)
            .map(|e| (e.sheet.clone(), e.inline.clone()))
            .ok_or_else(|| Error::DomError(format!("node {} is not a live element", from.0)))?;
        let target = self.element_mut(to)?;
        target.sheet = sheet;
        target.inline = inline;
        Ok(())
    }

    // --- tree mutation ---

    /// Create a detached element carrying user-agent defaults.
    pub fn create_element(&mut self, tag: &str) -> NodeId {
        let tag = tag.to_ascii_lowercase();
        let sheet = style::user_agent_defaults(&tag);
        self.push(
            None,
            NodeData::Element(ElementData {
                tag,
                attrs: Vec::new(),
                inline: Declarations::new(),
                sheet,
                hidden: false,
                origin: None,
            }),
        )
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.push(None, NodeData::Text(text.to_string()))
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> Result<()> {
        self.element(parent)
            .ok_or_else(|| Error::DomError(format!("node {} cannot have children", parent.0)))?;
        self.detach(child)?;
        self.nodes[child.0].parent = Some(parent);
        self.nodes[parent.0].children.push(child);
        Ok(())
    }

    /// Insert `new` as the previous sibling of `reference`.
    pub fn insert_before(&mut self, new: NodeId, reference: NodeId) -> Result<()> {
        let parent = self
            .parent(reference)
            .ok_or_else(|| Error::DomError(format!("node {} has no parent", reference.0)))?;
        self.detach(new)?;
        let pos = self.nodes[parent.0]
            .children
            .iter()
            .position(|c| *c == reference)
            .ok_or_else(|| Error::DomError("reference is not a child of its parent".into()))?;
        self.nodes[new.0].parent = Some(parent);
        self.nodes[parent.0].children.insert(pos, new);
        Ok(())
    }

    fn detach(&mut self, id: NodeId) -> Result<()> {
        self.node(id)?;
        if let Some(p) = self.nodes[id.0].parent.take() {
            self.nodes[p.0].children.retain(|c| *c != id);
        }
        Ok(())
    }

    /// Detach `id` and tombstone it together with its subtree.
    pub fn remove(&mut self, id: NodeId) -> Result<()> {
        let subtree = self.descendants(id);
        self.detach(id)?;
        for n in subtree {
            let node = &mut self.nodes[n.0];
            node.removed = true;
            node.parent = None;
            node.children.clear();
            self.videos.remove(&n);
            self.free.push(n);
        }
        Ok(())
    }

    /// Copy the subtree at `id` into a new, off-document [`Document`]. Cloned
    /// elements keep their cascaded styles and remember their origin; video
    /// decoders are not carried over.
    pub fn clone_subtree(&self, id: NodeId) -> Result<Document> {
        self.node(id)?;
        let mut clone = Document {
            nodes: Vec::new(),
            root: NodeId(0),
            metrics: self.metrics,
            scroll: (0.0, 0.0),
            stylesheets: self.stylesheets.clone(),
            videos: HashMap::new(),
            free: Vec::new(),
        };
        clone.root = self.copy_into(&mut clone, id, None);
        Ok(clone)
    }

    fn copy_into(&self, target: &mut Document, id: NodeId, parent: Option<NodeId>) -> NodeId {
        let src = &self.nodes[id.0];
        let data = match &src.data {
            NodeData::Element(e) => NodeData::Element(ElementData {
                origin: Some(id),
                ..e.clone()
            }),
            NodeData::Text(t) => NodeData::Text(t.clone()),
        };
        let new_id = target.push(parent, data);
        for c in &src.children {
            if self.nodes[c.0].removed {
                continue;
            }
            let cid = self.copy_into(target, *c, Some(new_id));
            target.nodes[new_id.0].children.push(cid);
        }
        new_id
    }

    /// Drop every stylesheet source: `<style>` and `<link rel=stylesheet>`
    /// elements are removed and matched rules are reset to user-agent
    /// defaults. Inline declarations survive.
    pub fn strip_stylesheets(&mut self) {
        let doomed: Vec<NodeId> = self
            .descendants(self.root)
            .into_iter()
            .filter(|n| match self.tag(*n) {
                Some("style") => true,
                Some("link") => self
                    .attribute(*n, "rel")
                    .is_some_and(|r| r.eq_ignore_ascii_case("stylesheet")),
                _ => false,
            })
            .collect();
        for n in doomed {
            let _ = self.remove(n);
        }
        for node in self.nodes.iter_mut().filter(|n| !n.removed) {
            if let NodeData::Element(e) = &mut node.data {
                e.sheet = style::user_agent_defaults(&e.tag);
            }
        }
        self.stylesheets.clear();
    }

    // --- media ---

    pub fn bind_video(&mut self, id: NodeId, source: Arc<dyn VideoFrameSource>) -> Result<()> {
        if self.tag(id) != Some("video") {
            return Err(Error::DomError(format!("node {} is not a <video>", id.0)));
        }
        self.videos.insert(id, source);
        Ok(())
    }

    pub fn video_source(&self, id: NodeId) -> Option<Arc<dyn VideoFrameSource>> {
        self.videos.get(&id).cloned()
    }

    /// Live node set under `root` with visibility flags, for comparing the
    /// tree before and after a scoped mutation.
    pub fn structure_signature(&self, root: NodeId) -> Vec<NodeSignature> {
        self.descendants(root)
            .into_iter()
            .map(|n| NodeSignature {
                id: n,
                parent: self.parent(n),
                tag: self.tag(n).unwrap_or("#text").to_string(),
                hidden: self.is_hidden(n),
            })
            .collect()
    }
}

/// Hides an element for as long as the guard lives. An element that was
/// already hidden is left hidden on release.
pub struct HideGuard<'a> {
    doc: &'a mut Document,
    node: NodeId,
    was_hidden: bool,
}

impl<'a> HideGuard<'a> {
    pub fn hide(doc: &'a mut Document, node: NodeId) -> Result<Self> {
        let was_hidden = doc.is_hidden(node);
        doc.set_hidden(node, true)?;
        Ok(HideGuard { doc, node, was_hidden })
    }

    pub fn document(&self) -> &Document {
        self.doc
    }
}

impl Drop for HideGuard<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.doc.set_hidden(self.node, self.was_hidden) {
            log::warn!("failed to restore visibility of node {}: {}", self.node.0, e);
        }
    }
}

fn is_current_color_default(prop: &str) -> bool {
    matches!(
        prop,
        "border-top-color"
            | "border-right-color"
            | "border-bottom-color"
            | "border-left-color"
            | "outline-color"
            | "text-decoration-color"
            | "column-rule-color"
    )
}

/// Initial values for the properties the pipeline reads.
pub fn initial_value(prop: &str) -> &'static str {
    match prop {
        "color" => "rgb(0, 0, 0)",
        "background-color" => "rgba(0, 0, 0, 0)",
        "display" => "block",
        "visibility" => "visible",
        "font-size" => "16px",
        "font-family" => "sans-serif",
        "font-weight" => "400",
        "font-style" => "normal",
        "line-height" => "normal",
        "opacity" => "1",
        "width" | "height" => "auto",
        "text-decoration-line" => "none",
        p if p.ends_with("-style") => "none",
        p if p.ends_with("-width") => "0px",
        p if p.starts_with("margin-") || p.starts_with("padding-") => "0px",
        _ => "",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r##"<html><head><style>
        .card { color: oklch(0.5 0.2 30); margin: 4px; }
        #main { background: #ff0000; }
        p { color: blue; }
    </style></head><body><div id="main" class="card" style="padding: 2px">
        <p>Hello</p><span>inherit me</span>
        <video id="v" data-still="#00ff00" width="16" height="8"></video>
    </div></body></html>"##;

    fn doc() -> Document {
        Document::parse_html(PAGE, DeviceMetrics::default())
    }

    #[test]
    fn cascade_applies_sheet_inline_and_inheritance() {
        let d = doc();
        let main = d.find_by_id("main").unwrap();
        assert_eq!(d.computed_style(main, "color"), "oklch(0.5 0.2 30)");
        assert_eq!(d.computed_style(main, "background-color"), "#ff0000");
        assert_eq!(d.computed_style(main, "margin-top"), "4px");
        assert_eq!(d.computed_style(main, "padding-left"), "2px");
        let span = d.elements_by_tag(main, "span")[0];
        assert_eq!(d.computed_style(span, "color"), "oklch(0.5 0.2 30)");
        let p = d.elements_by_tag(main, "p")[0];
        assert_eq!(d.computed_style(p, "color"), "blue");
        assert_eq!(d.computed_style(p, "border-top-color"), "blue");
        assert_eq!(d.computed_style(span, "background-color"), "rgba(0, 0, 0, 0)");
    }

    #[test]
    fn resolved_color_always_uses_srgb_syntax() {
        let d = doc();
        let main = d.find_by_id("main").unwrap();
        let resolved = d.resolved_color(main, "color").unwrap();
        assert!(resolved.starts_with("rgb("), "{}", resolved);
    }

    #[test]
    fn videos_with_hints_get_decoders() {
        let d = doc();
        let v = d.find_by_id("v").unwrap();
        assert_eq!(d.video_source(v).unwrap().intrinsic_size(), (16, 8));
    }

    #[test]
    fn insert_and_remove_keep_ids_stable() {
        let mut d = doc();
        let v = d.find_by_id("v").unwrap();
        let before = d.structure_signature(d.root());
        let img = d.create_element("img");
        d.insert_before(img, v).unwrap();
        assert_eq!(d.parent(img), d.parent(v));
        let siblings = d.children(d.parent(v).unwrap());
        let pos_img = siblings.iter().position(|c| *c == img).unwrap();
        assert_eq!(siblings[pos_img + 1], v);
        d.remove(img).unwrap();
        assert_eq!(d.structure_signature(d.root()), before);
        assert!(d.tag(img).is_none());
    }

    #[test]
    fn removed_slots_are_recycled() {
        let mut d = doc();
        let main = d.find_by_id("main").unwrap();
        let slots = d.slot_count();
        for _ in 0..100 {
            let probe = d.create_element("div");
            let text = d.create_text("x");
            d.append_child(probe, text).unwrap();
            d.append_child(main, probe).unwrap();
            d.remove(probe).unwrap();
        }
        assert_eq!(d.slot_count(), slots + 2);

        let fresh = d.create_element("span");
        assert_eq!(d.tag(fresh), Some("span"));
        assert!(d.children(fresh).is_empty());
        assert_eq!(d.parent(fresh), None);
        assert!(d.remove(fresh).is_ok());
        assert!(d.remove(fresh).is_err());
    }

    #[test]
    fn clone_strips_sheets_but_keeps_inline() {
        let d = doc();
        let main = d.find_by_id("main").unwrap();
        let mut c = d.clone_subtree(d.root()).unwrap();
        let cmain = c.find_by_id("main").unwrap();
        assert_eq!(c.origin(cmain), Some(main));
        assert_eq!(c.computed_style(cmain, "margin-top"), "4px");
        c.strip_stylesheets();
        assert!(c.elements_by_tag(c.root(), "style").is_empty());
        assert_eq!(c.computed_style(cmain, "margin-top"), "0px");
        assert_eq!(c.computed_style(cmain, "padding-left"), "2px");
        assert!(c.video_source(c.find_by_id("v").unwrap()).is_none());
    }

    #[test]
    fn hide_guard_restores_previous_visibility() {
        let mut d = doc();
        let main = d.find_by_id("main").unwrap();
        {
            let g = HideGuard::hide(&mut d, main).unwrap();
            assert!(g.document().is_hidden(main));
        }
        assert!(!d.is_hidden(main));
        d.set_hidden(main, true).unwrap();
        drop(HideGuard::hide(&mut d, main).unwrap());
        assert!(d.is_hidden(main));
    }

    #[test]
    fn hidden_elements_are_not_displayed() {
        let mut d = doc();
        let main = d.find_by_id("main").unwrap();
        let p = d.elements_by_tag(main, "p")[0];
        assert!(d.is_displayed(p));
        d.set_hidden(main, true).unwrap();
        assert!(!d.is_displayed(p));
        let head = d.elements_by_tag(d.root(), "head")[0];
        assert!(!d.is_displayed(head));
    }
}
