//! Rewrites a cloned subtree's styles into values the legacy painter reads.
//!
//! Colors come from each clone element's *original* element. Perceptual
//! syntaxes (oklch, lab, ...) are resolved through a probe element that lives
//! in the live document only for the duration of one resolution.

use crate::color::{is_unsupported_syntax, parse_color};
use crate::dom::{Document, NodeId};
use crate::{Error, Result};
use log::debug;

/// Color-bearing properties copied or resolved per element.
pub const COLOR_PROPERTIES: &[&str] = &[
    "background-color",
    "color",
    "border-top-color",
    "border-right-color",
    "border-bottom-color",
    "border-left-color",
    "outline-color",
    "text-decoration-color",
    "column-rule-color",
];

/// Spacing and typography copied only where the clone has no inline value.
pub const LAYOUT_PROPERTIES: &[&str] = &[
    "margin-top",
    "margin-right",
    "margin-bottom",
    "margin-left",
    "padding-top",
    "padding-right",
    "padding-bottom",
    "padding-left",
    "border-top-width",
    "border-right-width",
    "border-bottom-width",
    "border-left-width",
    "border-top-style",
    "border-right-style",
    "border-bottom-style",
    "border-left-style",
    "line-height",
    "font-size",
    "font-family",
    "font-weight",
    "font-style",
    "text-decoration-line",
    "width",
    "height",
    "display",
];

/// Counters from one normalization pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NormalizeReport {
    pub resolved: usize,
    pub copied: usize,
    pub layout_copied: usize,
    pub failed: usize,
}

/// A hidden element appended to the live document. Removed on drop.
pub struct ProbeElement<'a> {
    doc: &'a mut Document,
    node: NodeId,
}

impl<'a> ProbeElement<'a> {
    pub fn attach(doc: &'a mut Document) -> Result<Self> {
        let parent = doc.body().unwrap_or_else(|| doc.root());
        let node = doc.create_element("div");
        doc.set_style(node, "visibility", "hidden")?;
        doc.set_style(node, "position", "absolute")?;
        doc.append_child(parent, node)?;
        Ok(ProbeElement { doc, node })
    }

    pub fn node(&self) -> NodeId {
        self.node
    }

    /// Let the document compute `value` and read back its sRGB form.
    pub fn resolve(&mut self, value: &str) -> Result<String> {
        self.doc.set_style(self.node, "color", value)?;
        self.doc.resolved_color(self.node, "color")
    }
}

impl Drop for ProbeElement<'_> {
    fn drop(&mut self) {
        if let Err(e) = self.doc.remove(self.node) {
            log::warn!("failed to remove color probe: {}", e);
        }
    }
}

#[derive(Debug, Default)]
pub struct ColorSpaceNormalizer;

impl ColorSpaceNormalizer {
    pub fn new() -> Self {
        ColorSpaceNormalizer
    }

    /// Resolve one perceptual color through a probe in `live`.
    pub fn resolve_color(&self, live: &mut Document, value: &str) -> Result<String> {
        let mut probe = ProbeElement::attach(live)?;
        probe.resolve(value)
    }

    /// Normalize every element of `clone` that was copied from `live`.
    /// Failures are counted and skipped.
    pub fn normalize(&self, live: &mut Document, clone: &mut Document) -> NormalizeReport {
        let mut report = NormalizeReport::default();
        for id in clone.descendants(clone.root()) {
            let Some(original) = clone.origin(id) else {
                continue;
            };
            if !live.is_element(original) {
                continue;
            }
            self.normalize_colors(live, original, clone, id, &mut report);
            self.copy_layout(live, original, clone, id, &mut report);
        }
        debug!(
            "normalized clone: {} resolved, {} copied, {} layout, {} failed",
            report.resolved, report.copied, report.layout_copied, report.failed
        );
        report
    }

    fn normalize_colors(
        &self,
        live: &mut Document,
        original: NodeId,
        clone: &mut Document,
        id: NodeId,
        report: &mut NormalizeReport,
    ) {
        for prop in COLOR_PROPERTIES {
            let value = live.computed_style(original, prop);
            let applied = if is_unsupported_syntax(&value) {
                self.resolve_color(live, &value)
                    .and_then(|rgb| clone.set_style(id, prop, &rgb))
                    .map(|_| report.resolved += 1)
            } else {
                match parse_color(&value) {
                    Some(c) if !c.is_transparent() => {
                        clone.set_style(id, prop, &value).map(|_| report.copied += 1)
                    }
                    Some(_) => Ok(()),
                    None => Err(Error::RenderError(format!("unparseable color {:?}", value))),
                }
            };
            if let Err(e) = applied {
                debug!("skipping {} on node {}: {}", prop, id.index(), e);
                report.failed += 1;
            }
        }
    }

    fn copy_layout(
        &self,
        live: &Document,
        original: NodeId,
        clone: &mut Document,
        id: NodeId,
        report: &mut NormalizeReport,
    ) {
        for prop in LAYOUT_PROPERTIES {
            if clone.inline_style(id, prop).is_some() {
                continue;
            }
            let value = live.computed_style(original, prop);
            if value.is_empty() {
                continue;
            }
            match clone.set_style(id, prop, &value) {
                Ok(()) => report.layout_copied += 1,
                Err(e) => debug!("skipping {} on node {}: {}", prop, id.index(), e),
            }
        }
    }
}
