//! Style declarations, stylesheet parsing and the tiny cascade the document
//! model runs at parse time.

use std::collections::BTreeMap;

/// Property name -> value, longhands only.
pub type Declarations = BTreeMap<String, String>;

/// Properties that inherit from the parent element when not declared.
pub const INHERITED_PROPERTIES: &[&str] = &[
    "color",
    "font-family",
    "font-size",
    "font-style",
    "font-weight",
    "line-height",
    "visibility",
];

/// A parsed style rule: one selector (groups are split) and its declarations.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleRule {
    pub selector: String,
    pub declarations: Declarations,
}

/// Split on `sep` outside parentheses.
pub fn split_top_level(input: &str, sep: char) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    for (i, c) in input.char_indices() {
        match c {
            '(' => depth += 1,
            ')' => depth -= 1,
            c if c == sep && depth == 0 => {
                out.push(&input[start..i]);
                start = i + c.len_utf8();
            }
            _ => {}
        }
    }
    out.push(&input[start..]);
    out
}

/// Whitespace-separated tokens, keeping function arguments together.
pub fn tokens(value: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut depth = 0i32;
    let mut start: Option<usize> = None;
    for (i, c) in value.char_indices() {
        match c {
            '(' => {
                depth += 1;
                start.get_or_insert(i);
            }
            ')' => depth -= 1,
            c if c.is_whitespace() && depth == 0 => {
                if let Some(s) = start.take() {
                    out.push(&value[s..i]);
                }
            }
            _ => {
                start.get_or_insert(i);
            }
        }
    }
    if let Some(s) = start {
        out.push(&value[s..]);
    }
    out
}

/// Parse a `style` attribute body (`a: b; c: d`) and expand shorthands.
pub fn parse_declarations(input: &str) -> Declarations {
    let mut decls = Declarations::new();
    for part in split_top_level(input, ';') {
        let Some((name, value)) = part.split_once(':') else {
            continue;
        };
        let name = name.trim().to_ascii_lowercase();
        let value = value.trim().trim_end_matches("!important").trim();
        if name.is_empty() || value.is_empty() {
            continue;
        }
        set_property(&mut decls, &name, value);
    }
    decls
}

const SIDES: [&str; 4] = ["top", "right", "bottom", "left"];

/// Insert a declaration, expanding the shorthands the renderer cares about.
pub fn set_property(decls: &mut Declarations, name: &str, value: &str) {
    let value = value.to_string();
    match name {
        "margin" | "padding" => {
            for (side, v) in SIDES.iter().zip(box_sides(&value)) {
                decls.insert(format!("{}-{}", name, side), v);
            }
        }
        "border-width" | "border-style" | "border-color" => {
            let kind = &name["border-".len()..];
            for (side, v) in SIDES.iter().zip(box_sides(&value)) {
                decls.insert(format!("border-{}-{}", side, kind), v);
            }
        }
        "border" => {
            let (width, style, color) = split_border(&value);
            for side in SIDES {
                apply_border_side(decls, side, &width, &style, &color);
            }
        }
        "border-top" | "border-right" | "border-bottom" | "border-left" => {
            let (width, style, color) = split_border(&value);
            apply_border_side(decls, &name["border-".len()..], &width, &style, &color);
        }
        "outline" => {
            let (width, style, color) = split_border(&value);
            decls.insert("outline-width".into(), width.unwrap_or_else(|| "3px".into()));
            decls.insert("outline-style".into(), style.unwrap_or_else(|| "none".into()));
            if let Some(c) = color {
                decls.insert("outline-color".into(), c);
            }
        }
        "column-rule" => {
            let (width, style, color) = split_border(&value);
            decls.insert("column-rule-width".into(), width.unwrap_or_else(|| "3px".into()));
            decls.insert("column-rule-style".into(), style.unwrap_or_else(|| "none".into()));
            if let Some(c) = color {
                decls.insert("column-rule-color".into(), c);
            }
        }
        "background" => {
            let color = tokens(&value)
                .into_iter()
                .rev()
                .find(|t| looks_like_color(t))
                .map(str::to_string);
            if let Some(c) = color {
                decls.insert("background-color".into(), c);
            }
        }
        "text-decoration" => {
            for t in tokens(&value) {
                if looks_like_color(t) {
                    decls.insert("text-decoration-color".into(), t.to_string());
                } else if matches!(t, "underline" | "overline" | "line-through" | "none") {
                    decls.insert("text-decoration-line".into(), t.to_string());
                }
            }
        }
        _ => {
            decls.insert(name.to_string(), value);
        }
    }
}

fn apply_border_side(
    decls: &mut Declarations,
    side: &str,
    width: &Option<String>,
    style: &Option<String>,
    color: &Option<String>,
) {
    decls.insert(
        format!("border-{}-width", side),
        width.clone().unwrap_or_else(|| "3px".into()),
    );
    decls.insert(
        format!("border-{}-style", side),
        style.clone().unwrap_or_else(|| "none".into()),
    );
    if let Some(c) = color {
        decls.insert(format!("border-{}-color", side), c.clone());
    }
}

/// `1px solid red` -> (width, style, color), in any order.
fn split_border(value: &str) -> (Option<String>, Option<String>, Option<String>) {
    let mut width = None;
    let mut style = None;
    let mut color = None;
    for t in tokens(value) {
        if matches!(
            t,
            "none" | "hidden" | "solid" | "dashed" | "dotted" | "double" | "groove" | "ridge" | "inset" | "outset"
        ) {
            style = Some(t.to_string());
        } else if parse_length(t, 16.0, 0.0).is_some() || matches!(t, "thin" | "medium" | "thick") {
            width = Some(t.to_string());
        } else {
            color = Some(t.to_string());
        }
    }
    (width, style, color)
}

fn looks_like_color(token: &str) -> bool {
    token.starts_with('#')
        || crate::color::is_unsupported_syntax(token)
        || crate::color::parse_color(token).is_some()
}

/// Expand the 1-4 value box shorthand into top/right/bottom/left.
fn box_sides(value: &str) -> [String; 4] {
    let t: Vec<String> = tokens(value).into_iter().map(str::to_string).collect();
    match t.len() {
        0 => Default::default(),
        1 => [t[0].clone(), t[0].clone(), t[0].clone(), t[0].clone()],
        2 => [t[0].clone(), t[1].clone(), t[0].clone(), t[1].clone()],
        3 => [t[0].clone(), t[1].clone(), t[2].clone(), t[1].clone()],
        _ => [t[0].clone(), t[1].clone(), t[2].clone(), t[3].clone()],
    }
}

/// Parse a CSS length into px. `em` resolves against `font_size`, `%`
/// against `percent_base`. `auto`/`normal`/unknown units yield `None`.
pub fn parse_length(value: &str, font_size: f32, percent_base: f32) -> Option<f32> {
    let v = value.trim();
    match v {
        "0" => return Some(0.0),
        "thin" => return Some(1.0),
        "medium" => return Some(3.0),
        "thick" => return Some(5.0),
        _ => {}
    }
    if let Some(n) = v.strip_suffix("px") {
        return n.trim().parse().ok();
    }
    if let Some(n) = v.strip_suffix("rem") {
        return n.trim().parse::<f32>().ok().map(|x| x * 16.0);
    }
    if let Some(n) = v.strip_suffix("em") {
        return n.trim().parse::<f32>().ok().map(|x| x * font_size);
    }
    if let Some(n) = v.strip_suffix("pt") {
        return n.trim().parse::<f32>().ok().map(|x| x * 4.0 / 3.0);
    }
    if let Some(n) = v.strip_suffix('%') {
        return n.trim().parse::<f32>().ok().map(|x| x / 100.0 * percent_base);
    }
    None
}

/// Parse a stylesheet into rules. `@` blocks (media queries, font faces) are
/// skipped; selector groups are split so each rule carries one selector.
pub fn parse_stylesheet(css: &str) -> Vec<StyleRule> {
    let css = strip_comments(css);
    let mut rules = Vec::new();
    let mut depth = 0usize;
    let mut prelude_start = 0usize;
    let mut body_start = 0usize;
    let mut prelude = String::new();
    for (i, c) in css.char_indices() {
        match c {
            '{' => {
                if depth == 0 {
                    prelude = css[prelude_start..i].trim().to_string();
                    body_start = i + 1;
                }
                depth += 1;
            }
            '}' => {
                if depth == 0 {
                    prelude_start = i + 1;
                    continue;
                }
                depth -= 1;
                if depth == 0 {
                    if !prelude.starts_with('@') && !prelude.is_empty() {
                        let declarations = parse_declarations(&css[body_start..i]);
                        for sel in split_top_level(&prelude, ',') {
                            let sel = sel.trim();
                            if !sel.is_empty() {
                                rules.push(StyleRule {
                                    selector: sel.to_string(),
                                    declarations: declarations.clone(),
                                });
                            }
                        }
                    }
                    prelude_start = i + 1;
                }
            }
            ';' if depth == 0 => {
                // statement at-rules like @import
                prelude_start = i + 1;
            }
            _ => {}
        }
    }
    rules
}

fn strip_comments(css: &str) -> String {
    let mut out = String::with_capacity(css.len());
    let mut rest = css;
    while let Some(start) = rest.find("/*") {
        out.push_str(&rest[..start]);
        match rest[start + 2..].find("*/") {
            Some(end) => rest = &rest[start + 2 + end + 2..],
            None => {
                rest = "";
                break;
            }
        }
    }
    out.push_str(rest);
    out
}

/// Approximate selector specificity as (ids, classes/attributes/pseudo, types).
pub fn specificity(selector: &str) -> (u32, u32, u32) {
    let mut ids = 0;
    let mut classes = 0;
    let mut types = 0;
    for compound in selector.split(|c: char| c.is_whitespace() || c == '>' || c == '+' || c == '~') {
        if compound.is_empty() {
            continue;
        }
        let mut chars = compound.chars().peekable();
        let mut at_start = true;
        while let Some(c) = chars.next() {
            match c {
                '#' => ids += 1,
                '.' | '[' => classes += 1,
                ':' => {
                    if chars.peek() == Some(&':') {
                        chars.next();
                        types += 1;
                    } else {
                        classes += 1;
                    }
                }
                c if at_start && c.is_ascii_alphabetic() => types += 1,
                _ => {}
            }
            at_start = false;
        }
    }
    (ids, classes, types)
}

/// User-agent defaults for a tag.
pub fn user_agent_defaults(tag: &str) -> Declarations {
    let css = match tag {
        "head" | "style" | "script" | "link" | "meta" | "title" | "template" => "display: none",
        "body" => "margin: 8px",
        "h1" => "font-size: 32px; font-weight: 700; margin: 21px 0",
        "h2" => "font-size: 24px; font-weight: 700; margin: 20px 0",
        "h3" => "font-size: 19px; font-weight: 700; margin: 18px 0",
        "p" | "blockquote" => "margin: 16px 0",
        "ul" | "ol" => "margin: 16px 0; padding-left: 40px",
        "strong" | "b" => "font-weight: 700",
        "em" | "i" => "font-style: italic",
        "u" => "text-decoration-line: underline",
        _ => "",
    };
    parse_declarations(css)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_box_and_border_shorthands() {
        let d = parse_declarations("margin: 1px 2px; border: 2px solid oklch(0.5 0.1 20); color: red");
        assert_eq!(d["margin-top"], "1px");
        assert_eq!(d["margin-right"], "2px");
        assert_eq!(d["margin-bottom"], "1px");
        assert_eq!(d["margin-left"], "2px");
        assert_eq!(d["border-left-width"], "2px");
        assert_eq!(d["border-top-style"], "solid");
        assert_eq!(d["border-bottom-color"], "oklch(0.5 0.1 20)");
        assert_eq!(d["color"], "red");
    }

    #[test]
    fn background_shorthand_keeps_color() {
        let d = parse_declarations("background: url(x.png) no-repeat lab(50 10 10)");
        assert_eq!(d["background-color"], "lab(50 10 10)");
    }

    #[test]
    fn stylesheet_skips_at_rules_and_splits_groups() {
        let css = "/* c */ @media print { p { color: red } } h1, .a { color: blue } #b{margin:0}";
        let rules = parse_stylesheet(css);
        let sels: Vec<_> = rules.iter().map(|r| r.selector.as_str()).collect();
        assert_eq!(sels, vec!["h1", ".a", "#b"]);
        assert_eq!(rules[0].declarations["color"], "blue");
    }

    #[test]
    fn lengths_resolve_units() {
        assert_eq!(parse_length("12px", 16.0, 0.0), Some(12.0));
        assert_eq!(parse_length("2em", 10.0, 0.0), Some(20.0));
        assert_eq!(parse_length("50%", 16.0, 300.0), Some(150.0));
        assert_eq!(parse_length("auto", 16.0, 0.0), None);
    }

    #[test]
    fn specificity_orders_ids_over_classes() {
        assert!(specificity("#a") > specificity(".a.b"));
        assert!(specificity("div.a") > specificity("div"));
        assert_eq!(specificity("ul > li.x"), (0, 1, 2));
    }
}
