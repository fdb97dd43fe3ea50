//! CSS color parsing and color space conversion.
//!
//! Two parsers share one grammar: [`parse_color`] understands every syntax the
//! document model accepts (including `oklch()`, `oklab()`, `lab()`, `lch()` and
//! `color()`), while [`parse_legacy_color`] mimics a rasterizer that only knows
//! sRGB channel syntax and rejects the perceptual functions outright.

use std::fmt;

/// Functions a legacy rasterizer cannot interpret.
const UNSUPPORTED_FUNCTIONS: &[&str] = &["oklch(", "oklab(", "lab(", "lch(", "color("];

/// An sRGB color with straight (non-premultiplied) alpha, channels in 0..=1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const TRANSPARENT: Color = Color { r: 0.0, g: 0.0, b: 0.0, a: 0.0 };
    pub const BLACK: Color = Color { r: 0.0, g: 0.0, b: 0.0, a: 1.0 };
    pub const WHITE: Color = Color { r: 1.0, g: 1.0, b: 1.0, a: 1.0 };

    pub fn from_rgba8(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self {
            r: r as f32 / 255.0,
            g: g as f32 / 255.0,
            b: b as f32 / 255.0,
            a: a as f32 / 255.0,
        }
    }

    pub fn to_rgba8(self) -> [u8; 4] {
        [to_byte(self.r), to_byte(self.g), to_byte(self.b), to_byte(self.a)]
    }

    pub fn is_transparent(&self) -> bool {
        self.a <= 0.0
    }

    /// Multiply alpha, used for `opacity`.
    pub fn with_alpha_factor(self, factor: f32) -> Self {
        Self { a: (self.a * factor).clamp(0.0, 1.0), ..self }
    }

    fn clamped(self) -> Self {
        Self {
            r: self.r.clamp(0.0, 1.0),
            g: self.g.clamp(0.0, 1.0),
            b: self.b.clamp(0.0, 1.0),
            a: self.a.clamp(0.0, 1.0),
        }
    }
}

/// Serializes the way a browser reports a computed color: `rgb(r, g, b)` when
/// opaque, `rgba(r, g, b, a)` otherwise.
impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b, _] = self.to_rgba8();
        if self.a >= 1.0 {
            write!(f, "rgb({}, {}, {})", r, g, b)
        } else {
            let alpha = (self.a.clamp(0.0, 1.0) * 1000.0).round() / 1000.0;
            write!(f, "rgba({}, {}, {}, {})", r, g, b, alpha)
        }
    }
}

fn to_byte(c: f32) -> u8 {
    (c.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Whether `value` uses a perceptual / device-independent color function.
pub fn is_unsupported_syntax(value: &str) -> bool {
    let v = value.to_ascii_lowercase();
    UNSUPPORTED_FUNCTIONS.iter().any(|f| contains_function(&v, f))
}

// `lab(` must not match inside `oklab(`; same for `lch(` / `oklch(`.
fn contains_function(haystack: &str, func: &str) -> bool {
    let mut start = 0;
    while let Some(pos) = haystack[start..].find(func) {
        let abs = start + pos;
        let prev = haystack[..abs].chars().next_back();
        if !matches!(prev, Some(c) if c.is_ascii_alphanumeric() || c == '-') {
            return true;
        }
        start = abs + func.len();
    }
    false
}

/// Parse any supported CSS color. `currentcolor` and unknown keywords yield `None`.
pub fn parse_color(value: &str) -> Option<Color> {
    let v = value.trim().to_ascii_lowercase();
    if v.is_empty() {
        return None;
    }
    if let Some(hex) = v.strip_prefix('#') {
        return parse_hex(hex);
    }
    if let Some(open) = v.find('(') {
        if !v.ends_with(')') {
            return None;
        }
        let name = v[..open].trim();
        let args = &v[open + 1..v.len() - 1];
        return parse_function(name, args).map(Color::clamped);
    }
    named_color(&v)
}

/// Parse only the syntaxes a legacy rasterizer understands.
pub fn parse_legacy_color(value: &str) -> Option<Color> {
    if is_unsupported_syntax(value) {
        return None;
    }
    parse_color(value)
}

/// Resolve any color to its always-supported `rgb()`/`rgba()` form.
pub fn resolve_to_srgb(value: &str) -> Option<String> {
    parse_color(value).map(|c| c.to_string())
}

fn parse_hex(hex: &str) -> Option<Color> {
    if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    let nibble = |i: usize| u8::from_str_radix(&hex[i..i + 1], 16).ok().map(|n| n * 17);
    let byte = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    match hex.len() {
        3 => Some(Color::from_rgba8(nibble(0)?, nibble(1)?, nibble(2)?, 255)),
        4 => Some(Color::from_rgba8(nibble(0)?, nibble(1)?, nibble(2)?, nibble(3)?)),
        6 => Some(Color::from_rgba8(byte(0)?, byte(2)?, byte(4)?, 255)),
        8 => Some(Color::from_rgba8(byte(0)?, byte(2)?, byte(4)?, byte(6)?)),
        _ => None,
    }
}

/// Split `a b c / d` or `a, b, c, d` into channel tokens and an optional alpha token.
fn split_args(args: &str) -> (Vec<&str>, Option<&str>) {
    let (channels, alpha) = match args.split_once('/') {
        Some((c, a)) => (c, Some(a.trim())),
        None => (args, None),
    };
    let mut parts: Vec<&str> = channels
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|s| !s.is_empty())
        .collect();
    // legacy comma syntax carries alpha as a fourth component
    if alpha.is_none() && args.contains(',') && parts.len() == 4 {
        let a = parts.pop();
        return (parts, a);
    }
    (parts, alpha)
}

/// A number, a percentage scaled against `percent_ref`, or `none` (0).
fn number(token: &str, percent_ref: f32) -> Option<f32> {
    if token == "none" {
        return Some(0.0);
    }
    if let Some(p) = token.strip_suffix('%') {
        return p.trim().parse::<f32>().ok().map(|v| v / 100.0 * percent_ref);
    }
    token.parse::<f32>().ok()
}

fn hue(token: &str) -> Option<f32> {
    if token == "none" {
        return Some(0.0);
    }
    if let Some(v) = token.strip_suffix("deg") {
        return v.parse().ok();
    }
    if let Some(v) = token.strip_suffix("grad") {
        return v.parse::<f32>().ok().map(|g| g * 0.9);
    }
    if let Some(v) = token.strip_suffix("rad") {
        return v.parse::<f32>().ok().map(f32::to_degrees);
    }
    if let Some(v) = token.strip_suffix("turn") {
        return v.parse::<f32>().ok().map(|t| t * 360.0);
    }
    token.parse().ok()
}

fn alpha(token: Option<&str>) -> Option<f32> {
    match token {
        None => Some(1.0),
        Some(t) => number(t, 1.0).map(|a| a.clamp(0.0, 1.0)),
    }
}

fn parse_function(name: &str, args: &str) -> Option<Color> {
    let (parts, alpha_token) = split_args(args);
    let a = alpha(alpha_token)?;
    match name {
        "rgb" | "rgba" => {
            if parts.len() != 3 {
                return None;
            }
            let ch = |t: &str| number(t, 255.0).map(|v| v / 255.0);
            Some(Color { r: ch(parts[0])?, g: ch(parts[1])?, b: ch(parts[2])?, a })
        }
        "hsl" | "hsla" => {
            if parts.len() != 3 {
                return None;
            }
            let h = hue(parts[0])?;
            let s = number(parts[1], 1.0)?;
            let l = number(parts[2], 1.0)?;
            let (r, g, b) = hsl_to_rgb(h, s, l);
            Some(Color { r, g, b, a })
        }
        "oklab" => {
            if parts.len() != 3 {
                return None;
            }
            let l = number(parts[0], 1.0)?;
            let ca = number(parts[1], 0.4)?;
            let cb = number(parts[2], 0.4)?;
            Some(from_linear(oklab_to_linear_srgb(l, ca, cb), a))
        }
        "oklch" => {
            if parts.len() != 3 {
                return None;
            }
            let l = number(parts[0], 1.0)?;
            let c = number(parts[1], 0.4)?;
            let h = hue(parts[2])?.to_radians();
            Some(from_linear(oklab_to_linear_srgb(l, c * h.cos(), c * h.sin()), a))
        }
        "lab" => {
            if parts.len() != 3 {
                return None;
            }
            let l = number(parts[0], 100.0)?;
            let ca = number(parts[1], 125.0)?;
            let cb = number(parts[2], 125.0)?;
            Some(from_linear(lab_to_linear_srgb(l, ca, cb), a))
        }
        "lch" => {
            if parts.len() != 3 {
                return None;
            }
            let l = number(parts[0], 100.0)?;
            let c = number(parts[1], 150.0)?;
            let h = hue(parts[2])?.to_radians();
            Some(from_linear(lab_to_linear_srgb(l, c * h.cos(), c * h.sin()), a))
        }
        "color" => {
            let (space, rest) = parts.split_first()?;
            if rest.len() != 3 {
                return None;
            }
            let c0 = number(rest[0], 1.0)?;
            let c1 = number(rest[1], 1.0)?;
            let c2 = number(rest[2], 1.0)?;
            match *space {
                "srgb" => Some(Color { r: c0, g: c1, b: c2, a }),
                "srgb-linear" => Some(from_linear([c0, c1, c2], a)),
                "display-p3" => {
                    let lin = [srgb_decode(c0), srgb_decode(c1), srgb_decode(c2)];
                    let xyz = mul3(&P3_TO_XYZ_D65, lin);
                    Some(from_linear(mul3(&XYZ_D65_TO_LINEAR_SRGB, xyz), a))
                }
                _ => None,
            }
        }
        _ => None,
    }
}

fn hsl_to_rgb(h: f32, s: f32, l: f32) -> (f32, f32, f32) {
    let h = h.rem_euclid(360.0);
    let s = s.clamp(0.0, 1.0);
    let l = l.clamp(0.0, 1.0);
    let f = |n: f32| {
        let k = (n + h / 30.0) % 12.0;
        let a = s * l.min(1.0 - l);
        l - a * (k - 3.0).min(9.0 - k).clamp(-1.0, 1.0)
    };
    (f(0.0), f(8.0), f(4.0))
}

type Mat3 = [[f64; 3]; 3];

const XYZ_D65_TO_LINEAR_SRGB: Mat3 = [
    [3.2409699419045226, -1.537383177570094, -0.4986107602930034],
    [-0.9692436362808796, 1.8759675015077202, 0.04155505740717559],
    [0.05563007969699366, -0.20397695888897652, 1.0569715142428786],
];

const BRADFORD_D50_TO_D65: Mat3 = [
    [0.9554734527042182, -0.023098536874261423, 0.0632593086610217],
    [-0.028369706963208136, 1.0099954580058226, 0.021041398966943008],
    [0.012314001688319899, -0.020507696433477912, 1.3303659366080753],
];

const P3_TO_XYZ_D65: Mat3 = [
    [0.4865709486482162, 0.26566769316909306, 0.1982172852343625],
    [0.2289745640697488, 0.6917385218365064, 0.079286914093745],
    [0.0, 0.04511338185890264, 1.043944368900976],
];

const D50_WHITE: [f64; 3] = [0.3457 / 0.3585, 1.0, (1.0 - 0.3457 - 0.3585) / 0.3585];

fn mul3(m: &Mat3, v: [f32; 3]) -> [f32; 3] {
    let v = [v[0] as f64, v[1] as f64, v[2] as f64];
    let row = |r: &[f64; 3]| (r[0] * v[0] + r[1] * v[1] + r[2] * v[2]) as f32;
    [row(&m[0]), row(&m[1]), row(&m[2])]
}

fn oklab_to_linear_srgb(l: f32, a: f32, b: f32) -> [f32; 3] {
    let l_ = l + 0.396_337_78 * a + 0.215_803_76 * b;
    let m_ = l - 0.105_561_346 * a - 0.063_854_17 * b;
    let s_ = l - 0.089_484_18 * a - 1.291_485_5 * b;
    let (l3, m3, s3) = (l_.powi(3), m_.powi(3), s_.powi(3));
    [
        4.076_741_7 * l3 - 3.307_711_6 * m3 + 0.230_969_94 * s3,
        -1.268_438 * l3 + 2.609_757_4 * m3 - 0.341_319_38 * s3,
        -0.004_196_086_3 * l3 - 0.703_418_6 * m3 + 1.707_614_7 * s3,
    ]
}

fn lab_to_linear_srgb(l: f32, a: f32, b: f32) -> [f32; 3] {
    const EPSILON: f32 = 216.0 / 24389.0;
    const KAPPA: f32 = 24389.0 / 27.0;
    let fy = (l + 16.0) / 116.0;
    let fx = fy + a / 500.0;
    let fz = fy - b / 200.0;
    let x = if fx.powi(3) > EPSILON { fx.powi(3) } else { (116.0 * fx - 16.0) / KAPPA };
    let y = if l > KAPPA * EPSILON { fy.powi(3) } else { l / KAPPA };
    let z = if fz.powi(3) > EPSILON { fz.powi(3) } else { (116.0 * fz - 16.0) / KAPPA };
    let xyz_d50 = [
        x * D50_WHITE[0] as f32,
        y * D50_WHITE[1] as f32,
        z * D50_WHITE[2] as f32,
    ];
    let xyz_d65 = mul3(&BRADFORD_D50_TO_D65, xyz_d50);
    mul3(&XYZ_D65_TO_LINEAR_SRGB, xyz_d65)
}

fn srgb_encode(c: f32) -> f32 {
    let sign = c.signum();
    let c = c.abs();
    let v = if c <= 0.003_130_8 { 12.92 * c } else { 1.055 * c.powf(1.0 / 2.4) - 0.055 };
    sign * v
}

fn srgb_decode(c: f32) -> f32 {
    let sign = c.signum();
    let c = c.abs();
    let v = if c <= 0.040_45 { c / 12.92 } else { ((c + 0.055) / 1.055).powf(2.4) };
    sign * v
}

fn from_linear(rgb: [f32; 3], a: f32) -> Color {
    Color {
        r: srgb_encode(rgb[0]),
        g: srgb_encode(rgb[1]),
        b: srgb_encode(rgb[2]),
        a,
    }
    .clamped()
}

fn named_color(name: &str) -> Option<Color> {
    let rgb: (u8, u8, u8) = match name {
        "transparent" => return Some(Color::TRANSPARENT),
        "black" => (0, 0, 0),
        "white" => (255, 255, 255),
        "red" => (255, 0, 0),
        "green" => (0, 128, 0),
        "lime" => (0, 255, 0),
        "blue" => (0, 0, 255),
        "yellow" => (255, 255, 0),
        "cyan" | "aqua" => (0, 255, 255),
        "magenta" | "fuchsia" => (255, 0, 255),
        "gray" | "grey" => (128, 128, 128),
        "silver" => (192, 192, 192),
        "maroon" => (128, 0, 0),
        "olive" => (128, 128, 0),
        "navy" => (0, 0, 128),
        "purple" => (128, 0, 128),
        "teal" => (0, 128, 128),
        "orange" => (255, 165, 0),
        "pink" => (255, 192, 203),
        "brown" => (165, 42, 42),
        "gold" => (255, 215, 0),
        "indigo" => (75, 0, 130),
        "violet" => (238, 130, 238),
        "coral" => (255, 127, 80),
        "salmon" => (250, 128, 114),
        "tomato" => (255, 99, 71),
        "crimson" => (220, 20, 60),
        "orchid" => (218, 112, 214),
        "plum" => (221, 160, 221),
        "khaki" => (240, 230, 140),
        "beige" => (245, 245, 220),
        "ivory" => (255, 255, 240),
        "lavender" => (230, 230, 250),
        "tan" => (210, 180, 140),
        "chocolate" => (210, 105, 30),
        "firebrick" => (178, 34, 34),
        "darkred" => (139, 0, 0),
        "darkgreen" => (0, 100, 0),
        "darkblue" => (0, 0, 139),
        "darkgray" | "darkgrey" => (169, 169, 169),
        "lightgray" | "lightgrey" => (211, 211, 211),
        "gainsboro" => (220, 220, 220),
        "whitesmoke" => (245, 245, 245),
        "dimgray" | "dimgrey" => (105, 105, 105),
        "slategray" | "slategrey" => (112, 128, 144),
        "steelblue" => (70, 130, 180),
        "royalblue" => (65, 105, 225),
        "dodgerblue" => (30, 144, 255),
        "skyblue" => (135, 206, 235),
        "lightblue" => (173, 216, 230),
        "seagreen" => (46, 139, 87),
        "forestgreen" => (34, 139, 34),
        "limegreen" => (50, 205, 50),
        "turquoise" => (64, 224, 208),
        "rebeccapurple" => (102, 51, 153),
        _ => return None,
    };
    Some(Color::from_rgba8(rgb.0, rgb.1, rgb.2, 255))
}
