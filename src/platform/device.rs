/// Device metrics for the page being captured

use crate::Viewport;

/// Logical viewport size (CSS px) plus the device pixel ratio at capture time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviceMetrics {
    pub width: u32,
    pub height: u32,
    pub dpr: f32,
}

impl DeviceMetrics {
    pub fn new(width: u32, height: u32, dpr: f32) -> Self {
        Self { width, height, dpr }
    }

    pub fn viewport(&self) -> Viewport {
        Viewport {
            width: self.width,
            height: self.height,
        }
    }

    /// Physical pixel size of a CSS length at this density.
    pub fn to_physical(&self, css_px: f32) -> u32 {
        (css_px * self.dpr).round().max(0.0) as u32
    }
}

impl Default for DeviceMetrics {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            dpr: 1.0,
        }
    }
}
