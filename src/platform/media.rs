/// Video decoding hooks used for still-frame snapshots

use crate::{Error, Result};
use futures::future::{self, BoxFuture, FutureExt};
use image::{Rgba, RgbaImage};
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaState {
    Playing,
    Paused,
    Ended,
}

/// A decoder bound to a `<video>` element.
pub trait VideoFrameSource: Send + Sync {
    /// Intrinsic pixel size of the decoded stream; `(0, 0)` before metadata loads.
    fn intrinsic_size(&self) -> (u32, u32);

    fn state(&self) -> MediaState;

    /// Whether the source can signal frame readiness. When it can't, callers
    /// fall back to a fixed delay.
    fn supports_frame_callback(&self) -> bool {
        true
    }

    /// Resolves once the next frame is decoded. Paused sources may never resolve.
    fn next_frame(&self) -> BoxFuture<'_, ()>;

    /// Read the currently decoded frame. Fails with `Error::Tainted` for
    /// cross-origin content without permissive headers.
    fn read_frame(&self) -> Result<RgbaImage>;
}

/// A source that always shows the same frame.
pub struct StillVideo {
    frame: RgbaImage,
    state: Mutex<MediaState>,
    frame_callback: bool,
}

impl StillVideo {
    pub fn new(frame: RgbaImage) -> Self {
        StillVideo {
            frame,
            state: Mutex::new(MediaState::Playing),
            frame_callback: true,
        }
    }

    pub fn solid(width: u32, height: u32, rgba: [u8; 4]) -> Self {
        Self::new(RgbaImage::from_pixel(width, height, Rgba(rgba)))
    }

    /// Model a browser without frame-ready callbacks.
    pub fn without_frame_callback(mut self) -> Self {
        self.frame_callback = false;
        self
    }

    pub fn play(&self) {
        if let Ok(mut s) = self.state.lock() {
            *s = MediaState::Playing;
        }
    }

    pub fn pause(&self) {
        if let Ok(mut s) = self.state.lock() {
            *s = MediaState::Paused;
        }
    }
}

impl VideoFrameSource for StillVideo {
    fn intrinsic_size(&self) -> (u32, u32) {
        self.frame.dimensions()
    }

    fn state(&self) -> MediaState {
        self.state.lock().map(|s| *s).unwrap_or(MediaState::Paused)
    }

    fn supports_frame_callback(&self) -> bool {
        self.frame_callback
    }

    fn next_frame(&self) -> BoxFuture<'_, ()> {
        match self.state() {
            MediaState::Playing => future::ready(()).boxed(),
            _ => future::pending().boxed(),
        }
    }

    fn read_frame(&self) -> Result<RgbaImage> {
        Ok(self.frame.clone())
    }
}

/// A cross-origin source: it decodes and has a size, but pixel reads fail.
pub struct TaintedVideo {
    width: u32,
    height: u32,
}

impl TaintedVideo {
    pub fn new(width: u32, height: u32) -> Self {
        TaintedVideo { width, height }
    }
}

impl VideoFrameSource for TaintedVideo {
    fn intrinsic_size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    fn state(&self) -> MediaState {
        MediaState::Playing
    }

    fn next_frame(&self) -> BoxFuture<'_, ()> {
        future::ready(()).boxed()
    }

    fn read_frame(&self) -> Result<RgbaImage> {
        Err(Error::Tainted(
            "the video element has been tainted by cross-origin data".into(),
        ))
    }
}

/// Build a source from markup hints: `data-still="<color>"` yields a
/// [`StillVideo`] sized from `width`/`height`, `data-tainted` a [`TaintedVideo`].
pub fn source_from_attributes(
    attr: impl Fn(&str) -> Option<String>,
) -> Option<Arc<dyn VideoFrameSource>> {
    let dim = |name: &str, default: u32| {
        attr(name)
            .and_then(|v| v.trim_end_matches("px").trim().parse::<u32>().ok())
            .unwrap_or(default)
    };
    let (w, h) = (dim("width", 320), dim("height", 180));
    if attr("data-tainted").is_some() {
        return Some(Arc::new(TaintedVideo::new(w, h)));
    }
    let still = attr("data-still")?;
    let color = crate::color::parse_color(&still)?;
    let video = StillVideo::solid(w, h, color.to_rgba8());
    if attr("data-paused").is_some() {
        video.pause();
    }
    Some(Arc::new(video))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn still_video_transitions_state() {
        let v = StillVideo::solid(4, 2, [1, 2, 3, 255]);
        assert_eq!(v.state(), MediaState::Playing);
        v.pause();
        assert_eq!(v.state(), MediaState::Paused);
        v.play();
        assert_eq!(v.state(), MediaState::Playing);
        assert_eq!(v.intrinsic_size(), (4, 2));
    }

    #[test]
    fn tainted_video_refuses_pixel_reads() {
        let v = TaintedVideo::new(10, 10);
        assert!(matches!(v.read_frame(), Err(Error::Tainted(_))));
    }

    #[test]
    fn markup_hints_select_a_source() {
        let attrs = |name: &str| match name {
            "data-still" => Some("#00ff00".to_string()),
            "width" => Some("8".to_string()),
            _ => None,
        };
        let src = source_from_attributes(attrs).expect("source");
        assert_eq!(src.intrinsic_size(), (8, 180));
        let px = src.read_frame().unwrap();
        assert_eq!(px.get_pixel(0, 0).0, [0, 255, 0, 255]);

        assert!(source_from_attributes(|_| None).is_none());
    }
}
