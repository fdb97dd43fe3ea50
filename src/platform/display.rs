//! Display-capture capability: the screen-sharing permission prompt and the
//! media stream it hands back.

use crate::{Error, Result};
use futures::future::{self, BoxFuture, FutureExt};
use image::RgbaImage;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// A live capture of a screen, window or tab.
pub trait MediaStream: Send {
    /// Grab a single frame from the video track.
    fn grab_frame(&mut self) -> BoxFuture<'_, Result<RgbaImage>>;

    /// Stop every track of the stream, ending the capture session.
    fn stop_all_tracks(&mut self);
}

/// Entry point for display capture. Requesting media shows a permission prompt.
pub trait DisplayCapture: Send + Sync {
    fn request_display_media(&self) -> BoxFuture<'_, Result<Box<dyn MediaStream>>>;
}

/// Owns a stream and stops all of its tracks when dropped.
pub struct StreamGuard {
    stream: Box<dyn MediaStream>,
}

impl StreamGuard {
    pub fn new(stream: Box<dyn MediaStream>) -> Self {
        StreamGuard { stream }
    }

    pub async fn grab_frame(&mut self) -> Result<RgbaImage> {
        self.stream.grab_frame().await
    }
}

impl Drop for StreamGuard {
    fn drop(&mut self) {
        self.stream.stop_all_tracks();
    }
}

/// Serves a fixed frame for every stream. Counts opened and stopped streams.
pub struct StaticDisplay {
    frame: RgbaImage,
    grant: bool,
    broken: bool,
    opened: Arc<AtomicUsize>,
    stopped: Arc<AtomicUsize>,
}

impl StaticDisplay {
    pub fn new(frame: RgbaImage) -> Self {
        StaticDisplay {
            frame,
            grant: true,
            broken: false,
            opened: Arc::new(AtomicUsize::new(0)),
            stopped: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// The user dismisses the permission prompt.
    pub fn denied(frame: RgbaImage) -> Self {
        StaticDisplay { grant: false, ..Self::new(frame) }
    }

    /// Permission is granted but the track never yields a frame.
    pub fn with_broken_stream(frame: RgbaImage) -> Self {
        StaticDisplay { broken: true, ..Self::new(frame) }
    }

    pub fn opened_streams(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn stopped_streams(&self) -> usize {
        self.stopped.load(Ordering::SeqCst)
    }
}

impl DisplayCapture for StaticDisplay {
    fn request_display_media(&self) -> BoxFuture<'_, Result<Box<dyn MediaStream>>> {
        if !self.grant {
            return future::ready(Err(Error::PermissionDenied(
                "display capture was dismissed".into(),
            )))
            .boxed();
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        let stream = StaticStream {
            frame: if self.broken { None } else { Some(self.frame.clone()) },
            stopped: self.stopped.clone(),
            live: true,
        };
        future::ready(Ok(Box::new(stream) as Box<dyn MediaStream>)).boxed()
    }
}

struct StaticStream {
    frame: Option<RgbaImage>,
    stopped: Arc<AtomicUsize>,
    live: bool,
}

impl MediaStream for StaticStream {
    fn grab_frame(&mut self) -> BoxFuture<'_, Result<RgbaImage>> {
        let res = match (&self.frame, self.live) {
            (Some(f), true) => Ok(f.clone()),
            (_, false) => Err(Error::RenderError("stream already stopped".into())),
            (None, true) => Err(Error::RenderError("video track produced no frame".into())),
        };
        future::ready(res).boxed()
    }

    fn stop_all_tracks(&mut self) {
        if self.live {
            self.live = false;
            self.stopped.fetch_add(1, Ordering::SeqCst);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    #[tokio::test]
    async fn guard_stops_tracks_on_drop() {
        let display = StaticDisplay::new(RgbaImage::from_pixel(2, 2, Rgba([9, 9, 9, 255])));
        {
            let stream = display.request_display_media().await.unwrap();
            let mut guard = StreamGuard::new(stream);
            let frame = guard.grab_frame().await.unwrap();
            assert_eq!(frame.dimensions(), (2, 2));
        }
        assert_eq!(display.opened_streams(), 1);
        assert_eq!(display.stopped_streams(), 1);
    }

    #[tokio::test]
    async fn denied_prompt_opens_nothing() {
        let display = StaticDisplay::denied(RgbaImage::new(1, 1));
        let res = display.request_display_media().await;
        assert!(matches!(res, Err(Error::PermissionDenied(_))));
        assert_eq!(display.opened_streams(), 0);
    }
}
