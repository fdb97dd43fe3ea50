//! Display capture backed by headless Chrome
//!
//! Each stream launches a headless browser sized to the viewport, loads the
//! target, and serves PNG screenshots as frames. Stopping the stream drops
//! the browser, which terminates the Chrome process.

use crate::platform::{DeviceMetrics, DisplayCapture, MediaStream};
use crate::{Error, Result};
use base64::Engine as Base64Engine;
use futures::future::{BoxFuture, FutureExt};
use headless_chrome::browser::tab::Tab;
use headless_chrome::protocol::cdp::Page;
use headless_chrome::{Browser, LaunchOptions};
use image::RgbaImage;
use std::sync::Arc;
use std::time::Duration;

/// Wait after navigation for layout and fonts to settle.
const SETTLE_DELAY: Duration = Duration::from_millis(500);

pub struct CdpDisplay {
    target: String,
    metrics: DeviceMetrics,
}

impl CdpDisplay {
    pub fn for_url(url: &str, metrics: DeviceMetrics) -> Self {
        CdpDisplay {
            target: url.to_string(),
            metrics,
        }
    }

    /// Serve an in-memory document through a `data:` URL.
    pub fn for_html(html: &str, metrics: DeviceMetrics) -> Self {
        let b64 = base64::engine::general_purpose::STANDARD.encode(html.as_bytes());
        Self::for_url(&format!("data:text/html;base64,{}", b64), metrics)
    }
}

impl DisplayCapture for CdpDisplay {
    fn request_display_media(&self) -> BoxFuture<'_, Result<Box<dyn MediaStream>>> {
        let target = self.target.clone();
        let metrics = self.metrics;
        async move {
            let stream = tokio::task::spawn_blocking(move || CdpStream::open(&target, metrics))
                .await
                .map_err(|e| Error::CdpError(format!("browser launch task failed: {}", e)))??;
            Ok(Box::new(stream) as Box<dyn MediaStream>)
        }
        .boxed()
    }
}

struct CdpStream {
    browser: Option<Browser>,
    tab: Arc<Tab>,
}

impl CdpStream {
    fn open(target: &str, metrics: DeviceMetrics) -> Result<Self> {
        let launch_options = LaunchOptions::default_builder()
            .headless(true)
            .window_size(Some((metrics.width, metrics.height)))
            .build()
            .map_err(|e| Error::CdpError(format!("Failed to build launch options: {}", e)))?;

        let browser = Browser::new(launch_options)
            .map_err(|e| Error::CapabilityUnavailable(format!("Failed to launch browser: {}", e)))?;
        let tab = browser
            .new_tab()
            .map_err(|e| Error::CdpError(format!("Failed to create tab: {}", e)))?;

        tab.navigate_to(target)
            .map_err(|e| Error::LoadError(format!("Navigation failed: {}", e)))?;
        tab.wait_until_navigated()
            .map_err(|e| Error::LoadError(format!("Wait for navigation failed: {}", e)))?;
        std::thread::sleep(SETTLE_DELAY);

        Ok(CdpStream {
            browser: Some(browser),
            tab,
        })
    }
}

impl MediaStream for CdpStream {
    fn grab_frame(&mut self) -> BoxFuture<'_, Result<RgbaImage>> {
        let result = if self.browser.is_none() {
            Err(Error::RenderError("stream already stopped".into()))
        } else {
            self.tab
                .capture_screenshot(Page::CaptureScreenshotFormatOption::Png, None, None, true)
                .map_err(|e| Error::RenderError(format!("Screenshot failed: {}", e)))
                .and_then(|png| Ok(image::load_from_memory(&png)?.to_rgba8()))
        };
        futures::future::ready(result).boxed()
    }

    fn stop_all_tracks(&mut self) {
        if self.browser.take().is_some() {
            log::debug!("headless browser stream stopped");
        }
    }
}
