//! Document loading from files and (feature `fetch`) HTTP.

use crate::dom::Document;
use crate::platform::DeviceMetrics;
use crate::{Error, Result};
use std::path::Path;

/// User agent sent with document and stylesheet requests.
pub const USER_AGENT: &str = concat!("annocap/", env!("CARGO_PKG_VERSION"));

/// Parse an HTML file from disk.
pub fn load_file(path: impl AsRef<Path>, metrics: DeviceMetrics) -> Result<Document> {
    let path = path.as_ref();
    let html = std::fs::read_to_string(path)
        .map_err(|e| Error::LoadError(format!("Failed to read {}: {}", path.display(), e)))?;
    Ok(Document::parse_html(&html, metrics))
}

#[cfg(feature = "fetch")]
pub use fetch::{fetch_document, linked_stylesheets};

#[cfg(feature = "fetch")]
mod fetch {
    use super::USER_AGENT;
    use crate::dom::Document;
    use crate::platform::DeviceMetrics;
    use crate::{Error, Result};
    use reqwest::blocking::Client;
    use scraper::{Html, Selector};
    use std::time::Duration;

    /// GET `url`, then fetch its `<link rel="stylesheet">` targets and
    /// cascade them after the page's own `<style>` sheets. Stylesheets that
    /// fail to load are skipped.
    pub fn fetch_document(url: &str, timeout_ms: u64, metrics: DeviceMetrics) -> Result<Document> {
        let client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| Error::LoadError(format!("Failed to build HTTP client: {}", e)))?;

        let resp = client
            .get(url)
            .send()
            .and_then(|r| r.error_for_status())
            .map_err(|e| Error::LoadError(format!("Failed to fetch {}: {}", url, e)))?;
        let body = resp
            .text()
            .map_err(|e| Error::LoadError(format!("Failed to read response body: {}", e)))?;

        let mut sheets = Vec::new();
        for css_url in linked_stylesheets(&body, url) {
            match client.get(&css_url).send().and_then(|r| r.error_for_status()).and_then(|r| r.text()) {
                Ok(text) if !text.trim().is_empty() => sheets.push(text),
                Ok(_) => {}
                Err(e) => log::warn!("skipping stylesheet {}: {}", css_url, e),
            }
        }
        log::debug!("loaded {} with {} linked stylesheets", url, sheets.len());
        Ok(Document::parse_html_with_styles(&body, &sheets, metrics))
    }

    /// Absolute URLs of the page's linked stylesheets, in document order.
    pub fn linked_stylesheets(html: &str, base_url: &str) -> Vec<String> {
        let document = Html::parse_document(html);
        let Ok(link_sel) = Selector::parse("link[rel=\"stylesheet\"]") else {
            return Vec::new();
        };
        let base = url::Url::parse(base_url).ok();
        document
            .select(&link_sel)
            .filter_map(|node| node.value().attr("href"))
            .map(|href| match &base {
                Some(b) => b.join(href).map(|u| u.to_string()).unwrap_or_else(|_| href.to_string()),
                None => href.to_string(),
            })
            .collect()
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn hrefs_resolve_against_the_page() {
            let html = r#"<html><head>
                <link rel="stylesheet" href="css/a.css">
                <link rel="icon" href="favicon.ico">
                <link rel="stylesheet" href="https://cdn.example/b.css">
                </head></html>"#;
            let urls = linked_stylesheets(html, "http://host/docs/page.html");
            assert_eq!(urls, vec!["http://host/docs/css/a.css", "https://cdn.example/b.css"]);
        }
    }
}
