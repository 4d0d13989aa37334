//! Page fetcher abstraction for retrieving raw page bodies.

use async_trait::async_trait;

use crate::FetchErrorKind;

/// A response as seen by the crawler, before any content handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawPage {
    /// URL after redirects.
    pub final_url: String,
    /// HTTP status code.
    pub status: u16,
    /// `Content-Type` header, if any.
    pub content_type: Option<String>,
    /// Body bytes, already capped by the fetcher.
    pub body: Vec<u8>,
    /// Whether the body was cut at the size cap.
    pub truncated: bool,
}

impl RawPage {
    /// Body decoded as UTF-8, replacing invalid sequences.
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Trait for retrieving a single URL.
///
/// Implementations perform exactly one outbound request per call and never
/// apply crawl policy; scheme, allow-list and robots checks happen in the
/// [`Crawler`](crate::Crawler) before a fetcher is invoked. Timeouts are also
/// enforced by the caller.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    /// Fetches `url`, reading at most `max_bytes` of body.
    async fn fetch(&self, url: &str, max_bytes: usize) -> Result<RawPage, FetchErrorKind>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_raw_page_body_text() {
        let page = RawPage {
            final_url: "https://example.com".into(),
            status: 200,
            content_type: Some("text/plain".into()),
            body: b"hello".to_vec(),
            truncated: false,
        };
        assert_eq!(page.body_text(), "hello");
    }

    #[test]
    fn test_raw_page_body_text_lossy() {
        let page = RawPage {
            final_url: "https://example.com".into(),
            status: 200,
            content_type: None,
            body: vec![b'o', b'k', 0xff],
            truncated: true,
        };
        assert_eq!(page.body_text(), "ok\u{fffd}");
    }
}
