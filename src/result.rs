//! Search result, fetch outcome, and summary types.

use std::fmt;

use serde::ser::Serializer;
use serde::{Deserialize, Serialize};
use url::Url;

/// Number of characters of page text included in a summary preview.
pub const TEXT_PREVIEW_CHARS: usize = 8_000;

/// Query parameters that only track clicks and never change the target page.
const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "msclkid", "ref_src"];

/// A single candidate returned by a search provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    /// Result title.
    pub title: String,
    /// Absolute http(s) URL.
    pub url: String,
    /// Result description/snippet.
    pub snippet: String,
}

impl SearchResult {
    /// Creates a new search result.
    pub fn new(
        title: impl Into<String>,
        url: impl Into<String>,
        snippet: impl Into<String>,
    ) -> Self {
        Self {
            title: title.into(),
            url: url.into(),
            snippet: snippet.into(),
        }
    }

    /// Returns the normalized URL used for deduplication, or `None` when the
    /// URL is not an absolute http(s) URL.
    pub fn normalized_url(&self) -> Option<String> {
        normalize_url(&self.url)
    }
}

/// Normalizes an absolute http(s) URL for duplicate detection.
///
/// Scheme and host are lowercased, a leading `www.`, the default port, the
/// fragment, tracking parameters and a trailing slash are dropped. Path case
/// is preserved.
pub fn normalize_url(raw: &str) -> Option<String> {
    let parsed = Url::parse(raw.trim()).ok()?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return None;
    }
    let host = parsed.host_str()?.to_lowercase();
    let host = host.strip_prefix("www.").unwrap_or(&host);

    let mut normalized = format!("{}://{host}", parsed.scheme());
    if let Some(port) = parsed.port() {
        normalized.push(':');
        normalized.push_str(&port.to_string());
    }
    normalized.push_str(parsed.path().trim_end_matches('/'));

    let kept: Vec<String> = parsed
        .query_pairs()
        .filter(|(k, _)| !k.starts_with("utm_") && !TRACKING_PARAMS.contains(&k.as_ref()))
        .map(|(k, v)| format!("{k}={v}"))
        .collect();
    if !kept.is_empty() {
        normalized.push('?');
        normalized.push_str(&kept.join("&"));
    }
    Some(normalized)
}

/// Collapses duplicate URLs, keeping the first (highest ranked) occurrence.
/// Candidates without an absolute http(s) URL are dropped.
pub fn dedup_results(results: Vec<SearchResult>) -> Vec<SearchResult> {
    let mut seen = std::collections::HashSet::new();
    results
        .into_iter()
        .filter(|result| match result.normalized_url() {
            Some(key) => seen.insert(key),
            None => false,
        })
        .collect()
}

/// Why a page fetch did not produce content.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FetchErrorKind {
    /// Connection, DNS, TLS or body read failure.
    Network,
    /// The fetch or the caller's deadline elapsed.
    Timeout,
    /// Refused by policy (allow-list or robots.txt) before any request.
    Blocked,
    /// The server answered with a 4xx/5xx status.
    HttpError,
    /// Unparsable URL or a scheme other than http/https.
    InvalidUrl,
    /// The body is not text and nothing could be extracted.
    UnsupportedContent,
}

impl fmt::Display for FetchErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Result of fetching one URL: either content or an error, never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchOutcome {
    url: String,
    status_code: Option<u16>,
    content_type: Option<String>,
    text: Option<String>,
    html: Option<String>,
    error: Option<FetchErrorKind>,
}

impl FetchOutcome {
    /// A successful fetch. Returns a `UnsupportedContent` failure when neither
    /// markup nor text is present.
    pub fn page(
        url: impl Into<String>,
        status_code: u16,
        content_type: Option<String>,
        html: Option<String>,
        text: Option<String>,
    ) -> Self {
        let url = url.into();
        if html.is_none() && text.is_none() {
            return Self {
                url,
                status_code: Some(status_code),
                content_type,
                text: None,
                html: None,
                error: Some(FetchErrorKind::UnsupportedContent),
            };
        }
        Self {
            url,
            status_code: Some(status_code),
            content_type,
            text,
            html,
            error: None,
        }
    }

    /// A failed fetch with no response.
    pub fn failed(url: impl Into<String>, kind: FetchErrorKind) -> Self {
        Self {
            url: url.into(),
            status_code: None,
            content_type: None,
            text: None,
            html: None,
            error: Some(kind),
        }
    }

    /// A failed fetch that still received a status line (e.g. HTTP 404).
    pub fn failed_with_status(
        url: impl Into<String>,
        kind: FetchErrorKind,
        status_code: u16,
        content_type: Option<String>,
    ) -> Self {
        Self {
            status_code: Some(status_code),
            content_type,
            ..Self::failed(url, kind)
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn status_code(&self) -> Option<u16> {
        self.status_code
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    pub fn text(&self) -> Option<&str> {
        self.text.as_deref()
    }

    pub fn html(&self) -> Option<&str> {
        self.html.as_deref()
    }

    pub fn error(&self) -> Option<FetchErrorKind> {
        self.error
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }

    /// Caps `text` and `html` at `max_chars` characters each.
    pub fn truncated(mut self, max_chars: usize) -> Self {
        if let Some(text) = self.text.as_mut() {
            let end = truncate_chars(text, max_chars).len();
            text.truncate(end);
        }
        if let Some(html) = self.html.as_mut() {
            let end = truncate_chars(html, max_chars).len();
            html.truncate(end);
        }
        self
    }
}

/// The structured answer to a query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuerySummary {
    /// Extractive overview built from the best snippets.
    pub overview: String,
    /// Most salient snippets and page sentences.
    pub highlights: Vec<String>,
    /// Deduplicated, re-scored citations.
    pub sources: Vec<SearchResult>,
    /// Fetch outcomes for the top sources, in `sources` order.
    #[serde(serialize_with = "serialize_previews")]
    pub fetched_pages: Vec<FetchOutcome>,
    /// Whether the summary was served from the result cache.
    #[serde(skip)]
    pub from_cache: bool,
}

#[derive(Serialize)]
struct PagePreview<'a> {
    url: &'a str,
    status_code: Option<u16>,
    content_type: Option<&'a str>,
    text_preview: &'a str,
    error: Option<FetchErrorKind>,
}

fn serialize_previews<S>(pages: &[FetchOutcome], serializer: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.collect_seq(pages.iter().map(|page| PagePreview {
        url: page.url(),
        status_code: page.status_code(),
        content_type: page.content_type(),
        text_preview: truncate_chars(page.text().unwrap_or_default(), TEXT_PREVIEW_CHARS),
        error: page.error(),
    }))
}

/// Returns the longest prefix of `s` holding at most `max_chars` characters.
pub(crate) fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
