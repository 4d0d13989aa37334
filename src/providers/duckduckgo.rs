//! DuckDuckGo HTML results page provider.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use scraper::{ElementRef, Html, Selector};
use tracing::debug;
use url::Url;

use crate::{dedup_results, ProviderConfig, ProviderError, Query, SearchProvider, SearchResult};

/// Default HTML endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://html.duckduckgo.com/html/";

/// Default region/language parameter (`kl`).
pub const DEFAULT_LANGUAGE: &str = "us-en";

/// DuckDuckGo search provider scraping the no-JavaScript results page.
pub struct DuckDuckGo {
    config: ProviderConfig,
    client: Client,
    endpoint: String,
    language: String,
}

impl DuckDuckGo {
    /// Creates a provider that issues requests with `client`.
    pub fn new(client: Client) -> Self {
        Self {
            config: ProviderConfig {
                name: "DuckDuckGo".to_string(),
                shortcut: "ddg".to_string(),
                timeout: 15,
            },
            client,
            endpoint: DEFAULT_ENDPOINT.to_string(),
            language: DEFAULT_LANGUAGE.to_string(),
        }
    }

    /// Creates with custom configuration.
    pub fn with_config(mut self, config: ProviderConfig) -> Self {
        self.config = config;
        self
    }

    /// Points the provider at another results endpoint.
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// Sets the language used when the query carries none.
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = language.into();
        self
    }

    fn request_url(&self, query: &Query) -> String {
        let language = query.language().unwrap_or(&self.language);
        format!(
            "{}?q={}&kl={}",
            self.endpoint,
            urlencoding::encode(query.text()),
            urlencoding::encode(language)
        )
    }
}

#[async_trait]
impl SearchProvider for DuckDuckGo {
    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    async fn search(&self, query: &Query) -> Result<Vec<SearchResult>, ProviderError> {
        let url = self.request_url(query);
        debug!(provider = self.name(), "requesting {}", url);

        let response = self
            .client
            .get(&url)
            .timeout(Duration::from_secs(self.config.timeout))
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::blocked(format!(
                "provider refused the request with status {}",
                status.as_u16()
            )));
        }
        if !status.is_success() {
            return Err(ProviderError::network(format!(
                "unexpected status {}",
                status.as_u16()
            )));
        }

        let html = response.text().await?;
        let mut results = dedup_results(parse_results(&html)?);
        results.truncate(query.max_results());
        Ok(results)
    }
}

fn selector(css: &str) -> Result<Selector, ProviderError> {
    Selector::parse(css)
        .map_err(|e| ProviderError::parse(format!("Failed to parse selector: {:?}", e)))
}

/// Parses a results page into candidates in page order.
///
/// An empty result list is only accepted when the page shows the provider's
/// "no results" marker or an (empty) results container; any other page is a
/// layout the parser does not understand.
fn parse_results(html: &str) -> Result<Vec<SearchResult>, ProviderError> {
    let document = Html::parse_document(html);

    let challenge_selector = selector("#challenge-form, .anomaly-modal__title, .anomaly-modal")?;
    if document.select(&challenge_selector).next().is_some() {
        return Err(ProviderError::blocked("provider served a bot challenge"));
    }

    let result_selector = selector("div.result")?;
    let link_selector = selector("a.result__a")?;
    let snippet_selector = selector(".result__snippet")?;

    let mut results = Vec::new();
    let mut blocks = 0usize;
    let mut blocks_with_links = 0usize;

    for element in document.select(&result_selector) {
        blocks += 1;
        if is_ad(&element) {
            continue;
        }
        let Some(link) = element.select(&link_selector).next() else {
            continue;
        };
        blocks_with_links += 1;

        let title = collapse_whitespace(&link.text().collect::<Vec<_>>().join(" "));
        let href = link.value().attr("href").unwrap_or_default();
        let Some(url) = resolve_result_url(href) else {
            continue;
        };
        let snippet = element
            .select(&snippet_selector)
            .next()
            .map(|e| collapse_whitespace(&e.text().collect::<Vec<_>>().join(" ")))
            .unwrap_or_default();

        if !title.is_empty() {
            results.push(SearchResult::new(title, url, snippet));
        }
    }

    if blocks > 0 && blocks_with_links == 0 {
        return Err(ProviderError::parse(
            "result blocks found but none contained a result link",
        ));
    }

    if results.is_empty() && blocks == 0 {
        let container_selector = selector("div.no-results, #links, div.results")?;
        if document.select(&container_selector).next().is_none() {
            return Err(ProviderError::parse("results container not found"));
        }
    }

    Ok(results)
}

fn is_ad(element: &ElementRef<'_>) -> bool {
    element
        .value()
        .classes()
        .any(|class| class == "result--ad")
}

/// Turns a result link into the target URL, unwrapping the provider's click
/// redirect. Internal links and non-http(s) targets yield `None`.
fn resolve_result_url(href: &str) -> Option<String> {
    let href = href.trim();
    let absolute = if let Some(rest) = href.strip_prefix("//") {
        format!("https://{rest}")
    } else if href.starts_with('/') {
        format!("https://duckduckgo.com{href}")
    } else {
        href.to_string()
    };

    let parsed = Url::parse(&absolute).ok()?;
    let target = if parsed
        .host_str()
        .is_some_and(|host| host.ends_with("duckduckgo.com"))
    {
        if !parsed.path().starts_with("/l/") {
            return None;
        }
        parsed
            .query_pairs()
            .find(|(key, _)| key == "uddg")
            .map(|(_, value)| value.into_owned())?
    } else {
        absolute
    };

    let scheme_ok = Url::parse(&target)
        .map(|u| matches!(u.scheme(), "http" | "https"))
        .unwrap_or(false);
    scheme_ok.then_some(target)
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
