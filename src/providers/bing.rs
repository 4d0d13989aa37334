//! Bing Web Search JSON API provider.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::{dedup_results, ProviderConfig, ProviderError, Query, SearchProvider, SearchResult};

/// Default API endpoint.
pub const BING_ENDPOINT: &str = "https://api.bing.microsoft.com/v7.0/search";

/// Header carrying the subscription key.
const KEY_HEADER: &str = "Ocp-Apim-Subscription-Key";

/// Bing search provider using the keyed Web Search API.
pub struct Bing {
    config: ProviderConfig,
    client: Client,
    endpoint: String,
    api_key: String,
}

impl Bing {
    /// Creates a provider that authenticates with `api_key`.
    pub fn new(client: Client, api_key: impl Into<String>) -> Self {
        Self {
            config: ProviderConfig {
                name: "Bing".to_string(),
                shortcut: "bing".to_string(),
                timeout: 15,
            },
            client,
            endpoint: BING_ENDPOINT.to_string(),
            api_key: api_key.into(),
        }
    }

    /// Creates with custom configuration.
    pub fn with_config(mut self, config: ProviderConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[derive(Deserialize)]
struct BingResponse {
    #[serde(rename = "webPages")]
    web_pages: Option<WebPages>,
}

#[derive(Deserialize)]
struct WebPages {
    #[serde(default)]
    value: Vec<WebPage>,
}

#[derive(Deserialize)]
struct WebPage {
    #[serde(default)]
    name: String,
    #[serde(default)]
    url: String,
    #[serde(default)]
    snippet: String,
}

#[async_trait]
impl SearchProvider for Bing {
    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    async fn search(&self, query: &Query) -> Result<Vec<SearchResult>, ProviderError> {
        let count = query.max_results().to_string();
        let mut params = vec![("q", query.text()), ("count", count.as_str())];
        if let Some(market) = query.language() {
            params.push(("mkt", market));
        }
        debug!(provider = self.name(), "requesting {}", self.endpoint);

        let response = self
            .client
            .get(&self.endpoint)
            .query(&params)
            .header(KEY_HEADER, &self.api_key)
            .timeout(Duration::from_secs(self.config.timeout))
            .send()
            .await?;

        let status = response.status();
        if matches!(
            status,
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS
        ) {
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

        let body = response.text().await?;
        let mut results = dedup_results(parse_results(&body)?);
        results.truncate(query.max_results());
        Ok(results)
    }
}

/// Parses an API response into candidates in rank order.
///
/// A response without `webPages` means no results.
fn parse_results(body: &str) -> Result<Vec<SearchResult>, ProviderError> {
    let response: BingResponse = serde_json::from_str(body)
        .map_err(|e| ProviderError::parse(format!("unexpected response body: {e}")))?;

    let results = response
        .web_pages
        .map(|pages| {
            pages
                .value
                .into_iter()
                .filter(|page| !page.url.is_empty() && !page.name.is_empty())
                .map(|page| SearchResult::new(page.name, page.url, page.snippet))
                .collect()
        })
        .unwrap_or_default();
    Ok(results)
}
