//! Service configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;

use crate::crawler::CrawlerOptions;
use crate::fetcher_http::DEFAULT_USER_AGENT;
use crate::providers::{DEFAULT_ENDPOINT, DEFAULT_LANGUAGE};
use crate::rate_limiter::RateLimiterConfig;
use crate::{Result, SearchError};

/// Configuration for a [`WebSearchService`](crate::WebSearchService).
///
/// Every field has a default, so a partial JSON object deserializes into a
/// complete configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Maximum in-flight calls per agent.
    #[serde(default = "default_concurrency_limit")]
    pub concurrency_limit: usize,
    /// Maximum admissions per quota window, across all agents.
    #[serde(default = "default_global_quota")]
    pub global_quota_per_minute: usize,
    /// Length of the quota window in seconds.
    #[serde(default = "default_quota_window")]
    pub quota_window_secs: u64,
    /// Result cache lifetime; 0 disables caching.
    #[serde(default = "default_cache_ttl")]
    pub cache_ttl_seconds: u64,
    /// Number of top sources fetched for previews.
    #[serde(default = "default_preview_count")]
    pub preview_count: usize,
    /// Maximum concurrent fetches per registrable domain.
    #[serde(default = "default_per_domain_limit")]
    pub per_domain_limit: usize,
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_search_timeout")]
    pub search_timeout_secs: u64,
    /// Domains pages may be fetched from; empty allows all.
    #[serde(default)]
    pub domain_allow_list: Vec<String>,
    #[serde(default)]
    pub respect_robots: bool,
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// How long robots.txt rules are reused per origin.
    #[serde(default = "default_robots_ttl")]
    pub robots_ttl_secs: u64,
    /// Cap on `text` and `html` returned by `fetch_page`.
    #[serde(default = "default_max_page_chars")]
    pub max_page_chars: usize,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_search_endpoint")]
    pub search_endpoint: String,
    /// Region/language used when a query does not name one.
    #[serde(default = "default_search_language")]
    pub search_language: String,
}

fn default_concurrency_limit() -> usize {
    5
}

fn default_global_quota() -> usize {
    60
}

fn default_quota_window() -> u64 {
    60
}

fn default_cache_ttl() -> u64 {
    600
}

fn default_preview_count() -> usize {
    3
}

fn default_per_domain_limit() -> usize {
    2
}

fn default_fetch_timeout() -> u64 {
    10
}

fn default_search_timeout() -> u64 {
    15
}

fn default_max_body_bytes() -> usize {
    2 * 1024 * 1024
}

fn default_robots_ttl() -> u64 {
    3600
}

fn default_max_page_chars() -> usize {
    200_000
}

fn default_user_agent() -> String {
    DEFAULT_USER_AGENT.to_string()
}

fn default_search_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_search_language() -> String {
    DEFAULT_LANGUAGE.to_string()
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: default_concurrency_limit(),
            global_quota_per_minute: default_global_quota(),
            quota_window_secs: default_quota_window(),
            cache_ttl_seconds: default_cache_ttl(),
            preview_count: default_preview_count(),
            per_domain_limit: default_per_domain_limit(),
            fetch_timeout_secs: default_fetch_timeout(),
            search_timeout_secs: default_search_timeout(),
            domain_allow_list: Vec::new(),
            respect_robots: false,
            max_body_bytes: default_max_body_bytes(),
            robots_ttl_secs: default_robots_ttl(),
            max_page_chars: default_max_page_chars(),
            user_agent: default_user_agent(),
            search_endpoint: default_search_endpoint(),
            search_language: default_search_language(),
        }
    }
}

impl ServiceConfig {
    /// Rejects values that would make the service unusable.
    pub fn validate(&self) -> Result<()> {
        let positive = [
            ("concurrency_limit", self.concurrency_limit as u64),
            ("global_quota_per_minute", self.global_quota_per_minute as u64),
            ("quota_window_secs", self.quota_window_secs),
            ("per_domain_limit", self.per_domain_limit as u64),
            ("fetch_timeout_secs", self.fetch_timeout_secs),
            ("search_timeout_secs", self.search_timeout_secs),
            ("max_body_bytes", self.max_body_bytes as u64),
            ("max_page_chars", self.max_page_chars as u64),
        ];
        if let Some((name, _)) = positive.iter().find(|(_, value)| *value == 0) {
            return Err(SearchError::Config(format!("{name} must be greater than 0")));
        }
        let permits = [
            ("concurrency_limit", self.concurrency_limit),
            ("per_domain_limit", self.per_domain_limit),
        ];
        if let Some((name, _)) = permits.iter().find(|(_, v)| *v > Semaphore::MAX_PERMITS) {
            return Err(SearchError::Config(format!(
                "{name} must be at most {}",
                Semaphore::MAX_PERMITS
            )));
        }
        if self.user_agent.trim().is_empty() {
            return Err(SearchError::Config("user_agent must not be empty".into()));
        }
        match url::Url::parse(&self.search_endpoint) {
            Ok(url) if matches!(url.scheme(), "http" | "https") => {}
            _ => {
                return Err(SearchError::Config(format!(
                    "search_endpoint is not an http(s) URL: {}",
                    self.search_endpoint
                )))
            }
        }
        if let Some(entry) = self.domain_allow_list.iter().find(|d| d.trim().is_empty()) {
            return Err(SearchError::Config(format!(
                "domain_allow_list contains an empty entry: {entry:?}"
            )));
        }
        Ok(())
    }

    pub fn rate_limits(&self) -> RateLimiterConfig {
        RateLimiterConfig {
            max_concurrent_per_agent: self.concurrency_limit,
            max_queries_per_window: self.global_quota_per_minute,
            window: Duration::from_secs(self.quota_window_secs),
        }
    }

    pub fn crawler_options(&self) -> CrawlerOptions {
        CrawlerOptions {
            per_domain_limit: self.per_domain_limit,
            domain_allow_list: self.domain_allow_list.clone(),
            respect_robots: self.respect_robots,
            max_body_bytes: self.max_body_bytes,
            robots_ttl: Duration::from_secs(self.robots_ttl_secs),
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_seconds)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn search_timeout(&self) -> Duration {
        Duration::from_secs(self.search_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::default();
        assert_eq!(config.concurrency_limit, 5);
        assert_eq!(config.global_quota_per_minute, 60);
        assert_eq!(config.cache_ttl_seconds, 600);
        assert_eq!(config.preview_count, 3);
        assert_eq!(config.per_domain_limit, 2);
        assert_eq!(config.max_page_chars, 200_000);
        assert_eq!(config.search_language, "us-en");
        assert!(!config.respect_robots);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let json = r#"{"cache_ttl_seconds": 0, "domain_allow_list": ["rust-lang.org"]}"#;
        let config: ServiceConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.cache_ttl_seconds, 0);
        assert_eq!(config.domain_allow_list, ["rust-lang.org"]);
        assert_eq!(config.concurrency_limit, 5);
        assert_eq!(config.search_endpoint, DEFAULT_ENDPOINT);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_limits() {
        let config = ServiceConfig {
            concurrency_limit: 0,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("concurrency_limit"));

        let config = ServiceConfig {
            per_domain_limit: 0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_limits_beyond_semaphore_capacity() {
        let config = ServiceConfig {
            concurrency_limit: usize::MAX,
            ..Default::default()
        };
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("concurrency_limit"));

        let config = ServiceConfig {
            per_domain_limit: Semaphore::MAX_PERMITS + 1,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ServiceConfig {
            concurrency_limit: Semaphore::MAX_PERMITS,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_accepts_unbounded_durations() {
        let config = ServiceConfig {
            cache_ttl_seconds: u64::MAX,
            quota_window_secs: u64::MAX,
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_endpoint() {
        let config = ServiceConfig {
            search_endpoint: "ftp://example.com".into(),
            ..Default::default()
        };
        assert!(matches!(config.validate(), Err(SearchError::Config(_))));
    }

    #[test]
    fn test_derived_settings() {
        let config = ServiceConfig {
            concurrency_limit: 2,
            quota_window_secs: 30,
            respect_robots: true,
            ..Default::default()
        };
        let limits = config.rate_limits();
        assert_eq!(limits.max_concurrent_per_agent, 2);
        assert_eq!(limits.window, Duration::from_secs(30));
        assert!(config.crawler_options().respect_robots);
        assert_eq!(config.crawler_options().robots_ttl, Duration::from_secs(3600));
        assert_eq!(config.cache_ttl(), Duration::from_secs(600));
    }
}
