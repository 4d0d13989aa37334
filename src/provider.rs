//! Search provider capability and its configuration.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{ProviderError, Query, SearchResult};

/// Configuration shared by provider implementations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Display name of the provider.
    pub name: String,
    /// Short identifier (e.g., "ddg" for DuckDuckGo).
    pub shortcut: String,
    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

fn default_timeout() -> u64 {
    15
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            shortcut: String::new(),
            timeout: default_timeout(),
        }
    }
}

/// Turns a query into an ordered list of candidate results.
///
/// Implementations return results in provider rank order, collapse duplicate
/// URLs, then truncate to `query.max_results()`. Scoring happens downstream.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Returns the provider configuration.
    fn config(&self) -> &ProviderConfig;

    /// Performs a search and returns candidates in rank order.
    async fn search(&self, query: &Query) -> Result<Vec<SearchResult>, ProviderError>;

    /// Returns the provider name.
    fn name(&self) -> &str {
        &self.config().name
    }

    /// Returns the provider shortcut.
    fn shortcut(&self) -> &str {
        &self.config().shortcut
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedProvider {
        config: ProviderConfig,
    }

    #[async_trait]
    impl SearchProvider for FixedProvider {
        fn config(&self) -> &ProviderConfig {
            &self.config
        }

        async fn search(&self, query: &Query) -> Result<Vec<SearchResult>, ProviderError> {
            Ok(vec![SearchResult::new(
                query.text(),
                "https://example.com",
                "snippet",
            )])
        }
    }

    #[test]
    fn test_provider_config_default() {
        let config = ProviderConfig::default();
        assert_eq!(config.name, "");
        assert_eq!(config.shortcut, "");
        assert_eq!(config.timeout, 15);
    }

    #[test]
    fn test_provider_config_deserialization_defaults() {
        let json = r#"{"name":"Test","shortcut":"t"}"#;
        let config: ProviderConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.name, "Test");
        assert_eq!(config.timeout, 15);
    }

    #[tokio::test]
    async fn test_provider_trait_defaults() {
        let provider = FixedProvider {
            config: ProviderConfig {
                name: "Fixed".to_string(),
                shortcut: "fx".to_string(),
                ..Default::default()
            },
        };
        assert_eq!(provider.name(), "Fixed");
        assert_eq!(provider.shortcut(), "fx");
        let results = provider.search(&Query::new("rust")).await.unwrap();
        assert_eq!(results[0].title, "rust");
    }
}
