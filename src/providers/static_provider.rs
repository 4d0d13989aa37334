//! Offline provider answering from a fixed result table.

use async_trait::async_trait;

use crate::{dedup_results, ProviderConfig, ProviderError, Query, SearchProvider, SearchResult};

/// Serves results from an in-memory table.
///
/// Entries whose title or snippet contain the query text are returned first;
/// when nothing matches the whole table is returned. Useful for running the
/// service without network access.
pub struct StaticProvider {
    config: ProviderConfig,
    results: Vec<SearchResult>,
}

impl StaticProvider {
    /// Creates a provider over `results`.
    pub fn new(results: Vec<SearchResult>) -> Self {
        Self {
            config: ProviderConfig {
                name: "Static".to_string(),
                shortcut: "static".to_string(),
                ..Default::default()
            },
            results,
        }
    }

    /// Creates a provider over the built-in sample table.
    pub fn sample() -> Self {
        Self::new(sample_results())
    }
}

#[async_trait]
impl SearchProvider for StaticProvider {
    fn config(&self) -> &ProviderConfig {
        &self.config
    }

    async fn search(&self, query: &Query) -> Result<Vec<SearchResult>, ProviderError> {
        let needle = query.text().to_lowercase();
        let matches: Vec<SearchResult> = self
            .results
            .iter()
            .filter(|r| {
                r.title.to_lowercase().contains(&needle)
                    || r.snippet.to_lowercase().contains(&needle)
            })
            .cloned()
            .collect();
        let mut selection = dedup_results(if matches.is_empty() {
            self.results.clone()
        } else {
            matches
        });
        selection.truncate(query.max_results());
        Ok(selection)
    }
}

fn sample_results() -> Vec<SearchResult> {
    vec![
        SearchResult::new(
            "AI security best practices",
            "https://example.com/ai-security-best-practices",
            "Overview of the latest security guidelines for AI models and agents.",
        ),
        SearchResult::new(
            "Observability checklist for agent servers",
            "https://example.com/agent-observability",
            "How to implement metrics, logs, and traces for a multi-server agent environment.",
        ),
        SearchResult::new(
            "Scaling search agents with rate limiting",
            "https://example.com/agent-rate-limiters",
            "Practical guidance on throttling queries and protecting search engine APIs.",
        ),
        SearchResult::new(
            "Security review template for integration projects",
            "https://example.com/security-review-template",
            "Security checklist template for integration projects.",
        ),
        SearchResult::new(
            "Tracing instrumentation cookbook",
            "https://example.com/tracing-cookbook",
            "Instrumentation examples for async services.",
        ),
    ]
}
