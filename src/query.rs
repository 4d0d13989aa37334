//! Search query representation.

use std::collections::HashSet;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Result, SearchError};

/// Default number of results requested per query.
pub const DEFAULT_MAX_RESULTS: usize = 5;

/// Upper bound on `max_results`.
pub const MAX_RESULTS_LIMIT: usize = 10;

/// Agent identity used when the caller supplies none.
pub const DEFAULT_AGENT_ID: &str = "default";

/// A search query with all parameters.
///
/// Fields are private so a constructed query cannot be changed behind the
/// service's back; use the `with_*` builders before handing it over.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    text: String,
    max_results: usize,
    agent_id: String,
    language: Option<String>,
    #[serde(skip)]
    timeout: Option<Duration>,
}

impl Query {
    /// Creates a new query. Surrounding whitespace is trimmed.
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into().trim().to_string(),
            max_results: DEFAULT_MAX_RESULTS,
            agent_id: DEFAULT_AGENT_ID.to_string(),
            language: None,
            timeout: None,
        }
    }

    /// Sets the maximum number of results.
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    /// Sets the calling agent.
    pub fn with_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = agent_id.into();
        self
    }

    /// Sets the language/region hint (e.g. "us-en").
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Bounds the whole call; pending page fetches are cut off when it elapses.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn max_results(&self) -> usize {
        self.max_results
    }

    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }

    pub fn language(&self) -> Option<&str> {
        self.language.as_deref()
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Lowercased query terms, used for keyword scoring.
    pub fn terms(&self) -> Vec<String> {
        let mut terms: Vec<String> = self
            .text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty())
            .map(|t| t.to_lowercase())
            .collect();
        let mut seen = HashSet::new();
        terms.retain(|t| seen.insert(t.clone()));
        terms
    }

    /// Checks the query before any work is done for it.
    pub fn validate(&self) -> Result<()> {
        if self.text.is_empty() {
            return Err(SearchError::InvalidQuery("Query cannot be empty".into()));
        }
        if self.max_results == 0 || self.max_results > MAX_RESULTS_LIMIT {
            return Err(SearchError::InvalidQuery(format!(
                "max_results must be between 1 and {}, got {}",
                MAX_RESULTS_LIMIT, self.max_results
            )));
        }
        if self.agent_id.trim().is_empty() {
            return Err(SearchError::InvalidQuery("agent_id cannot be empty".into()));
        }
        Ok(())
    }

    /// Cache key for this query. The agent and timeout are not part of it.
    pub fn cache_key(&self) -> CacheKey {
        CacheKey {
            text: self.text.to_lowercase(),
            max_results: self.max_results,
            language: self.language.clone(),
        }
    }
}

/// Normalized query parameters identifying a cached result.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    text: String,
    max_results: usize,
    language: Option<String>,
}
