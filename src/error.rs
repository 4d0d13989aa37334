//! Error types for the web search service.

use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for service operations.
pub type Result<T> = std::result::Result<T, SearchError>;

/// Why the rate limiter refused a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RateLimitReason {
    /// The agent already holds the maximum number of in-flight permits.
    AgentConcurrency,
    /// The global rolling-window quota is exhausted.
    GlobalQuota,
}

impl fmt::Display for RateLimitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AgentConcurrency => f.write_str("agent concurrency limit reached"),
            Self::GlobalQuota => f.write_str("global query quota exhausted"),
        }
    }
}

/// Classification of a search provider failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ProviderErrorKind {
    /// Transport failure or unexpected HTTP status.
    Network,
    /// The provider did not answer in time.
    Timeout,
    /// The returned markup no longer matches the expected structure.
    ParseFailure,
    /// The provider refused the request (captcha, 403, 429).
    Blocked,
}

impl fmt::Display for ProviderErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Network => "network",
            Self::Timeout => "timeout",
            Self::ParseFailure => "parse failure",
            Self::Blocked => "blocked",
        };
        f.write_str(name)
    }
}

/// A failed call to a [`SearchProvider`](crate::SearchProvider).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("search provider {kind} error: {message}")]
pub struct ProviderError {
    /// Failure class.
    pub kind: ProviderErrorKind,
    /// Human-readable detail.
    pub message: String,
}

impl ProviderError {
    /// Creates a provider error of the given kind.
    pub fn new(kind: ProviderErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Shorthand for a [`ProviderErrorKind::Network`] error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Network, message)
    }

    /// Shorthand for a [`ProviderErrorKind::Timeout`] error.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Timeout, message)
    }

    /// Shorthand for a [`ProviderErrorKind::ParseFailure`] error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::ParseFailure, message)
    }

    /// Shorthand for a [`ProviderErrorKind::Blocked`] error.
    pub fn blocked(message: impl Into<String>) -> Self {
        Self::new(ProviderErrorKind::Blocked, message)
    }

    /// Transient failures that a caller may reasonably retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self.kind,
            ProviderErrorKind::Network | ProviderErrorKind::Timeout
        )
    }

    /// The provider's markup changed; retrying will not help.
    pub fn is_compatibility_break(&self) -> bool {
        self.kind == ProviderErrorKind::ParseFailure
    }
}

impl From<reqwest::Error> for ProviderError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::timeout(err.to_string())
        } else {
            Self::network(err.to_string())
        }
    }
}

/// Errors surfaced by [`WebSearchService`](crate::WebSearchService) calls.
#[derive(Error, Debug)]
pub enum SearchError {
    /// Admission was denied; the caller should back off.
    #[error("Rate limited: {0}")]
    RateLimited(RateLimitReason),

    /// The search step failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// Invalid query.
    #[error("Invalid query: {0}")]
    InvalidQuery(String),

    /// Invalid service configuration.
    #[error("Invalid configuration: {0}")]
    Config(String),
}

impl SearchError {
    /// Short machine-readable label used in emitted events.
    pub fn label(&self) -> String {
        match self {
            Self::RateLimited(reason) => format!("RateLimited({reason:?})"),
            Self::Provider(err) => format!("ProviderError({:?})", err.kind),
            Self::InvalidQuery(_) => "InvalidQuery".to_string(),
            Self::Config(_) => "Config".to_string(),
        }
    }
}
