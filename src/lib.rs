//! # agent-web-search
//!
//! Web search for autonomous agents.
//!
//! A [`WebSearchService`] takes a [`Query`], admits it under per-agent and
//! global rate limits, answers from a TTL cache when it can, otherwise asks a
//! [`SearchProvider`] for candidates, fetches the top pages concurrently under
//! per-domain limits and returns a [`QuerySummary`] with an extractive
//! overview, highlights and citations.
//!
//! - Non-blocking admission with RAII permits
//! - Deterministic re-ranking and summaries
//! - Partial failure: a page that cannot be fetched never fails the query
//! - Pluggable providers and fetchers
//!
//! ## Example
//!
//! ```rust,no_run
//! use agent_web_search::{Query, ServiceConfig, WebSearchService};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let service = WebSearchService::from_http_config(ServiceConfig::default())?;
//!
//!     let summary = service
//!         .query(Query::new("rust ownership model").with_max_results(3))
//!         .await?;
//!
//!     println!("{}", summary.overview);
//!     for source in &summary.sources {
//!         println!("{}: {}", source.title, source.url);
//!     }
//!     Ok(())
//! }
//! ```

mod cache;
mod clock;
mod config;
mod crawler;
mod error;
mod events;
mod extract;
mod fetcher;
mod fetcher_http;
mod provider;
mod query;
mod rate_limiter;
mod result;
mod robots;
mod service;
mod summarizer;

pub mod providers;

pub use cache::{is_expired, CacheEntry, ResultCache};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::ServiceConfig;
pub use crawler::{check_url, registrable_domain, Crawler, CrawlerOptions};
pub use error::{ProviderError, ProviderErrorKind, RateLimitReason, Result, SearchError};
pub use events::{
    CallEvent, CallStage, CallStatus, EventSink, NoopEventSink, Operation, TracingEventSink,
};
pub use extract::extract_text;
pub use fetcher::{PageFetcher, RawPage};
pub use fetcher_http::{build_client, HttpFetcher, DEFAULT_USER_AGENT};
pub use provider::{ProviderConfig, SearchProvider};
pub use query::{CacheKey, Query, DEFAULT_AGENT_ID, DEFAULT_MAX_RESULTS, MAX_RESULTS_LIMIT};
pub use rate_limiter::{Permit, RateLimiter, RateLimiterConfig};
pub use result::{
    dedup_results, normalize_url, FetchErrorKind, FetchOutcome, QuerySummary, SearchResult,
    TEXT_PREVIEW_CHARS,
};
pub use robots::{RobotsRules, ROBOTS_TOKEN};
pub use service::WebSearchService;
pub use summarizer::{Summarizer, Summary, EMPTY_OVERVIEW};
