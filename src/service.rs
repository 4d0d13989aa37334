//! Request orchestration.

use std::sync::Arc;

use tokio::time::{timeout_at, Instant};
use tracing::debug;

use crate::cache::ResultCache;
use crate::clock::Clock;
use crate::config::ServiceConfig;
use crate::crawler::{check_url, Crawler};
use crate::events::{CallEvent, CallStage, CallStatus, EventSink, Operation, TracingEventSink};
use crate::fetcher::PageFetcher;
use crate::fetcher_http::{build_client, HttpFetcher};
use crate::provider::{ProviderConfig, SearchProvider};
use crate::providers::DuckDuckGo;
use crate::rate_limiter::RateLimiter;
use crate::summarizer::Summarizer;
use crate::{
    dedup_results, FetchOutcome, ProviderError, Query, QuerySummary, Result, SearchError,
    DEFAULT_AGENT_ID,
};

/// Cache size above which expired entries are swept after a store.
const CACHE_SWEEP_THRESHOLD: usize = 256;

/// Web search for agents: admission, caching, search, crawl and summary.
pub struct WebSearchService {
    config: ServiceConfig,
    provider: Arc<dyn SearchProvider>,
    crawler: Crawler,
    limiter: RateLimiter,
    cache: ResultCache,
    summarizer: Summarizer,
    events: Arc<dyn EventSink>,
}

impl WebSearchService {
    /// Creates a service around the given provider and fetcher.
    pub fn new(
        config: ServiceConfig,
        provider: Arc<dyn SearchProvider>,
        fetcher: Arc<dyn PageFetcher>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            crawler: Crawler::new(fetcher, config.crawler_options()),
            limiter: RateLimiter::new(config.rate_limits()),
            cache: ResultCache::new(),
            summarizer: Summarizer::new(),
            events: Arc::new(TracingEventSink),
            provider,
            config,
        })
    }

    /// Creates a service that searches DuckDuckGo and fetches pages over HTTP.
    pub fn from_http_config(config: ServiceConfig) -> Result<Self> {
        config.validate()?;
        let search_client = build_client(&config.user_agent, config.search_timeout())?;
        let fetch_client = build_client(&config.user_agent, config.fetch_timeout())?;

        let provider = DuckDuckGo::new(search_client)
            .with_config(ProviderConfig {
                name: "DuckDuckGo".to_string(),
                shortcut: "ddg".to_string(),
                timeout: config.search_timeout_secs,
            })
            .with_endpoint(config.search_endpoint.clone())
            .with_language(config.search_language.clone());

        Self::new(
            config,
            Arc::new(provider),
            Arc::new(HttpFetcher::with_client(fetch_client)),
        )
    }

    /// Uses `clock` for rate-limit windows, cache and robots.txt expiry.
    ///
    /// Limiter, cache and robots.txt state are reset.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.limiter = RateLimiter::with_clock(self.config.rate_limits(), Arc::clone(&clock));
        self.cache = ResultCache::with_clock(Arc::clone(&clock));
        self.crawler = self.crawler.with_clock(clock);
        self
    }

    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    pub fn with_summarizer(mut self, summarizer: Summarizer) -> Self {
        self.summarizer = summarizer;
        self
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn provider(&self) -> &dyn SearchProvider {
        self.provider.as_ref()
    }

    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    /// Answers a query with ranked sources, page previews and a summary.
    ///
    /// Fails only when the query is invalid, admission is denied, or the
    /// search step fails. Page fetch failures are reported per page.
    pub async fn query(&self, query: Query) -> Result<QuerySummary> {
        let started = Instant::now();
        let mut event = CallEvent::new(Operation::Query, query.agent_id());
        let result = self.run_query(&query, &mut event).await;

        event.status = match &result {
            Ok(summary) => CallStatus::Completed {
                from_cache: summary.from_cache,
            },
            Err(err) => failure_status(err),
        };
        if let Err(SearchError::Provider(err)) = &result {
            event.provider_error = Some(err.kind);
        }
        self.finish(event, started);
        result
    }

    async fn run_query(&self, query: &Query, event: &mut CallEvent) -> Result<QuerySummary> {
        query.validate()?;
        let _permit = self
            .limiter
            .admit(query.agent_id())
            .map_err(SearchError::RateLimited)?;
        event.stage = Some(CallStage::Admitted);

        let key = query.cache_key();
        let cached = self.cache.lookup(&key);
        event.stage = Some(CallStage::CacheChecked);
        if let Some(mut summary) = cached {
            debug!(query = query.text(), "cache hit");
            summary.from_cache = true;
            event.stage = Some(CallStage::Completed);
            return Ok(summary);
        }

        // A budget too large to represent as an instant imposes no deadline.
        let now = Instant::now();
        let deadline = query.timeout().and_then(|t| now.checked_add(t));
        let search_deadline = earliest(deadline, now.checked_add(self.config.search_timeout()));

        let search = self.provider.search(query);
        let candidates = match search_deadline {
            Some(at) => match timeout_at(at, search).await {
                Ok(result) => result?,
                Err(_) => {
                    return Err(ProviderError::timeout(format!(
                        "{} did not answer in time",
                        self.provider.name()
                    ))
                    .into())
                }
            },
            None => search.await?,
        };
        event.stage = Some(CallStage::Searched);
        debug!(
            provider = self.provider.name(),
            "provider returned {} candidates",
            candidates.len()
        );

        let mut sources = dedup_results(candidates);
        sources.truncate(query.max_results());
        let sources = self.summarizer.rank(query, sources);

        let preview = query.max_results().min(self.config.preview_count);
        let urls: Vec<String> = sources.iter().take(preview).map(|s| s.url.clone()).collect();
        let pages = self
            .crawler
            .fetch_many(&urls, self.config.fetch_timeout(), deadline)
            .await;
        event.status_codes = pages.iter().map(FetchOutcome::status_code).collect();
        event.urls_visited = urls;
        event.stage = Some(CallStage::Crawled);

        let summary = self.summarizer.assemble(query, &sources, &pages);
        event.stage = Some(CallStage::Summarized);

        let result = QuerySummary {
            overview: summary.overview,
            highlights: summary.highlights,
            sources,
            fetched_pages: pages,
            from_cache: false,
        };

        self.cache.store(key, result.clone(), self.config.cache_ttl());
        if self.cache.len() > CACHE_SWEEP_THRESHOLD {
            let swept = self.cache.sweep();
            debug!("swept {} expired cache entries", swept);
        }
        event.stage = Some(CallStage::Completed);
        Ok(result)
    }

    /// Fetches one page for the default agent.
    pub async fn fetch_page(&self, url: &str) -> Result<FetchOutcome> {
        self.fetch_page_for(DEFAULT_AGENT_ID, url).await
    }

    /// Fetches one page on behalf of `agent_id`.
    ///
    /// An unusable URL yields an `InvalidUrl` outcome without admission or
    /// I/O. The only error is `RateLimited`.
    pub async fn fetch_page_for(&self, agent_id: &str, url: &str) -> Result<FetchOutcome> {
        let agent_id = match agent_id.trim() {
            "" => DEFAULT_AGENT_ID,
            id => id,
        };
        let started = Instant::now();
        let mut event = CallEvent::new(Operation::FetchPage, agent_id);

        if let Err(kind) = check_url(url) {
            debug!(url, "rejected before admission: {}", kind);
            event.status = CallStatus::Completed { from_cache: false };
            self.finish(event, started);
            return Ok(FetchOutcome::failed(url, kind));
        }

        let permit = match self.limiter.admit(agent_id) {
            Ok(permit) => permit,
            Err(reason) => {
                event.status = CallStatus::RateLimited(reason);
                self.finish(event, started);
                return Err(SearchError::RateLimited(reason));
            }
        };
        event.stage = Some(CallStage::Admitted);

        let outcome = self
            .crawler
            .fetch(url, self.config.fetch_timeout())
            .await
            .truncated(self.config.max_page_chars);
        drop(permit);

        event.stage = Some(CallStage::Completed);
        event.status = CallStatus::Completed { from_cache: false };
        event.urls_visited.push(url.to_string());
        event.status_codes.push(outcome.status_code());
        self.finish(event, started);
        Ok(outcome)
    }

    fn finish(&self, mut event: CallEvent, started: Instant) {
        event.latency = started.elapsed();
        self.events.record(&event);
    }
}

fn earliest(a: Option<Instant>, b: Option<Instant>) -> Option<Instant> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

fn failure_status(err: &SearchError) -> CallStatus {
    match err {
        SearchError::RateLimited(reason) => CallStatus::RateLimited(*reason),
        other => CallStatus::Failed(other.label()),
    }
}

impl std::fmt::Debug for WebSearchService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSearchService")
            .field("config", &self.config)
            .field("provider", &self.provider.name())
            .field("limiter", &self.limiter)
            .field("cache", &self.cache)
            .finish()
    }
}
