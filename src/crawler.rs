//! Concurrent page fetching under per-domain limits and crawl policy.
//!
//! Policy (scheme, allow-list, robots.txt) is evaluated before any request for
//! the page itself. A failed URL never affects its siblings: every input URL
//! yields exactly one [`FetchOutcome`], in input order.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::join_all;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::{timeout, timeout_at, Instant};
use tracing::debug;
use url::{Host, Url};

use crate::clock::{Clock, SystemClock};
use crate::extract::extract_text;
use crate::fetcher::{PageFetcher, RawPage};
use crate::robots::{RobotsRules, ROBOTS_TOKEN};
use crate::{FetchErrorKind, FetchOutcome};

/// Second-level labels that sit under a two-letter country code TLD.
const COUNTRY_SECOND_LEVELS: &[&str] = &["co", "com", "net", "org", "ac", "gov", "edu"];

/// Crawl behavior settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlerOptions {
    /// Maximum concurrent requests per registrable domain.
    pub per_domain_limit: usize,
    /// When non-empty, only hosts under these domains are fetched.
    pub domain_allow_list: Vec<String>,
    /// Whether robots.txt exclusions are honored.
    pub respect_robots: bool,
    /// Body bytes read per page before truncating.
    pub max_body_bytes: usize,
    /// How long parsed robots.txt rules are reused for an origin.
    pub robots_ttl: Duration,
}

impl Default for CrawlerOptions {
    fn default() -> Self {
        Self {
            per_domain_limit: 2,
            domain_allow_list: Vec::new(),
            respect_robots: false,
            max_body_bytes: 2 * 1024 * 1024,
            robots_ttl: Duration::from_secs(3600),
        }
    }
}

/// Checks that `raw` is an absolute http(s) URL with a host.
pub fn check_url(raw: &str) -> Result<Url, FetchErrorKind> {
    let url = Url::parse(raw.trim()).map_err(|_| FetchErrorKind::InvalidUrl)?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        return Err(FetchErrorKind::InvalidUrl);
    }
    Ok(url)
}

/// The host-identifying part of a URL used to group concurrency limits.
pub fn registrable_domain(url: &Url) -> String {
    match url.host() {
        Some(Host::Domain(domain)) => {
            let domain = domain.to_lowercase();
            let domain = domain.trim_end_matches('.');
            let labels: Vec<&str> = domain.split('.').collect();
            let keep = match labels.as_slice() {
                [.., second, tld]
                    if labels.len() >= 3
                        && tld.len() == 2
                        && COUNTRY_SECOND_LEVELS.contains(second) =>
                {
                    3
                }
                _ => 2,
            };
            labels[labels.len().saturating_sub(keep)..].join(".")
        }
        Some(host) => host.to_string(),
        None => String::new(),
    }
}

/// Per-domain counting semaphores, created on first use and dropped again
/// once nobody holds or awaits a slot.
struct DomainLimiter {
    limit: usize,
    slots: Mutex<HashMap<String, Arc<Semaphore>>>,
}

/// A held slot on one domain. Dropping it releases the slot.
struct DomainSlot<'a> {
    limiter: &'a DomainLimiter,
    permit: Option<OwnedSemaphorePermit>,
}

impl DomainLimiter {
    fn new(limit: usize) -> Self {
        Self {
            limit: limit.clamp(1, Semaphore::MAX_PERMITS),
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Waits for a slot on `domain`.
    async fn acquire(&self, domain: &str) -> Option<DomainSlot<'_>> {
        let semaphore = {
            let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
            slots
                .entry(domain.to_string())
                .or_insert_with(|| Arc::new(Semaphore::new(self.limit)))
                .clone()
        };
        let permit = semaphore.acquire_owned().await.ok()?;
        Some(DomainSlot {
            limiter: self,
            permit: Some(permit),
        })
    }

    /// Drops semaphores referenced only by the map. Every holder and waiter
    /// keeps its own `Arc`, so an idle entry has a strong count of one.
    fn prune_idle(&self) {
        let mut slots = self.slots.lock().unwrap_or_else(|e| e.into_inner());
        slots.retain(|_, semaphore| {
            Arc::strong_count(semaphore) > 1 || semaphore.available_permits() < self.limit
        });
    }

    fn tracked(&self) -> usize {
        self.slots.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

impl Drop for DomainSlot<'_> {
    fn drop(&mut self) {
        self.permit.take();
        self.limiter.prune_idle();
    }
}

/// Parsed robots.txt rules for one origin and when they go stale.
struct CachedRobots {
    rules: Arc<RobotsRules>,
    expires_at: Option<std::time::Instant>,
}

/// Fetches candidate pages concurrently.
pub struct Crawler {
    fetcher: Arc<dyn PageFetcher>,
    options: CrawlerOptions,
    domains: DomainLimiter,
    robots: Mutex<HashMap<String, CachedRobots>>,
    clock: Arc<dyn Clock>,
}

impl Crawler {
    /// Creates a crawler that issues requests through `fetcher`.
    pub fn new(fetcher: Arc<dyn PageFetcher>, options: CrawlerOptions) -> Self {
        Self {
            fetcher,
            domains: DomainLimiter::new(options.per_domain_limit),
            options,
            robots: Mutex::new(HashMap::new()),
            clock: Arc::new(SystemClock),
        }
    }

    /// Uses `clock` for robots.txt expiry. Cached rules are dropped.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self.robots = Mutex::new(HashMap::new());
        self
    }

    pub fn options(&self) -> &CrawlerOptions {
        &self.options
    }

    /// Number of domains with a fetch in flight or queued.
    pub fn active_domains(&self) -> usize {
        self.domains.tracked()
    }

    /// Number of origins with cached robots.txt rules, expired or not.
    pub fn cached_robots(&self) -> usize {
        self.robots.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Fetches one URL with a hard `limit` on the request.
    pub async fn fetch(&self, url: &str, limit: Duration) -> FetchOutcome {
        let parsed = match self.admit_url(url) {
            Ok(parsed) => parsed,
            Err(kind) => {
                debug!(url, error = %kind, "fetch refused by policy");
                return FetchOutcome::failed(url, kind);
            }
        };

        let domain = registrable_domain(&parsed);
        let Some(_slot) = self.domains.acquire(&domain).await else {
            return FetchOutcome::failed(url, FetchErrorKind::Network);
        };

        let work = async {
            if self.options.respect_robots && !self.robots_allow(&parsed).await {
                debug!(url, "disallowed by robots.txt");
                return FetchOutcome::failed(url, FetchErrorKind::Blocked);
            }
            match self.fetcher.fetch(parsed.as_str(), self.options.max_body_bytes).await {
                Ok(page) => into_outcome(url, page),
                Err(kind) => FetchOutcome::failed(url, kind),
            }
        };

        let outcome = timeout(limit, work)
            .await
            .unwrap_or_else(|_| FetchOutcome::failed(url, FetchErrorKind::Timeout));
        debug!(
            url,
            status = ?outcome.status_code(),
            error = ?outcome.error(),
            "fetch finished"
        );
        outcome
    }

    /// Fetches every URL concurrently; the result has one outcome per input,
    /// in input order. Fetches still pending at `deadline` become `Timeout`.
    pub async fn fetch_many(
        &self,
        urls: &[String],
        limit: Duration,
        deadline: Option<Instant>,
    ) -> Vec<FetchOutcome> {
        let fetches = urls.iter().map(|url| async move {
            match deadline {
                Some(deadline) => timeout_at(deadline, self.fetch(url, limit))
                    .await
                    .unwrap_or_else(|_| {
                        FetchOutcome::failed(url.as_str(), FetchErrorKind::Timeout)
                    }),
                None => self.fetch(url, limit).await,
            }
        });
        join_all(fetches).await
    }

    /// Scheme and allow-list checks; no I/O.
    fn admit_url(&self, raw: &str) -> Result<Url, FetchErrorKind> {
        let url = check_url(raw)?;
        if !self.options.domain_allow_list.is_empty() {
            let host = url.host_str().unwrap_or_default().to_lowercase();
            let allowed = self.options.domain_allow_list.iter().any(|entry| {
                let entry = entry.trim().to_lowercase();
                host == entry || host.ends_with(&format!(".{entry}"))
            });
            if !allowed {
                return Err(FetchErrorKind::Blocked);
            }
        }
        Ok(url)
    }

    async fn robots_allow(&self, url: &Url) -> bool {
        let origin = url.origin().ascii_serialization();
        let now = self.clock.now();
        let cached = self
            .robots
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(&origin)
            .filter(|entry| entry.expires_at.map_or(true, |at| now < at))
            .map(|entry| Arc::clone(&entry.rules));

        let rules = match cached {
            Some(rules) => rules,
            None => {
                let robots_url = format!("{origin}/robots.txt");
                let rules = match self.fetcher.fetch(&robots_url, 512 * 1024).await {
                    Ok(page) if (200..300).contains(&page.status) => {
                        RobotsRules::parse(&page.body_text(), ROBOTS_TOKEN)
                    }
                    _ => RobotsRules::allow_all(),
                };
                let rules = Arc::new(rules);
                let now = self.clock.now();
                let mut robots = self.robots.lock().unwrap_or_else(|e| e.into_inner());
                robots.retain(|_, entry| entry.expires_at.map_or(true, |at| now < at));
                robots.insert(
                    origin,
                    CachedRobots {
                        rules: Arc::clone(&rules),
                        expires_at: now.checked_add(self.options.robots_ttl),
                    },
                );
                rules
            }
        };

        let mut path = url.path().to_string();
        if let Some(query) = url.query() {
            path.push('?');
            path.push_str(query);
        }
        rules.is_allowed(&path)
    }
}

/// Turns a raw response into an outcome recorded under the requested URL.
fn into_outcome(url: &str, page: RawPage) -> FetchOutcome {
    if page.status >= 400 {
        return FetchOutcome::failed_with_status(
            url,
            FetchErrorKind::HttpError,
            page.status,
            page.content_type,
        );
    }

    let mime = page
        .content_type
        .as_deref()
        .and_then(|ct| ct.split(';').next())
        .map(|m| m.trim().to_lowercase());

    let body = page.body_text();
    let kind = match mime.as_deref() {
        Some("text/html") | Some("application/xhtml+xml") => ContentKind::Markup,
        Some(m)
            if m.starts_with("text/")
                || m == "application/json"
                || m == "application/xml"
                || m.ends_with("+json")
                || m.ends_with("+xml") =>
        {
            ContentKind::Text
        }
        Some(_) => ContentKind::Binary,
        None if body.trim_start().starts_with('<') => ContentKind::Markup,
        None if std::str::from_utf8(&page.body).is_ok() => ContentKind::Text,
        None => ContentKind::Binary,
    };

    match kind {
        ContentKind::Markup => {
            let text = extract_text(&body);
            FetchOutcome::page(url, page.status, page.content_type, Some(body), Some(text))
        }
        ContentKind::Text => {
            FetchOutcome::page(url, page.status, page.content_type, None, Some(body))
        }
        ContentKind::Binary => FetchOutcome::failed_with_status(
            url,
            FetchErrorKind::UnsupportedContent,
            page.status,
            page.content_type,
        ),
    }
}

enum ContentKind {
    Markup,
    Text,
    Binary,
}
