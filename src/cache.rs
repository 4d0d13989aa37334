//! TTL-bounded memoization of completed query summaries.
//!
//! Expired entries are evicted lazily when read, and in bulk by [`ResultCache::sweep`].
//! Nothing here depends on a timer; time comes from the injected [`Clock`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::clock::{Clock, SystemClock};
use crate::query::CacheKey;
use crate::QuerySummary;

/// A stored summary and the instant it stops being valid.
///
/// `expires_at` is `None` when the TTL reaches past the clock's range; such an
/// entry never expires.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    value: QuerySummary,
    expires_at: Option<Instant>,
}

/// An entry is expired from `expires_at` onwards.
pub fn is_expired(entry: &CacheEntry, now: Instant) -> bool {
    entry.expires_at.is_some_and(|at| now >= at)
}

/// In-memory result cache.
pub struct ResultCache {
    entries: Mutex<HashMap<CacheKey, CacheEntry>>,
    clock: Arc<dyn Clock>,
}

impl ResultCache {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            clock,
        }
    }

    /// Returns a copy of the cached summary, or `None` on a miss.
    pub fn lookup(&self, key: &CacheKey) -> Option<QuerySummary> {
        let now = self.clock.now();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.get(key) {
            Some(entry) if is_expired(entry, now) => {
                entries.remove(key);
                None
            }
            Some(entry) => Some(entry.value.clone()),
            None => None,
        }
    }

    /// Stores `value` for `ttl`. A zero TTL stores nothing.
    pub fn store(&self, key: CacheKey, value: QuerySummary, ttl: Duration) {
        if ttl.is_zero() {
            return;
        }
        let entry = CacheEntry {
            value,
            expires_at: self.clock.now().checked_add(ttl),
        };
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key, entry);
    }

    /// Removes every expired entry and returns how many were dropped.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        entries.retain(|_, entry| !is_expired(entry, now));
        before - entries.len()
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    pub fn len(&self) -> usize {
        self.entries.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultCache")
            .field("entries", &self.len())
            .finish()
    }
}
