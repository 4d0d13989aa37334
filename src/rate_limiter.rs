//! Admission control: per-agent concurrency and a global rolling quota.
//!
//! Both gates are non-blocking. A denied call learns about it immediately and
//! decides for itself whether to retry; the limiter never queues.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tracing::debug;

use crate::clock::{Clock, SystemClock};
use crate::RateLimitReason;

/// Limits applied by a [`RateLimiter`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimiterConfig {
    /// Maximum simultaneous calls per agent.
    pub max_concurrent_per_agent: usize,
    /// Maximum admissions within one window, across all agents.
    pub max_queries_per_window: usize,
    /// Length of the rolling window.
    pub window: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            max_concurrent_per_agent: 5,
            max_queries_per_window: 60,
            window: Duration::from_secs(60),
        }
    }
}

/// A scoped admission. Dropping it frees the agent's concurrency slot.
///
/// The global quota consumed at admission is not returned on drop.
#[derive(Debug)]
pub struct Permit {
    agent_id: String,
    _slot: OwnedSemaphorePermit,
}

impl Permit {
    pub fn agent_id(&self) -> &str {
        &self.agent_id
    }
}

/// Process-wide admission state, shared by every concurrent call.
pub struct RateLimiter {
    config: RateLimiterConfig,
    clock: Arc<dyn Clock>,
    agents: Mutex<HashMap<String, Arc<Semaphore>>>,
    admissions: Mutex<VecDeque<std::time::Instant>>,
}

impl RateLimiter {
    /// Creates a limiter on the system clock.
    pub fn new(config: RateLimiterConfig) -> Self {
        Self::with_clock(config, Arc::new(SystemClock))
    }

    /// Creates a limiter driven by the given clock.
    ///
    /// The per-agent limit is capped at [`Semaphore::MAX_PERMITS`].
    pub fn with_clock(mut config: RateLimiterConfig, clock: Arc<dyn Clock>) -> Self {
        config.max_concurrent_per_agent =
            config.max_concurrent_per_agent.min(Semaphore::MAX_PERMITS);
        Self {
            config,
            clock,
            agents: Mutex::new(HashMap::new()),
            admissions: Mutex::new(VecDeque::new()),
        }
    }

    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }

    /// Tries to admit one call for `agent_id`.
    pub fn admit(&self, agent_id: &str) -> Result<Permit, RateLimitReason> {
        let semaphore = self.agent_semaphore(agent_id);
        let slot = semaphore
            .try_acquire_owned()
            .map_err(|_| RateLimitReason::AgentConcurrency)?;

        // On denial `slot` is dropped here, so the agent gate is untouched.
        self.consume_quota()?;

        debug!(agent_id, "admitted");
        Ok(Permit {
            agent_id: agent_id.to_string(),
            _slot: slot,
        })
    }

    /// Number of permits currently held by `agent_id`.
    pub fn in_flight(&self, agent_id: &str) -> usize {
        let agents = self.agents.lock().unwrap_or_else(|e| e.into_inner());
        agents
            .get(agent_id)
            .map(|s| self.config.max_concurrent_per_agent - s.available_permits())
            .unwrap_or(0)
    }

    /// Admissions counted in the current window.
    pub fn quota_used(&self) -> usize {
        let now = self.clock.now();
        let mut log = self.admissions.lock().unwrap_or_else(|e| e.into_inner());
        prune(&mut log, now, self.config.window);
        log.len()
    }

    fn agent_semaphore(&self, agent_id: &str) -> Arc<Semaphore> {
        let mut agents = self.agents.lock().unwrap_or_else(|e| e.into_inner());
        agents
            .entry(agent_id.to_string())
            .or_insert_with(|| Arc::new(Semaphore::new(self.config.max_concurrent_per_agent)))
            .clone()
    }

    fn consume_quota(&self) -> Result<(), RateLimitReason> {
        let now = self.clock.now();
        let mut log = self.admissions.lock().unwrap_or_else(|e| e.into_inner());
        prune(&mut log, now, self.config.window);
        if log.len() >= self.config.max_queries_per_window {
            return Err(RateLimitReason::GlobalQuota);
        }
        log.push_back(now);
        Ok(())
    }
}

/// Drops admissions that are at least one window old.
fn prune(log: &mut VecDeque<std::time::Instant>, now: std::time::Instant, window: Duration) {
    while let Some(&oldest) = log.front() {
        if now.saturating_duration_since(oldest) >= window {
            log.pop_front();
        } else {
            break;
        }
    }
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("config", &self.config)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;

    fn limiter(concurrency: usize, quota: usize) -> (RateLimiter, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        let limiter = RateLimiter::with_clock(
            RateLimiterConfig {
                max_concurrent_per_agent: concurrency,
                max_queries_per_window: quota,
                window: Duration::from_secs(60),
            },
            clock.clone(),
        );
        (limiter, clock)
    }

    #[test]
    fn test_default_config() {
        let config = RateLimiterConfig::default();
        assert_eq!(config.max_concurrent_per_agent, 5);
        assert_eq!(config.max_queries_per_window, 60);
        assert_eq!(config.window, Duration::from_secs(60));
    }

    #[test]
    fn test_acquire_and_release_under_limits() {
        let (limiter, _) = limiter(2, 10);
        let a = limiter.admit("agent").unwrap();
        let b = limiter.admit("agent").unwrap();
        assert_eq!(limiter.in_flight("agent"), 2);
        drop(a);
        drop(b);
        assert_eq!(limiter.in_flight("agent"), 0);
    }

    #[test]
    fn test_agent_concurrency_denies_extra_call() {
        let (limiter, _) = limiter(5, 100);
        let permits: Vec<_> = (0..5).map(|_| limiter.admit("agent").unwrap()).collect();
        assert_eq!(
            limiter.admit("agent").unwrap_err(),
            RateLimitReason::AgentConcurrency
        );
        drop(permits);
        assert!(limiter.admit("agent").is_ok());
    }

    #[test]
    fn test_agent_denial_does_not_consume_quota() {
        let (limiter, _) = limiter(1, 100);
        let _held = limiter.admit("agent").unwrap();
        assert!(limiter.admit("agent").is_err());
        assert_eq!(limiter.quota_used(), 1);
    }

    #[test]
    fn test_agents_are_independent() {
        let (limiter, _) = limiter(1, 100);
        let _a = limiter.admit("a").unwrap();
        assert!(limiter.admit("b").is_ok());
        assert_eq!(limiter.in_flight("a"), 1);
        assert_eq!(limiter.in_flight("unknown"), 0);
    }

    #[test]
    fn test_global_quota_denies_61st_call() {
        let (limiter, _) = limiter(100, 60);
        for i in 0..60 {
            let agent = format!("agent-{}", i % 7);
            drop(limiter.admit(&agent).unwrap());
        }
        assert_eq!(
            limiter.admit("agent-x").unwrap_err(),
            RateLimitReason::GlobalQuota
        );
    }

    #[test]
    fn test_global_denial_releases_agent_slot() {
        let (limiter, _) = limiter(3, 1);
        let _first = limiter.admit("agent").unwrap();
        assert_eq!(limiter.admit("agent").unwrap_err(), RateLimitReason::GlobalQuota);
        assert_eq!(limiter.in_flight("agent"), 1);
    }

    #[test]
    fn test_quota_not_returned_on_release() {
        let (limiter, _) = limiter(5, 2);
        drop(limiter.admit("agent").unwrap());
        drop(limiter.admit("agent").unwrap());
        assert_eq!(limiter.admit("agent").unwrap_err(), RateLimitReason::GlobalQuota);
    }

    #[test]
    fn test_window_rolls_forward() {
        let (limiter, clock) = limiter(2, 1);
        drop(limiter.admit("agent").unwrap());
        clock.advance(Duration::from_secs(59));
        assert_eq!(limiter.admit("agent").unwrap_err(), RateLimitReason::GlobalQuota);
        clock.advance(Duration::from_secs(2));
        assert!(limiter.admit("agent").is_ok());
    }

    #[test]
    fn test_quota_used_prunes_old_entries() {
        let (limiter, clock) = limiter(5, 10);
        drop(limiter.admit("a").unwrap());
        drop(limiter.admit("b").unwrap());
        assert_eq!(limiter.quota_used(), 2);
        clock.advance(Duration::from_secs(60));
        assert_eq!(limiter.quota_used(), 0);
    }

    #[test]
    fn test_oversized_agent_limit_is_capped() {
        let (limiter, _) = limiter(usize::MAX, 10);
        assert_eq!(limiter.config().max_concurrent_per_agent, Semaphore::MAX_PERMITS);
        let _a = limiter.admit("agent").unwrap();
        let _b = limiter.admit("agent").unwrap();
        assert_eq!(limiter.in_flight("agent"), 2);
    }

    #[test]
    fn test_permit_agent_id() {
        let (limiter, _) = limiter(1, 1);
        let permit = limiter.admit("agent-9").unwrap();
        assert_eq!(permit.agent_id(), "agent-9");
    }

    #[tokio::test]
    async fn test_concurrent_admissions_never_exceed_limit() {
        let (limiter, _) = limiter(3, 1_000);
        let limiter = Arc::new(limiter);
        let handles: Vec<_> = (0..50)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                tokio::spawn(async move { limiter.admit("agent").ok() })
            })
            .collect();
        let mut held = Vec::new();
        for handle in handles {
            if let Some(permit) = handle.await.unwrap() {
                held.push(permit);
            }
        }
        assert_eq!(held.len(), 3);
        assert_eq!(limiter.in_flight("agent"), 3);
    }
}
