//! Structured per-call events.
//!
//! The service reports exactly one [`CallEvent`] per `query` or `fetch_page`
//! call to an [`EventSink`]. Emission is the sink's concern; the default
//! [`TracingEventSink`] turns events into `tracing` records.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::{ProviderErrorKind, RateLimitReason};

/// Which public operation produced the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Operation {
    Query,
    FetchPage,
}

/// Last pipeline stage a call reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum CallStage {
    Admitted,
    CacheChecked,
    Searched,
    Crawled,
    Summarized,
    Completed,
}

/// How the call ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum CallStatus {
    Completed { from_cache: bool },
    RateLimited(RateLimitReason),
    /// Error label, e.g. `ProviderError(Timeout)`.
    Failed(String),
}

impl fmt::Display for CallStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Completed { from_cache: true } => write!(f, "completed (cache)"),
            Self::Completed { from_cache: false } => write!(f, "completed"),
            Self::RateLimited(reason) => write!(f, "rate limited: {reason}"),
            Self::Failed(label) => write!(f, "failed: {label}"),
        }
    }
}

/// One record per call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CallEvent {
    pub call_id: Uuid,
    pub operation: Operation,
    pub agent_id: String,
    /// `None` when the call never got past admission.
    pub stage: Option<CallStage>,
    pub status: CallStatus,
    pub urls_visited: Vec<String>,
    pub status_codes: Vec<Option<u16>>,
    pub latency: Duration,
    /// Set when the provider failed.
    pub provider_error: Option<ProviderErrorKind>,
}

impl CallEvent {
    /// Starts an event for a new call with a fresh id.
    pub fn new(operation: Operation, agent_id: impl Into<String>) -> Self {
        Self {
            call_id: Uuid::new_v4(),
            operation,
            agent_id: agent_id.into(),
            stage: None,
            status: CallStatus::Failed(String::new()),
            urls_visited: Vec::new(),
            status_codes: Vec::new(),
            latency: Duration::ZERO,
            provider_error: None,
        }
    }
}

/// Receives call events.
pub trait EventSink: Send + Sync {
    fn record(&self, event: &CallEvent);
}

/// Drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
    fn record(&self, _event: &CallEvent) {}
}

/// Logs events through `tracing`.
///
/// A provider parse failure usually means the result page layout changed, so
/// it is logged at `error` level.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn record(&self, event: &CallEvent) {
        let latency_ms = event.latency.as_millis() as u64;
        match &event.status {
            CallStatus::Completed { .. } => info!(
                call_id = %event.call_id,
                operation = ?event.operation,
                agent_id = %event.agent_id,
                urls = event.urls_visited.len(),
                latency_ms,
                "{}",
                event.status
            ),
            CallStatus::RateLimited(_) => warn!(
                call_id = %event.call_id,
                operation = ?event.operation,
                agent_id = %event.agent_id,
                "{}",
                event.status
            ),
            CallStatus::Failed(_)
                if event.provider_error == Some(ProviderErrorKind::ParseFailure) =>
            {
                error!(
                    call_id = %event.call_id,
                    agent_id = %event.agent_id,
                    stage = ?event.stage,
                    "search provider page layout not recognized: {}",
                    event.status
                )
            }
            CallStatus::Failed(_) => warn!(
                call_id = %event.call_id,
                operation = ?event.operation,
                agent_id = %event.agent_id,
                stage = ?event.stage,
                latency_ms,
                "{}",
                event.status
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_event_has_unique_id() {
        let a = CallEvent::new(Operation::Query, "agent");
        let b = CallEvent::new(Operation::Query, "agent");
        assert_ne!(a.call_id, b.call_id);
        assert_eq!(a.agent_id, "agent");
        assert!(a.stage.is_none());
    }

    #[test]
    fn test_stage_order() {
        assert!(CallStage::Admitted < CallStage::CacheChecked);
        assert!(CallStage::Summarized < CallStage::Completed);
    }

    #[test]
    fn test_status_display() {
        assert_eq!(CallStatus::Completed { from_cache: true }.to_string(), "completed (cache)");
        assert_eq!(
            CallStatus::RateLimited(RateLimitReason::GlobalQuota).to_string(),
            "rate limited: global query quota exhausted"
        );
        assert_eq!(
            CallStatus::Failed("InvalidQuery".into()).to_string(),
            "failed: InvalidQuery"
        );
    }

    #[test]
    fn test_sinks_accept_every_status() {
        let mut event = CallEvent::new(Operation::FetchPage, "a");
        for status in [
            CallStatus::Completed { from_cache: false },
            CallStatus::RateLimited(RateLimitReason::AgentConcurrency),
            CallStatus::Failed("ProviderError(ParseFailure)".into()),
        ] {
            event.status = status;
            event.provider_error = Some(ProviderErrorKind::ParseFailure);
            TracingEventSink.record(&event);
            NoopEventSink.record(&event);
        }
    }
}
