use std::sync::Arc;
use std::time::Duration;

use bloomed_types::{RateLimitDecision, RateLimitScope};

use crate::counter::{CounterStore, WindowOutcome};
use crate::metrics::MetricsSink;

pub const HOUR_MS: i64 = 60 * 60 * 1000;
pub const DAY_MS: i64 = 24 * HOUR_MS;

/// Longest a single window check may take before the request is admitted
pub const COUNTER_STORE_TIMEOUT: Duration = Duration::from_secs(5);

/// One quota: `limit` requests per `window_ms`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSpec {
    pub limit: u64,
    pub window_ms: i64,
}

impl WindowSpec {
    pub fn hourly(limit: u64) -> Self {
        Self { limit, window_ms: HOUR_MS }
    }

    pub fn daily(limit: u64) -> Self {
        Self { limit, window_ms: DAY_MS }
    }
}

/// Dual-window admission gate keyed by client identity.
///
/// The daily window is consulted first; the hourly window only when the daily
/// one admits. A store failure on either window fails open.
#[derive(Clone)]
pub struct RateLimiter {
    store: Option<Arc<dyn CounterStore>>,
    hourly: WindowSpec,
    daily: WindowSpec,
    key_prefix: String,
    metrics: MetricsSink,
}

impl RateLimiter {
    pub fn new(
        store: Arc<dyn CounterStore>,
        hourly: WindowSpec,
        daily: WindowSpec,
        metrics: MetricsSink,
    ) -> Self {
        Self {
            store: Some(store),
            hourly,
            daily,
            key_prefix: "dreamchat:ratelimit".to_string(),
            metrics,
        }
    }

    /// A limiter that admits everything, for deployments without a store
    pub fn disabled() -> Self {
        Self {
            store: None,
            hourly: WindowSpec::hourly(0),
            daily: WindowSpec::daily(0),
            key_prefix: String::new(),
            metrics: MetricsSink::disabled(),
        }
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = prefix.into();
        self
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    pub async fn check(&self, identity: &str) -> RateLimitDecision {
        self.check_at(identity, chrono::Utc::now().timestamp_millis()).await
    }

    /// Check both windows at an explicit instant
    pub async fn check_at(&self, identity: &str, now_ms: i64) -> RateLimitDecision {
        let Some(store) = &self.store else {
            return RateLimitDecision::open();
        };

        let daily = self
            .window(store.as_ref(), RateLimitScope::Daily, self.daily, identity, now_ms)
            .await;
        if let Some(outcome) = daily {
            if !outcome.allowed {
                return decision(RateLimitScope::Daily, outcome);
            }
        }

        let hourly = self
            .window(store.as_ref(), RateLimitScope::Hourly, self.hourly, identity, now_ms)
            .await;
        match hourly {
            Some(outcome) if !outcome.allowed => decision(RateLimitScope::Hourly, outcome),
            Some(outcome) => RateLimitDecision {
                allowed: true,
                scope: RateLimitScope::None,
                limit: outcome.limit,
                remaining: outcome.remaining,
                reset_at_epoch_ms: outcome.reset_at_ms,
            },
            None => RateLimitDecision::open(),
        }
    }

    /// `None` when the store could not answer
    async fn window(
        &self,
        store: &dyn CounterStore,
        scope: RateLimitScope,
        spec: WindowSpec,
        identity: &str,
        now_ms: i64,
    ) -> Option<WindowOutcome> {
        let key = format!("{}:{}:{}", self.key_prefix, scope, identity);
        let lookup = store.sliding_window(&key, spec.limit, spec.window_ms, now_ms);
        match tokio::time::timeout(COUNTER_STORE_TIMEOUT, lookup).await {
            Ok(Ok(outcome)) => Some(outcome),
            Ok(Err(e)) => {
                tracing::error!(scope = %scope, error = %e, "Rate limit lookup failed, admitting request");
                self.metrics.record_error();
                None
            }
            Err(_) => {
                tracing::error!(
                    scope = %scope,
                    timeout_secs = COUNTER_STORE_TIMEOUT.as_secs(),
                    "Rate limit lookup timed out, admitting request"
                );
                self.metrics.record_error();
                None
            }
        }
    }
}

fn decision(scope: RateLimitScope, outcome: WindowOutcome) -> RateLimitDecision {
    RateLimitDecision {
        allowed: false,
        scope,
        limit: outcome.limit,
        remaining: outcome.remaining,
        reset_at_epoch_ms: outcome.reset_at_ms,
    }
}
