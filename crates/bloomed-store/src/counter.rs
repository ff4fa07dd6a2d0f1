use async_trait::async_trait;

use crate::error::Result;

/// Trait for the shared atomic counter store.
///
/// All mutation goes through the store's own atomic primitives; callers never
/// read-modify-write.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Atomically increment `key` by one, returning the new value
    async fn incr(&self, key: &str) -> Result<i64>;

    /// Current value of `key`, zero when absent
    async fn get(&self, key: &str) -> Result<i64>;

    /// Add `member` to the set at `key`. Returns true if it was not present.
    async fn sadd(&self, key: &str, member: &str) -> Result<bool>;

    /// Cardinality of the set at `key`
    async fn scard(&self, key: &str) -> Result<u64>;

    /// Sliding-window admission for `key`: consume one unit of `limit` within
    /// `window_ms` if available.
    async fn sliding_window(&self, key: &str, limit: u64, window_ms: i64, now_ms: i64)
        -> Result<WindowOutcome>;
}

/// Result of one sliding-window check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowOutcome {
    pub allowed: bool,
    pub limit: u64,
    pub remaining: u64,
    pub reset_at_ms: i64,
}

/// Two adjacent fixed windows, weighted by how far `now` has moved into the
/// current one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct WindowKeys {
    pub current: String,
    pub previous: String,
    pub reset_at_ms: i64,
}

impl WindowKeys {
    pub fn new(key: &str, window_ms: i64, now_ms: i64) -> Self {
        let index = now_ms.div_euclid(window_ms);
        Self {
            current: format!("{}:{}", key, index),
            previous: format!("{}:{}", key, index - 1),
            reset_at_ms: (index + 1) * window_ms,
        }
    }
}

/// Share of the previous window still counted at `now_ms`.
pub(crate) fn weighted_previous(previous: i64, window_ms: i64, now_ms: i64) -> i64 {
    let elapsed = now_ms.rem_euclid(window_ms) as f64 / window_ms as f64;
    ((1.0 - elapsed) * previous as f64).floor() as i64
}
