use serde::{Deserialize, Serialize};
use std::fmt;

/// Which admission window produced a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateLimitScope {
    Hourly,
    Daily,
    None,
}

impl RateLimitScope {
    pub fn as_str(&self) -> &'static str {
        match self {
            RateLimitScope::Hourly => "hourly",
            RateLimitScope::Daily => "daily",
            RateLimitScope::None => "none",
        }
    }
}

impl fmt::Display for RateLimitScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of the dual-window admission check. Computed per request, never
/// stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub scope: RateLimitScope,
    pub limit: u64,
    pub remaining: u64,
    pub reset_at_epoch_ms: i64,
}

impl RateLimitDecision {
    /// Decision used when the limiter is disabled or its store is down.
    pub fn open() -> Self {
        Self {
            allowed: true,
            scope: RateLimitScope::None,
            limit: 0,
            remaining: 0,
            reset_at_epoch_ms: 0,
        }
    }

    /// Human readable wait estimate, rounded up to whole minutes.
    pub fn retry_message(&self, now_epoch_ms: i64) -> String {
        let remaining_ms = (self.reset_at_epoch_ms - now_epoch_ms).max(0);
        let minutes = (remaining_ms + 59_999) / 60_000;
        match minutes {
            0 => "Too many requests. Please try again in a moment.".to_string(),
            1 => "Too many requests. Please try again in 1 minute.".to_string(),
            n => format!("Too many requests. Please try again in {} minutes.", n),
        }
    }
}
