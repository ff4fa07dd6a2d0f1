use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::counter::CounterStore;
use crate::error::Result;

pub const KEY_UNIQUE_USERS: &str = "dreamchat:users";
pub const KEY_TOTAL_MESSAGES: &str = "dreamchat:total_messages";
pub const KEY_TOTAL_ERRORS: &str = "dreamchat:total_errors";
pub const KEY_TOTAL_RATE_LIMITED: &str = "dreamchat:total_rate_limited";

/// Best-effort usage counters.
///
/// Every `record_*` call detaches its store round-trip onto the runtime and
/// returns immediately; failures are logged at debug level and dropped. A sink
/// without a store is a no-op.
#[derive(Clone, Default)]
pub struct MetricsSink {
    store: Option<Arc<dyn CounterStore>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshot {
    pub total_unique_users: u64,
    pub total_messages: i64,
    pub total_errors: i64,
    pub total_rate_limited: i64,
}

impl MetricsSink {
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self { store: Some(store) }
    }

    pub fn disabled() -> Self {
        Self { store: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.store.is_some()
    }

    /// An admitted submission from `identity`
    pub fn record_message(&self, identity: &str) {
        let identity = identity.to_string();
        self.detach("message", move |store| async move {
            store.incr(KEY_TOTAL_MESSAGES).await?;
            store.sadd(KEY_UNIQUE_USERS, &identity).await?;
            Ok(())
        });
    }

    pub fn record_error(&self) {
        self.detach("error", |store| async move {
            store.incr(KEY_TOTAL_ERRORS).await.map(|_| ())
        });
    }

    pub fn record_rate_limited(&self) {
        self.detach("rate_limited", |store| async move {
            store.incr(KEY_TOTAL_RATE_LIMITED).await.map(|_| ())
        });
    }

    /// Read every counter back. Disabled sinks report zeros.
    pub async fn snapshot(&self) -> Result<MetricsSnapshot> {
        let Some(store) = &self.store else {
            return Ok(MetricsSnapshot::default());
        };

        let (users, messages, errors, rate_limited) = tokio::join!(
            store.scard(KEY_UNIQUE_USERS),
            store.get(KEY_TOTAL_MESSAGES),
            store.get(KEY_TOTAL_ERRORS),
            store.get(KEY_TOTAL_RATE_LIMITED),
        );

        Ok(MetricsSnapshot {
            total_unique_users: users?,
            total_messages: messages?,
            total_errors: errors?,
            total_rate_limited: rate_limited?,
        })
    }

    fn detach<F, Fut>(&self, metric: &'static str, op: F)
    where
        F: FnOnce(Arc<dyn CounterStore>) -> Fut + Send + 'static,
        Fut: std::future::Future<Output = Result<()>> + Send + 'static,
    {
        let Some(store) = self.store.clone() else {
            return;
        };
        tokio::spawn(async move {
            if let Err(e) = op(store).await {
                tracing::debug!(metric, error = %e, "Dropping metric update");
            }
        });
    }
}
