pub mod auth;
pub mod counter;
pub mod error;
pub mod gate;
pub mod journal;
pub mod limiter;
pub mod memory;
pub mod metrics;
pub mod supabase;
pub mod upstash;

pub use auth::{bearer_token, AuthSession, AuthStore};
pub use counter::{CounterStore, WindowOutcome};
pub use error::StoreError;
pub use gate::PersistenceGate;
pub use journal::JournalStore;
pub use limiter::{RateLimiter, WindowSpec, COUNTER_STORE_TIMEOUT, DAY_MS, HOUR_MS};
pub use memory::{InMemoryAuthStore, InMemoryCounterStore, InMemoryJournalStore};
pub use metrics::{MetricsSink, MetricsSnapshot};
pub use supabase::{SupabaseClient, SupabaseClientBuilder};
pub use upstash::UpstashCounterStore;
