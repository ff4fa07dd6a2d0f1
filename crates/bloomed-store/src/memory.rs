// In-process collaborators, used when the hosted services are not configured
// and as test doubles.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use bloomed_types::{JournalEntry, NewJournalEntry};

use crate::auth::{bearer_token, AuthSession, AuthStore};
use crate::counter::{weighted_previous, CounterStore, WindowKeys, WindowOutcome};
use crate::error::{Result, StoreError};
use crate::journal::JournalStore;
use reqwest::header::HeaderMap;

#[derive(Default)]
struct Counters {
    values: HashMap<String, i64>,
    sets: HashMap<String, HashSet<String>>,
}

/// Counter store backed by a mutex-guarded map.
#[derive(Default)]
pub struct InMemoryCounterStore {
    inner: Mutex<Counters>,
    unavailable: AtomicBool,
}

impl InMemoryCounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulate an outage: every call fails until switched back.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Seed a raw counter, e.g. a window bucket in tests
    pub fn set(&self, key: &str, value: i64) {
        self.lock().values.insert(key.to_string(), value);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Counters> {
        self.inner.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn ensure_available(&self) -> Result<()> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("in-memory store switched off".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl CounterStore for InMemoryCounterStore {
    async fn incr(&self, key: &str) -> Result<i64> {
        self.ensure_available()?;
        let mut inner = self.lock();
        let value = inner.values.entry(key.to_string()).or_insert(0);
        *value += 1;
        Ok(*value)
    }

    async fn get(&self, key: &str) -> Result<i64> {
        self.ensure_available()?;
        Ok(self.lock().values.get(key).copied().unwrap_or(0))
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<bool> {
        self.ensure_available()?;
        Ok(self
            .lock()
            .sets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string()))
    }

    async fn scard(&self, key: &str) -> Result<u64> {
        self.ensure_available()?;
        Ok(self.lock().sets.get(key).map(|s| s.len() as u64).unwrap_or(0))
    }

    async fn sliding_window(
        &self,
        key: &str,
        limit: u64,
        window_ms: i64,
        now_ms: i64,
    ) -> Result<WindowOutcome> {
        self.ensure_available()?;
        let keys = WindowKeys::new(key, window_ms, now_ms);
        let mut inner = self.lock();

        let current = inner.values.get(&keys.current).copied().unwrap_or(0);
        let previous = inner.values.get(&keys.previous).copied().unwrap_or(0);
        let previous = weighted_previous(previous, window_ms, now_ms);

        if (previous + current) as u64 >= limit {
            return Ok(WindowOutcome {
                allowed: false,
                limit,
                remaining: 0,
                reset_at_ms: keys.reset_at_ms,
            });
        }

        let value = inner.values.entry(keys.current).or_insert(0);
        *value += 1;
        let used = (*value + previous) as u64;
        Ok(WindowOutcome {
            allowed: true,
            limit,
            remaining: limit.saturating_sub(used),
            reset_at_ms: keys.reset_at_ms,
        })
    }
}

/// Auth store resolving bearer tokens from a fixed table.
#[derive(Default)]
pub struct InMemoryAuthStore {
    sessions: Mutex<HashMap<String, AuthSession>>,
    unavailable: AtomicBool,
}

impl InMemoryAuthStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_session(self, token: impl Into<String>, session: AuthSession) -> Self {
        self.sessions
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(token.into(), session);
        self
    }

    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }
}

#[async_trait]
impl AuthStore for InMemoryAuthStore {
    async fn current_session(&self, headers: &HeaderMap) -> Result<Option<AuthSession>> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("auth store switched off".to_string()));
        }
        let Some(token) = bearer_token(headers) else {
            return Ok(None);
        };
        Ok(self
            .sessions
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .get(&token)
            .cloned())
    }
}

/// Journal store keeping rows in insertion order.
#[derive(Default)]
pub struct InMemoryJournalStore {
    entries: Mutex<Vec<JournalEntry>>,
    insert_calls: AtomicUsize,
    failing: AtomicBool,
}

impl InMemoryJournalStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every insert fail, e.g. to mimic a constraint violation
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of insert attempts, successful or not
    pub fn insert_calls(&self) -> usize {
        self.insert_calls.load(Ordering::SeqCst)
    }

    pub fn entries(&self) -> Vec<JournalEntry> {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl JournalStore for InMemoryJournalStore {
    async fn insert(&self, _session: &AuthSession, entry: NewJournalEntry) -> Result<JournalEntry> {
        self.insert_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(StoreError::Command("insert rejected".to_string()));
        }
        let row = entry.into_entry(uuid::Uuid::new_v4().to_string(), Utc::now());
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .push(row.clone());
        Ok(row)
    }

    async fn list(&self, session: &AuthSession) -> Result<Vec<JournalEntry>> {
        let mut rows: Vec<JournalEntry> = self
            .entries()
            .into_iter()
            .filter(|e| e.user_id == session.user_id)
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(rows)
    }
}
