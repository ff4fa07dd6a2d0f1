use async_trait::async_trait;

use bloomed_types::{JournalEntry, NewJournalEntry};

use crate::auth::AuthSession;
use crate::error::Result;

/// Trait for the authenticated user's dream journal
#[async_trait]
pub trait JournalStore: Send + Sync {
    /// Insert a row owned by the session's user, returning the stored row
    async fn insert(&self, session: &AuthSession, entry: NewJournalEntry) -> Result<JournalEntry>;

    /// The session user's rows, newest first
    async fn list(&self, session: &AuthSession) -> Result<Vec<JournalEntry>>;
}
