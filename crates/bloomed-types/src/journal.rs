use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::dream::{DreamDetails, Mood};

/// A persisted journal row, as returned by the journal store.
///
/// Field names follow the `dreams` table columns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct JournalEntry {
    pub id: String,
    pub user_id: String,
    pub content: String,
    pub interpretation: Option<String>,
    pub title: Option<String>,
    pub mood: Option<Mood>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Insert payload for a new journal row. The store assigns `id` and
/// `created_at`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewJournalEntry {
    pub user_id: String,
    pub content: String,
    pub interpretation: String,
    pub title: String,
    pub mood: Mood,
    pub tags: Vec<String>,
}

impl NewJournalEntry {
    pub fn from_details(
        user_id: impl Into<String>,
        content: impl Into<String>,
        interpretation: impl Into<String>,
        details: &DreamDetails,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            content: content.into(),
            interpretation: interpretation.into(),
            title: details.title.clone(),
            mood: details.mood,
            tags: details.tags.clone(),
        }
    }

    /// Materialize the row the way a store would after insert.
    pub fn into_entry(self, id: impl Into<String>, created_at: DateTime<Utc>) -> JournalEntry {
        JournalEntry {
            id: id.into(),
            user_id: self.user_id,
            content: self.content,
            interpretation: Some(self.interpretation),
            title: Some(self.title),
            mood: Some(self.mood),
            tags: self.tags,
            created_at,
        }
    }
}
