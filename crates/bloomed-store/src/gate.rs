use std::sync::Arc;

use bloomed_types::{DreamAnalysis, DreamSubmission, JournalEntry, NewJournalEntry};

use crate::auth::AuthSession;
use crate::journal::JournalStore;

/// Decides whether a submission becomes a journal row.
///
/// A row is written only for a `Dream` classification from an authenticated
/// caller. Every other combination is a no-op, and a failed write only
/// means nothing was saved.
#[derive(Clone)]
pub struct PersistenceGate {
    journal: Option<Arc<dyn JournalStore>>,
}

impl PersistenceGate {
    pub fn new(journal: Arc<dyn JournalStore>) -> Self {
        Self {
            journal: Some(journal),
        }
    }

    /// A gate that never writes
    pub fn disabled() -> Self {
        Self { journal: None }
    }

    pub fn journal(&self) -> Option<&Arc<dyn JournalStore>> {
        self.journal.as_ref()
    }

    pub async fn maybe_persist(
        &self,
        analysis: &DreamAnalysis,
        session: Option<&AuthSession>,
        submission: &DreamSubmission,
        interpretation: &str,
    ) -> Option<JournalEntry> {
        let journal = self.journal.as_ref()?;
        let (DreamAnalysis::Dream(details), Some(session)) = (analysis, session) else {
            return None;
        };

        let entry = NewJournalEntry::from_details(
            &session.user_id,
            &submission.dream_text,
            interpretation,
            details,
        );

        match journal.insert(session, entry).await {
            Ok(row) => {
                tracing::info!(user_id = %session.user_id, entry_id = %row.id, "Dream saved to journal");
                Some(row)
            }
            Err(e) => {
                tracing::error!(user_id = %session.user_id, error = %e, "Failed to save dream to journal");
                None
            }
        }
    }
}
