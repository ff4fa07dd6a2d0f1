use uuid::Uuid;

/// Owns the widget's session identifier.
///
/// The id is generated on the first open and then kept for the life of the
/// widget, across close/open cycles.
#[derive(Debug, Clone, Default)]
pub struct SessionManager {
    id: Option<Uuid>,
}

impl SessionManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current id, creating one if none exists yet
    pub fn ensure(&mut self) -> Uuid {
        *self.id.get_or_insert_with(|| {
            let id = Uuid::new_v4();
            tracing::debug!(session_id = %id, "Generated new chat session");
            id
        })
    }

    pub fn current(&self) -> Option<Uuid> {
        self.id
    }
}
