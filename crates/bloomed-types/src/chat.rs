use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One entry in the chat widget's message list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub text: String,
    pub is_user: bool,
    pub timestamp: DateTime<Utc>,
}

impl ChatMessage {
    pub fn user(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            is_user: true,
            timestamp: Utc::now(),
        }
    }

    pub fn bot(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            is_user: false,
            timestamp: Utc::now(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.id.starts_with("error-")
    }
}
