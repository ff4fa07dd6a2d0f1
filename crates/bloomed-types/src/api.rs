// Wire bodies of the `/dream` endpoint, shared by server and widget.

use serde::{Deserialize, Serialize};

use crate::journal::JournalEntry;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct DreamResponse {
    pub interpretation: String,
    pub saved_dream: Option<JournalEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ErrorBody {
    pub error: String,
}

/// 429 body. `scope` is `hourly`, `daily` or `unknown`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
pub struct ThrottledBody {
    pub error: String,
    #[serde(default)]
    pub scope: String,
}
