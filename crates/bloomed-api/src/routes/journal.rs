use axum::{extract::State, http::HeaderMap, Json};
use std::sync::Arc;

use bloomed_types::JournalEntry;

use crate::{best_effort::best_effort, state::AppState};

/// List the caller's journal, newest first
///
/// Never fails: anonymous callers and store errors both get an empty list.
#[utoipa::path(
    get,
    path = "/journal",
    responses(
        (status = 200, description = "Journal entries of the signed-in user", body = Vec<JournalEntry>)
    ),
    tag = "journal"
)]
pub async fn list_journal(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Json<Vec<JournalEntry>> {
    let (Some(auth), Some(journal)) = (state.auth.as_ref(), state.gate.journal()) else {
        return Json(Vec::new());
    };

    let Some(session) = best_effort("session lookup", auth.current_session(&headers))
        .await
        .flatten()
    else {
        return Json(Vec::new());
    };

    let entries = best_effort("journal list", journal.list(&session))
        .await
        .unwrap_or_default();
    Json(entries)
}
