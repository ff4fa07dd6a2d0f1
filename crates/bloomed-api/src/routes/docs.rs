use axum::Json;
use utoipa::OpenApi;

use bloomed_types::{DreamResponse, DreamSubmission, ErrorBody, JournalEntry, Mood, ThrottledBody};

use super::{dream, health, journal};

#[derive(OpenApi)]
#[openapi(
    paths(dream::submit_dream, journal::list_journal, health::health_check),
    components(schemas(
        DreamSubmission,
        DreamResponse,
        JournalEntry,
        Mood,
        ErrorBody,
        ThrottledBody,
        health::HealthResponse
    )),
    tags(
        (name = "dream", description = "Dream submission pipeline"),
        (name = "journal", description = "Saved dreams"),
        (name = "health", description = "Service status")
    )
)]
pub struct ApiDoc;

/// OpenAPI document of the HTTP surface
pub async fn openapi_json() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
