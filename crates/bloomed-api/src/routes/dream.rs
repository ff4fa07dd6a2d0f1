use axum::{
    body::Bytes,
    extract::State,
    http::HeaderMap,
    Json,
};
use serde_json::Value;
use std::convert::Infallible;
use std::sync::Arc;

use bloomed_store::AuthSession;
use bloomed_types::{
    validate_dream_text, DreamResponse, DreamSubmission, DreamTextProblem, ErrorBody, ThrottledBody,
};

use crate::{
    best_effort::best_effort,
    error::{ApiError, ApiResult},
    state::AppState,
};

/// Identity used when the request carries no `x-forwarded-for` hop
pub const FALLBACK_IDENTITY: &str = "127.0.0.1";

/// Rate-limit identity of the caller: the first `x-forwarded-for` hop.
///
/// The header is client controlled unless a trusted proxy overwrites it.
pub fn client_identity(headers: &HeaderMap) -> String {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|hop| !hop.is_empty())
        .unwrap_or(FALLBACK_IDENTITY)
        .to_string()
}

/// Submit a dream for interpretation
///
/// Admission control runs before either upstream is called. The workflow and
/// the classifier are then awaited together; only a workflow failure fails
/// the request. The dream is saved to the journal when it is classified as a
/// dream and the caller is signed in.
#[utoipa::path(
    post,
    path = "/dream",
    request_body = DreamSubmission,
    responses(
        (status = 200, description = "Interpretation, plus the saved journal entry if any", body = DreamResponse),
        (status = 400, description = "Empty, too long or malformed submission", body = ErrorBody),
        (status = 429, description = "Hourly or daily limit reached", body = ThrottledBody),
        (status = 502, description = "Interpretation workflow failed", body = ErrorBody),
        (status = 500, description = "Server misconfigured or unexpected failure", body = ErrorBody)
    ),
    tag = "dream"
)]
pub async fn submit_dream(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<DreamResponse>> {
    let workflow = state
        .workflow
        .clone()
        .ok_or_else(|| ApiError::Config("N8N_INTERNAL_WEBHOOK_URL is not set".to_string()))?;

    let submission = parse_submission(&body)?;

    let identity = client_identity(&headers);
    let decision = state.limiter.check(&identity).await;
    if !decision.allowed {
        tracing::info!(client = %identity, scope = %decision.scope, "Dream submission throttled");
        state.metrics.record_rate_limited();
        let message = decision.retry_message(chrono::Utc::now().timestamp_millis());
        return Err(ApiError::Throttled { decision, message });
    }
    state.metrics.record_message(&identity);

    let session = current_session(&state, &headers).await;

    let (interpretation, analysis) = futures::future::join(
        workflow.interpret(&submission),
        state.classifier.classify(&submission.dream_text),
    )
    .await;

    let interpretation = match interpretation {
        Ok(result) => result,
        Err(e) => {
            state.metrics.record_error();
            return Err(ApiError::Upstream(e));
        }
    };

    tracing::info!(
        client = %identity,
        session_id = %submission.session_id,
        is_dream = analysis.is_dream(),
        signed_in = session.is_some(),
        "Dream interpreted"
    );

    let saved_dream = best_effort("journal write", async {
        Ok::<_, Infallible>(
            state
                .gate
                .maybe_persist(&analysis, session.as_ref(), &submission, &interpretation.text)
                .await,
        )
    })
    .await
    .flatten();

    Ok(Json(DreamResponse {
        interpretation: interpretation.text,
        saved_dream,
    }))
}

/// Decode the raw body. Malformed JSON is a bad request; a missing or
/// non-string `dreamText` counts as empty.
fn parse_submission(body: &[u8]) -> ApiResult<DreamSubmission> {
    let value: Value =
        serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(e.to_string()))?;

    let dream_text = value
        .get("dreamText")
        .and_then(Value::as_str)
        .ok_or(ApiError::InvalidDream(DreamTextProblem::Empty))?;
    validate_dream_text(dream_text)?;

    let timestamp = value
        .get("timestamp")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true));
    let session_id = value
        .get("sessionId")
        .and_then(Value::as_str)
        .unwrap_or_default();

    Ok(DreamSubmission::new(dream_text, timestamp, session_id))
}

async fn current_session(state: &AppState, headers: &HeaderMap) -> Option<AuthSession> {
    let auth = state.auth.as_ref()?;
    best_effort("session lookup", auth.current_session(headers))
        .await
        .flatten()
}
