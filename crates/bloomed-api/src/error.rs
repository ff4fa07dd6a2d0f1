use axum::{
    http::{HeaderMap, HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, SecondsFormat, Utc};
use thiserror::Error;

use bloomed_gateway::GatewayError;
use bloomed_types::{DreamTextProblem, ErrorBody, RateLimitDecision, ThrottledBody};

pub const MSG_INVALID_BODY: &str = "Invalid request body.";
pub const MSG_NOT_CONFIGURED: &str = "Internal server configuration error. Please contact support.";
pub const MSG_UPSTREAM: &str = "Failed to get a response from the dream decoder service.";
pub const MSG_UNEXPECTED: &str = "An unexpected error occurred on the server.";

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    InvalidDream(DreamTextProblem),

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Rate limited ({})", .decision.scope)]
    Throttled {
        decision: RateLimitDecision,
        message: String,
    },

    #[error("Workflow error: {0}")]
    Upstream(#[from] GatewayError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal server error")]
    Internal,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidDream(_) | ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Throttled { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ApiError::Config(_) | ApiError::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<DreamTextProblem> for ApiError {
    fn from(problem: DreamTextProblem) -> Self {
        ApiError::InvalidDream(problem)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        match self {
            ApiError::InvalidDream(problem) => {
                error_response(status, problem.message())
            }
            ApiError::BadRequest(ref detail) => {
                tracing::debug!("Bad request: {}", detail);
                error_response(status, MSG_INVALID_BODY)
            }
            ApiError::Throttled { decision, message } => {
                let body = ThrottledBody {
                    error: message,
                    scope: decision.scope.to_string(),
                };
                (status, rate_limit_headers(&decision), Json(body)).into_response()
            }
            ApiError::Upstream(ref e) => {
                tracing::error!("Workflow call failed: {}", e);
                error_response(status, MSG_UPSTREAM)
            }
            ApiError::Config(ref msg) => {
                tracing::error!("Config error: {}", msg);
                error_response(status, MSG_NOT_CONFIGURED)
            }
            ApiError::Internal => {
                tracing::error!("Internal error while handling request");
                error_response(status, MSG_UNEXPECTED)
            }
        }
    }
}

fn error_response(status: StatusCode, message: &str) -> Response {
    let body = Json(ErrorBody {
        error: message.to_string(),
    });
    (status, body).into_response()
}

/// `X-Ratelimit-*` headers; the reset time is rendered as ISO-8601
pub fn rate_limit_headers(decision: &RateLimitDecision) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let reset = DateTime::<Utc>::from_timestamp_millis(decision.reset_at_epoch_ms)
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Millis, true);

    let values = [
        ("x-ratelimit-limit", decision.limit.to_string()),
        ("x-ratelimit-remaining", decision.remaining.to_string()),
        ("x-ratelimit-reset", reset),
    ];
    for (name, value) in values {
        if let Ok(value) = HeaderValue::from_str(&value) {
            headers.insert(HeaderName::from_static(name), value);
        }
    }
    headers
}

pub type ApiResult<T> = Result<T, ApiError>;
