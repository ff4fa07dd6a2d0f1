pub mod best_effort;
pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod state;

use axum::{
    middleware as axum_middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use std::any::Any as PanicPayload;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{
    catch_panic::CatchPanicLayer,
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use bloomed_store::COUNTER_STORE_TIMEOUT;

use crate::best_effort::BEST_EFFORT_TIMEOUT;
use crate::config::Config;
use crate::error::ApiError;
use crate::middleware::logging;
use crate::routes::{docs, dream, health, journal};
use crate::state::AppState;

/// Slack added on top of the pipeline budget before the server gives up
const REQUEST_TIMEOUT_SLACK: Duration = Duration::from_secs(10);

/// Worst-case time of one dream submission, plus slack.
///
/// Both window checks, the session lookup, the slower of the two concurrent
/// upstream calls and the journal write each run under their own bound.
pub fn request_timeout(config: &Config) -> Duration {
    let gateway = &config.gateway;
    let upstream = gateway.workflow_timeout().max(gateway.classifier_timeout());
    COUNTER_STORE_TIMEOUT * 2 + BEST_EFFORT_TIMEOUT * 2 + upstream + REQUEST_TIMEOUT_SLACK
}

/// A panicking handler answers 500 with the generic error body
fn handle_panic(_payload: Box<dyn PanicPayload + Send + 'static>) -> Response {
    ApiError::Internal.into_response()
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let request_timeout = request_timeout(&state.config);

    let api_routes = Router::new()
        .route("/health", get(health::health_check))
        .route("/dream", post(dream::submit_dream))
        .route("/journal", get(journal::list_journal))
        .route("/api-docs/openapi.json", get(docs::openapi_json));

    Router::new()
        .merge(api_routes)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(axum_middleware::from_fn(logging::log_request))
        .layer(TimeoutLayer::new(request_timeout))
        .layer(CompressionLayer::new())
        .layer(build_cors_layer(&state.config))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn build_cors_layer(config: &Config) -> CorsLayer {
    if !config.cors.enabled {
        return CorsLayer::permissive();
    }

    let cors = CorsLayer::new()
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers(Any);

    if config.cors.origins.iter().any(|o| o == "*") {
        cors.allow_origin(Any)
    } else {
        let origins: Vec<axum::http::HeaderValue> = config
            .cors
            .origins
            .iter()
            .filter_map(|o| o.parse::<axum::http::HeaderValue>().ok())
            .collect();
        cors.allow_origin(origins)
    }
}
