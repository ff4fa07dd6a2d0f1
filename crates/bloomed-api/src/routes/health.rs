use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use utoipa::ToSchema;

use bloomed_store::MetricsSnapshot;

use crate::{error::ApiResult, state::AppState};

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub services: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    #[schema(value_type = Object)]
    pub metrics: Option<MetricsSnapshot>,
}

/// Health check endpoint
///
/// Reports which collaborators are configured and, when the counter store is
/// reachable, the usage counters.
#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is healthy", body = HealthResponse)
    ),
    tag = "health"
)]
pub async fn health_check(State(state): State<Arc<AppState>>) -> ApiResult<Json<HealthResponse>> {
    let mut services = HashMap::new();
    services.insert("counter_store".to_string(), configured(state.limiter.is_enabled()));
    services.insert("workflow".to_string(), configured(state.workflow.is_some()));
    services.insert("classifier".to_string(), configured(state.classifier.is_configured()));
    services.insert("journal".to_string(), configured(state.gate.journal().is_some()));

    let metrics = if state.metrics.is_enabled() {
        match state.metrics.snapshot().await {
            Ok(snapshot) => {
                services.insert("counter_store".to_string(), "connected".to_string());
                Some(snapshot)
            }
            Err(e) => {
                tracing::warn!("Counter store health check failed: {}", e);
                services.insert("counter_store".to_string(), "disconnected".to_string());
                None
            }
        }
    } else {
        None
    };

    Ok(Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        services,
        metrics,
    }))
}

fn configured(enabled: bool) -> String {
    if enabled { "configured" } else { "disabled" }.to_string()
}
