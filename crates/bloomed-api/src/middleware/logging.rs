use axum::{extract::Request, middleware::Next, response::Response};
use std::time::Instant;

use crate::routes::dream::client_identity;

/// Request logging middleware
///
/// Server errors are logged at `warn` so they stand out from normal traffic.
pub async fn log_request(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let client = client_identity(req.headers());
    let start = Instant::now();

    let response = next.run(req).await;

    let duration_ms = start.elapsed().as_millis();
    let status = response.status();

    if status.is_server_error() {
        tracing::warn!(
            method = %method,
            uri = %uri,
            client = %client,
            status = %status,
            duration_ms = %duration_ms,
            "Request failed"
        );
    } else {
        tracing::info!(
            method = %method,
            uri = %uri,
            client = %client,
            status = %status,
            duration_ms = %duration_ms,
            "Request processed"
        );
    }

    response
}
