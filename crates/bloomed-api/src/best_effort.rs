use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

/// Upper bound for any step that must not hold up the response
pub const BEST_EFFORT_TIMEOUT: Duration = Duration::from_secs(5);

/// Run a non-critical step of a request.
///
/// Errors and timeouts are logged and collapse to `None`; nothing a
/// best-effort step does can change the primary response.
pub async fn best_effort<T, E, F>(step: &'static str, fut: F) -> Option<T>
where
    F: Future<Output = Result<T, E>>,
    E: Display,
{
    match tokio::time::timeout(BEST_EFFORT_TIMEOUT, fut).await {
        Ok(Ok(value)) => Some(value),
        Ok(Err(e)) => {
            tracing::warn!(step, error = %e, "Best-effort step failed");
            None
        }
        Err(_) => {
            tracing::warn!(step, timeout_secs = BEST_EFFORT_TIMEOUT.as_secs(), "Best-effort step timed out");
            None
        }
    }
}
