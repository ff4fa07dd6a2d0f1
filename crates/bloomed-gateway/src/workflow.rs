use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use serde_json::Value;
use std::time::Duration;

use bloomed_types::{DreamSubmission, InterpretationResult};

use crate::error::{GatewayError, Result};
use crate::traits::WorkflowGateway;

/// Client for the workflow webhook that produces the interpretation.
///
/// The webhook answers `{"output": "..."}`, or a one-element array of that
/// object. Anything else is a failure of this call.
pub struct WebhookWorkflowClient {
    http_client: reqwest::Client,
    url: String,
    timeout: Duration,
}

impl WebhookWorkflowClient {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            http_client,
            url: url.into(),
            timeout,
        })
    }

    fn map_send_error(&self, e: reqwest::Error) -> GatewayError {
        if e.is_timeout() {
            GatewayError::Timeout(self.timeout.as_secs())
        } else {
            GatewayError::Transport(e)
        }
    }
}

#[async_trait]
impl WorkflowGateway for WebhookWorkflowClient {
    async fn interpret(&self, submission: &DreamSubmission) -> Result<InterpretationResult> {
        let response = self
            .http_client
            .post(&self.url)
            .json(submission)
            .send()
            .await
            .map_err(|e| self.map_send_error(e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| self.map_send_error(e))?;

        if !status.is_success() {
            return Err(GatewayError::Status {
                status: status.as_u16(),
                detail: error_detail(&body),
            });
        }

        let value: Value = serde_json::from_str(&body)
            .map_err(|e| GatewayError::Malformed(format!("invalid JSON: {}", e)))?;
        extract_output(&value).map(InterpretationResult::new)
    }
}

fn extract_output(value: &Value) -> Result<String> {
    let object = match value {
        Value::Array(items) => items.first().unwrap_or(&Value::Null),
        other => other,
    };

    if let Some(output) = object.get("output").and_then(Value::as_str) {
        return Ok(output.to_string());
    }
    if let Some(error) = object.get("error").and_then(Value::as_str) {
        return Err(GatewayError::Malformed(format!("workflow reported: {}", error)));
    }
    Err(GatewayError::Malformed("missing `output` field".to_string()))
}

/// Best description of a failed webhook call: its `error`/`message` field,
/// else the raw body.
fn error_detail(body: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            v.get("error")
                .or_else(|| v.get("message"))
                .and_then(Value::as_str)
                .map(str::to_string)
        })
        .unwrap_or_else(|| body.to_string())
}
