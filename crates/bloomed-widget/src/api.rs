use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use serde_json::Value;
use std::time::Duration;

use bloomed_types::{DreamResponse, DreamSubmission};

use crate::error::{Result, WidgetError};

/// Transport used by the widget to reach the dream endpoint
#[async_trait]
pub trait DreamApi: Send + Sync {
    async fn submit(&self, submission: &DreamSubmission) -> Result<DreamResponse>;
}

/// `POST {base_url}/dream` over HTTP
pub struct HttpDreamApi {
    http_client: reqwest::Client,
    endpoint: String,
    access_token: Option<String>,
}

impl HttpDreamApi {
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_secs(60))
            .build()?;

        Ok(Self {
            http_client,
            endpoint: format!("{}/dream", base_url.as_ref().trim_end_matches('/')),
            access_token: None,
        })
    }

    /// Send requests as a signed-in user
    pub fn with_access_token(mut self, token: impl Into<String>) -> Self {
        self.access_token = Some(token.into());
        self
    }
}

#[async_trait]
impl DreamApi for HttpDreamApi {
    async fn submit(&self, submission: &DreamSubmission) -> Result<DreamResponse> {
        let mut request = self.http_client.post(&self.endpoint).json(submission);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if status.is_success() {
            return Ok(serde_json::from_str(&body)?);
        }

        let parsed: Option<Value> = serde_json::from_str(&body).ok();
        let field = |name: &str| {
            parsed
                .as_ref()
                .and_then(|v| v.get(name))
                .and_then(Value::as_str)
                .map(str::to_string)
        };

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(WidgetError::Throttled {
                scope: field("scope").unwrap_or_default(),
                message: field("error").unwrap_or_else(|| "You've reached your usage limit.".to_string()),
            });
        }

        Err(WidgetError::Rejected {
            status: status.as_u16(),
            message: field("error")
                .or_else(|| field("message"))
                .unwrap_or_else(|| format!("Request Failed ({})", status.as_u16())),
        })
    }
}
