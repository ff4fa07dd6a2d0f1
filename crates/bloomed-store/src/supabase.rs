// Supabase auth + PostgREST access for sessions and the `dreams` table

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, CONTENT_TYPE};
use reqwest::StatusCode;
use serde::Deserialize;
use std::time::Duration;

use bloomed_types::{JournalEntry, NewJournalEntry};

use crate::auth::{bearer_token, AuthSession, AuthStore};
use crate::error::{Result, StoreError};
use crate::journal::JournalStore;

const DREAMS_TABLE: &str = "dreams";

/// Client for a Supabase project, acting as both auth and journal store
pub struct SupabaseClient {
    http_client: reqwest::Client,
    base_url: String,
    anon_key: String,
}

#[derive(Debug, Deserialize)]
struct SupabaseUser {
    id: String,
    email: Option<String>,
}

impl SupabaseClient {
    pub fn builder() -> SupabaseClientBuilder {
        SupabaseClientBuilder::new()
    }

    fn user_request(&self, method: reqwest::Method, path: &str, token: &str) -> reqwest::RequestBuilder {
        self.http_client
            .request(method, format!("{}{}", self.base_url, path))
            .header("apikey", &self.anon_key)
            .bearer_auth(token)
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(StoreError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

#[async_trait]
impl AuthStore for SupabaseClient {
    async fn current_session(&self, headers: &HeaderMap) -> Result<Option<AuthSession>> {
        let Some(token) = bearer_token(headers) else {
            return Ok(None);
        };

        let response = self
            .user_request(reqwest::Method::GET, "/auth/v1/user", &token)
            .send()
            .await?;

        if matches!(response.status(), StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
            return Ok(None);
        }
        let user: SupabaseUser = Self::check_status(response).await?.json().await?;

        Ok(Some(AuthSession {
            user_id: user.id,
            access_token: token,
            email: user.email,
        }))
    }
}

#[async_trait]
impl JournalStore for SupabaseClient {
    async fn insert(&self, session: &AuthSession, entry: NewJournalEntry) -> Result<JournalEntry> {
        let response = self
            .user_request(
                reqwest::Method::POST,
                &format!("/rest/v1/{}", DREAMS_TABLE),
                &session.access_token,
            )
            .header("Prefer", "return=representation")
            .json(&entry)
            .send()
            .await?;

        let mut rows: Vec<JournalEntry> = Self::check_status(response).await?.json().await?;
        if rows.is_empty() {
            return Err(StoreError::UnexpectedReply("insert returned no rows".to_string()));
        }
        Ok(rows.swap_remove(0))
    }

    async fn list(&self, session: &AuthSession) -> Result<Vec<JournalEntry>> {
        let response = self
            .user_request(
                reqwest::Method::GET,
                &format!("/rest/v1/{}", DREAMS_TABLE),
                &session.access_token,
            )
            .query(&[
                ("select", "*".to_string()),
                ("user_id", format!("eq.{}", session.user_id)),
                ("order", "created_at.desc".to_string()),
            ])
            .send()
            .await?;

        Ok(Self::check_status(response).await?.json().await?)
    }
}

pub struct SupabaseClientBuilder {
    url: Option<String>,
    anon_key: Option<String>,
    timeout: Duration,
}

impl SupabaseClientBuilder {
    pub fn new() -> Self {
        Self {
            url: None,
            anon_key: None,
            timeout: Duration::from_secs(10),
        }
    }

    pub fn url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn anon_key(mut self, key: impl Into<String>) -> Self {
        self.anon_key = Some(key.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn build(self) -> Result<SupabaseClient> {
        let url = self
            .url
            .ok_or_else(|| StoreError::Config("Supabase url is required".to_string()))?;
        let anon_key = self
            .anon_key
            .ok_or_else(|| StoreError::Config("Supabase anon key is required".to_string()))?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(self.timeout)
            .build()?;

        Ok(SupabaseClient {
            http_client,
            base_url: url.trim_end_matches('/').to_string(),
            anon_key,
        })
    }
}

impl Default for SupabaseClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}
