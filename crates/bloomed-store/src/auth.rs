use async_trait::async_trait;
use reqwest::header::{HeaderMap, AUTHORIZATION, COOKIE};
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Cookie carrying the user's access token when no `Authorization` header is sent
pub const ACCESS_TOKEN_COOKIE: &str = "sb-access-token";

/// An authenticated caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthSession {
    pub user_id: String,
    pub access_token: String,
    pub email: Option<String>,
}

impl AuthSession {
    pub fn new(user_id: impl Into<String>, access_token: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            access_token: access_token.into(),
            email: None,
        }
    }
}

/// Trait for resolving the session attached to an incoming request
///
/// `Ok(None)` means anonymous. Callers treat `Err` the same way.
#[async_trait]
pub trait AuthStore: Send + Sync {
    async fn current_session(&self, headers: &HeaderMap) -> Result<Option<AuthSession>>;
}

/// Access token from `Authorization: Bearer ...`, falling back to the session cookie
pub fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let from_header = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty());
    if from_header.is_some() {
        return from_header;
    }

    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == ACCESS_TOKEN_COOKIE)
        .map(|(_, value)| value.trim().to_string())
        .filter(|t| !t.is_empty())
}
