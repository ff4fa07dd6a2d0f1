// Upstash Redis over its REST interface (HTTP direct, no SDK)

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::Value;

use crate::counter::{CounterStore, WindowKeys, WindowOutcome};
use crate::error::{Result, StoreError};
use crate::limiter::COUNTER_STORE_TIMEOUT;

/// Weighted two-window check, evaluated atomically inside Redis.
///
/// Returns -1 when the request is rejected, otherwise the remaining quota.
const SLIDING_WINDOW_SCRIPT: &str = r#"
local currentKey  = KEYS[1]
local previousKey = KEYS[2]
local tokens      = tonumber(ARGV[1])
local now         = tonumber(ARGV[2])
local window      = tonumber(ARGV[3])

local current = tonumber(redis.call("GET", currentKey) or "0")
local previous = tonumber(redis.call("GET", previousKey) or "0")
local elapsed = (now % window) / window
previous = math.floor((1 - elapsed) * previous)

if previous + current >= tokens then
  return -1
end

local value = redis.call("INCR", currentKey)
if value == 1 then
  redis.call("PEXPIRE", currentKey, window * 2 + 1000)
end
return tokens - (value + previous)
"#;

/// Counter store talking to Upstash Redis
pub struct UpstashCounterStore {
    http_client: reqwest::Client,
    base_url: String,
}

#[derive(Debug, Deserialize)]
struct UpstashReply {
    result: Option<Value>,
    error: Option<String>,
}

impl UpstashCounterStore {
    /// Create a client for `url` authenticated with the REST `token`
    pub fn new(url: impl Into<String>, token: impl AsRef<str>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token.as_ref()))
                .map_err(|_| StoreError::Config("Invalid Upstash token format".to_string()))?,
        );

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(COUNTER_STORE_TIMEOUT)
            .build()?;

        Ok(Self {
            http_client,
            base_url: url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Run a single Redis command, returning its `result`
    async fn command(&self, args: Vec<Value>) -> Result<Value> {
        let response = self
            .http_client
            .post(&self.base_url)
            .json(&args)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await?;
        let reply: UpstashReply = match serde_json::from_str(&text) {
            Ok(reply) => reply,
            Err(_) if !status.is_success() => {
                return Err(StoreError::Status {
                    status: status.as_u16(),
                    body: text,
                })
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(error) = reply.error {
            return Err(StoreError::Command(error));
        }
        if !status.is_success() {
            return Err(StoreError::Status {
                status: status.as_u16(),
                body: text,
            });
        }
        Ok(reply.result.unwrap_or(Value::Null))
    }
}

fn as_integer(value: &Value) -> Result<i64> {
    match value {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| StoreError::UnexpectedReply(n.to_string())),
        Value::String(s) => s
            .parse()
            .map_err(|_| StoreError::UnexpectedReply(s.clone())),
        Value::Null => Ok(0),
        other => Err(StoreError::UnexpectedReply(other.to_string())),
    }
}

#[async_trait]
impl CounterStore for UpstashCounterStore {
    async fn incr(&self, key: &str) -> Result<i64> {
        let reply = self.command(vec!["INCR".into(), key.into()]).await?;
        as_integer(&reply)
    }

    async fn get(&self, key: &str) -> Result<i64> {
        let reply = self.command(vec!["GET".into(), key.into()]).await?;
        as_integer(&reply)
    }

    async fn sadd(&self, key: &str, member: &str) -> Result<bool> {
        let reply = self
            .command(vec!["SADD".into(), key.into(), member.into()])
            .await?;
        Ok(as_integer(&reply)? == 1)
    }

    async fn scard(&self, key: &str) -> Result<u64> {
        let reply = self.command(vec!["SCARD".into(), key.into()]).await?;
        Ok(as_integer(&reply)?.max(0) as u64)
    }

    async fn sliding_window(
        &self,
        key: &str,
        limit: u64,
        window_ms: i64,
        now_ms: i64,
    ) -> Result<WindowOutcome> {
        let keys = WindowKeys::new(key, window_ms, now_ms);
        let reply = self
            .command(vec![
                "EVAL".into(),
                SLIDING_WINDOW_SCRIPT.into(),
                "2".into(),
                keys.current.into(),
                keys.previous.into(),
                limit.to_string().into(),
                now_ms.to_string().into(),
                window_ms.to_string().into(),
            ])
            .await?;

        let remaining = as_integer(&reply)?;
        Ok(WindowOutcome {
            allowed: remaining >= 0,
            limit,
            remaining: remaining.max(0) as u64,
            reset_at_ms: keys.reset_at_ms,
        })
    }
}
