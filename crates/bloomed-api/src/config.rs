use config::{Config as ConfigLoader, ConfigError, File};
use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

/// Environment variables that override single keys of the file configuration
const ENV_OVERRIDES: &[(&str, &str)] = &[
    ("SERVER_HOST", "server.host"),
    ("SERVER_PORT", "server.port"),
    ("LOG_LEVEL", "logging.level"),
    ("LOG_FORMAT", "logging.format"),
    ("GATEWAY_CLASSIFIER_MODEL", "gateway.classifier_model"),
    ("GATEWAY_CLASSIFIER_BASE_URL", "gateway.classifier_base_url"),
    ("GATEWAY_CLASSIFIER_TEMPERATURE", "gateway.classifier_temperature"),
    ("GATEWAY_WORKFLOW_TIMEOUT_SECS", "gateway.workflow_timeout_secs"),
    ("GATEWAY_CLASSIFIER_TIMEOUT_SECS", "gateway.classifier_timeout_secs"),
    ("LIMITS_HOURLY", "limits.hourly"),
    ("LIMITS_DAILY", "limits.daily"),
    ("LIMITS_KEY_PREFIX", "limits.key_prefix"),
];

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub limits: LimitsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,

    // Secrets (from ENV only)
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default)]
    pub openrouter_api_key: Option<String>,
    #[serde(default)]
    pub upstash_url: Option<String>,
    #[serde(default)]
    pub upstash_token: Option<String>,
    #[serde(default)]
    pub supabase_url: Option<String>,
    #[serde(default)]
    pub supabase_anon_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CorsConfig {
    pub enabled: bool,
    #[serde(default)]
    pub origins: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewayConfig {
    pub classifier_model: String,
    pub classifier_base_url: String,
    pub classifier_temperature: f32,
    pub workflow_timeout_secs: u64,
    pub classifier_timeout_secs: u64,
}

impl GatewayConfig {
    pub fn workflow_timeout(&self) -> Duration {
        Duration::from_secs(self.workflow_timeout_secs)
    }

    pub fn classifier_timeout(&self) -> Duration {
        Duration::from_secs(self.classifier_timeout_secs)
    }
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            classifier_model: bloomed_gateway::DEFAULT_CLASSIFIER_MODEL.to_string(),
            classifier_base_url: bloomed_gateway::openai::client::OPENROUTER_API_BASE.to_string(),
            classifier_temperature: 0.2,
            workflow_timeout_secs: 30,
            classifier_timeout_secs: 15,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LimitsConfig {
    pub hourly: u64,
    pub daily: u64,
    pub key_prefix: String,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            hourly: 5,
            daily: 10,
            key_prefix: "dreamchat:ratelimit".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

impl Config {
    /// Load configuration from TOML files and environment variables
    ///
    /// Hierarchy (weakest to strongest):
    /// 1. config/default.toml
    /// 2. config/{ENV}.toml (if ENV is set)
    /// 3. Environment variables (SERVER_, LOG_, GATEWAY_, LIMITS_ prefixes)
    ///
    /// Secrets are never read from files. A missing secret disables the
    /// collaborator that needs it instead of failing startup.
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("ENV").unwrap_or_else(|_| "dev".to_string());

        let mut builder = ConfigLoader::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", env)).required(false));

        for (var, key) in ENV_OVERRIDES {
            builder = builder.set_override_option(*key, secret(var))?;
        }

        let mut cfg: Config = builder.build()?.try_deserialize()?;
        cfg.load_secrets();
        Ok(cfg)
    }

    /// Load config from a specific path (useful for testing)
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let builder = ConfigLoader::builder().add_source(File::from(path.as_ref()));

        let config = builder.build()?;
        config.try_deserialize()
    }

    fn load_secrets(&mut self) {
        self.webhook_url = secret("N8N_INTERNAL_WEBHOOK_URL");
        self.openrouter_api_key = secret("OPENROUTER_API_KEY");
        self.upstash_url = secret("UPSTASH_REDIS_REST_URL");
        self.upstash_token = secret("UPSTASH_REDIS_REST_TOKEN");
        self.supabase_url = secret("SUPABASE_URL");
        self.supabase_anon_key = secret("SUPABASE_ANON_KEY");
    }
}

fn secret(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
