use std::sync::Arc;

use bloomed_gateway::{
    DreamClassifier, LlmClassifier, OpenAIClient, WebhookWorkflowClient, WorkflowGateway,
};
use bloomed_store::{
    AuthStore, CounterStore, JournalStore, MetricsSink, PersistenceGate, RateLimiter,
    SupabaseClient, UpstashCounterStore, WindowSpec,
};

use crate::config::Config;

/// Shared application state passed to all handlers
///
/// Every collaborator is constructed once at startup and injected here, so
/// tests can swap any of them for an in-memory fake. An absent collaborator
/// disables its feature rather than failing requests.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub limiter: RateLimiter,
    pub metrics: MetricsSink,
    pub workflow: Option<Arc<dyn WorkflowGateway>>,
    pub classifier: Arc<dyn DreamClassifier>,
    pub auth: Option<Arc<dyn AuthStore>>,
    pub gate: PersistenceGate,
}

impl AppState {
    /// State with every collaborator disabled
    pub fn new(config: Config) -> Self {
        Self {
            config: Arc::new(config),
            limiter: RateLimiter::disabled(),
            metrics: MetricsSink::disabled(),
            workflow: None,
            classifier: Arc::new(LlmClassifier::unconfigured()),
            auth: None,
            gate: PersistenceGate::disabled(),
        }
    }

    /// Build the real HTTP collaborators from configured secrets
    pub fn from_config(config: Config) -> anyhow::Result<Self> {
        let mut state = Self::new(config.clone());

        match (&config.upstash_url, &config.upstash_token) {
            (Some(url), Some(token)) => {
                tracing::info!("Using Upstash counter store");
                state = state.with_counter_store(Arc::new(UpstashCounterStore::new(url, token)?));
            }
            _ => {
                tracing::warn!("Upstash Redis is not configured; rate limiting and metrics are disabled");
            }
        }

        match &config.webhook_url {
            Some(url) => {
                let client = WebhookWorkflowClient::new(url, config.gateway.workflow_timeout())?;
                state = state.with_workflow(Arc::new(client));
            }
            None => {
                tracing::warn!("N8N_INTERNAL_WEBHOOK_URL is not set; /dream will answer 500");
            }
        }

        match &config.openrouter_api_key {
            Some(key) => {
                let client = OpenAIClient::with_timeout(key, Some(config.gateway.classifier_timeout()))?
                    .with_base_url(&config.gateway.classifier_base_url);
                let classifier = LlmClassifier::new(Arc::new(client), &config.gateway.classifier_model)
                    .with_temperature(config.gateway.classifier_temperature)
                    .with_timeout(config.gateway.classifier_timeout());
                state = state.with_classifier(Arc::new(classifier));
            }
            None => {
                tracing::warn!("OPENROUTER_API_KEY is not set; no dream will be classified or saved");
            }
        }

        match (&config.supabase_url, &config.supabase_anon_key) {
            (Some(url), Some(key)) => {
                let supabase = Arc::new(SupabaseClient::builder().url(url).anon_key(key).build()?);
                state = state
                    .with_auth(supabase.clone())
                    .with_journal(supabase);
            }
            _ => {
                tracing::warn!("Supabase is not configured; all callers are anonymous");
            }
        }

        Ok(state)
    }

    /// Enable rate limiting and metrics on top of `store`
    pub fn with_counter_store(mut self, store: Arc<dyn CounterStore>) -> Self {
        let limits = &self.config.limits;
        self.metrics = MetricsSink::new(store.clone());
        self.limiter = RateLimiter::new(
            store,
            WindowSpec::hourly(limits.hourly),
            WindowSpec::daily(limits.daily),
            self.metrics.clone(),
        )
        .with_key_prefix(limits.key_prefix.clone());
        self
    }

    pub fn with_workflow(mut self, workflow: Arc<dyn WorkflowGateway>) -> Self {
        self.workflow = Some(workflow);
        self
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn DreamClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_auth(mut self, auth: Arc<dyn AuthStore>) -> Self {
        self.auth = Some(auth);
        self
    }

    pub fn with_journal(mut self, journal: Arc<dyn JournalStore>) -> Self {
        self.gate = PersistenceGate::new(journal);
        self
    }
}
