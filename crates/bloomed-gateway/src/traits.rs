use anyhow::Result;
use async_trait::async_trait;

use bloomed_types::{DreamAnalysis, DreamSubmission, InterpretationResult};

use crate::message::Message;

/// Trait for chat-completion style LLM interactions
#[async_trait]
pub trait ChatClient: Send + Sync {
    /// Non-streaming chat completion
    async fn chat(&self, request: ChatRequest) -> Result<ChatResponse>;
}

/// The workflow automation service that writes the interpretation
#[async_trait]
pub trait WorkflowGateway: Send + Sync {
    async fn interpret(&self, submission: &DreamSubmission) -> crate::error::Result<InterpretationResult>;
}

/// Decides whether a text is a dream and extracts its metadata.
///
/// Infallible by contract: every failure collapses to `NotADream`.
#[async_trait]
pub trait DreamClassifier: Send + Sync {
    async fn classify(&self, text: &str) -> DreamAnalysis;

    /// Whether a model is actually behind this classifier
    fn is_configured(&self) -> bool {
        true
    }
}

#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub options: ChatOptions,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            model: model.into(),
            messages,
            options: ChatOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ChatOptions) -> Self {
        self.options = options;
        self
    }
}

#[derive(Debug, Clone, Default)]
pub struct ChatOptions {
    pub temperature: Option<f32>,
    /// Ask the provider for a bare JSON object (`response_format: json_object`)
    pub json_object: bool,
}

impl ChatOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp);
        self
    }

    pub fn json_object(mut self) -> Self {
        self.json_object = true;
        self
    }
}

#[derive(Debug, Clone)]
pub struct ChatResponse {
    pub content: Option<String>,
}
