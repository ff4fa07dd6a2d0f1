pub mod classifier;
pub mod error;
pub mod message;
pub mod openai;
pub mod traits;
pub mod workflow;

pub use classifier::{
    decode_analysis, LlmClassifier, CLASSIFIER_SYSTEM_PROMPT, DEFAULT_CLASSIFIER_MODEL,
};
pub use error::GatewayError;
pub use message::Message;
pub use openai::OpenAIClient;
pub use traits::{
    ChatClient, ChatOptions, ChatRequest, ChatResponse, DreamClassifier, WorkflowGateway,
};
pub use workflow::WebhookWorkflowClient;
