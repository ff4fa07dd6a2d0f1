use async_trait::async_trait;
use serde::Deserialize;
use std::sync::Arc;
use std::time::Duration;

use bloomed_types::{DreamAnalysis, DreamDetails, Mood};

use crate::message::Message;
use crate::traits::{ChatClient, ChatOptions, ChatRequest, DreamClassifier};

pub const DEFAULT_CLASSIFIER_MODEL: &str = "google/gemini-2.5-flash-preview-09-2025";
const UNTITLED: &str = "Untitled Dream";
const MAX_TAGS: usize = 5;

pub const CLASSIFIER_SYSTEM_PROMPT: &str = r#"You are the dream analysis assistant of the Bloomed Dreams app. Analyze the user's message and answer with a single JSON object, nothing else.

Rules:
1. First decide whether the message describes a dream.
2. If it is NOT a dream (a greeting, a question, small talk), answer: {"isDream": false}
3. If it IS a dream, answer with:
   - "isDream": true
   - "title": a short poetic title for the dream (3 to 7 words)
   - "mood": the main feeling, exactly one of "neutral", "happy", "sad", "anxious", "exciting", "fearful", "confused"
   - "tags": an array of 3 to 5 unique lowercase keywords naming the dream's main elements

Dream example: "I dreamed I was flying over a crystal city and felt free"
Answer: {"isDream": true, "title": "Flight Over the Crystal City", "mood": "happy", "tags": ["flying", "city", "crystal", "freedom"]}

Non-dream example: "hi, how are you"
Answer: {"isDream": false}"#;

/// Classifier backed by a chat-completion model.
///
/// Never fails: a missing client, empty input, transport error, timeout or
/// undecodable answer all yield `NotADream`.
pub struct LlmClassifier {
    client: Option<Arc<dyn ChatClient>>,
    model: String,
    temperature: f32,
    timeout: Duration,
}

impl LlmClassifier {
    pub fn new(client: Arc<dyn ChatClient>, model: impl Into<String>) -> Self {
        Self {
            client: Some(client),
            model: model.into(),
            temperature: 0.2,
            timeout: Duration::from_secs(15),
        }
    }

    /// A classifier with no model behind it, used when no API key is set
    pub fn unconfigured() -> Self {
        Self {
            client: None,
            model: DEFAULT_CLASSIFIER_MODEL.to_string(),
            temperature: 0.2,
            timeout: Duration::from_secs(15),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl DreamClassifier for LlmClassifier {
    async fn classify(&self, text: &str) -> DreamAnalysis {
        let Some(client) = &self.client else {
            tracing::error!("Classifier API key is not configured");
            return DreamAnalysis::NotADream;
        };
        if text.trim().is_empty() {
            return DreamAnalysis::NotADream;
        }

        let request = ChatRequest::new(
            self.model.clone(),
            vec![Message::system(CLASSIFIER_SYSTEM_PROMPT), Message::human(text)],
        )
        .with_options(ChatOptions::new().temperature(self.temperature).json_object());

        let response = match tokio::time::timeout(self.timeout, client.chat(request)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                tracing::error!(error = %e, "Classification call failed");
                return DreamAnalysis::NotADream;
            }
            Err(_) => {
                tracing::error!(timeout_secs = self.timeout.as_secs(), "Classification call timed out");
                return DreamAnalysis::NotADream;
            }
        };

        let Some(content) = response.content else {
            tracing::warn!("Classification response had no content");
            return DreamAnalysis::NotADream;
        };
        tracing::debug!(raw = %content, "Classifier output");
        decode_analysis(&content)
    }

    fn is_configured(&self) -> bool {
        self.client.is_some()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawAnalysis {
    is_dream: bool,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    mood: Option<String>,
    #[serde(default)]
    tags: Option<Vec<String>>,
}

/// Decode model output into a [`DreamAnalysis`].
///
/// Markdown code fences around the object are tolerated. `isDream` must be a
/// boolean, `mood` one of the known moods and `tags` an array of strings;
/// any violation decodes to `NotADream`.
pub fn decode_analysis(raw: &str) -> DreamAnalysis {
    let json = strip_code_fences(raw);
    let parsed: RawAnalysis = match serde_json::from_str(json) {
        Ok(parsed) => parsed,
        Err(e) => {
            tracing::warn!(error = %e, "Classifier output is not a valid analysis");
            return DreamAnalysis::NotADream;
        }
    };

    if !parsed.is_dream {
        return DreamAnalysis::NotADream;
    }

    let mood = match parsed.mood.as_deref() {
        None => Mood::Neutral,
        Some(m) => match m.parse::<Mood>() {
            Ok(mood) => mood,
            Err(e) => {
                tracing::warn!(error = %e, "Classifier returned an unknown mood");
                return DreamAnalysis::NotADream;
            }
        },
    };

    let title = parsed
        .title
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| UNTITLED.to_string());

    let mut tags: Vec<String> = Vec::new();
    for tag in parsed.tags.unwrap_or_default() {
        let tag = tag.trim().to_lowercase();
        if !tag.is_empty() && !tags.contains(&tag) {
            tags.push(tag);
        }
    }
    tags.truncate(MAX_TAGS);

    DreamAnalysis::Dream(DreamDetails { title, mood, tags })
}

fn strip_code_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
