use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Upper bound on dream text, counted in characters after trimming.
pub const MAX_DREAM_CHARS: usize = 5000;

/// Payload of a single dream submission.
///
/// Created client-side per user action and validated server-side. The
/// timestamp and session id are forwarded to the workflow gateway as-is.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "camelCase")]
pub struct DreamSubmission {
    pub dream_text: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(default)]
    pub session_id: String,
}

impl DreamSubmission {
    pub fn new(
        dream_text: impl Into<String>,
        timestamp: impl Into<String>,
        session_id: impl Into<String>,
    ) -> Self {
        Self {
            dream_text: dream_text.into(),
            timestamp: timestamp.into(),
            session_id: session_id.into(),
        }
    }

    /// Check the dream text bounds: non-empty and at most
    /// [`MAX_DREAM_CHARS`] characters once surrounding whitespace is removed.
    pub fn validate(&self) -> Result<(), DreamTextProblem> {
        validate_dream_text(&self.dream_text)
    }
}

/// Why a dream text was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DreamTextProblem {
    Empty,
    TooLong,
}

impl DreamTextProblem {
    pub fn message(&self) -> &'static str {
        match self {
            DreamTextProblem::Empty => "Dream text cannot be empty.",
            DreamTextProblem::TooLong => {
                "Dream text is too long. Please keep it under 5000 characters."
            }
        }
    }
}

impl fmt::Display for DreamTextProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

pub fn validate_dream_text(text: &str) -> Result<(), DreamTextProblem> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(DreamTextProblem::Empty);
    }
    if trimmed.chars().count() > MAX_DREAM_CHARS {
        return Err(DreamTextProblem::TooLong);
    }
    Ok(())
}

/// Dominant feeling of a dream, as picked by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[cfg_attr(feature = "openapi", derive(utoipa::ToSchema))]
#[serde(rename_all = "lowercase")]
pub enum Mood {
    #[default]
    Neutral,
    Happy,
    Sad,
    Anxious,
    Exciting,
    Fearful,
    Confused,
}

impl Mood {
    pub const ALL: [Mood; 7] = [
        Mood::Neutral,
        Mood::Happy,
        Mood::Sad,
        Mood::Anxious,
        Mood::Exciting,
        Mood::Fearful,
        Mood::Confused,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Mood::Neutral => "neutral",
            Mood::Happy => "happy",
            Mood::Sad => "sad",
            Mood::Anxious => "anxious",
            Mood::Exciting => "exciting",
            Mood::Fearful => "fearful",
            Mood::Confused => "confused",
        }
    }
}

impl fmt::Display for Mood {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Mood {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Mood::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == needle)
            .ok_or_else(|| format!("unknown mood: {}", s))
    }
}

/// Structured metadata extracted from a text that is a dream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DreamDetails {
    pub title: String,
    pub mood: Mood,
    pub tags: Vec<String>,
}

/// Classification outcome for one submission. Only gates persistence.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DreamAnalysis {
    #[default]
    NotADream,
    Dream(DreamDetails),
}

impl DreamAnalysis {
    pub fn is_dream(&self) -> bool {
        matches!(self, DreamAnalysis::Dream(_))
    }

    pub fn details(&self) -> Option<&DreamDetails> {
        match self {
            DreamAnalysis::Dream(details) => Some(details),
            DreamAnalysis::NotADream => None,
        }
    }
}

/// Interpretation text returned by the workflow gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterpretationResult {
    pub text: String,
}

impl InterpretationResult {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}
