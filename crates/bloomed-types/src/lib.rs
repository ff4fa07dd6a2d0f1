pub mod api;
pub mod chat;
pub mod dream;
pub mod journal;
pub mod limits;

pub use api::{DreamResponse, ErrorBody, ThrottledBody};
pub use chat::ChatMessage;
pub use dream::{
    validate_dream_text, DreamAnalysis, DreamDetails, DreamSubmission, DreamTextProblem,
    InterpretationResult, Mood, MAX_DREAM_CHARS,
};
pub use journal::{JournalEntry, NewJournalEntry};
pub use limits::{RateLimitDecision, RateLimitScope};
