use thiserror::Error;

#[derive(Error, Debug)]
pub enum WidgetError {
    #[error("Please describe your dream first.")]
    EmptyDream,

    #[error("Please wait, previous request is processing.")]
    Busy,

    #[error("Session ID is missing. Cannot send message.")]
    NoSession,

    /// 429 from the server; `scope` is `hourly`, `daily` or empty
    #[error("{message}")]
    Throttled { scope: String, message: String },

    #[error("{message}")]
    Rejected { status: u16, message: String },

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, WidgetError>;
