use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Store responded with {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Command failed: {0}")]
    Command(String),

    #[error("Unexpected reply: {0}")]
    UnexpectedReply(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
