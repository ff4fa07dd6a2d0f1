use thiserror::Error;

/// Failures of the workflow gateway. Any of these fails the submission.
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Workflow request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Workflow responded with {status}: {detail}")]
    Status { status: u16, detail: String },

    #[error("Workflow response was malformed: {0}")]
    Malformed(String),

    #[error("Workflow timed out after {0}s")]
    Timeout(u64),
}

pub type Result<T> = std::result::Result<T, GatewayError>;
