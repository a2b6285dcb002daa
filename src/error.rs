use std::time::Duration;
use thiserror::Error;

/// Everything that can make a generation call fail.
///
/// All variants are transport failures from the caller's point of view; the
/// client never retries and never caches the output of a failed call.
#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("backend returned {status}: {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("event stream is not valid UTF-8: {0}")]
    Decode(#[from] std::string::FromUtf8Error),

    #[error("invalid response body: {0}")]
    Json(#[from] serde_json::Error),

    #[error("no data received for {0:?}")]
    IdleTimeout(Duration),
}

pub type Result<T> = std::result::Result<T, GenerationError>;
