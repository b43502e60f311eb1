//! Error types for the LLM layer.

use thiserror::Error;

/// Result type for LLM calls.
pub type Result<T> = std::result::Result<T, AiError>;

/// Errors from credential loading and the Messages API.
#[derive(Debug, Error)]
pub enum AiError {
    /// No usable API key
    #[error("ANTHROPIC_API_KEY is not set")]
    MissingCredential,

    /// Transport failure, including request timeouts
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-success status from the API
    #[error("api returned {status}: {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Message from the error body, or the raw body
        message: String,
    },

    /// Reply carried no text block
    #[error("response contained no text")]
    EmptyResponse,

    /// No time left to make the call
    #[error("deadline passed before the request was sent")]
    DeadlineExceeded,
}

impl AiError {
    /// Whether the request ran out of time.
    pub fn is_timeout(&self) -> bool {
        match self {
            AiError::Http(e) => e.is_timeout(),
            AiError::DeadlineExceeded => true,
            _ => false,
        }
    }
}
