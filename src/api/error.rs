//! API Error Types
//!
//! Errors returned by the REST client. A rejection carries the message
//! the server put in its body so it can be shown verbatim.

use serde::Deserialize;
use thiserror::Error;

/// Text shown when no structured error came back
pub const GENERIC_TRANSPORT_MESSAGE: &str = "Network error, please try again";

/// REST client errors
#[derive(Error, Debug)]
pub enum ApiError {
    /// No response was received
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    /// The request did not complete in time
    #[error("Request timeout")]
    Timeout,

    /// The server answered with an error status
    #[error("API error {status}: {message}")]
    Rejected { status: u16, message: String },

    /// The response body did not have the expected shape
    #[error("Unexpected response: {0}")]
    Decode(String),
}

impl ApiError {
    /// Map a reqwest failure the way the rest of the client expects
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::Timeout
        } else if err.is_decode() {
            ApiError::Decode(err.to_string())
        } else {
            ApiError::Transport(err)
        }
    }

    /// Build a rejection from a status code and raw response body.
    ///
    /// Uses the body's `message` field when there is one, otherwise the
    /// raw text, otherwise the status reason.
    pub fn rejected(status: reqwest::StatusCode, body: &str) -> Self {
        let message = serde_json::from_str::<RejectBody>(body)
            .ok()
            .and_then(|b| b.message)
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| {
                if body.trim().is_empty() {
                    status
                        .canonical_reason()
                        .unwrap_or("Request rejected")
                        .to_string()
                } else {
                    body.trim().to_string()
                }
            });

        ApiError::Rejected {
            status: status.as_u16(),
            message,
        }
    }

    /// Text to surface in session or mutation error state
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Rejected { message, .. } => message.clone(),
            ApiError::Transport(_) | ApiError::Timeout => GENERIC_TRANSPORT_MESSAGE.to_string(),
            ApiError::Decode(msg) => msg.clone(),
        }
    }

    /// Whether the server refused our credentials
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Rejected { status: 401 | 403, .. })
    }
}

/// Error body shape used by the GymSense API
#[derive(Debug, Deserialize)]
struct RejectBody {
    #[serde(default)]
    message: Option<String>,
}

/// Result type for API operations
pub type ApiResult<T> = Result<T, ApiError>;
