use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum YouTubeError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid API url: {0}")]
    Url(#[from] url::ParseError),

    #[error("API key was rejected: {0}")]
    InvalidApiKey(String),

    #[error("quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("API returned status {status}: {message}")]
    Status { status: StatusCode, message: String },

    #[error("failed to parse response: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("unexpected item kind: {0}")]
    UnexpectedKind(String),

    #[error("invalid timestamp: {0:?}")]
    InvalidTimestamp(String),

    #[error("failed to format timestamp: {0}")]
    Format(#[from] time::error::Format),
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{key} is not a valid url: {reason}")]
    InvalidUrl { key: &'static str, reason: String },

    #[error("{key} must be a boolean, got {value:?}")]
    InvalidBool { key: &'static str, value: String },
}

/// Google's JSON error envelope: `{"error": {"code", "message", "errors": [{"reason"}]}}`
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    reason: String,
}

impl YouTubeError {
    /// Classify a non-success response from its status and raw body.
    pub fn from_response(status: StatusCode, body: &str) -> Self {
        let Ok(envelope) = serde_json::from_str::<ErrorEnvelope>(body) else {
            return YouTubeError::Status {
                status,
                message: body.trim().to_string(),
            };
        };

        let message = envelope.error.message;
        let has_reason = |r: &str| envelope.error.errors.iter().any(|e| e.reason == r);

        if has_reason("keyInvalid") || status == StatusCode::UNAUTHORIZED {
            YouTubeError::InvalidApiKey(message)
        } else if has_reason("quotaExceeded") || has_reason("dailyLimitExceeded") {
            YouTubeError::QuotaExceeded(message)
        } else {
            YouTubeError::Status { status, message }
        }
    }
}
