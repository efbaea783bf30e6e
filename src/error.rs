use reqwest::StatusCode;
use thiserror::Error;

/// Failures talking to the booking API.
///
/// Screens never show these raw: they call [`ApiError::user_message`] with
/// their own fallback text, which prefers whatever the server said.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("API returned error status: {status}{}", .message.as_deref().map(|m| format!(" ({m})")).unwrap_or_default())]
    Rejected {
        status: StatusCode,
        message: Option<String>,
    },

    #[error("session rejected by the API ({status})")]
    Unauthorized {
        status: StatusCode,
        message: Option<String>,
    },

    #[error("failed to parse API response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("not logged in")]
    NotLoggedIn,

    #[error("invalid API URL: {0}")]
    InvalidUrl(String),
}

impl ApiError {
    /// The server's own explanation, if it sent one.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ApiError::Rejected { message, .. } | ApiError::Unauthorized { message, .. } => {
                message.as_deref()
            }
            _ => None,
        }
    }

    /// Text to show the user: the server's message verbatim, else `fallback`.
    pub fn user_message(&self, fallback: &str) -> String {
        self.server_message().unwrap_or(fallback).to_string()
    }

    pub fn status(&self) -> Option<StatusCode> {
        match self {
            ApiError::Rejected { status, .. } | ApiError::Unauthorized { status, .. } => {
                Some(*status)
            }
            ApiError::Transport(e) => e.status(),
            _ => None,
        }
    }

    /// Whether the stored session should be discarded.
    pub fn is_auth_failure(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. } | ApiError::NotLoggedIn)
    }

    /// Build the error for a non-success response body.
    pub(crate) fn from_response(status: StatusCode, body: &str) -> Self {
        let message = extract_message(body);
        if status == StatusCode::UNAUTHORIZED {
            ApiError::Unauthorized { status, message }
        } else {
            ApiError::Rejected { status, message }
        }
    }
}

/// Pull `msg` (or `message`/`error`) out of an error body.
fn extract_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    ["msg", "message", "error"]
        .iter()
        .find_map(|key| value.get(key)?.as_str())
        .map(str::to_string)
        .filter(|m| !m.trim().is_empty())
}

pub type ApiResult<T> = Result<T, ApiError>;
