//! User-facing outcome of an action.
//!
//! Every failure at the API boundary ends up here as a string the user can
//! read; nothing propagates as an unhandled fault.

use thiserror::Error;

use crate::availability::Ineligible;
use crate::error::ApiError;
use crate::validation::ValidationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
}

/// The banner shown at the top of a screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub text: String,
}

impl Notice {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Success,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Error,
            text: text.into(),
        }
    }

    pub fn is_error(&self) -> bool {
        self.kind == NoticeKind::Error
    }
}

impl std::fmt::Display for Notice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.text)
    }
}

/// A failed user action. `Display` is the text to show.
#[derive(Debug, Error)]
pub enum ActionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Ineligible(#[from] Ineligible),

    #[error("{message}")]
    Api {
        message: String,
        #[source]
        source: ApiError,
    },

    #[error("{0}")]
    Rejected(String),
}

impl ActionError {
    /// Wrap an API failure, preferring the server's message over `fallback`.
    pub fn api(source: ApiError, fallback: &str) -> Self {
        ActionError::Api {
            message: source.user_message(fallback),
            source,
        }
    }

    pub fn api_source(&self) -> Option<&ApiError> {
        match self {
            ActionError::Api { source, .. } => Some(source),
            _ => None,
        }
    }
}

impl From<&ActionError> for Notice {
    fn from(err: &ActionError) -> Self {
        Notice::error(err.to_string())
    }
}

pub type ActionResult<T> = Result<T, ActionError>;

/// Extension for mapping API results onto user actions.
pub trait OrNotice<T> {
    fn or_notice(self, fallback: &str) -> ActionResult<T>;
}

impl<T> OrNotice<T> for Result<T, ApiError> {
    fn or_notice(self, fallback: &str) -> ActionResult<T> {
        self.map_err(|e| {
            tracing::warn!("{}: {}", fallback, e);
            ActionError::api(e, fallback)
        })
    }
}
