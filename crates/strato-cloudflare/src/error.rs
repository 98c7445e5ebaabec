//! Cloudflare provider error types
//!
//! The API boundary produces structured [`ApiError`] values carrying the
//! HTTP status and the numeric error codes from the response envelope.
//! Reconcilers classify failures by status and code, never by matching
//! message text.

use strato_reconcile::{ImportIdError, PollError};
use thiserror::Error;

/// A failure reported by the Cloudflare API.
///
/// Carries the HTTP status plus every numeric error code found in the
/// response envelope so callers can match on stable categories.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiError {
    pub status: u16,
    pub codes: Vec<i32>,
    pub message: String,
}

impl ApiError {
    /// Whether the remote entity does not exist.
    pub fn is_not_found(&self) -> bool {
        self.status == 404
    }

    /// Whether the envelope contained the given provider error code.
    pub fn has_code(&self, code: i32) -> bool {
        self.codes.contains(&code)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.codes.is_empty() {
            write!(f, "HTTP status {}: {}", self.status, self.message)
        } else {
            write!(
                f,
                "HTTP status {}: {} (codes {:?})",
                self.status, self.message, self.codes
            )
        }
    }
}

impl std::error::Error for ApiError {}

/// Cloudflare provider errors
#[derive(Error, Debug)]
pub enum Error {
    #[error("Cloudflare API error: {0}")]
    Api(#[from] ApiError),

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error(transparent)]
    InvalidImportId(#[from] ImportIdError),

    #[error("failed to find id in {op} response for {resource}; resource was empty")]
    MissingId {
        resource: &'static str,
        op: &'static str,
    },

    #[error("timed out waiting for {resource} after {attempts} attempts: {last}")]
    PollTimeout {
        resource: &'static str,
        attempts: u32,
        last: String,
    },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    #[error("API response for {path} contained no result")]
    EmptyResult { path: String },

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{context}: {source}")]
    Context {
        context: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Annotate this error with operation context (resource kind, scope,
    /// identifier). Classification helpers see through the annotation.
    pub fn context(self, context: impl Into<String>) -> Error {
        Error::Context {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Whether the underlying failure means the remote entity is absent.
    pub fn is_not_found(&self) -> bool {
        match self {
            Error::Api(api) => api.is_not_found(),
            Error::Context { source, .. } => source.is_not_found(),
            _ => false,
        }
    }

    /// Whether the underlying API failure carried the given error code.
    pub fn has_code(&self, code: i32) -> bool {
        match self {
            Error::Api(api) => api.has_code(code),
            Error::Context { source, .. } => source.has_code(code),
            _ => false,
        }
    }

    /// Collapse a polling outcome into a provider error.
    pub(crate) fn from_poll(resource: &'static str, err: PollError<Error>) -> Error {
        match err {
            PollError::Aborted(inner) => inner,
            PollError::TimedOut { attempts, last } => Error::PollTimeout {
                resource,
                attempts,
                last,
            },
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    fn not_found() -> ApiError {
        ApiError {
            status: 404,
            codes: vec![10007],
            message: "filter not found".to_string(),
        }
    }

    #[test]
    fn classification_sees_through_context() {
        let err = Error::from(not_found()).context("error finding filter \"abc\"");
        assert!(err.is_not_found());
        assert!(err.has_code(10007));
        assert!(!err.has_code(1414));
    }

    #[test]
    fn context_is_part_of_the_message() {
        let err = Error::from(not_found()).context("error finding filter \"abc\"");
        let rendered = err.to_string();
        assert!(rendered.contains("error finding filter"));
    }

    #[test]
    fn transport_errors_are_not_not_found() {
        let err = Error::MissingId {
            resource: "filter",
            op: "create",
        };
        assert!(!err.is_not_found());
    }
}
