//! Error types shared by the collaborators and the reply consumer

use thiserror::Error;

/// Errors raised by a backend collaborator
#[derive(Debug, Error)]
pub enum BackendError {
    /// Transport-level failure
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Backend answered with a non-success status
    #[error("backend returned {status}: {body}")]
    Status {
        /// HTTP status code
        status: u16,
        /// Response body (may be empty)
        body: String,
    },

    /// Requested resource does not exist (e.g. no model loaded)
    #[error("not found: {0}")]
    NotFound(String),

    /// Response body could not be decoded
    #[error("invalid response: {0}")]
    Decode(#[from] serde_json::Error),

    /// Incremental stream broke mid-flight
    #[error("stream interrupted: {0}")]
    Stream(String),

    /// Unknown task or other collaborator-specific failure
    #[error("{0}")]
    Other(String),
}

impl BackendError {
    /// Whether this error means "the thing is absent" rather than a fault
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// Reply could not be obtained by either path
#[derive(Debug, Error)]
pub enum StreamError {
    /// Streaming failed and the single fallback request failed too
    #[error("streaming failed ({stream}); fallback request failed: {fallback}")]
    FallbackFailed {
        /// Why the stream was abandoned
        stream: String,
        /// Why the fallback request failed
        #[source]
        fallback: BackendError,
    },
}
