//! Error types for the YApi cache layer.
//!
//! [`BackendError`] is the only error that reaches tool handlers. Storage and
//! credential errors are recovered locally and only surface in logs.

use std::time::Duration;

use thiserror::Error;

pub type BackendResult<T> = Result<T, BackendError>;

#[derive(Debug, Error)]
pub enum BackendError {
    /// Token missing from the credential table or rejected by the backend.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Non-zero application error code returned by the backend.
    #[error("Backend error {code}: {message}")]
    Remote { code: i64, message: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Malformed backend response: {0}")]
    Decode(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// On-demand fetch suppressed while a recent failure is backing off.
    #[error("Backing off '{key}' after repeated failures, retry in {retry_after:?}")]
    BackingOff { key: String, retry_after: Duration },
}

impl BackendError {
    /// Transient errors are worth retrying; everything else is final.
    pub fn is_transient(&self) -> bool {
        matches!(self, BackendError::Transport(_))
    }
}

impl From<reqwest::Error> for BackendError {
    // The request URL carries the project token in its query string.
    fn from(err: reqwest::Error) -> Self {
        let err = err.without_url();
        if err.is_decode() {
            BackendError::Decode(err.to_string())
        } else if err.is_timeout() {
            BackendError::Transport(format!("request timed out: {}", err))
        } else {
            BackendError::Transport(err.to_string())
        }
    }
}

/// Durable snapshot errors. Never propagated past the cache.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("Snapshot schema version {found} does not match expected {expected}")]
    SchemaMismatch { found: u32, expected: u32 },

    #[error("Snapshot has no creation timestamp")]
    MissingTimestamp,
}

/// Problems found in a credential segment. Only `EmptyToken` keeps the entry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CredentialError {
    #[error("entry {index} has no ':' separator")]
    MissingSeparator { index: usize },

    #[error("entry {index} has an empty project id")]
    EmptyProjectId { index: usize },

    #[error("entry {index} (project '{project_id}') has an empty token")]
    EmptyToken { index: usize, project_id: String },
}
