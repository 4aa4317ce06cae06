//! Error types shared by every instasync crate.

use thiserror::Error;

/// Errors that can occur while fetching, decoding or storing sync data.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Configuration is missing or invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A required request parameter was not supplied.
    #[error("Missing required parameter: {0}")]
    MissingParameter(String),

    /// The upstream could not be reached (connection refused, DNS, timeout).
    #[error("Transport error: {0}")]
    Transport(String),

    /// The upstream answered with a non-success status.
    #[error("HTTP {status}: {body}")]
    Http { status: u16, body: String },

    /// The upstream kept answering 429 after the cooldown retry.
    #[error("Rate limit exceeded on {endpoint}")]
    RateLimited { endpoint: String },

    /// The cursor sequence is inconsistent.
    #[error("Pagination error: {0}")]
    Pagination(String),

    /// A response body or record could not be interpreted.
    #[error("Decode error: {0}")]
    Decode(String),

    /// The document store rejected an operation.
    #[error("Storage error: {0}")]
    Storage(String),

    /// A batch commit failed; earlier batches stay committed.
    #[error("Batch {batch} failed after {committed} committed batch(es): {reason}")]
    BatchCommit {
        batch: usize,
        committed: usize,
        reason: String,
    },

    /// The requested document or upstream resource does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Another sync run holds the run lock.
    #[error("A sync run is already in progress")]
    AlreadyRunning,

    /// Caller failed authentication.
    #[error("Unauthenticated: {0}")]
    Unauthenticated(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl SyncError {
    /// Returns `true` for transient upstream failures.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Transport(_) | Self::RateLimited { .. } => true,
            Self::Http { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }

    /// Returns `true` when the upstream API could not be reached at all.
    pub fn is_connection_failure(&self) -> bool {
        matches!(self, Self::Transport(_))
    }

    /// Short machine-readable category used in handler envelopes.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) => "config_error",
            Self::MissingParameter(_) => "missing_parameter",
            Self::Transport(_) => "upstream_unavailable",
            Self::Http { .. } => "upstream_error",
            Self::RateLimited { .. } => "rate_limited",
            Self::Pagination(_) => "pagination_error",
            Self::Decode(_) | Self::Serialization(_) => "decode_error",
            Self::Storage(_) => "storage_error",
            Self::BatchCommit { .. } => "batch_commit_failed",
            Self::NotFound(_) => "not_found",
            Self::AlreadyRunning => "sync_in_progress",
            Self::Unauthenticated(_) => "unauthenticated",
        }
    }
}
