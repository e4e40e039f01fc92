//! Structured error types for the retrieval engine
//!
//! Errors are categorized along the taxonomy the engine promises its
//! callers: invalid queries fail fast and loudly, transient external
//! failures degrade silently, data inconsistencies are repaired in the
//! background. Only the first category ever reaches the caller as an error.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Machine-readable error payload for embedding callers
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error code
    pub code: String,

    /// Human-readable error message
    pub message: String,
}

/// Engine error types with proper categorization
#[derive(Debug)]
pub enum RecallError {
    /// Malformed query rejected before any I/O
    InvalidQuery { field: String, reason: String },

    /// A referenced memory record does not exist
    RecordNotFound(String),

    /// Vector dimension does not match the index
    DimensionMismatch { expected: usize, actual: usize },

    /// External vector/embedding service failed after retries
    VectorServiceUnavailable(String),

    /// External graph-query service failed after retries
    GraphServiceUnavailable(String),

    /// Configuration rejected at startup (e.g. weights not summing to 1.0)
    InvalidConfig(String),

    /// Generic wrapper for internal errors
    Internal(anyhow::Error),
}

impl RecallError {
    /// Get error code for client identification
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidQuery { .. } => "INVALID_QUERY",
            Self::RecordNotFound(_) => "RECORD_NOT_FOUND",
            Self::DimensionMismatch { .. } => "DIMENSION_MISMATCH",
            Self::VectorServiceUnavailable(_) => "VECTOR_SERVICE_UNAVAILABLE",
            Self::GraphServiceUnavailable(_) => "GRAPH_SERVICE_UNAVAILABLE",
            Self::InvalidConfig(_) => "INVALID_CONFIG",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Whether this error represents a transient external failure
    ///
    /// Transient failures are retried and then degraded to partial results;
    /// they are never surfaced to the caller as a hard failure.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::VectorServiceUnavailable(_) | Self::GraphServiceUnavailable(_)
        )
    }

    /// Convenience constructor for query-validation failures
    pub fn invalid_query(field: &str, reason: impl Into<String>) -> Self {
        Self::InvalidQuery {
            field: field.to_string(),
            reason: reason.into(),
        }
    }

    /// Serialize into the structured payload callers log or forward
    pub fn detail(&self) -> ErrorDetail {
        ErrorDetail {
            code: self.code().to_string(),
            message: self.to_string(),
        }
    }
}

impl fmt::Display for RecallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidQuery { field, reason } => {
                write!(f, "invalid query: field '{field}': {reason}")
            }
            Self::RecordNotFound(id) => write!(f, "memory record not found: {id}"),
            Self::DimensionMismatch { expected, actual } => {
                write!(f, "vector dimension mismatch: expected {expected}, got {actual}")
            }
            Self::VectorServiceUnavailable(msg) => {
                write!(f, "vector service unavailable: {msg}")
            }
            Self::GraphServiceUnavailable(msg) => {
                write!(f, "graph service unavailable: {msg}")
            }
            Self::InvalidConfig(msg) => write!(f, "invalid configuration: {msg}"),
            Self::Internal(err) => write!(f, "internal error: {err}"),
        }
    }
}

impl std::error::Error for RecallError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Internal(err) => err.source(),
            _ => None,
        }
    }
}

impl From<anyhow::Error> for RecallError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err)
    }
}

/// Result alias for engine-surface operations
pub type RecallResult<T> = Result<T, RecallError>;
