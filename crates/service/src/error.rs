//! Typed error enum for the service layer.
//!
//! Unifies storage and LLM failures with the synchronizer's own failure
//! modes (timeouts, cancellation) so handlers can match on them.

use std::time::Duration;

use analysis_console_llm::LlmError;
use analysis_console_storage::StorageError;
use thiserror::Error;

/// Service-layer error.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Storage operation failed (DB, not found, duplicate, blob io).
    #[error("storage: {0}")]
    Storage(#[from] StorageError),

    /// Generation endpoint call failed.
    #[error("llm: {0}")]
    Llm(#[from] LlmError),

    /// Caller provided invalid input (empty text, out-of-range ordinal).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Addressed entity does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// Required backend (generation endpoint) is not configured.
    #[error("not configured: {0}")]
    NotConfigured(String),

    /// A remote call did not answer in time. Its effect is unknown.
    #[error("{operation} timed out after {after:?}")]
    Timeout { operation: &'static str, after: Duration },

    /// The thread was detached while the call was in flight.
    #[error("thread {0} was detached; operation cancelled")]
    Cancelled(String),

    /// The thread was reloaded or cleared while a result was in flight.
    #[error("thread {0} changed while the call was in flight")]
    Superseded(String),
}

impl ServiceError {
    /// Whether this error is likely transient (worth retrying).
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Storage(e) => e.is_transient(),
            Self::Llm(e) => e.is_transient(),
            Self::Timeout { .. } | Self::Superseded(_) => true,
            _ => false,
        }
    }

    /// Whether this error represents a not-found condition.
    pub fn is_not_found(&self) -> bool {
        match self {
            Self::NotFound(_) => true,
            Self::Storage(e) => e.is_not_found(),
            _ => false,
        }
    }

    /// Whether this error represents a duplicate/conflict.
    pub fn is_duplicate(&self) -> bool {
        matches!(self, Self::Storage(e) if e.is_duplicate())
    }
}
