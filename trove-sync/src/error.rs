//! Error types for store synchronization

use chrono::{DateTime, Utc};
use thiserror::Error;
use trove_access::AccessError;
use trove_events::AuditError;

use crate::store::StoreError;

/// Sync error types.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Target document does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Document was edited since the caller last saw it
    #[error("Conflict: document was edited at {current_edited_at}")]
    Conflict { current_edited_at: DateTime<Utc> },

    /// Caller lacks the required permission
    #[error(transparent)]
    Denied(AccessError),

    /// Remote store could not be reached
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Read-modify-write kept losing races
    #[error("Transaction aborted after {attempts} attempts")]
    TransactionAborted { attempts: u32 },

    /// Document could not be decoded or would be invalid after the change
    #[error("Invalid document: {0}")]
    InvalidDocument(String),

    /// Request is well-formed but not allowed by the tree's rules
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// No user is signed in
    #[error("No signed-in user")]
    SignedOut,
}

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

impl SyncError {
    /// Get error code for API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            SyncError::NotFound(_) => "NOT_FOUND",
            SyncError::Conflict { .. } => "CONFLICT",
            SyncError::Denied(_) => "DENIED",
            SyncError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            SyncError::TransactionAborted { .. } => "TRANSACTION_ABORTED",
            SyncError::InvalidDocument(_) => "INVALID_DOCUMENT",
            SyncError::InvalidRequest(_) => "INVALID_REQUEST",
            SyncError::SignedOut => "SIGNED_OUT",
        }
    }

    /// Whether repeating the same call unchanged may succeed.
    ///
    /// Conflict is terminal: the caller must re-read before trying again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SyncError::StoreUnavailable(_) | SyncError::TransactionAborted { .. }
        )
    }
}

impl From<AccessError> for SyncError {
    fn from(err: AccessError) -> Self {
        match err {
            AccessError::SignedOut => SyncError::SignedOut,
            denied => SyncError::Denied(denied),
        }
    }
}

impl From<AuditError> for SyncError {
    fn from(err: AuditError) -> Self {
        match err {
            AuditError::Store(msg) => SyncError::StoreUnavailable(msg),
            AuditError::Serialization(msg) => SyncError::InvalidDocument(msg),
        }
    }
}

impl From<StoreError> for SyncError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => SyncError::StoreUnavailable(msg),
            StoreError::Serialization(msg) => SyncError::InvalidDocument(msg),
            StoreError::InvalidPath(path) => SyncError::InvalidRequest(format!("invalid path {path}")),
            // Callers that expect precondition failures handle them before
            // converting; anything left over is a document that moved on.
            StoreError::PreconditionFailed { path, .. } => {
                SyncError::InvalidRequest(format!("precondition failed on {path}"))
            }
        }
    }
}
