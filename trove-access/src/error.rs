//! Error types for access checks
//!
//! The resolver itself only answers yes or no. These errors are what callers
//! raise when they turn a `false` into a refusal.

use thiserror::Error;
use trove_rbac::Permission;
use uuid::Uuid;

/// Access error types.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AccessError {
    /// User lacks the permission at the resolved scope
    #[error("Forbidden: user {user_id} lacks {permission} on {target}")]
    Denied {
        user_id: Uuid,
        permission: Permission,
        /// Document path of the most specific scope checked
        target: String,
    },

    /// Operation reserved to owners of the container
    #[error("Forbidden: user {user_id} does not own container {container_id}")]
    NotOwner { user_id: Uuid, container_id: Uuid },

    /// No user is signed in
    #[error("No signed-in user")]
    SignedOut,
}

/// Result type for access operations.
pub type AccessResult<T> = Result<T, AccessError>;

impl AccessError {
    /// Get HTTP-style status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            AccessError::Denied { .. } | AccessError::NotOwner { .. } => 403,
            AccessError::SignedOut => 401,
        }
    }

    /// Get error code for API responses.
    pub fn error_code(&self) -> &'static str {
        match self {
            AccessError::Denied { .. } => "DENIED",
            AccessError::NotOwner { .. } => "NOT_OWNER",
            AccessError::SignedOut => "SIGNED_OUT",
        }
    }
}
