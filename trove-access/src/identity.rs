//! Identity provider boundary
//!
//! Authentication happens elsewhere. This core only needs a stable user id
//! for the current session, or nothing when signed out.

use parking_lot::RwLock;
use uuid::Uuid;

use crate::error::{AccessError, AccessResult};

/// Supplies the signed-in user.
pub trait IdentityProvider: Send + Sync {
    /// Current user id, `None` when signed out.
    fn current_user(&self) -> Option<Uuid>;

    /// Current user id, or [`AccessError::SignedOut`].
    fn require_user(&self) -> AccessResult<Uuid> {
        self.current_user().ok_or(AccessError::SignedOut)
    }
}

/// Identity that changes only through explicit sign-in and sign-out.
///
/// # Examples
///
/// ```
/// use uuid::Uuid;
/// use trove_access::{IdentityProvider, SessionIdentity};
///
/// let identity = SessionIdentity::signed_out();
/// assert!(identity.current_user().is_none());
///
/// let user_id = Uuid::now_v7();
/// identity.sign_in(user_id);
/// assert_eq!(identity.current_user(), Some(user_id));
/// ```
#[derive(Debug, Default)]
pub struct SessionIdentity {
    user: RwLock<Option<Uuid>>,
}

impl SessionIdentity {
    pub fn signed_out() -> Self {
        Self::default()
    }

    pub fn signed_in(user_id: Uuid) -> Self {
        Self {
            user: RwLock::new(Some(user_id)),
        }
    }

    pub fn sign_in(&self, user_id: Uuid) {
        *self.user.write() = Some(user_id);
    }

    pub fn sign_out(&self) {
        *self.user.write() = None;
    }
}

impl IdentityProvider for SessionIdentity {
    fn current_user(&self) -> Option<Uuid> {
        *self.user.read()
    }
}
