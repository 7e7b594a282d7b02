//! Membership domain models
//!
//! A membership links a user to a container with a role. OWNER memberships
//! mean full access; DELEGATE memberships carry an explicit permission set.
//! Memberships are never deleted: revocation keeps the row for history.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use trove_rbac::{PermissionSet, RoleLabel};

/// Container-wide role.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MembershipRole {
    /// Full control; carries no explicit permission set
    Owner,
    /// Access defined by the membership's permission set
    Delegate,
}

impl MembershipRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Owner => "OWNER",
            Self::Delegate => "DELEGATE",
        }
    }
}

/// Whether the membership currently confers access.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MembershipStatus {
    Active,
    Revoked,
}

/// Membership linking a user to a container.
///
/// At most one row exists per `(container_id, user_id)`; later writes
/// replace it in place.
///
/// # Examples
///
/// ```
/// use uuid::Uuid;
/// use trove_rbac::{Permission, PermissionSet};
/// use trove_tree::Membership;
///
/// let container_id = Uuid::now_v7();
/// let owner = Membership::owner(container_id, Uuid::now_v7());
/// assert!(owner.permissions.is_none());
/// assert!(owner.effective_permissions().unwrap().is_full());
///
/// let delegate = Membership::delegate(container_id, Uuid::now_v7(), Some(PermissionSet::view_only()));
/// assert!(!delegate.effective_permissions().unwrap().has(Permission::Edit));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Membership {
    /// Container ID
    pub container_id: Uuid,

    /// User ID (also the document id)
    pub user_id: Uuid,

    /// Role within the container
    pub role: MembershipRole,

    /// Explicit permission set for delegates; always `None` for owners
    #[serde(default)]
    pub permissions: Option<PermissionSet>,

    pub status: MembershipStatus,

    /// When the role was (last) assigned
    pub assigned_at: DateTime<Utc>,

    /// When the membership was revoked, if it was
    #[serde(default)]
    pub revoked_at: Option<DateTime<Utc>>,

    /// Who assigned this membership (if applicable)
    #[serde(default)]
    pub assigned_by: Option<Uuid>,
}

impl Membership {
    /// Creates an active OWNER membership.
    pub fn owner(container_id: Uuid, user_id: Uuid) -> Self {
        Self {
            container_id,
            user_id,
            role: MembershipRole::Owner,
            permissions: None,
            status: MembershipStatus::Active,
            assigned_at: Utc::now(),
            revoked_at: None,
            assigned_by: None,
        }
    }

    /// Creates an active DELEGATE membership.
    ///
    /// A delegate without an explicit set is treated as view-only.
    pub fn delegate(container_id: Uuid, user_id: Uuid, permissions: Option<PermissionSet>) -> Self {
        Self {
            role: MembershipRole::Delegate,
            permissions,
            ..Self::owner(container_id, user_id)
        }
    }

    /// Creates a DELEGATE membership from an administrative role label.
    pub fn from_label(container_id: Uuid, user_id: Uuid, label: RoleLabel, can_create: bool) -> Self {
        Self::delegate(container_id, user_id, Some(label.permissions(can_create)))
    }

    /// Set the assignment timestamp.
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.assigned_at = now;
        self
    }

    /// Set who assigned this membership.
    pub fn with_assigner(mut self, assigner_id: Uuid) -> Self {
        self.assigned_by = Some(assigner_id);
        self
    }

    /// Mark the membership revoked. The row is kept.
    pub fn revoke(&mut self, now: DateTime<Utc>) {
        self.status = MembershipStatus::Revoked;
        self.revoked_at = Some(now);
    }

    pub fn is_active(&self) -> bool {
        self.status == MembershipStatus::Active
    }

    pub fn is_active_owner(&self) -> bool {
        self.is_active() && self.role == MembershipRole::Owner
    }

    pub fn is_active_delegate(&self) -> bool {
        self.is_active() && self.role == MembershipRole::Delegate
    }

    /// Permissions this membership confers, or `None` once revoked.
    pub fn effective_permissions(&self) -> Option<PermissionSet> {
        if !self.is_active() {
            return None;
        }
        Some(match self.role {
            MembershipRole::Owner => PermissionSet::full(),
            MembershipRole::Delegate => self.permissions.unwrap_or_else(PermissionSet::view_only),
        })
    }

    /// Enforce the OWNER-carries-no-set invariant on data read from a store.
    pub fn normalized(mut self) -> Self {
        if self.role == MembershipRole::Owner {
            self.permissions = None;
        }
        self
    }

    /// Identity of the row.
    pub fn key(&self) -> (Uuid, Uuid) {
        (self.container_id, self.user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trove_rbac::Permission;

    #[test]
    fn test_owner_membership_creation() {
        let container_id = Uuid::now_v7();
        let user_id = Uuid::now_v7();
        let membership = Membership::owner(container_id, user_id);

        assert_eq!(membership.container_id, container_id);
        assert_eq!(membership.user_id, user_id);
        assert!(membership.is_active_owner());
        assert!(membership.permissions.is_none());
        assert!(membership.revoked_at.is_none());
    }

    #[test]
    fn test_delegate_defaults_to_view_only() {
        let membership = Membership::delegate(Uuid::now_v7(), Uuid::now_v7(), None);
        assert_eq!(membership.effective_permissions(), Some(PermissionSet::view_only()));
    }

    #[test]
    fn test_delegate_from_label() {
        let membership =
            Membership::from_label(Uuid::now_v7(), Uuid::now_v7(), RoleLabel::Editor, true);
        let perms = membership.effective_permissions().unwrap();
        assert!(perms.has(Permission::Create));
        assert!(perms.has(Permission::Edit));
        assert!(!perms.has(Permission::Move));
    }

    #[test]
    fn test_revoke_keeps_row() {
        let mut membership = Membership::delegate(Uuid::now_v7(), Uuid::now_v7(), None);
        let now = Utc::now();
        membership.revoke(now);

        assert_eq!(membership.status, MembershipStatus::Revoked);
        assert_eq!(membership.revoked_at, Some(now));
        assert!(membership.effective_permissions().is_none());
        assert!(!membership.is_active_delegate());
    }

    #[test]
    fn test_normalized_strips_owner_permissions() {
        let mut membership = Membership::owner(Uuid::now_v7(), Uuid::now_v7());
        membership.permissions = Some(PermissionSet::view_only());
        assert!(membership.normalized().permissions.is_none());
    }

    #[test]
    fn test_wire_format() {
        let membership = Membership::delegate(
            Uuid::now_v7(),
            Uuid::now_v7(),
            Some(PermissionSet::view_only()),
        );
        let json = serde_json::to_value(&membership).unwrap();
        assert_eq!(json["role"], "DELEGATE");
        assert_eq!(json["status"], "ACTIVE");
        assert_eq!(json["permissions"]["view"], true);
    }
}
