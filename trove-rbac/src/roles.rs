//! Role labels
//!
//! Simplified role names used by administrative screens and for labeling a
//! user's access. A label is always derived from or expanded into a
//! [`PermissionSet`]; the set is what gets enforced.

use serde::{Deserialize, Serialize};

use crate::permissions::{Permission, PermissionSet};

/// UI-facing role label.
///
/// The hierarchy is: Reviewer < Editor < Manager < Owner
///
/// # Examples
///
/// ```
/// use trove_rbac::RoleLabel;
///
/// let manager = RoleLabel::Manager.permissions(false);
/// assert!(manager.clone);
/// assert!(!manager.delete);
///
/// // Unknown labels degrade to reviewer.
/// assert_eq!(RoleLabel::parse_lenient("superuser"), RoleLabel::Reviewer);
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RoleLabel {
    /// View only
    Reviewer = 0,

    /// View and edit, optionally create
    Editor = 1,

    /// Everything except delete
    Manager = 2,

    /// Everything, including delete
    Owner = 3,
}

impl RoleLabel {
    /// Parse role from string representation.
    ///
    /// The legacy `viewer` label is accepted as [`RoleLabel::Reviewer`].
    ///
    /// # Examples
    ///
    /// ```
    /// use trove_rbac::RoleLabel;
    ///
    /// assert_eq!(RoleLabel::parse("MANAGER"), Some(RoleLabel::Manager));
    /// assert_eq!(RoleLabel::parse("viewer"), Some(RoleLabel::Reviewer));
    /// assert_eq!(RoleLabel::parse("invalid"), None);
    /// ```
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "reviewer" | "viewer" => Some(Self::Reviewer),
            "editor" => Some(Self::Editor),
            "manager" => Some(Self::Manager),
            "owner" => Some(Self::Owner),
            _ => None,
        }
    }

    /// Parse role, degrading anything unknown to [`RoleLabel::Reviewer`].
    pub fn parse_lenient(s: &str) -> Self {
        Self::parse(s).unwrap_or(Self::Reviewer)
    }

    /// Get string representation of the role.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Reviewer => "reviewer",
            Self::Editor => "editor",
            Self::Manager => "manager",
            Self::Owner => "owner",
        }
    }

    /// Get a human-readable display name for the role.
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Reviewer => "Reviewer",
            Self::Editor => "Editor",
            Self::Manager => "Manager",
            Self::Owner => "Owner",
        }
    }

    /// Expand the label into a permission set.
    ///
    /// `can_create` only matters for [`RoleLabel::Editor`]; managers and
    /// owners always create, reviewers never do.
    ///
    /// | role | view | create | edit | move | clone | delete |
    /// |---|---|---|---|---|---|---|
    /// | reviewer | x | | | | | |
    /// | editor | x | flag | x | | | |
    /// | manager | x | x | x | x | x | |
    /// | owner | x | x | x | x | x | x |
    pub fn permissions(&self, can_create: bool) -> PermissionSet {
        match self {
            Self::Reviewer => PermissionSet::view_only(),
            Self::Editor => PermissionSet {
                view: true,
                create: can_create,
                edit: true,
                ..PermissionSet::default()
            },
            Self::Manager => PermissionSet::full().without(Permission::Delete),
            Self::Owner => PermissionSet::full(),
        }
    }

    /// Label a resolved permission set.
    ///
    /// Delete is treated as an owner-equivalent affordance even though the
    /// underlying membership may be a delegate.
    pub fn from_permissions(set: &PermissionSet) -> Self {
        if set.delete {
            Self::Owner
        } else if set.move_ || set.clone {
            Self::Manager
        } else if set.edit || set.create {
            Self::Editor
        } else {
            Self::Reviewer
        }
    }
}

impl Default for RoleLabel {
    fn default() -> Self {
        Self::Reviewer
    }
}
