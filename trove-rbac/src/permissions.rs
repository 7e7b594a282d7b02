//! # Permissions
//!
//! The six independent capabilities a user can hold on a scope, and the
//! boolean vector that carries them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// A single capability that can be checked against a scope.
///
/// Capabilities are independent: holding `Edit` says nothing about `View`.
/// Any implication between them is a property of the role tables in
/// [`crate::roles`], never of the check itself.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Permission {
    /// See the resource and its children.
    View,
    /// Create children under the resource.
    Create,
    /// Change the resource's fields.
    Edit,
    /// Move the resource to another parent.
    Move,
    /// Duplicate the resource.
    Clone,
    /// Delete the resource.
    Delete,
}

impl Permission {
    /// Get the string representation of the permission.
    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::View => "view",
            Permission::Create => "create",
            Permission::Edit => "edit",
            Permission::Move => "move",
            Permission::Clone => "clone",
            Permission::Delete => "delete",
        }
    }

    /// Parse permission from string representation.
    ///
    /// # Arguments
    ///
    /// * `s` - String to parse (case-insensitive, supports aliases)
    ///
    /// # Returns
    ///
    /// `Some(Permission)` if valid, `None` otherwise
    ///
    /// # Example
    ///
    /// ```
    /// use trove_rbac::Permission;
    ///
    /// assert_eq!(Permission::parse("view"), Some(Permission::View));
    /// assert_eq!(Permission::parse("read"), Some(Permission::View)); // Alias
    /// assert_eq!(Permission::parse("duplicate"), Some(Permission::Clone)); // Alias
    /// assert_eq!(Permission::parse("share"), None);
    /// ```
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "view" | "read" => Some(Permission::View),
            "create" | "add" => Some(Permission::Create),
            "edit" | "update" | "write" => Some(Permission::Edit),
            "move" | "relocate" => Some(Permission::Move),
            "clone" | "duplicate" | "copy" => Some(Permission::Clone),
            "delete" | "remove" => Some(Permission::Delete),
            _ => None,
        }
    }

    /// All permissions, in display order.
    pub fn all() -> [Permission; 6] {
        [
            Permission::View,
            Permission::Create,
            Permission::Edit,
            Permission::Move,
            Permission::Clone,
            Permission::Delete,
        ]
    }

    /// Check if this permission changes stored state.
    pub fn is_write(&self) -> bool {
        !matches!(self, Permission::View)
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Six-boolean capability vector attached to memberships and grants.
///
/// The default set has every capability off.
///
/// # Example
///
/// ```
/// use trove_rbac::{Permission, PermissionSet};
///
/// let set = PermissionSet::view_only().with(Permission::Edit);
/// assert!(set.has(Permission::View));
/// assert!(set.has(Permission::Edit));
/// assert!(!set.has(Permission::Delete));
/// ```
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub struct PermissionSet {
    #[serde(default)]
    pub view: bool,
    #[serde(default)]
    pub create: bool,
    #[serde(default)]
    pub edit: bool,
    #[serde(default, rename = "move")]
    pub move_: bool,
    #[serde(default)]
    pub clone: bool,
    #[serde(default)]
    pub delete: bool,
}

impl PermissionSet {
    /// Create an empty permission set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every capability on. This is what an OWNER membership means.
    pub fn full() -> Self {
        Self {
            view: true,
            create: true,
            edit: true,
            move_: true,
            clone: true,
            delete: true,
        }
    }

    /// Only `View`. Also the meaning of the legacy "viewer" label and the
    /// fallback for a delegate membership that carries no explicit set.
    pub fn view_only() -> Self {
        Self {
            view: true,
            ..Self::default()
        }
    }

    /// Check a single capability.
    pub fn has(&self, permission: Permission) -> bool {
        match permission {
            Permission::View => self.view,
            Permission::Create => self.create,
            Permission::Edit => self.edit,
            Permission::Move => self.move_,
            Permission::Clone => self.clone,
            Permission::Delete => self.delete,
        }
    }

    /// Set a single capability.
    pub fn set(&mut self, permission: Permission, value: bool) {
        match permission {
            Permission::View => self.view = value,
            Permission::Create => self.create = value,
            Permission::Edit => self.edit = value,
            Permission::Move => self.move_ = value,
            Permission::Clone => self.clone = value,
            Permission::Delete => self.delete = value,
        }
    }

    /// Builder form of [`PermissionSet::set`] turning a capability on.
    pub fn with(mut self, permission: Permission) -> Self {
        self.set(permission, true);
        self
    }

    /// Builder form of [`PermissionSet::set`] turning a capability off.
    pub fn without(mut self, permission: Permission) -> Self {
        self.set(permission, false);
        self
    }

    /// The capabilities that are on, in display order.
    pub fn granted(&self) -> Vec<Permission> {
        Permission::all()
            .into_iter()
            .filter(|p| self.has(*p))
            .collect()
    }

    /// Check if no capability is on.
    pub fn is_empty(&self) -> bool {
        self.granted().is_empty()
    }

    /// Check if every capability is on.
    pub fn is_full(&self) -> bool {
        *self == Self::full()
    }
}

impl FromIterator<Permission> for PermissionSet {
    fn from_iter<T: IntoIterator<Item = Permission>>(iter: T) -> Self {
        let mut set = PermissionSet::new();
        for perm in iter {
            set.set(perm, true);
        }
        set
    }
}
