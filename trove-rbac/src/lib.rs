//! # Trove RBAC
//!
//! Permission vocabulary shared by every Trove crate.
//!
//! ## Overview
//!
//! The trove-rbac crate handles:
//! - **Permissions**: The six independent capabilities (View, Create, Edit,
//!   Move, Clone, Delete)
//! - **Permission Sets**: The boolean vector carried by memberships and grants
//! - **Scopes**: The tree levels a grant can be attached to
//! - **Role Labels**: Simplified role names and the legacy role table
//!
//! ## Usage
//!
//! ```rust
//! use trove_rbac::{Permission, PermissionSet, RoleLabel};
//!
//! // Expand an administrative role label into raw capabilities
//! let set = RoleLabel::Editor.permissions(true);
//! assert!(set.has(Permission::Create));
//!
//! // Label a resolved set for display
//! assert_eq!(RoleLabel::from_permissions(&set), RoleLabel::Editor);
//!
//! // Capabilities are independent
//! let edit_only = PermissionSet::new().with(Permission::Edit);
//! assert!(!edit_only.has(Permission::View));
//! ```

pub mod permissions;
pub mod roles;
pub mod scope;

// Re-export main types for convenience
pub use permissions::{Permission, PermissionSet};
pub use roles::RoleLabel;
pub use scope::ScopeType;
