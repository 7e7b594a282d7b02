//! # Trove Access
//!
//! Decides what a user may do at a container, sub-container or item.
//!
//! ## Overview
//!
//! The trove-access crate handles:
//! - **Stores**: Keyed tables of memberships and scoped grants
//! - **Resolution**: Owner override, grant specificity, delegate fallback
//! - **Display Roles**: Collapsing a permission set to an administrative label
//! - **Identity**: The boundary that yields the signed-in user
//!
//! ## Usage
//!
//! ```rust
//! use uuid::Uuid;
//! use trove_access::{AccessQuery, AccessSource, MembershipStore, GrantStore, PermissionResolver};
//! use trove_rbac::{Permission, PermissionSet, ScopeType};
//! use trove_tree::{Membership, PermissionGrant};
//!
//! struct Tables {
//!     memberships: MembershipStore,
//!     grants: GrantStore,
//! }
//!
//! impl AccessSource for Tables {
//!     fn owner_of_record(&self, _container_id: Uuid) -> Option<Uuid> {
//!         None
//!     }
//!     fn membership(&self, container_id: Uuid, user_id: Uuid) -> Option<&Membership> {
//!         self.memberships.get(container_id, user_id)
//!     }
//!     fn grant(&self, scope_type: ScopeType, scope_id: Uuid, user_id: Uuid) -> Option<&PermissionGrant> {
//!         self.grants.get(scope_type, scope_id, user_id)
//!     }
//! }
//!
//! let (container, item, user) = (Uuid::now_v7(), Uuid::now_v7(), Uuid::now_v7());
//! let mut tables = Tables { memberships: MembershipStore::new(), grants: GrantStore::new() };
//! tables.memberships.upsert(Membership::delegate(container, user, Some(PermissionSet::full())));
//! tables.grants.upsert(PermissionGrant::new(container, ScopeType::Item, item, user, PermissionSet::view_only()));
//!
//! let resolver = PermissionResolver::new(&tables);
//! let query = AccessQuery::container(container, user).on_item(item);
//! assert!(resolver.resolve(&query, Permission::View));
//! assert!(!resolver.resolve(&query, Permission::Edit));
//! ```

pub mod error;
pub mod identity;
pub mod resolver;
pub mod store;

// Re-export main types for convenience
pub use error::{AccessError, AccessResult};
pub use identity::{IdentityProvider, SessionIdentity};
pub use resolver::{AccessQuery, AccessSource, PermissionResolver, Resolution};
pub use store::{GrantStore, MembershipStore};
