//! # Trove Resource Tree
//!
//! Data model for the three-level resource tree and the access records
//! attached to it.
//!
//! ## Overview
//!
//! The trove-tree crate handles:
//! - **Containers**: Top-level resources, owned by exactly one user of record
//! - **SubContainers**: Groupings inside a container
//! - **Items**: Leaves inside a container, optionally inside a sub-container
//! - **Memberships**: Container-wide OWNER / DELEGATE records
//! - **Grants**: Sub-container or item scoped permission overrides
//! - **Paths**: Document addresses in the remote store
//!
//! ## Architecture
//!
//! ```text
//! Container (ownerId)
//!   ├─ SubContainer
//!   │    └─ Item
//!   ├─ Item
//!   ├─ Membership ─→ User (OWNER | DELEGATE + PermissionSet)
//!   └─ PermissionGrant ─→ User (SUBCONTAINER | ITEM scope)
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use trove_tree::{Container, Item, Membership, TreeEntity};
//! use uuid::Uuid;
//!
//! let owner_id = Uuid::now_v7();
//! let container = Container::new("Pantry", owner_id);
//! let owner = Membership::owner(container.id, owner_id);
//! let item = Item::new(container.id, "Flour", owner_id);
//!
//! assert!(owner.is_active_owner());
//! assert_eq!(item.entity_ref().container_id(), container.id);
//! ```

pub mod container;
pub mod entity;
pub mod grant;
pub mod item;
pub mod media;
pub mod membership;
pub mod path;
pub mod sub_container;

// Re-export main types for convenience
pub use container::Container;
pub use entity::{EntityKind, EntityRef, TreeEntity, MAX_NAME_CHARS};
pub use grant::PermissionGrant;
pub use item::Item;
pub use membership::{Membership, MembershipRole, MembershipStatus};
pub use path::ChildCollection;
pub use sub_container::SubContainer;
