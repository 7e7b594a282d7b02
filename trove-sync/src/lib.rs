//! # Trove Sync
//!
//! Keeps a client's view of the resource tree in step with the remote
//! authoritative store.
//!
//! ## Overview
//!
//! The trove-sync crate handles:
//! - **Store boundary**: The [`DocumentStore`] trait (point reads, queries,
//!   atomic batches with preconditions, live queries) and an in-memory
//!   implementation
//! - **Mutations**: Optimistic-concurrency patches with field-level diffs
//!   and monotonic `editedAt` stamps
//! - **Lifecycle**: Create, delete with cascade, share, revoke, transfer
//!   ownership, grants and moves, each as one atomic batch
//! - **Audit**: Fire-and-forget events after every successful write
//! - **Subscriptions**: Ref-counted live channels per container feeding the
//!   local cache
//! - **Session**: Permission-checked facade over all of the above
//!
//! ## Architecture
//!
//! ```text
//! Session ──→ PermissionResolver (over LocalCache)
//!    │
//!    ├──→ MutationCoordinator ──→ DocumentStore.commit
//!    │          └──→ AuditLog.record_detached
//!    │
//!    └──→ SubscriptionManager ──→ DocumentStore.listen ──→ LocalCache
//! ```
//!
//! ## Usage
//!
//! ```rust
//! use std::sync::Arc;
//! use uuid::Uuid;
//! use trove_access::SessionIdentity;
//! use trove_rbac::{Permission, RoleLabel};
//! use trove_sync::{MemoryDocumentStore, Session, ShareAccess};
//! use trove_tree::{Container, Item, TreeEntity};
//!
//! # #[tokio::main]
//! # async fn main() {
//! let owner = Uuid::now_v7();
//! let session = Session::builder(
//!     Arc::new(MemoryDocumentStore::new()),
//!     Arc::new(SessionIdentity::signed_in(owner)),
//! )
//! .build()
//! .unwrap();
//! session.sign_in().await.unwrap();
//!
//! let pantry = session.create_container(Container::new("Pantry", owner)).await.unwrap();
//! let flour = session.create_item(Item::new(pantry.id, "Flour", owner)).await.unwrap();
//! session
//!     .share(pantry.id, Uuid::now_v7(), ShareAccess::role(RoleLabel::Reviewer))
//!     .await
//!     .unwrap();
//!
//! assert!(session.resolve(flour.entity_ref(), Permission::Delete).unwrap());
//! # }
//! ```

pub mod audit_store;
pub mod cache;
pub mod config;
pub mod diff;
pub mod error;
pub mod lifecycle;
pub mod memory;
pub mod mutation;
pub mod patch;
pub mod session;
pub mod store;
pub mod subscription;

// Re-export main types for convenience
pub use audit_store::DocumentAuditStore;
pub use cache::{merge_by_id, CacheState, CacheUpdate, Keyed, LocalCache, Snapshot};
pub use config::{ConfigError, SyncConfig};
pub use diff::{diff_fields, Changes, FieldChange};
pub use error::{SyncError, SyncResult};
pub use lifecycle::{OwnershipTransfer, ShareAccess};
pub use memory::{MemoryDocumentStore, MemoryStoreStats};
pub use mutation::{Mutation, MutationCoordinator};
pub use patch::Patch;
pub use session::{Session, SessionBuilder};
pub use store::{
    Direction, Document, DocumentStore, LiveQuery, Precondition, Query, QuerySnapshot,
    StoreError, StoreResult, WriteBatch,
};
pub use subscription::SubscriptionManager;
