//! # Trove Audit Events
//!
//! Best-effort, deduplicated audit trail of state changes in the resource
//! tree.
//!
//! ## Overview
//!
//! The trove-events crate handles:
//! - **Event Types**: The `AuditEvent` record and the typed vocabulary of
//!   view, lifecycle and move events
//! - **Write Policy**: Which event types this core appends directly
//! - **Fingerprints**: FNV-1a over an event's identifying fields
//! - **Normalization**: Size bounds for values placed in payloads
//! - **Audit Log**: Policy filter, duplicate window and fire-and-forget writes
//! - **Clock**: Injectable time source for windowed behavior
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use serde_json::json;
//! use trove_events::{AuditKind, AuditLog, LifecycleAction, MemoryAuditStore};
//! use trove_tree::EntityKind;
//! use uuid::Uuid;
//!
//! async fn record_example() {
//!     let log = Arc::new(AuditLog::new(Arc::new(MemoryAuditStore::new())));
//!     let event_type = AuditKind::Lifecycle(EntityKind::Item, LifecycleAction::Created);
//!
//!     // Awaited write
//!     let outcome = log
//!         .record(Uuid::now_v7(), &event_type.event_type(), Uuid::now_v7(), json!({}))
//!         .await
//!         .unwrap();
//!     println!("{outcome:?}");
//!
//!     // Fire-and-forget write; failures are logged, never returned
//!     log.record_detached(Uuid::now_v7(), "ITEM_VIEWED", Uuid::now_v7(), json!({}));
//! }
//! ```

pub mod clock;
pub mod fingerprint;
pub mod log;
pub mod normalize;
pub mod policy;
pub mod store;
pub mod types;

// Re-export main types for convenience
pub use clock::{Clock, ManualClock, SystemClock};
pub use log::{AuditConfig, AuditLog, AuditStats, RecordOutcome};
pub use policy::WritePolicy;
pub use store::{AuditError, AuditResult, AuditStore, MemoryAuditStore};
pub use types::{AuditEvent, AuditKind, LifecycleAction, MoveDirection};
