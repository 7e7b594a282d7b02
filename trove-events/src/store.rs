//! Audit storage
//!
//! The audit log needs exactly two things from storage: the most recent
//! event of a container (for duplicate detection) and an append.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::types::AuditEvent;

/// Audit storage error types.
#[derive(Debug, Error)]
pub enum AuditError {
    /// Backing store failed
    #[error("Audit store error: {0}")]
    Store(String),

    /// Event could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Result type for audit operations.
pub type AuditResult<T> = Result<T, AuditError>;

/// Append-only storage for audit events.
#[async_trait]
pub trait AuditStore: Send + Sync {
    /// The single most recent event of `container_id`, by `createdAt`.
    async fn latest(&self, container_id: Uuid) -> AuditResult<Option<AuditEvent>>;

    /// Append an event.
    async fn append(&self, event: &AuditEvent) -> AuditResult<()>;
}

/// In-memory audit store.
///
/// Suitable for single-process use and testing.
#[derive(Debug, Clone, Default)]
pub struct MemoryAuditStore {
    events: Arc<RwLock<HashMap<Uuid, Vec<AuditEvent>>>>,
}

impl MemoryAuditStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All events of a container, oldest first.
    pub async fn events(&self, container_id: Uuid) -> Vec<AuditEvent> {
        self.events
            .read()
            .await
            .get(&container_id)
            .cloned()
            .unwrap_or_default()
    }

    /// Total number of stored events.
    pub async fn len(&self) -> usize {
        self.events.read().await.values().map(Vec::len).sum()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl AuditStore for MemoryAuditStore {
    async fn latest(&self, container_id: Uuid) -> AuditResult<Option<AuditEvent>> {
        let events = self.events.read().await;
        Ok(events
            .get(&container_id)
            .and_then(|list| list.iter().max_by_key(|e| e.created_at))
            .cloned())
    }

    async fn append(&self, event: &AuditEvent) -> AuditResult<()> {
        let mut events = self.events.write().await;
        events
            .entry(event.container_id)
            .or_default()
            .push(event.clone());
        Ok(())
    }
}
