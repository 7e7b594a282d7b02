//! Audit events persisted in the document store.
//!
//! Events live at `containers/{id}/auditEvents/{eventId}` with `createdAt`
//! stored as epoch milliseconds, so "latest" is an ordered, limited query.

use async_trait::async_trait;
use std::sync::Arc;
use uuid::Uuid;

use trove_events::{AuditError, AuditEvent, AuditResult, AuditStore};
use trove_tree::{path, ChildCollection};

use crate::store::{Direction, DocumentStore, Precondition, Query, StoreError, WriteBatch};

/// [`AuditStore`] backed by a [`DocumentStore`].
#[derive(Clone)]
pub struct DocumentAuditStore {
    store: Arc<dyn DocumentStore>,
}

impl std::fmt::Debug for DocumentAuditStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentAuditStore").finish()
    }
}

impl DocumentAuditStore {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    /// All events of a container, oldest first.
    pub async fn events(&self, container_id: Uuid) -> AuditResult<Vec<AuditEvent>> {
        let query = Query::collection(ChildCollection::AuditEvents.path(container_id))
            .order_by("createdAt", Direction::Ascending);
        let docs = self.store.query(&query).await.map_err(to_audit_error)?;
        docs.iter()
            .map(|doc| doc.decode().map_err(to_audit_error))
            .collect()
    }
}

fn to_audit_error(err: StoreError) -> AuditError {
    match err {
        StoreError::Serialization(msg) => AuditError::Serialization(msg),
        other => AuditError::Store(other.to_string()),
    }
}

#[async_trait]
impl AuditStore for DocumentAuditStore {
    async fn latest(&self, container_id: Uuid) -> AuditResult<Option<AuditEvent>> {
        let query = Query::collection(ChildCollection::AuditEvents.path(container_id))
            .order_by("createdAt", Direction::Descending)
            .limit(1);
        let docs = self.store.query(&query).await.map_err(to_audit_error)?;
        docs.first()
            .map(|doc| doc.decode().map_err(to_audit_error))
            .transpose()
    }

    async fn append(&self, event: &AuditEvent) -> AuditResult<()> {
        let data = serde_json::to_value(event).map_err(|e| AuditError::Serialization(e.to_string()))?;
        let mut batch = WriteBatch::new();
        batch.set_checked(
            path::audit_event(event.container_id, event.id),
            data,
            Precondition::Missing,
        );
        self.store.commit(batch).await.map_err(to_audit_error)
    }
}
