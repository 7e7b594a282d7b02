//! Optimistic-concurrency mutations.
//!
//! Every edit is a read-check-write against the document's revision:
//!
//! ```text
//! read ──► absent? ──────────────► NotFound
//!   │
//!   ├──► editedAt != expected? ──► Conflict(current editedAt)
//!   │
//!   └──► apply patch, stamp editedAt, commit @ revision
//!            │
//!            ├─ ok ───────────────► Mutation (+ detached *_UPDATED audit)
//!            └─ revision moved ───► read again (bounded)
//! ```
//!
//! The coordinator never checks permissions; callers do that first.

use chrono::{DateTime, Duration, Utc};
use serde::de::DeserializeOwned;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::instrument;
use uuid::Uuid;

use trove_events::{AuditKind, AuditLog, Clock, LifecycleAction, SystemClock};
use trove_tree::{Container, EntityKind, EntityRef, Item, SubContainer};

use crate::config::SyncConfig;
use crate::diff::{diff_fields, Changes};
use crate::error::{SyncError, SyncResult};
use crate::patch::Patch;
use crate::store::{Document, DocumentStore, Precondition, StoreError, WriteBatch};

const EDITED_AT: &str = "editedAt";
const VIEWED_AT: &str = "viewedAt";

/// Result of a successful [`MutationCoordinator::mutate`].
#[derive(Debug, Clone, PartialEq)]
pub struct Mutation {
    pub entity: EntityRef,
    /// New `editedAt` stamp
    pub edited_at: DateTime<Utc>,
    /// Normalized field changes; empty for a no-op patch
    pub changes: Changes,
    /// Document as committed
    pub document: Value,
}

impl Mutation {
    /// Decode the committed document.
    pub fn decode<T: DeserializeOwned>(&self) -> SyncResult<T> {
        serde_json::from_value(self.document.clone())
            .map_err(|e| SyncError::InvalidDocument(e.to_string()))
    }
}

/// Applies patches and lifecycle changes to the document store.
pub struct MutationCoordinator {
    pub(crate) store: Arc<dyn DocumentStore>,
    pub(crate) audit: Arc<AuditLog>,
    pub(crate) clock: Arc<dyn Clock>,
    max_attempts: u32,
}

impl std::fmt::Debug for MutationCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MutationCoordinator")
            .field("max_attempts", &self.max_attempts)
            .finish()
    }
}

impl MutationCoordinator {
    pub fn new(store: Arc<dyn DocumentStore>, audit: Arc<AuditLog>) -> Self {
        Self {
            store,
            audit,
            clock: Arc::new(SystemClock),
            max_attempts: SyncConfig::default().max_transaction_attempts,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_config(mut self, config: &SyncConfig) -> Self {
        self.max_attempts = config.max_transaction_attempts.max(1);
        self
    }

    /// Apply `patch` to an entity.
    ///
    /// With `expected_edited_at`, the write only happens if the document's
    /// `editedAt` still equals it; otherwise the current stamp is returned
    /// in [`SyncError::Conflict`] and nothing is written.
    #[instrument(skip(self, entity, patch), fields(entity = %entity))]
    pub async fn mutate(
        &self,
        actor_id: Uuid,
        entity: EntityRef,
        patch: Patch,
        expected_edited_at: Option<DateTime<Utc>>,
    ) -> SyncResult<Mutation> {
        let patch = patch.sanitized();
        let fields = patch.affected_fields();
        let mutation = self
            .read_modify_write(entity, expected_edited_at, &fields, |document| {
                patch.apply_to(document)
            })
            .await?;

        if !mutation.changes.is_empty() {
            let mut payload = entity_payload(entity.id());
            payload["changes"] = json!(mutation.changes);
            self.emit(
                entity.container_id(),
                AuditKind::Lifecycle(entity.kind(), LifecycleAction::Updated),
                actor_id,
                payload,
            );
        }
        Ok(mutation)
    }

    /// Read, check `editedAt`, modify, stamp and commit at the read
    /// revision. Lost races re-run the whole step.
    pub(crate) async fn read_modify_write<F>(
        &self,
        entity: EntityRef,
        expected_edited_at: Option<DateTime<Utc>>,
        fields: &[String],
        modify: F,
    ) -> SyncResult<Mutation>
    where
        F: Fn(&mut Map<String, Value>),
    {
        let path = entity.path();

        for attempt in 1..=self.max_attempts {
            let doc = self.read(&path).await?;
            let current = edited_at(&doc)?;
            if let Some(expected) = expected_edited_at {
                if expected != current {
                    tracing::debug!(%expected, %current, "Stale edit rejected");
                    return Err(SyncError::Conflict {
                        current_edited_at: current,
                    });
                }
            }

            let before = as_object(&doc)?;
            let mut after = before.clone();
            modify(&mut after);
            let changes = diff_fields(before, &after, fields);

            let stamp = self.next_stamp(current);
            after.insert(EDITED_AT.to_string(), encode_time(stamp));
            let document = Value::Object(after);
            validate_entity(entity.kind(), &document)?;

            let mut batch = WriteBatch::new();
            batch.set_checked(path.clone(), document.clone(), Precondition::Revision(doc.revision));
            match self.store.commit(batch).await {
                Ok(()) => {
                    if attempt > 1 {
                        tracing::info!(attempts = attempt, "Mutation committed after re-run");
                    }
                    return Ok(Mutation {
                        entity,
                        edited_at: stamp,
                        changes,
                        document,
                    });
                }
                Err(StoreError::PreconditionFailed { .. }) => {
                    tracing::debug!(
                        attempt,
                        max_attempts = self.max_attempts,
                        "Document changed during mutation, re-reading"
                    );
                }
                Err(e) => return Err(e.into()),
            }
        }

        tracing::warn!(attempts = self.max_attempts, %path, "Mutation aborted");
        Err(SyncError::TransactionAborted {
            attempts: self.max_attempts,
        })
    }

    /// Stamp `viewedAt` and emit a `*_VIEWED` event.
    ///
    /// Viewing never conflicts and never changes `editedAt`.
    pub async fn mark_viewed(&self, actor_id: Uuid, entity: EntityRef) -> SyncResult<DateTime<Utc>> {
        let now = self.clock.now();
        let mut fields = Map::new();
        fields.insert(VIEWED_AT.to_string(), encode_time(now));

        let mut batch = WriteBatch::new();
        batch.merge_checked(entity.path(), fields, Precondition::Exists);
        self.commit_existing(&entity.path(), batch).await?;

        self.emit(
            entity.container_id(),
            AuditKind::Viewed(entity.kind()),
            actor_id,
            entity_payload(entity.id()),
        );
        Ok(now)
    }

    /// Fire-and-forget audit write.
    pub(crate) fn emit(&self, container_id: Uuid, kind: AuditKind, actor_id: Uuid, payload: Value) {
        self.audit
            .record_detached(container_id, kind.event_type(), actor_id, payload);
    }

    pub(crate) async fn read(&self, path: &str) -> SyncResult<Document> {
        self.store
            .get(path)
            .await?
            .ok_or_else(|| SyncError::NotFound(path.to_string()))
    }

    pub(crate) async fn read_as<T: DeserializeOwned>(&self, path: &str) -> SyncResult<(T, Document)> {
        let doc = self.read(path).await?;
        let record = doc
            .decode()
            .map_err(|e| SyncError::InvalidDocument(e.to_string()))?;
        Ok((record, doc))
    }

    /// Commit a batch whose preconditions only assert existence; a failed
    /// precondition means the target is gone.
    pub(crate) async fn commit_existing(&self, path: &str, batch: WriteBatch) -> SyncResult<()> {
        match self.store.commit(batch).await {
            Ok(()) => Ok(()),
            Err(StoreError::PreconditionFailed { path: failed, actual: None }) => {
                Err(SyncError::NotFound(failed))
            }
            Err(StoreError::PreconditionFailed { .. }) => {
                tracing::debug!(path, "Batch lost a race");
                Err(SyncError::TransactionAborted { attempts: 1 })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Strictly increasing edit stamp: now, or one millisecond past the
    /// previous stamp if the clock has not moved on.
    pub(crate) fn next_stamp(&self, previous: DateTime<Utc>) -> DateTime<Utc> {
        let now = self.clock.now();
        if now > previous {
            now
        } else {
            previous + Duration::milliseconds(1)
        }
    }
}

fn as_object(doc: &Document) -> SyncResult<&Map<String, Value>> {
    doc.data
        .as_object()
        .ok_or_else(|| SyncError::InvalidDocument(format!("{} is not an object", doc.path)))
}

fn edited_at(doc: &Document) -> SyncResult<DateTime<Utc>> {
    doc.field(EDITED_AT)
        .and_then(|v| serde_json::from_value(v.clone()).ok())
        .ok_or_else(|| SyncError::InvalidDocument(format!("{} has no editedAt", doc.path)))
}

/// Payload naming the entity an event is about.
pub(crate) fn entity_payload(entity_id: Uuid) -> Value {
    json!({ "entityId": entity_id })
}

pub(crate) fn encode_time(at: DateTime<Utc>) -> Value {
    serde_json::to_value(at).unwrap_or(Value::Null)
}

/// The patched document must still decode as its entity type.
fn validate_entity(kind: EntityKind, document: &Value) -> SyncResult<()> {
    let result = match kind {
        EntityKind::Container => serde_json::from_value::<Container>(document.clone()).map(drop),
        EntityKind::SubContainer => {
            serde_json::from_value::<SubContainer>(document.clone()).map(drop)
        }
        EntityKind::Item => serde_json::from_value::<Item>(document.clone()).map(drop),
    };
    result.map_err(|e| SyncError::InvalidDocument(e.to_string()))
}
