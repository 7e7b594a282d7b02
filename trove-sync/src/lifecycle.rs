//! Lifecycle operations on the resource tree.
//!
//! Each operation is one atomic batch followed by one detached audit event.
//! Like [`MutationCoordinator::mutate`], none of them check permissions.

use serde_json::{json, Map, Value};
use uuid::Uuid;

use trove_events::{AuditKind, LifecycleAction, MoveDirection};
use trove_rbac::{PermissionSet, RoleLabel, ScopeType};
use trove_tree::entity::clamp_name;
use trove_tree::grant::grant_id;
use trove_tree::{
    media, path, ChildCollection, Container, EntityKind, EntityRef, Item, Membership,
    PermissionGrant, SubContainer,
};

use crate::error::{SyncError, SyncResult};
use crate::mutation::{entity_payload, Mutation, MutationCoordinator};
use crate::store::{encode, Document, Precondition, Query, StoreError, WriteBatch};

/// Access handed out by [`MutationCoordinator::share`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShareAccess {
    /// Administrative label plus the editor "may create" flag
    Role { label: RoleLabel, can_create: bool },
    /// Explicit permission set
    Permissions(PermissionSet),
}

impl ShareAccess {
    pub fn role(label: RoleLabel) -> Self {
        Self::Role {
            label,
            can_create: label != RoleLabel::Reviewer,
        }
    }

    pub fn permissions(&self) -> PermissionSet {
        match self {
            Self::Role { label, can_create } => label.permissions(*can_create),
            Self::Permissions(set) => *set,
        }
    }

    /// Label shown for the shared access.
    pub fn label(&self) -> RoleLabel {
        match self {
            Self::Role { label, .. } => *label,
            Self::Permissions(set) => RoleLabel::from_permissions(set),
        }
    }
}

/// Records written by [`MutationCoordinator::transfer_ownership`].
#[derive(Debug, Clone, PartialEq)]
pub struct OwnershipTransfer {
    pub container: Container,
    /// Previous owner, now a full-access delegate
    pub demoted: Membership,
    pub promoted: Membership,
}

fn scope_kind(scope_type: ScopeType) -> EntityKind {
    match scope_type {
        ScopeType::SubContainer => EntityKind::SubContainer,
        ScopeType::Item => EntityKind::Item,
    }
}

fn scope_path(container_id: Uuid, scope_type: ScopeType, scope_id: Uuid) -> String {
    match scope_type {
        ScopeType::SubContainer => path::sub_container(container_id, scope_id),
        ScopeType::Item => path::item(container_id, scope_id),
    }
}

fn grants_on(container_id: Uuid, scope_id: Uuid) -> Query {
    Query::collection(ChildCollection::Grants.path(container_id)).where_eq("scopeId", json!(scope_id))
}

impl MutationCoordinator {
    /// Create a container owned by `actor_id`, together with its OWNER
    /// membership.
    pub async fn create_container(&self, actor_id: Uuid, container: Container) -> SyncResult<Container> {
        let now = self.clock.now();
        let mut container = container.at(now);
        container.owner_id = actor_id;
        container.name = clamp_name(&container.name);
        media::normalize(&mut container.media, &mut container.primary_media);

        let owner = Membership::owner(container.id, actor_id)
            .at(now)
            .with_assigner(actor_id);

        let mut batch = WriteBatch::new();
        batch
            .set_checked(path::container(container.id), encode(&container)?, Precondition::Missing)
            .set_checked(
                path::membership(container.id, actor_id),
                encode(&owner)?,
                Precondition::Missing,
            );
        self.commit_new(batch).await?;

        tracing::info!(container_id = %container.id, owner_id = %actor_id, "Container created");
        self.emit_lifecycle(
            container.id,
            EntityKind::Container,
            LifecycleAction::Created,
            actor_id,
            json!({ "entityId": container.id, "name": container.name }),
        );
        Ok(container)
    }

    /// Create a sub-container inside an existing container.
    pub async fn create_sub_container(
        &self,
        actor_id: Uuid,
        sub_container: SubContainer,
    ) -> SyncResult<SubContainer> {
        self.read(&path::container(sub_container.container_id)).await?;

        let mut sub_container = sub_container.at(self.clock.now());
        sub_container.owner_id = actor_id;
        sub_container.name = clamp_name(&sub_container.name);
        media::normalize(&mut sub_container.media, &mut sub_container.primary_media);

        let mut batch = WriteBatch::new();
        batch.set_checked(
            path::sub_container(sub_container.container_id, sub_container.id),
            encode(&sub_container)?,
            Precondition::Missing,
        );
        self.commit_new(batch).await?;

        tracing::info!(
            container_id = %sub_container.container_id,
            sub_container_id = %sub_container.id,
            "Sub-container created"
        );
        self.emit_lifecycle(
            sub_container.container_id,
            EntityKind::SubContainer,
            LifecycleAction::Created,
            actor_id,
            json!({ "entityId": sub_container.id, "name": sub_container.name }),
        );
        Ok(sub_container)
    }

    /// Create an item in an existing container, and sub-container if set.
    pub async fn create_item(&self, actor_id: Uuid, item: Item) -> SyncResult<Item> {
        self.read(&path::container(item.container_id)).await?;
        if let Some(sub_container_id) = item.sub_container_id {
            self.read(&path::sub_container(item.container_id, sub_container_id))
                .await?;
        }

        let mut item = item.at(self.clock.now());
        item.owner_id = actor_id;
        item.name = clamp_name(&item.name);
        media::normalize(&mut item.media, &mut item.primary_media);

        let mut batch = WriteBatch::new();
        batch.set_checked(
            path::item(item.container_id, item.id),
            encode(&item)?,
            Precondition::Missing,
        );
        self.commit_new(batch).await?;

        tracing::info!(container_id = %item.container_id, item_id = %item.id, "Item created");
        self.emit_lifecycle(
            item.container_id,
            EntityKind::Item,
            LifecycleAction::Created,
            actor_id,
            json!({ "entityId": item.id, "name": item.name }),
        );
        Ok(item)
    }

    /// Delete an entity and everything scoped under it.
    ///
    /// - container: its sub-containers, items and grants
    /// - sub-container: its items, and grants on it or on those items
    /// - item: grants on it
    ///
    /// Memberships are never deleted. Returns the number of documents
    /// removed, the entity included.
    pub async fn delete(&self, actor_id: Uuid, entity: EntityRef) -> SyncResult<usize> {
        let entity_path = entity.path();
        self.read(&entity_path).await?;
        let container_id = entity.container_id();

        let mut doomed: Vec<Document> = Vec::new();
        match entity {
            EntityRef::Container { id } => {
                for collection in [
                    ChildCollection::SubContainers,
                    ChildCollection::Items,
                    ChildCollection::Grants,
                ] {
                    doomed.extend(self.store.query(&Query::collection(collection.path(id))).await?);
                }
            }
            EntityRef::SubContainer { id, .. } => {
                let items = self
                    .store
                    .query(
                        &Query::collection(ChildCollection::Items.path(container_id))
                            .where_eq("subContainerId", json!(id)),
                    )
                    .await?;
                doomed.extend(self.store.query(&grants_on(container_id, id)).await?);
                for item in &items {
                    let item_id: Uuid = item
                        .id()
                        .parse()
                        .map_err(|_| SyncError::InvalidDocument(item.path.clone()))?;
                    doomed.extend(self.store.query(&grants_on(container_id, item_id)).await?);
                }
                doomed.extend(items);
            }
            EntityRef::Item { id, .. } => {
                doomed.extend(self.store.query(&grants_on(container_id, id)).await?);
            }
        }

        let mut batch = WriteBatch::new();
        for doc in &doomed {
            batch.delete(doc.path.clone());
        }
        batch.delete_checked(entity_path.clone(), Precondition::Exists);
        self.commit_existing(&entity_path, batch).await?;

        let removed = doomed.len() + 1;
        tracing::info!(entity = %entity, removed, "Entity deleted");
        let mut payload = entity_payload(entity.id());
        payload["removed"] = json!(removed);
        self.emit_lifecycle(
            container_id,
            entity.kind(),
            LifecycleAction::DeleteRequested,
            actor_id,
            payload,
        );
        Ok(removed)
    }

    /// Give `user_id` DELEGATE access to a container, replacing any
    /// previous delegate membership.
    pub async fn share(
        &self,
        actor_id: Uuid,
        container_id: Uuid,
        user_id: Uuid,
        access: ShareAccess,
    ) -> SyncResult<Membership> {
        let (container, _) = self
            .read_as::<Container>(&path::container(container_id))
            .await?;
        if container.owner_id == user_id {
            return Err(SyncError::InvalidRequest(
                "the owner of record cannot be shared with".to_string(),
            ));
        }
        if let Some(existing) = self.store.get(&path::membership(container_id, user_id)).await? {
            let existing: Membership = existing.decode()?;
            if existing.is_active_owner() {
                return Err(SyncError::InvalidRequest(
                    "an active owner cannot be demoted by sharing".to_string(),
                ));
            }
        }

        let membership = Membership::delegate(container_id, user_id, Some(access.permissions()))
            .at(self.clock.now())
            .with_assigner(actor_id);
        let mut batch = WriteBatch::new();
        batch.set_record(path::membership(container_id, user_id), &membership)?;
        self.store.commit(batch).await?;

        tracing::info!(%container_id, %user_id, role = access.label().as_str(), "Container shared");
        self.emit_lifecycle(
            container_id,
            EntityKind::Container,
            LifecycleAction::Shared,
            actor_id,
            json!({
                "entityId": container_id,
                "userId": user_id,
                "role": access.label().as_str(),
                "permissions": access.permissions(),
            }),
        );
        Ok(membership)
    }

    /// Revoke a membership. The row is kept with `status = REVOKED`.
    ///
    /// Revoking an already revoked membership is a no-op.
    pub async fn revoke_access(
        &self,
        actor_id: Uuid,
        container_id: Uuid,
        user_id: Uuid,
    ) -> SyncResult<Membership> {
        let (container, _) = self
            .read_as::<Container>(&path::container(container_id))
            .await?;
        if container.owner_id == user_id {
            return Err(SyncError::InvalidRequest(
                "the owner of record cannot be revoked; transfer ownership first".to_string(),
            ));
        }

        let membership_path = path::membership(container_id, user_id);
        let (mut membership, doc) = self.read_as::<Membership>(&membership_path).await?;
        if !membership.is_active() {
            return Ok(membership);
        }
        membership.revoke(self.clock.now());

        let mut batch = WriteBatch::new();
        batch.set_checked(
            membership_path.clone(),
            encode(&membership)?,
            Precondition::Revision(doc.revision),
        );
        self.commit_existing(&membership_path, batch).await?;

        tracing::info!(%container_id, %user_id, "Access revoked");
        self.emit_lifecycle(
            container_id,
            EntityKind::Container,
            LifecycleAction::AccessRevoked,
            actor_id,
            json!({ "entityId": container_id, "userId": user_id }),
        );
        Ok(membership)
    }

    /// Hand a container to `new_owner_id` in one batch: the old owner keeps
    /// full access as a DELEGATE, the new owner gets an OWNER membership and
    /// becomes the owner of record.
    pub async fn transfer_ownership(
        &self,
        actor_id: Uuid,
        container_id: Uuid,
        new_owner_id: Uuid,
    ) -> SyncResult<OwnershipTransfer> {
        let container_path = path::container(container_id);
        let (mut container, doc) = self.read_as::<Container>(&container_path).await?;
        let old_owner_id = container.owner_id;
        if old_owner_id == new_owner_id {
            return Err(SyncError::InvalidRequest(
                "new owner is already the owner of record".to_string(),
            ));
        }
        container.owner_id = new_owner_id;

        let mut data = doc.data.as_object().cloned().unwrap_or_else(Map::new);
        data.insert("ownerId".to_string(), json!(new_owner_id));

        let now = self.clock.now();
        let demoted = Membership::from_label(container_id, old_owner_id, RoleLabel::Owner, true)
            .at(now)
            .with_assigner(actor_id);
        let promoted = Membership::owner(container_id, new_owner_id)
            .at(now)
            .with_assigner(actor_id);

        let mut batch = WriteBatch::new();
        batch
            .set_checked(
                container_path.clone(),
                Value::Object(data),
                Precondition::Revision(doc.revision),
            )
            .set_record(path::membership(container_id, old_owner_id), &demoted)?
            .set_record(path::membership(container_id, new_owner_id), &promoted)?;
        self.commit_existing(&container_path, batch).await?;

        tracing::info!(%container_id, from = %old_owner_id, to = %new_owner_id, "Ownership transferred");
        self.emit_lifecycle(
            container_id,
            EntityKind::Container,
            LifecycleAction::OwnershipTransferred,
            actor_id,
            json!({ "entityId": container_id, "from": old_owner_id, "to": new_owner_id }),
        );
        Ok(OwnershipTransfer {
            container,
            demoted,
            promoted,
        })
    }

    /// Set the grant for `(scope, user)`, replacing any previous one.
    pub async fn set_grant(
        &self,
        actor_id: Uuid,
        container_id: Uuid,
        scope_type: ScopeType,
        scope_id: Uuid,
        user_id: Uuid,
        permissions: PermissionSet,
    ) -> SyncResult<PermissionGrant> {
        self.read(&scope_path(container_id, scope_type, scope_id)).await?;

        let grant = PermissionGrant::new(container_id, scope_type, scope_id, user_id, permissions)
            .at(self.clock.now())
            .with_assigner(actor_id);
        let mut batch = WriteBatch::new();
        batch.set_record(path::grant(container_id, &grant.id), &grant)?;
        self.store.commit(batch).await?;

        tracing::info!(%container_id, grant_id = %grant.id, "Grant set");
        self.emit_lifecycle(
            container_id,
            scope_kind(scope_type),
            LifecycleAction::Shared,
            actor_id,
            json!({ "entityId": scope_id, "userId": user_id, "permissions": permissions }),
        );
        Ok(grant)
    }

    /// Remove the grant for `(scope, user)`.
    pub async fn remove_grant(
        &self,
        actor_id: Uuid,
        container_id: Uuid,
        scope_type: ScopeType,
        scope_id: Uuid,
        user_id: Uuid,
    ) -> SyncResult<()> {
        let id = grant_id(scope_type, scope_id, user_id);
        let grant_path = path::grant(container_id, &id);
        let mut batch = WriteBatch::new();
        batch.delete_checked(grant_path.clone(), Precondition::Exists);
        self.commit_existing(&grant_path, batch).await?;

        tracing::info!(%container_id, grant_id = %id, "Grant removed");
        self.emit_lifecycle(
            container_id,
            scope_kind(scope_type),
            LifecycleAction::AccessRevoked,
            actor_id,
            json!({ "entityId": scope_id, "userId": user_id }),
        );
        Ok(())
    }

    /// Move an item to another sub-container of its container, or to the
    /// container root with `None`.
    pub async fn move_item(
        &self,
        actor_id: Uuid,
        container_id: Uuid,
        item_id: Uuid,
        target: Option<Uuid>,
    ) -> SyncResult<Mutation> {
        if let Some(sub_container_id) = target {
            self.read(&path::sub_container(container_id, sub_container_id))
                .await?;
        }

        let entity = EntityRef::item(container_id, item_id);
        let fields = ["subContainerId".to_string()];
        let mutation = self
            .read_modify_write(entity, None, &fields, |document| {
                document.insert("subContainerId".to_string(), json!(target));
            })
            .await?;

        if let Some(change) = mutation.changes.get("subContainerId") {
            let payload = json!({ "entityId": item_id, "from": change.from, "to": change.to });
            for direction in [MoveDirection::Out, MoveDirection::In] {
                self.emit(
                    container_id,
                    AuditKind::Moved(EntityKind::Item, direction),
                    actor_id,
                    payload.clone(),
                );
            }
        }
        Ok(mutation)
    }

    fn emit_lifecycle(
        &self,
        container_id: Uuid,
        kind: EntityKind,
        action: LifecycleAction,
        actor_id: Uuid,
        payload: Value,
    ) {
        self.emit(container_id, AuditKind::Lifecycle(kind, action), actor_id, payload);
    }

    /// Commit a batch of creates; a failed precondition means an id clash.
    async fn commit_new(&self, batch: WriteBatch) -> SyncResult<()> {
        match self.store.commit(batch).await {
            Ok(()) => Ok(()),
            Err(StoreError::PreconditionFailed { path, .. }) => Err(SyncError::InvalidRequest(format!(
                "{path} already exists"
            ))),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryDocumentStore;
    use crate::store::DocumentStore;
    use std::sync::Arc;
    use trove_events::{AuditLog, ManualClock, MemoryAuditStore};
    use trove_rbac::Permission;
    use trove_tree::MembershipRole;

    struct Harness {
        coordinator: MutationCoordinator,
        store: MemoryDocumentStore,
        audit: MemoryAuditStore,
        owner: Uuid,
    }

    fn harness() -> Harness {
        let store = MemoryDocumentStore::new();
        let audit = MemoryAuditStore::new();
        let clock = Arc::new(ManualClock::default());
        let log = Arc::new(AuditLog::new(Arc::new(audit.clone())).with_clock(clock.clone()));
        Harness {
            coordinator: MutationCoordinator::new(Arc::new(store.clone()), log).with_clock(clock),
            store,
            audit,
            owner: Uuid::now_v7(),
        }
    }

    async fn event_types(audit: &MemoryAuditStore, container_id: Uuid, count: usize) -> Vec<String> {
        for _ in 0..100 {
            if audit.events(container_id).await.len() >= count {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        audit
            .events(container_id)
            .await
            .into_iter()
            .map(|e| e.event_type)
            .collect()
    }

    async fn membership(store: &MemoryDocumentStore, container_id: Uuid, user_id: Uuid) -> Membership {
        store
            .get(&path::membership(container_id, user_id))
            .await
            .unwrap()
            .unwrap()
            .decode()
            .unwrap()
    }

    #[tokio::test]
    async fn test_create_container_provisions_owner_membership() {
        let h = harness();
        let container = h
            .coordinator
            .create_container(h.owner, Container::new("x".repeat(50), Uuid::nil()))
            .await
            .unwrap();

        assert_eq!(container.owner_id, h.owner);
        assert_eq!(container.name.chars().count(), 35);
        let owner = membership(&h.store, container.id, h.owner).await;
        assert_eq!(owner.role, MembershipRole::Owner);
        assert!(owner.permissions.is_none());
        assert_eq!(
            event_types(&h.audit, container.id, 1).await,
            vec!["CONTAINER_CREATED"]
        );
    }

    #[tokio::test]
    async fn test_create_item_requires_parents() {
        let h = harness();
        let err = h
            .coordinator
            .create_item(h.owner, Item::new(Uuid::now_v7(), "Lamp", h.owner))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::NotFound(_)));

        let container = h
            .coordinator
            .create_container(h.owner, Container::new("Home", h.owner))
            .await
            .unwrap();
        let err = h
            .coordinator
            .create_item(
                h.owner,
                Item::new(container.id, "Lamp", h.owner).in_sub_container(Uuid::now_v7()),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_delete_sub_container_cascades() {
        let h = harness();
        let c = h
            .coordinator
            .create_container(h.owner, Container::new("Home", h.owner))
            .await
            .unwrap();
        let sub = h
            .coordinator
            .create_sub_container(h.owner, SubContainer::new(c.id, "Shelf", h.owner))
            .await
            .unwrap();
        let inside = h
            .coordinator
            .create_item(h.owner, Item::new(c.id, "Cup", h.owner).in_sub_container(sub.id))
            .await
            .unwrap();
        let outside = h
            .coordinator
            .create_item(h.owner, Item::new(c.id, "Pan", h.owner))
            .await
            .unwrap();
        let guest = Uuid::now_v7();
        h.coordinator
            .share(h.owner, c.id, guest, ShareAccess::role(RoleLabel::Reviewer))
            .await
            .unwrap();
        for (scope_type, scope_id) in [
            (ScopeType::SubContainer, sub.id),
            (ScopeType::Item, inside.id),
            (ScopeType::Item, outside.id),
        ] {
            h.coordinator
                .set_grant(h.owner, c.id, scope_type, scope_id, guest, PermissionSet::full())
                .await
                .unwrap();
        }

        let removed = h
            .coordinator
            .delete(h.owner, EntityRef::sub_container(c.id, sub.id))
            .await
            .unwrap();

        // sub-container, its item, and the two grants scoped to them
        assert_eq!(removed, 4);
        assert!(h.store.get(&path::item(c.id, inside.id)).await.unwrap().is_none());
        assert!(h.store.get(&path::item(c.id, outside.id)).await.unwrap().is_some());
        let outside_grant = grant_id(ScopeType::Item, outside.id, guest);
        assert!(h.store.get(&path::grant(c.id, &outside_grant)).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_delete_container_keeps_memberships() {
        let h = harness();
        let c = h
            .coordinator
            .create_container(h.owner, Container::new("Home", h.owner))
            .await
            .unwrap();
        h.coordinator
            .create_item(h.owner, Item::new(c.id, "Pan", h.owner))
            .await
            .unwrap();

        let removed = h
            .coordinator
            .delete(h.owner, EntityRef::container(c.id))
            .await
            .unwrap();
        assert_eq!(removed, 2);
        assert!(h.store.get(&path::container(c.id)).await.unwrap().is_none());
        assert!(h
            .store
            .get(&path::membership(c.id, h.owner))
            .await
            .unwrap()
            .is_some());

        let err = h
            .coordinator
            .delete(h.owner, EntityRef::container(c.id))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_share_and_revoke() {
        let h = harness();
        let c = h
            .coordinator
            .create_container(h.owner, Container::new("Home", h.owner))
            .await
            .unwrap();
        let guest = Uuid::now_v7();

        let shared = h
            .coordinator
            .share(
                h.owner,
                c.id,
                guest,
                ShareAccess::Role {
                    label: RoleLabel::Editor,
                    can_create: false,
                },
            )
            .await
            .unwrap();
        let permissions = shared.permissions.unwrap();
        assert!(permissions.has(Permission::Edit));
        assert!(!permissions.has(Permission::Create));

        let revoked = h.coordinator.revoke_access(h.owner, c.id, guest).await.unwrap();
        assert!(!revoked.is_active());
        assert!(revoked.revoked_at.is_some());
        assert!(!membership(&h.store, c.id, guest).await.is_active());

        let types = event_types(&h.audit, c.id, 3).await;
        assert!(types.contains(&"CONTAINER_SHARED".to_string()));
        assert!(types.contains(&"CONTAINER_ACCESS_REVOKED".to_string()));
    }

    #[tokio::test]
    async fn test_owner_of_record_cannot_be_shared_or_revoked() {
        let h = harness();
        let c = h
            .coordinator
            .create_container(h.owner, Container::new("Home", h.owner))
            .await
            .unwrap();

        let err = h
            .coordinator
            .share(h.owner, c.id, h.owner, ShareAccess::role(RoleLabel::Reviewer))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::InvalidRequest(_)));

        let err = h.coordinator.revoke_access(h.owner, c.id, h.owner).await.unwrap_err();
        assert!(matches!(err, SyncError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_transfer_ownership() {
        let h = harness();
        let c = h
            .coordinator
            .create_container(h.owner, Container::new("Home", h.owner))
            .await
            .unwrap();
        let heir = Uuid::now_v7();

        let transfer = h.coordinator.transfer_ownership(h.owner, c.id, heir).await.unwrap();
        assert_eq!(transfer.container.owner_id, heir);
        assert_eq!(transfer.promoted.user_id, heir);

        let stored: Container = h
            .store
            .get(&path::container(c.id))
            .await
            .unwrap()
            .unwrap()
            .decode()
            .unwrap();
        assert_eq!(stored.owner_id, heir);

        let old = membership(&h.store, c.id, h.owner).await;
        assert_eq!(old.role, MembershipRole::Delegate);
        assert!(old.permissions.unwrap().is_full());
        let new = membership(&h.store, c.id, heir).await;
        assert!(new.is_active_owner());

        let err = h.coordinator.transfer_ownership(heir, c.id, heir).await.unwrap_err();
        assert!(matches!(err, SyncError::InvalidRequest(_)));
    }

    #[tokio::test]
    async fn test_set_and_remove_grant() {
        let h = harness();
        let c = h
            .coordinator
            .create_container(h.owner, Container::new("Home", h.owner))
            .await
            .unwrap();
        let item = h
            .coordinator
            .create_item(h.owner, Item::new(c.id, "Pan", h.owner))
            .await
            .unwrap();
        let guest = Uuid::now_v7();

        let grant = h
            .coordinator
            .set_grant(h.owner, c.id, ScopeType::Item, item.id, guest, PermissionSet::view_only())
            .await
            .unwrap();
        assert!(grant.is_consistent());

        h.coordinator
            .remove_grant(h.owner, c.id, ScopeType::Item, item.id, guest)
            .await
            .unwrap();
        let err = h
            .coordinator
            .remove_grant(h.owner, c.id, ScopeType::Item, item.id, guest)
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::NotFound(_)));

        let err = h
            .coordinator
            .set_grant(h.owner, c.id, ScopeType::Item, Uuid::now_v7(), guest, PermissionSet::full())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_move_item_emits_split_events() {
        let h = harness();
        let c = h
            .coordinator
            .create_container(h.owner, Container::new("Home", h.owner))
            .await
            .unwrap();
        let sub = h
            .coordinator
            .create_sub_container(h.owner, SubContainer::new(c.id, "Shelf", h.owner))
            .await
            .unwrap();
        let item = h
            .coordinator
            .create_item(h.owner, Item::new(c.id, "Cup", h.owner))
            .await
            .unwrap();

        let mutation = h
            .coordinator
            .move_item(h.owner, c.id, item.id, Some(sub.id))
            .await
            .unwrap();
        let moved: Item = mutation.decode().unwrap();
        assert_eq!(moved.sub_container_id, Some(sub.id));
        assert!(moved.edited_at > item.edited_at);

        let types = event_types(&h.audit, c.id, 5).await;
        assert!(types.contains(&"ITEM_MOVED_OUT".to_string()));
        assert!(types.contains(&"ITEM_MOVED_IN".to_string()));

        let err = h
            .coordinator
            .move_item(h.owner, c.id, item.id, Some(Uuid::now_v7()))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::NotFound(_)));
    }
}
