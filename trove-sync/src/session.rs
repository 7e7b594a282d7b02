//! Client session facade.
//!
//! A [`Session`] is what an application talks to. It resolves permissions
//! against the local cache, refuses what the signed-in user may not do,
//! runs the operation through the [`MutationCoordinator`], and writes the
//! result through to the cache so the caller sees it before the live
//! channel catches up.

use serde_json::{json, Value};
use std::sync::Arc;
use uuid::Uuid;

use trove_access::{AccessQuery, IdentityProvider, PermissionResolver};
use trove_events::normalize::normalize_value;
use trove_events::{AuditLog, AuditStore, Clock, RecordOutcome, SystemClock};
use trove_rbac::{Permission, PermissionSet, RoleLabel, ScopeType};
use trove_tree::grant::grant_id;
use trove_tree::path::{self, CONTAINERS};
use trove_tree::{
    ChildCollection, Container, EntityKind, EntityRef, Item, Membership, PermissionGrant,
    SubContainer,
};

use crate::audit_store::DocumentAuditStore;
use crate::cache::{decode_documents, LocalCache};
use crate::config::{ConfigError, SyncConfig};
use crate::error::{SyncError, SyncResult};
use crate::lifecycle::{OwnershipTransfer, ShareAccess};
use crate::mutation::{Mutation, MutationCoordinator};
use crate::patch::Patch;
use crate::store::{DocumentStore, Query};
use crate::subscription::SubscriptionManager;

/// Builder for [`Session`].
pub struct SessionBuilder {
    store: Arc<dyn DocumentStore>,
    identity: Arc<dyn IdentityProvider>,
    audit_store: Option<Arc<dyn AuditStore>>,
    clock: Arc<dyn Clock>,
    config: SyncConfig,
}

impl SessionBuilder {
    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Keep audit events somewhere other than the document store.
    pub fn with_audit_store(mut self, audit_store: Arc<dyn AuditStore>) -> Self {
        self.audit_store = Some(audit_store);
        self
    }

    pub fn build(self) -> Result<Session, ConfigError> {
        self.config.validate()?;

        let audit_store = self
            .audit_store
            .unwrap_or_else(|| Arc::new(DocumentAuditStore::new(self.store.clone())));
        let audit = Arc::new(
            AuditLog::new(audit_store)
                .with_clock(self.clock.clone())
                .with_config(self.config.audit.clone()),
        );
        let coordinator = MutationCoordinator::new(self.store.clone(), audit.clone())
            .with_clock(self.clock)
            .with_config(&self.config);
        let cache = Arc::new(LocalCache::new());
        let subscriptions = SubscriptionManager::new(self.store.clone(), cache.clone());

        Ok(Session {
            store: self.store,
            identity: self.identity,
            audit,
            coordinator,
            cache,
            subscriptions,
            config: self.config,
        })
    }
}

/// One signed-in client's view of the tree.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use uuid::Uuid;
/// use trove_access::SessionIdentity;
/// use trove_sync::{MemoryDocumentStore, Patch, Session};
/// use trove_tree::{Container, TreeEntity};
///
/// # #[tokio::main]
/// # async fn main() {
/// let user = Uuid::now_v7();
/// let session = Session::builder(
///     Arc::new(MemoryDocumentStore::new()),
///     Arc::new(SessionIdentity::signed_in(user)),
/// )
/// .build()
/// .unwrap();
///
/// session.sign_in().await.unwrap();
/// let container = session.create_container(Container::new("Garage", user)).await.unwrap();
/// let mutation = session
///     .mutate(container.entity_ref(), Patch::new().set("name", "Shed"), Some(container.edited_at))
///     .await
///     .unwrap();
/// assert_eq!(mutation.changes["name"].to, "Shed");
/// # }
/// ```
pub struct Session {
    store: Arc<dyn DocumentStore>,
    identity: Arc<dyn IdentityProvider>,
    audit: Arc<AuditLog>,
    coordinator: MutationCoordinator,
    cache: Arc<LocalCache>,
    subscriptions: SubscriptionManager,
    config: SyncConfig,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("user", &self.identity.current_user())
            .field("subscriptions", &self.subscriptions)
            .field("config", &self.config)
            .finish()
    }
}

impl Session {
    pub fn builder(store: Arc<dyn DocumentStore>, identity: Arc<dyn IdentityProvider>) -> SessionBuilder {
        SessionBuilder {
            store,
            identity,
            audit_store: None,
            clock: Arc::new(SystemClock),
            config: SyncConfig::default(),
        }
    }

    /// Load the user's containers and open channels for the owned ones.
    ///
    /// Owned means legacy owner of record or an active OWNER membership.
    /// Containers shared with the user are cached but only streamed once
    /// retained.
    pub async fn sign_in(&self) -> SyncResult<Vec<Container>> {
        let user_id = self.user_id()?;

        let owned_query = Query::collection(CONTAINERS).where_eq("ownerId", json!(user_id));
        let mut containers: Vec<Container> = decode_documents(&self.store.query(&owned_query).await?);

        let membership_query = Query::collection_group(ChildCollection::Memberships.name())
            .where_eq("userId", json!(user_id));
        let memberships: Vec<Membership> =
            decode_documents(&self.store.query(&membership_query).await?);

        for membership in memberships.iter().filter(|m| m.is_active()) {
            if containers.iter().any(|c| c.id == membership.container_id) {
                continue;
            }
            match self.store.get(&path::container(membership.container_id)).await? {
                Some(doc) => match doc.decode::<Container>() {
                    Ok(container) => containers.push(container),
                    Err(e) => {
                        tracing::warn!(path = %doc.path, error = %e, "Skipping undecodable container");
                    }
                },
                None => {
                    tracing::debug!(container_id = %membership.container_id, "Membership of a deleted container");
                }
            }
        }

        let baseline: Vec<Uuid> = containers
            .iter()
            .filter(|c| {
                c.owner_id == user_id
                    || memberships
                        .iter()
                        .any(|m| m.container_id == c.id && m.is_active_owner())
            })
            .map(|c| c.id)
            .collect();

        {
            let mut cache = self.cache.write();
            cache.set_principal(Some(user_id));
            cache.merge_containers(containers.clone());
            for membership in memberships {
                cache.upsert_membership(membership);
            }
        }
        self.subscriptions.set_baseline(baseline.iter().copied());

        tracing::info!(
            %user_id,
            containers = containers.len(),
            owned = baseline.len(),
            "Signed in"
        );
        Ok(containers)
    }

    /// Close every channel and forget all cached state.
    pub fn sign_out(&self) {
        self.subscriptions.clear();
        self.cache.clear();
        tracing::info!("Signed out");
    }

    /// The signed-in user.
    pub fn user_id(&self) -> SyncResult<Uuid> {
        Ok(self.identity.require_user()?)
    }

    /// Whether the signed-in user holds `permission` on `entity`.
    pub fn resolve(&self, entity: EntityRef, permission: Permission) -> SyncResult<bool> {
        let query = self.query_for(entity)?;
        let cache = self.cache.read();
        Ok(PermissionResolver::new(&*cache).resolve(&query, permission))
    }

    /// Like [`resolve`](Self::resolve), but a `false` is [`SyncError::Denied`].
    pub fn require(&self, entity: EntityRef, permission: Permission) -> SyncResult<()> {
        let query = self.query_for(entity)?;
        let cache = self.cache.read();
        PermissionResolver::new(&*cache).require(&query, permission)?;
        Ok(())
    }

    pub fn effective_permissions(&self, entity: EntityRef) -> SyncResult<PermissionSet> {
        let query = self.query_for(entity)?;
        let cache = self.cache.read();
        Ok(PermissionResolver::new(&*cache).effective_permissions(&query))
    }

    pub fn display_role(&self, entity: EntityRef) -> SyncResult<RoleLabel> {
        let query = self.query_for(entity)?;
        let cache = self.cache.read();
        Ok(PermissionResolver::new(&*cache).display_role(&query))
    }

    fn require_owner(&self, container_id: Uuid) -> SyncResult<Uuid> {
        let user_id = self.user_id()?;
        let cache = self.cache.read();
        PermissionResolver::new(&*cache).require_owner(container_id, user_id)?;
        Ok(user_id)
    }

    /// Access query for `entity`. Items pick up their cached sub-container.
    fn query_for(&self, entity: EntityRef) -> SyncResult<AccessQuery> {
        let user_id = self.user_id()?;
        let query = match entity {
            EntityRef::Container { id } => AccessQuery::container(id, user_id),
            EntityRef::SubContainer { container_id, id } => {
                AccessQuery::container(container_id, user_id).in_sub_container(id)
            }
            EntityRef::Item { container_id, id } => {
                let cache = self.cache.read();
                match cache.items(container_id).iter().find(|i| i.id == id) {
                    Some(item) => AccessQuery::for_item(item, user_id),
                    None => AccessQuery::container(container_id, user_id).on_item(id),
                }
            }
        };
        Ok(query)
    }

    /// Apply a patch. Requires Edit.
    pub async fn mutate(
        &self,
        entity: EntityRef,
        patch: Patch,
        expected_edited_at: Option<chrono::DateTime<chrono::Utc>>,
    ) -> SyncResult<Mutation> {
        let user_id = self.user_id()?;
        self.require(entity, Permission::Edit)?;
        let mutation = self
            .coordinator
            .mutate(user_id, entity, patch, expected_edited_at)
            .await?;
        self.write_through(&mutation);
        Ok(mutation)
    }

    /// Stamp `viewedAt`. Requires View.
    pub async fn mark_viewed(&self, entity: EntityRef) -> SyncResult<chrono::DateTime<chrono::Utc>> {
        let user_id = self.user_id()?;
        self.require(entity, Permission::View)?;
        self.coordinator.mark_viewed(user_id, entity).await
    }

    /// Create a container owned by the signed-in user and start streaming it.
    pub async fn create_container(&self, container: Container) -> SyncResult<Container> {
        let user_id = self.user_id()?;
        let container = self.coordinator.create_container(user_id, container).await?;
        {
            let mut cache = self.cache.write();
            cache.upsert_container(container.clone());
            cache.upsert_membership(Membership::owner(container.id, user_id).at(container.created_at));
        }
        self.subscriptions.extend_baseline(container.id);
        Ok(container)
    }

    /// Requires Create on the container.
    pub async fn create_sub_container(&self, sub_container: SubContainer) -> SyncResult<SubContainer> {
        let user_id = self.user_id()?;
        self.require(EntityRef::container(sub_container.container_id), Permission::Create)?;
        let sub_container = self
            .coordinator
            .create_sub_container(user_id, sub_container)
            .await?;
        self.cache.write().upsert_sub_container(sub_container.clone());
        Ok(sub_container)
    }

    /// Requires Create on the item's parent scope.
    pub async fn create_item(&self, item: Item) -> SyncResult<Item> {
        let user_id = self.user_id()?;
        let scope = match item.sub_container_id {
            Some(sub_id) => EntityRef::sub_container(item.container_id, sub_id),
            None => EntityRef::container(item.container_id),
        };
        self.require(scope, Permission::Create)?;
        let item = self.coordinator.create_item(user_id, item).await?;
        self.cache.write().upsert_item(item.clone());
        Ok(item)
    }

    /// Delete with cascade. Requires Delete.
    pub async fn delete(&self, entity: EntityRef) -> SyncResult<usize> {
        let user_id = self.user_id()?;
        self.require(entity, Permission::Delete)?;
        let removed = self.coordinator.delete(user_id, entity).await?;
        if let EntityRef::Container { id } = entity {
            self.subscriptions.forget(id);
        }
        self.cache.write().remove_entity(entity);
        Ok(removed)
    }

    /// Share a container. Owners only.
    pub async fn share(&self, container_id: Uuid, user_id: Uuid, access: ShareAccess) -> SyncResult<Membership> {
        let actor_id = self.require_owner(container_id)?;
        let membership = self
            .coordinator
            .share(actor_id, container_id, user_id, access)
            .await?;
        self.cache.write().upsert_membership(membership.clone());
        Ok(membership)
    }

    /// Revoke a user's membership. Owners only.
    pub async fn revoke_access(&self, container_id: Uuid, user_id: Uuid) -> SyncResult<Membership> {
        let actor_id = self.require_owner(container_id)?;
        let membership = self
            .coordinator
            .revoke_access(actor_id, container_id, user_id)
            .await?;
        self.cache.write().upsert_membership(membership.clone());
        Ok(membership)
    }

    /// Hand a container to another user. Owners only.
    pub async fn transfer_ownership(&self, container_id: Uuid, new_owner_id: Uuid) -> SyncResult<OwnershipTransfer> {
        let actor_id = self.require_owner(container_id)?;
        let transfer = self
            .coordinator
            .transfer_ownership(actor_id, container_id, new_owner_id)
            .await?;
        {
            let mut cache = self.cache.write();
            cache.upsert_container(transfer.container.clone());
            cache.upsert_membership(transfer.demoted.clone());
            cache.upsert_membership(transfer.promoted.clone());
        }
        Ok(transfer)
    }

    /// Set a scoped grant. Owners only.
    pub async fn set_grant(
        &self,
        container_id: Uuid,
        scope_type: ScopeType,
        scope_id: Uuid,
        user_id: Uuid,
        permissions: PermissionSet,
    ) -> SyncResult<PermissionGrant> {
        let actor_id = self.require_owner(container_id)?;
        let grant = self
            .coordinator
            .set_grant(actor_id, container_id, scope_type, scope_id, user_id, permissions)
            .await?;
        self.cache.write().upsert_grant(grant.clone());
        Ok(grant)
    }

    /// Remove a scoped grant. Owners only.
    pub async fn remove_grant(
        &self,
        container_id: Uuid,
        scope_type: ScopeType,
        scope_id: Uuid,
        user_id: Uuid,
    ) -> SyncResult<()> {
        let actor_id = self.require_owner(container_id)?;
        self.coordinator
            .remove_grant(actor_id, container_id, scope_type, scope_id, user_id)
            .await?;
        self.cache
            .write()
            .remove_grant(&grant_id(scope_type, scope_id, user_id));
        Ok(())
    }

    /// Move an item to another sub-container, or to the container root.
    /// Requires Move on the item.
    pub async fn move_item(&self, container_id: Uuid, item_id: Uuid, target: Option<Uuid>) -> SyncResult<Mutation> {
        let user_id = self.user_id()?;
        self.require(EntityRef::item(container_id, item_id), Permission::Move)?;
        let mutation = self
            .coordinator
            .move_item(user_id, container_id, item_id, target)
            .await?;
        self.write_through(&mutation);
        Ok(mutation)
    }

    /// Record an audit event as the signed-in user and wait for the outcome.
    ///
    /// Each top-level payload field is normalized before storage.
    pub async fn record(&self, container_id: Uuid, event_type: &str, payload: Value) -> SyncResult<RecordOutcome> {
        let user_id = self.user_id()?;
        let payload = match payload {
            Value::Object(fields) => Value::Object(
                fields
                    .into_iter()
                    .map(|(k, v)| {
                        let v = normalize_value(&v);
                        (k, v)
                    })
                    .collect(),
            ),
            other => normalize_value(&other),
        };
        Ok(self.audit.record(container_id, event_type, user_id, payload).await?)
    }

    /// Keep a container's channel open while something needs it.
    pub fn retain(&self, container_id: Uuid) {
        self.subscriptions.retain(container_id);
    }

    pub fn release(&self, container_id: Uuid) {
        self.subscriptions.release(container_id);
    }

    pub fn is_subscribed(&self, container_id: Uuid) -> bool {
        self.subscriptions.is_subscribed(container_id)
    }

    /// Reopen channels that are wanted but not live, e.g. after the store
    /// was unreachable when they were opened.
    pub fn reconcile(&self) {
        self.subscriptions.reconcile();
    }

    pub fn containers(&self) -> Vec<Container> {
        self.cache.containers()
    }

    pub fn container(&self, container_id: Uuid) -> Option<Container> {
        self.cache.container(container_id)
    }

    pub fn sub_containers(&self, container_id: Uuid) -> Vec<SubContainer> {
        self.cache.sub_containers(container_id)
    }

    pub fn items(&self, container_id: Uuid) -> Vec<Item> {
        self.cache.items(container_id)
    }

    pub fn memberships(&self, container_id: Uuid) -> Vec<Membership> {
        self.cache.memberships(container_id)
    }

    pub fn grants(&self, container_id: Uuid) -> Vec<PermissionGrant> {
        self.cache.grants(container_id)
    }

    pub fn audit(&self) -> &Arc<AuditLog> {
        &self.audit
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    fn write_through(&self, mutation: &Mutation) {
        let result = match mutation.entity.kind() {
            EntityKind::Container => mutation
                .decode::<Container>()
                .map(|c| self.cache.write().upsert_container(c)),
            EntityKind::SubContainer => mutation
                .decode::<SubContainer>()
                .map(|s| self.cache.write().upsert_sub_container(s)),
            EntityKind::Item => mutation
                .decode::<Item>()
                .map(|i| self.cache.write().upsert_item(i)),
        };
        if let Err(e) = result {
            tracing::warn!(entity = %mutation.entity, error = %e, "Mutation result not cached");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryDocumentStore;
    use trove_access::{AccessError, SessionIdentity};
    use trove_events::{ManualClock, MemoryAuditStore};
    use trove_tree::TreeEntity;

    struct Harness {
        store: MemoryDocumentStore,
        identity: Arc<SessionIdentity>,
        session: Session,
    }

    fn harness(user_id: Uuid) -> Harness {
        let store = MemoryDocumentStore::new();
        let identity = Arc::new(SessionIdentity::signed_in(user_id));
        let session = Session::builder(Arc::new(store.clone()), identity.clone())
            .with_audit_store(Arc::new(MemoryAuditStore::new()))
            .with_clock(Arc::new(ManualClock::default()))
            .build()
            .unwrap();
        Harness {
            store,
            identity,
            session,
        }
    }

    #[tokio::test]
    async fn test_signed_out_is_refused() {
        let h = harness(Uuid::now_v7());
        h.identity.sign_out();

        let err = h
            .session
            .create_container(Container::new("Home", Uuid::nil()))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::SignedOut));
        assert!(matches!(h.session.sign_in().await, Err(SyncError::SignedOut)));
    }

    #[tokio::test]
    async fn test_create_container_makes_owner() {
        let owner = Uuid::now_v7();
        let h = harness(owner);
        let container = h
            .session
            .create_container(Container::new("Home", Uuid::nil()))
            .await
            .unwrap();

        assert!(h.session.is_subscribed(container.id));
        assert_eq!(
            h.session.display_role(container.entity_ref()).unwrap(),
            RoleLabel::Owner
        );
        assert!(h
            .session
            .resolve(container.entity_ref(), Permission::Delete)
            .unwrap());
    }

    #[tokio::test]
    async fn test_stranger_cannot_mutate() {
        let owner = Uuid::now_v7();
        let h = harness(owner);
        let container = h
            .session
            .create_container(Container::new("Home", owner))
            .await
            .unwrap();

        h.identity.sign_in(Uuid::now_v7());
        let err = h
            .session
            .mutate(container.entity_ref(), Patch::new().set("name", "Mine"), None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            SyncError::Denied(AccessError::Denied {
                permission: Permission::Edit,
                ..
            })
        ));

        let err = h
            .session
            .share(container.id, Uuid::now_v7(), ShareAccess::role(RoleLabel::Editor))
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::Denied(AccessError::NotOwner { .. })));
    }

    #[tokio::test]
    async fn test_sign_in_loads_owned_and_shared() {
        let owner = Uuid::now_v7();
        let guest = Uuid::now_v7();
        let h = harness(owner);
        let mine = h
            .session
            .create_container(Container::new("Mine", owner))
            .await
            .unwrap();
        h.session
            .share(mine.id, guest, ShareAccess::role(RoleLabel::Reviewer))
            .await
            .unwrap();

        let guest_session = Session::builder(
            Arc::new(h.store.clone()),
            Arc::new(SessionIdentity::signed_in(guest)),
        )
        .with_audit_store(Arc::new(MemoryAuditStore::new()))
        .build()
        .unwrap();
        let loaded = guest_session.sign_in().await.unwrap();

        assert_eq!(loaded.len(), 1);
        assert!(!guest_session.is_subscribed(mine.id));
        assert!(guest_session
            .resolve(mine.entity_ref(), Permission::View)
            .unwrap());
        assert!(!guest_session
            .resolve(mine.entity_ref(), Permission::Edit)
            .unwrap());

        guest_session.sign_out();
        assert!(guest_session.containers().is_empty());
    }

    #[tokio::test]
    async fn test_record_normalizes_payload_fields() {
        let owner = Uuid::now_v7();
        let h = harness(owner);
        let container = h
            .session
            .create_container(Container::new("Home", owner))
            .await
            .unwrap();

        let outcome = h
            .session
            .record(
                container.id,
                "ITEM_VIEWED",
                json!({ "entityId": Uuid::nil(), "tags": (0..20).collect::<Vec<_>>() }),
            )
            .await
            .unwrap();
        assert!(matches!(outcome, RecordOutcome::Recorded(_)));

        let skipped = h
            .session
            .record(container.id, "ITEM_PRINTED", json!({}))
            .await
            .unwrap();
        assert!(skipped.is_skipped());
    }
}
