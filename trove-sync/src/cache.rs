//! Client-side view of the resource tree.
//!
//! The cache is fed by live channels (full snapshots per container and
//! child collection), by sign-in queries and by write-through of this
//! session's own mutations. It is eventually consistent with the store.

use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use serde::de::DeserializeOwned;
use std::collections::HashMap;
use uuid::Uuid;

use trove_access::{AccessSource, GrantStore, MembershipStore};
use trove_rbac::ScopeType;
use trove_tree::{
    ChildCollection, Container, EntityRef, Item, Membership, PermissionGrant, SubContainer,
};

use crate::store::{Document, QuerySnapshot};

/// Typed contents of one child collection of one container.
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot<T> {
    pub container_id: Uuid,
    pub items: Vec<T>,
    /// The container is gone; drop everything cached for this collection
    pub removed: bool,
}

impl<T: DeserializeOwned> Snapshot<T> {
    /// Decode a store snapshot. Documents that do not decode are skipped.
    pub fn decode(container_id: Uuid, snapshot: &QuerySnapshot) -> Self {
        Self {
            container_id,
            items: decode_documents(&snapshot.documents),
            removed: snapshot.removed,
        }
    }
}

/// Decode documents, skipping (and logging) those that do not fit `T`.
pub fn decode_documents<T: DeserializeOwned>(documents: &[Document]) -> Vec<T> {
    documents
        .iter()
        .filter_map(|doc| match doc.decode() {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::warn!(path = %doc.path, error = %e, "Skipping undecodable document");
                None
            }
        })
        .collect()
}

/// Records with a stable identity.
pub trait Keyed {
    type Key: PartialEq;

    fn key(&self) -> Self::Key;
}

impl Keyed for Container {
    type Key = Uuid;

    fn key(&self) -> Uuid {
        self.id
    }
}

impl Keyed for SubContainer {
    type Key = Uuid;

    fn key(&self) -> Uuid {
        self.id
    }
}

impl Keyed for Item {
    type Key = Uuid;

    fn key(&self) -> Uuid {
        self.id
    }
}

impl Keyed for Membership {
    type Key = (Uuid, Uuid);

    fn key(&self) -> (Uuid, Uuid) {
        Membership::key(self)
    }
}

impl Keyed for PermissionGrant {
    type Key = String;

    fn key(&self) -> String {
        self.id.clone()
    }
}

/// Merge `incoming` into `existing`: replace in place by key, else append.
/// Never removes.
///
/// # Examples
///
/// ```
/// use uuid::Uuid;
/// use trove_sync::cache::merge_by_id;
/// use trove_tree::Container;
///
/// let owner = Uuid::now_v7();
/// let a = Container::new("A", owner);
/// let mut renamed = a.clone();
/// renamed.name = "A2".to_string();
/// let b = Container::new("B", owner);
///
/// let mut merged = vec![a];
/// merge_by_id(&mut merged, vec![renamed, b]);
/// assert_eq!(merged.len(), 2);
/// assert_eq!(merged[0].name, "A2");
/// ```
pub fn merge_by_id<T: Keyed>(existing: &mut Vec<T>, incoming: impl IntoIterator<Item = T>) {
    for record in incoming {
        let key = record.key();
        match existing.iter_mut().find(|r| r.key() == key) {
            Some(slot) => *slot = record,
            None => existing.push(record),
        }
    }
}

/// A decoded snapshot for one streamed collection.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheUpdate {
    SubContainers(Snapshot<SubContainer>),
    Items(Snapshot<Item>),
    Memberships(Snapshot<Membership>),
    Grants(Snapshot<PermissionGrant>),
}

impl CacheUpdate {
    /// Decode a snapshot of `collection`. Collections the cache does not
    /// hold yield `None`.
    pub fn decode(collection: ChildCollection, container_id: Uuid, snapshot: &QuerySnapshot) -> Option<Self> {
        match collection {
            ChildCollection::SubContainers => {
                Some(Self::SubContainers(Snapshot::decode(container_id, snapshot)))
            }
            ChildCollection::Items => Some(Self::Items(Snapshot::decode(container_id, snapshot))),
            ChildCollection::Memberships => {
                Some(Self::Memberships(Snapshot::decode(container_id, snapshot)))
            }
            ChildCollection::Grants => Some(Self::Grants(Snapshot::decode(container_id, snapshot))),
            ChildCollection::AuditEvents => None,
        }
    }

    pub fn container_id(&self) -> Uuid {
        match self {
            Self::SubContainers(s) => s.container_id,
            Self::Items(s) => s.container_id,
            Self::Memberships(s) => s.container_id,
            Self::Grants(s) => s.container_id,
        }
    }
}

/// Everything the cache holds.
#[derive(Debug, Default)]
pub struct CacheState {
    containers: Vec<Container>,
    sub_containers: HashMap<Uuid, Vec<SubContainer>>,
    items: HashMap<Uuid, Vec<Item>>,
    memberships: MembershipStore,
    grants: GrantStore,
    principal: Option<Uuid>,
}

impl CacheState {
    /// The signed-in user. Their own membership rows survive a purge.
    pub fn set_principal(&mut self, user_id: Option<Uuid>) {
        self.principal = user_id;
    }

    pub fn principal(&self) -> Option<Uuid> {
        self.principal
    }

    /// Replace the cached subset a snapshot covers.
    pub fn apply(&mut self, update: CacheUpdate) {
        match update {
            CacheUpdate::SubContainers(s) => {
                replace_subset(&mut self.sub_containers, s);
            }
            CacheUpdate::Items(s) => {
                replace_subset(&mut self.items, s);
            }
            CacheUpdate::Memberships(s) => {
                if s.removed {
                    self.memberships.remove_container(s.container_id);
                } else {
                    self.memberships.replace_container(s.container_id, s.items);
                }
            }
            CacheUpdate::Grants(s) => {
                if s.removed {
                    self.grants.remove_container(s.container_id);
                } else {
                    self.grants.replace_container(s.container_id, s.items);
                }
            }
        }
    }

    /// Forget the children of a container. The container record and the
    /// principal's own membership stay, so container-level access keeps
    /// resolving from sign-in data.
    pub fn purge_children(&mut self, container_id: Uuid) {
        let own = self
            .principal
            .and_then(|user_id| self.memberships.get(container_id, user_id).cloned());
        self.sub_containers.remove(&container_id);
        self.items.remove(&container_id);
        self.memberships.remove_container(container_id);
        self.grants.remove_container(container_id);
        if let Some(own) = own {
            self.memberships.upsert(own);
        }
    }

    pub fn merge_containers(&mut self, containers: Vec<Container>) {
        merge_by_id(&mut self.containers, containers);
    }

    pub fn upsert_container(&mut self, container: Container) {
        merge_by_id(&mut self.containers, [container]);
    }

    pub fn upsert_sub_container(&mut self, sub_container: SubContainer) {
        let rows = self.sub_containers.entry(sub_container.container_id).or_default();
        merge_by_id(rows, [sub_container]);
    }

    pub fn upsert_item(&mut self, item: Item) {
        let rows = self.items.entry(item.container_id).or_default();
        merge_by_id(rows, [item]);
    }

    pub fn upsert_membership(&mut self, membership: Membership) {
        self.memberships.upsert(membership);
    }

    pub fn upsert_grant(&mut self, grant: PermissionGrant) {
        self.grants.upsert(grant);
    }

    pub fn remove_grant(&mut self, id: &str) {
        self.grants.remove(id);
    }

    /// Drop a deleted entity and what was cascaded with it.
    pub fn remove_entity(&mut self, entity: EntityRef) {
        match entity {
            EntityRef::Container { id } => {
                self.purge_children(id);
                self.memberships.remove_container(id);
                self.containers.retain(|c| c.id != id);
            }
            EntityRef::SubContainer { container_id, id } => {
                self.grants.remove_scope(ScopeType::SubContainer, id);
                if let Some(items) = self.items.get_mut(&container_id) {
                    for item in items.iter().filter(|i| i.sub_container_id == Some(id)) {
                        self.grants.remove_scope(ScopeType::Item, item.id);
                    }
                    items.retain(|i| i.sub_container_id != Some(id));
                }
                if let Some(rows) = self.sub_containers.get_mut(&container_id) {
                    rows.retain(|s| s.id != id);
                }
            }
            EntityRef::Item { container_id, id } => {
                self.grants.remove_scope(ScopeType::Item, id);
                if let Some(rows) = self.items.get_mut(&container_id) {
                    rows.retain(|i| i.id != id);
                }
            }
        }
    }

    pub fn containers(&self) -> &[Container] {
        &self.containers
    }

    pub fn container(&self, id: Uuid) -> Option<&Container> {
        self.containers.iter().find(|c| c.id == id)
    }

    pub fn sub_containers(&self, container_id: Uuid) -> &[SubContainer] {
        self.sub_containers
            .get(&container_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn items(&self, container_id: Uuid) -> &[Item] {
        self.items
            .get(&container_id)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn memberships(&self) -> &MembershipStore {
        &self.memberships
    }

    pub fn grants(&self) -> &GrantStore {
        &self.grants
    }

    /// Whether any children of the container are cached.
    pub fn has_children(&self, container_id: Uuid) -> bool {
        !self.sub_containers(container_id).is_empty()
            || !self.items(container_id).is_empty()
            || !self.memberships.for_container(container_id).is_empty()
            || !self.grants.for_container(container_id).is_empty()
    }
}

fn replace_subset<T>(subsets: &mut HashMap<Uuid, Vec<T>>, snapshot: Snapshot<T>) {
    if snapshot.removed {
        subsets.remove(&snapshot.container_id);
    } else {
        subsets.insert(snapshot.container_id, snapshot.items);
    }
}

impl AccessSource for CacheState {
    fn owner_of_record(&self, container_id: Uuid) -> Option<Uuid> {
        self.container(container_id).map(|c| c.owner_id)
    }

    fn membership(&self, container_id: Uuid, user_id: Uuid) -> Option<&Membership> {
        self.memberships.get(container_id, user_id)
    }

    fn grant(&self, scope_type: ScopeType, scope_id: Uuid, user_id: Uuid) -> Option<&PermissionGrant> {
        self.grants.get(scope_type, scope_id, user_id)
    }
}

/// Shared, lock-protected [`CacheState`].
#[derive(Debug, Default)]
pub struct LocalCache {
    state: RwLock<CacheState>,
}

impl LocalCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn read(&self) -> RwLockReadGuard<'_, CacheState> {
        self.state.read()
    }

    pub fn write(&self) -> RwLockWriteGuard<'_, CacheState> {
        self.state.write()
    }

    pub fn apply(&self, update: CacheUpdate) {
        self.state.write().apply(update);
    }

    pub fn clear(&self) {
        *self.state.write() = CacheState::default();
    }

    pub fn containers(&self) -> Vec<Container> {
        self.read().containers().to_vec()
    }

    pub fn container(&self, id: Uuid) -> Option<Container> {
        self.read().container(id).cloned()
    }

    pub fn sub_containers(&self, container_id: Uuid) -> Vec<SubContainer> {
        self.read().sub_containers(container_id).to_vec()
    }

    pub fn items(&self, container_id: Uuid) -> Vec<Item> {
        self.read().items(container_id).to_vec()
    }

    pub fn memberships(&self, container_id: Uuid) -> Vec<Membership> {
        self.read()
            .memberships()
            .for_container(container_id)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn grants(&self, container_id: Uuid) -> Vec<PermissionGrant> {
        self.read()
            .grants()
            .for_container(container_id)
            .into_iter()
            .cloned()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use trove_access::PermissionResolver;
    use trove_rbac::{Permission, PermissionSet};
    use trove_tree::path;

    fn snapshot(collection: &str, docs: Vec<(String, serde_json::Value)>, removed: bool) -> QuerySnapshot {
        QuerySnapshot {
            collection: collection.to_string(),
            documents: docs
                .into_iter()
                .map(|(path, data)| Document {
                    path,
                    data,
                    revision: 1,
                })
                .collect(),
            removed,
        }
    }

    #[test]
    fn test_snapshot_skips_bad_documents() {
        let container_id = Uuid::now_v7();
        let item = Item::new(container_id, "Cup", Uuid::now_v7());
        let raw = snapshot(
            &ChildCollection::Items.path(container_id),
            vec![
                (path::item(container_id, item.id), serde_json::to_value(&item).unwrap()),
                (path::item(container_id, Uuid::now_v7()), json!({"name": 42})),
            ],
            false,
        );

        let decoded: Snapshot<Item> = Snapshot::decode(container_id, &raw);
        assert_eq!(decoded.items, vec![item]);
        assert!(!decoded.removed);
    }

    #[test]
    fn test_merge_by_id_never_removes() {
        let owner = Uuid::now_v7();
        let mut rows = vec![Container::new("A", owner), Container::new("B", owner)];
        merge_by_id(&mut rows, Vec::new());
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_full_snapshot_replaces_subset() {
        let container_id = Uuid::now_v7();
        let owner = Uuid::now_v7();
        let mut state = CacheState::default();
        state.upsert_item(Item::new(container_id, "Old", owner));

        let fresh = Item::new(container_id, "New", owner);
        state.apply(CacheUpdate::Items(Snapshot {
            container_id,
            items: vec![fresh.clone()],
            removed: false,
        }));
        assert_eq!(state.items(container_id), &[fresh]);

        state.apply(CacheUpdate::Items(Snapshot {
            container_id,
            items: Vec::new(),
            removed: true,
        }));
        assert!(state.items(container_id).is_empty());
    }

    #[test]
    fn test_purge_keeps_container_record() {
        let owner = Uuid::now_v7();
        let container = Container::new("Home", owner);
        let mut state = CacheState::default();
        state.upsert_container(container.clone());
        state.upsert_item(Item::new(container.id, "Cup", owner));
        state.upsert_membership(Membership::owner(container.id, owner));

        assert!(state.has_children(container.id));
        state.purge_children(container.id);
        assert!(!state.has_children(container.id));
        assert!(state.container(container.id).is_some());
    }

    #[test]
    fn test_purge_keeps_principal_membership() {
        let owner = Uuid::now_v7();
        let me = Uuid::now_v7();
        let other = Uuid::now_v7();
        let container = Container::new("Home", owner);
        let mut state = CacheState::default();
        state.set_principal(Some(me));
        state.upsert_container(container.clone());
        state.upsert_membership(Membership::delegate(container.id, me, None));
        state.upsert_membership(Membership::delegate(container.id, other, None));

        state.purge_children(container.id);
        assert!(state.memberships().get(container.id, me).is_some());
        assert!(state.memberships().get(container.id, other).is_none());

        let query = trove_access::AccessQuery::container(container.id, me);
        assert!(PermissionResolver::new(&state).resolve(&query, Permission::View));

        state.remove_entity(EntityRef::Container { id: container.id });
        assert!(state.memberships().get(container.id, me).is_none());
    }

    #[test]
    fn test_remove_sub_container_cascades_in_cache() {
        let owner = Uuid::now_v7();
        let guest = Uuid::now_v7();
        let container_id = Uuid::now_v7();
        let sub = SubContainer::new(container_id, "Shelf", owner);
        let inside = Item::new(container_id, "Cup", owner).in_sub_container(sub.id);
        let outside = Item::new(container_id, "Pan", owner);

        let mut state = CacheState::default();
        state.upsert_sub_container(sub.clone());
        state.upsert_item(inside.clone());
        state.upsert_item(outside.clone());
        state.upsert_grant(PermissionGrant::new(
            container_id,
            ScopeType::Item,
            inside.id,
            guest,
            PermissionSet::full(),
        ));

        state.remove_entity(EntityRef::sub_container(container_id, sub.id));
        assert!(state.sub_containers(container_id).is_empty());
        assert_eq!(state.items(container_id), &[outside]);
        assert!(state.grants().is_empty());
    }

    #[test]
    fn test_state_resolves_access() {
        let owner = Uuid::now_v7();
        let guest = Uuid::now_v7();
        let container = Container::new("Home", owner);
        let mut state = CacheState::default();
        state.upsert_container(container.clone());
        state.upsert_membership(Membership::delegate(
            container.id,
            guest,
            Some(PermissionSet::view_only()),
        ));

        let resolver = PermissionResolver::new(&state);
        assert!(resolver.is_owner(container.id, owner));
        assert!(resolver.resolve(
            &trove_access::AccessQuery::container(container.id, guest),
            Permission::View
        ));
        assert!(!resolver.resolve(
            &trove_access::AccessQuery::container(container.id, guest),
            Permission::Edit
        ));
    }

    #[test]
    fn test_local_cache_accessors_clone() {
        let cache = LocalCache::new();
        let owner = Uuid::now_v7();
        let container = Container::new("Home", owner);
        cache.write().upsert_container(container.clone());

        assert_eq!(cache.containers(), vec![container.clone()]);
        assert_eq!(cache.container(container.id), Some(container));
        cache.clear();
        assert!(cache.containers().is_empty());
    }
}
