//! Membership and grant stores
//!
//! Local, in-memory tables of the access records the resolver reads. Both
//! enforce their key: one membership per `(container, user)` and one grant
//! per `(scopeType, scopeId, user)`. Writes upsert in place.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;

use trove_rbac::ScopeType;
use trove_tree::grant::grant_id;
use trove_tree::{Membership, PermissionGrant};

/// Per-(container, user) membership rows.
#[derive(Debug, Clone, Default)]
pub struct MembershipStore {
    rows: HashMap<(Uuid, Uuid), Membership>,
}

impl MembershipStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the row for `(container_id, user_id)`.
    ///
    /// Returns the previous row, if any.
    pub fn upsert(&mut self, membership: Membership) -> Option<Membership> {
        let membership = membership.normalized();
        self.rows.insert(membership.key(), membership)
    }

    pub fn get(&self, container_id: Uuid, user_id: Uuid) -> Option<&Membership> {
        self.rows.get(&(container_id, user_id))
    }

    /// Revoke a membership in place. Returns `false` if no row exists.
    pub fn revoke(&mut self, container_id: Uuid, user_id: Uuid, now: DateTime<Utc>) -> bool {
        match self.rows.get_mut(&(container_id, user_id)) {
            Some(membership) => {
                membership.revoke(now);
                true
            }
            None => false,
        }
    }

    /// All rows of a container, oldest assignment first.
    pub fn for_container(&self, container_id: Uuid) -> Vec<&Membership> {
        let mut rows: Vec<&Membership> = self
            .rows
            .values()
            .filter(|m| m.container_id == container_id)
            .collect();
        rows.sort_by_key(|m| m.assigned_at);
        rows
    }

    /// All rows of a user, across containers.
    pub fn for_user(&self, user_id: Uuid) -> Vec<&Membership> {
        self.rows.values().filter(|m| m.user_id == user_id).collect()
    }

    /// Users holding an ACTIVE OWNER membership on the container.
    ///
    /// More than one only while an ownership transfer is in flight.
    pub fn active_owners(&self, container_id: Uuid) -> Vec<Uuid> {
        self.rows
            .values()
            .filter(|m| m.container_id == container_id && m.is_active_owner())
            .map(|m| m.user_id)
            .collect()
    }

    /// Replace every row of a container with an authoritative snapshot.
    pub fn replace_container(&mut self, container_id: Uuid, rows: Vec<Membership>) {
        self.remove_container(container_id);
        for membership in rows.into_iter().filter(|m| m.container_id == container_id) {
            self.upsert(membership);
        }
    }

    /// Forget every row of a container (cache purge, not revocation).
    pub fn remove_container(&mut self, container_id: Uuid) {
        self.rows.retain(|(c, _), _| *c != container_id);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Per-(scope, user) grant rows, keyed by grant id.
#[derive(Debug, Clone, Default)]
pub struct GrantStore {
    rows: HashMap<String, PermissionGrant>,
}

impl GrantStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a grant. The key is always re-derived from the
    /// scope fields, so a stale `id` cannot create a second row.
    pub fn upsert(&mut self, mut grant: PermissionGrant) -> Option<PermissionGrant> {
        grant.id = grant_id(grant.scope_type, grant.scope_id, grant.user_id);
        self.rows.insert(grant.id.clone(), grant)
    }

    pub fn get(&self, scope_type: ScopeType, scope_id: Uuid, user_id: Uuid) -> Option<&PermissionGrant> {
        self.rows.get(&grant_id(scope_type, scope_id, user_id))
    }

    pub fn get_by_id(&self, id: &str) -> Option<&PermissionGrant> {
        self.rows.get(id)
    }

    pub fn remove(&mut self, id: &str) -> Option<PermissionGrant> {
        self.rows.remove(id)
    }

    /// Remove every grant on one scope, for any user.
    pub fn remove_scope(&mut self, scope_type: ScopeType, scope_id: Uuid) -> Vec<PermissionGrant> {
        let ids: Vec<String> = self
            .for_scope(scope_type, scope_id)
            .into_iter()
            .map(|g| g.id.clone())
            .collect();
        ids.iter().filter_map(|id| self.rows.remove(id)).collect()
    }

    /// Grants attached to one scope.
    pub fn for_scope(&self, scope_type: ScopeType, scope_id: Uuid) -> Vec<&PermissionGrant> {
        self.rows
            .values()
            .filter(|g| g.scope_type == scope_type && g.scope_id == scope_id)
            .collect()
    }

    pub fn for_container(&self, container_id: Uuid) -> Vec<&PermissionGrant> {
        self.rows
            .values()
            .filter(|g| g.container_id == container_id)
            .collect()
    }

    pub fn for_user(&self, user_id: Uuid) -> Vec<&PermissionGrant> {
        self.rows.values().filter(|g| g.user_id == user_id).collect()
    }

    /// Replace every grant of a container with an authoritative snapshot.
    pub fn replace_container(&mut self, container_id: Uuid, rows: Vec<PermissionGrant>) {
        self.remove_container(container_id);
        for grant in rows.into_iter().filter(|g| g.container_id == container_id) {
            self.upsert(grant);
        }
    }

    pub fn remove_container(&mut self, container_id: Uuid) {
        self.rows.retain(|_, g| g.container_id != container_id);
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
