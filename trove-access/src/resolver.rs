//! Permission resolution
//!
//! Answers "may user U perform P at scope S?" by layering the owner of
//! record, container memberships and scoped grants:
//!
//! ```text
//! owner of record / ACTIVE OWNER membership  -> everything
//! ITEM grant for (item, user)                -> that grant, stop
//! SUBCONTAINER grant for (sub, user)         -> that grant, stop
//! ACTIVE DELEGATE membership                 -> its set (view-only if absent)
//! otherwise                                  -> nothing
//! ```
//!
//! A grant is authoritative for its scope even when it is narrower than the
//! membership. Only ownership beats it.

use uuid::Uuid;

use trove_rbac::{Permission, PermissionSet, RoleLabel, ScopeType};
use trove_tree::{path, Item, Membership, PermissionGrant, SubContainer};

use crate::error::{AccessError, AccessResult};

/// Read access to the records resolution needs.
///
/// Implemented by whatever holds the current view of the tree, usually the
/// client's local cache.
pub trait AccessSource {
    /// Legacy owner of record of a container.
    fn owner_of_record(&self, container_id: Uuid) -> Option<Uuid>;

    /// Membership row for `(container, user)`, in any status.
    fn membership(&self, container_id: Uuid, user_id: Uuid) -> Option<&Membership>;

    /// Grant for `(scope, user)`.
    fn grant(&self, scope_type: ScopeType, scope_id: Uuid, user_id: Uuid) -> Option<&PermissionGrant>;
}

/// Scope and subject of an access question.
///
/// # Examples
///
/// ```
/// use uuid::Uuid;
/// use trove_access::AccessQuery;
///
/// let (container, sub, item, user) = (Uuid::now_v7(), Uuid::now_v7(), Uuid::now_v7(), Uuid::now_v7());
/// let query = AccessQuery::container(container, user)
///     .in_sub_container(sub)
///     .on_item(item);
/// assert_eq!(query.item_id, Some(item));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AccessQuery {
    pub container_id: Uuid,
    pub sub_container_id: Option<Uuid>,
    pub item_id: Option<Uuid>,
    pub user_id: Uuid,
}

impl AccessQuery {
    /// Container-wide question.
    pub fn container(container_id: Uuid, user_id: Uuid) -> Self {
        Self {
            container_id,
            sub_container_id: None,
            item_id: None,
            user_id,
        }
    }

    pub fn in_sub_container(mut self, sub_container_id: Uuid) -> Self {
        self.sub_container_id = Some(sub_container_id);
        self
    }

    pub fn on_item(mut self, item_id: Uuid) -> Self {
        self.item_id = Some(item_id);
        self
    }

    /// Question about a sub-container.
    pub fn for_sub_container(sub_container: &SubContainer, user_id: Uuid) -> Self {
        Self::container(sub_container.container_id, user_id).in_sub_container(sub_container.id)
    }

    /// Question about an item, including its sub-container if it has one.
    pub fn for_item(item: &Item, user_id: Uuid) -> Self {
        let query = Self::container(item.container_id, user_id).on_item(item.id);
        match item.sub_container_id {
            Some(sub_container_id) => query.in_sub_container(sub_container_id),
            None => query,
        }
    }

    /// Document path of the most specific scope in the query.
    pub fn target_path(&self) -> String {
        match (self.item_id, self.sub_container_id) {
            (Some(item_id), _) => path::item(self.container_id, item_id),
            (None, Some(sub_container_id)) => path::sub_container(self.container_id, sub_container_id),
            (None, None) => path::container(self.container_id),
        }
    }
}

/// Which layer decided a query, and what it granted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
    /// Owner of record or ACTIVE OWNER membership
    Owner,
    /// ITEM grant
    ItemGrant(PermissionSet),
    /// SUBCONTAINER grant
    SubContainerGrant(PermissionSet),
    /// ACTIVE DELEGATE membership
    Delegate(PermissionSet),
    /// No applicable record
    NoAccess,
}

impl Resolution {
    /// Permission set this resolution confers.
    pub fn permissions(&self) -> PermissionSet {
        match self {
            Self::Owner => PermissionSet::full(),
            Self::ItemGrant(set) | Self::SubContainerGrant(set) | Self::Delegate(set) => *set,
            Self::NoAccess => PermissionSet::new(),
        }
    }

    pub fn allows(&self, permission: Permission) -> bool {
        self.permissions().has(permission)
    }

    /// Administrative label shown for this resolution.
    pub fn role_label(&self) -> RoleLabel {
        match self {
            Self::Owner => RoleLabel::Owner,
            other => RoleLabel::from_permissions(&other.permissions()),
        }
    }
}

/// Resolves permissions against an [`AccessSource`].
#[derive(Debug, Clone, Copy)]
pub struct PermissionResolver<'a, S: AccessSource + ?Sized> {
    source: &'a S,
}

impl<'a, S: AccessSource + ?Sized> PermissionResolver<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self { source }
    }

    /// Whether the query's user is an owner of the container.
    pub fn is_owner(&self, container_id: Uuid, user_id: Uuid) -> bool {
        if self.source.owner_of_record(container_id) == Some(user_id) {
            return true;
        }
        self.source
            .membership(container_id, user_id)
            .is_some_and(Membership::is_active_owner)
    }

    /// Walk the layers and report the first one that applies.
    pub fn explain(&self, query: &AccessQuery) -> Resolution {
        if self.is_owner(query.container_id, query.user_id) {
            return Resolution::Owner;
        }

        if let Some(grant) = query
            .item_id
            .and_then(|item_id| self.scoped_grant(query, ScopeType::Item, item_id))
        {
            return Resolution::ItemGrant(grant.permissions);
        }

        if let Some(grant) = query
            .sub_container_id
            .and_then(|sub_id| self.scoped_grant(query, ScopeType::SubContainer, sub_id))
        {
            return Resolution::SubContainerGrant(grant.permissions);
        }

        match self.source.membership(query.container_id, query.user_id) {
            Some(membership) if membership.is_active_delegate() => Resolution::Delegate(
                membership
                    .permissions
                    .unwrap_or_else(PermissionSet::view_only),
            ),
            _ => Resolution::NoAccess,
        }
    }

    /// Whether the user holds `permission` at the query's scope.
    pub fn resolve(&self, query: &AccessQuery, permission: Permission) -> bool {
        self.explain(query).allows(permission)
    }

    /// Full permission set at the query's scope.
    pub fn effective_permissions(&self, query: &AccessQuery) -> PermissionSet {
        self.explain(query).permissions()
    }

    /// Role label summarizing the user's access at the query's scope.
    pub fn display_role(&self, query: &AccessQuery) -> RoleLabel {
        self.explain(query).role_label()
    }

    /// Like [`resolve`](Self::resolve) but fails with [`AccessError::Denied`].
    pub fn require(&self, query: &AccessQuery, permission: Permission) -> AccessResult<()> {
        if self.resolve(query, permission) {
            Ok(())
        } else {
            Err(AccessError::Denied {
                user_id: query.user_id,
                permission,
                target: query.target_path(),
            })
        }
    }

    /// Fails with [`AccessError::NotOwner`] unless the user owns the
    /// container.
    pub fn require_owner(&self, container_id: Uuid, user_id: Uuid) -> AccessResult<()> {
        if self.is_owner(container_id, user_id) {
            Ok(())
        } else {
            Err(AccessError::NotOwner {
                user_id,
                container_id,
            })
        }
    }

    /// Grants from another container never apply.
    fn scoped_grant(
        &self,
        query: &AccessQuery,
        scope_type: ScopeType,
        scope_id: Uuid,
    ) -> Option<&'a PermissionGrant> {
        self.source
            .grant(scope_type, scope_id, query.user_id)
            .filter(|grant| grant.container_id == query.container_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{GrantStore, MembershipStore};
    use chrono::Utc;
    use std::collections::HashMap;

    #[derive(Default)]
    struct Fixture {
        owners: HashMap<Uuid, Uuid>,
        memberships: MembershipStore,
        grants: GrantStore,
    }

    impl AccessSource for Fixture {
        fn owner_of_record(&self, container_id: Uuid) -> Option<Uuid> {
            self.owners.get(&container_id).copied()
        }

        fn membership(&self, container_id: Uuid, user_id: Uuid) -> Option<&Membership> {
            self.memberships.get(container_id, user_id)
        }

        fn grant(&self, scope_type: ScopeType, scope_id: Uuid, user_id: Uuid) -> Option<&PermissionGrant> {
            self.grants.get(scope_type, scope_id, user_id)
        }
    }

    struct Ids {
        container: Uuid,
        sub: Uuid,
        item: Uuid,
        owner: Uuid,
        user: Uuid,
    }

    fn setup() -> (Fixture, Ids) {
        let ids = Ids {
            container: Uuid::now_v7(),
            sub: Uuid::now_v7(),
            item: Uuid::now_v7(),
            owner: Uuid::now_v7(),
            user: Uuid::now_v7(),
        };
        let mut fixture = Fixture::default();
        fixture.owners.insert(ids.container, ids.owner);
        (fixture, ids)
    }

    fn item_query(ids: &Ids) -> AccessQuery {
        AccessQuery::container(ids.container, ids.user)
            .in_sub_container(ids.sub)
            .on_item(ids.item)
    }

    fn item_grant(ids: &Ids, permissions: PermissionSet) -> PermissionGrant {
        PermissionGrant::new(ids.container, ScopeType::Item, ids.item, ids.user, permissions)
    }

    #[test]
    fn test_no_records_means_no_access() {
        let (fixture, ids) = setup();
        let resolver = PermissionResolver::new(&fixture);

        for permission in Permission::all() {
            assert!(!resolver.resolve(&item_query(&ids), permission));
        }
        assert_eq!(resolver.explain(&item_query(&ids)), Resolution::NoAccess);
    }

    #[test]
    fn test_owner_of_record_overrides_restrictive_grant() {
        let (mut fixture, ids) = setup();
        fixture.grants.upsert(PermissionGrant::new(
            ids.container,
            ScopeType::Item,
            ids.item,
            ids.owner,
            PermissionSet::new(),
        ));
        let resolver = PermissionResolver::new(&fixture);
        let query = AccessQuery::container(ids.container, ids.owner).on_item(ids.item);

        assert!(resolver.resolve(&query, Permission::Delete));
        assert_eq!(resolver.display_role(&query), RoleLabel::Owner);
    }

    #[test]
    fn test_active_owner_membership_overrides_grant() {
        let (mut fixture, ids) = setup();
        fixture.memberships.upsert(Membership::owner(ids.container, ids.user));
        fixture.grants.upsert(item_grant(&ids, PermissionSet::view_only()));
        let resolver = PermissionResolver::new(&fixture);

        assert!(resolver.resolve(&item_query(&ids), Permission::Edit));
    }

    #[test]
    fn test_revoked_owner_membership_confers_nothing() {
        let (mut fixture, ids) = setup();
        fixture.memberships.upsert(Membership::owner(ids.container, ids.user));
        fixture.memberships.revoke(ids.container, ids.user, Utc::now());
        let resolver = PermissionResolver::new(&fixture);

        assert!(!resolver.resolve(&item_query(&ids), Permission::View));
    }

    #[test]
    fn test_item_grant_wins_over_membership() {
        let (mut fixture, ids) = setup();
        fixture.memberships.upsert(Membership::delegate(
            ids.container,
            ids.user,
            Some(PermissionSet::full()),
        ));
        fixture.grants.upsert(item_grant(&ids, PermissionSet::view_only()));
        let resolver = PermissionResolver::new(&fixture);

        assert!(resolver.resolve(&item_query(&ids), Permission::View));
        assert!(!resolver.resolve(&item_query(&ids), Permission::Delete));

        // Other items in the container still follow the membership
        let other = AccessQuery::container(ids.container, ids.user).on_item(Uuid::now_v7());
        assert!(resolver.resolve(&other, Permission::Delete));
    }

    #[test]
    fn test_item_grant_wins_over_sub_container_grant() {
        let (mut fixture, ids) = setup();
        fixture.grants.upsert(PermissionGrant::new(
            ids.container,
            ScopeType::SubContainer,
            ids.sub,
            ids.user,
            PermissionSet::full(),
        ));
        fixture.grants.upsert(item_grant(&ids, PermissionSet::view_only()));
        let resolver = PermissionResolver::new(&fixture);

        assert!(!resolver.resolve(&item_query(&ids), Permission::Edit));
        assert_eq!(
            resolver.explain(&item_query(&ids)),
            Resolution::ItemGrant(PermissionSet::view_only())
        );
    }

    #[test]
    fn test_sub_container_grant_applies_when_no_item_grant() {
        let (mut fixture, ids) = setup();
        fixture.memberships.upsert(Membership::delegate(ids.container, ids.user, None));
        fixture.grants.upsert(PermissionGrant::new(
            ids.container,
            ScopeType::SubContainer,
            ids.sub,
            ids.user,
            PermissionSet::view_only().with(Permission::Edit),
        ));
        let resolver = PermissionResolver::new(&fixture);

        assert!(resolver.resolve(&item_query(&ids), Permission::Edit));
        assert!(matches!(
            resolver.explain(&item_query(&ids)),
            Resolution::SubContainerGrant(_)
        ));
    }

    #[test]
    fn test_grant_from_other_container_is_ignored() {
        let (mut fixture, ids) = setup();
        fixture.grants.upsert(PermissionGrant::new(
            Uuid::now_v7(),
            ScopeType::Item,
            ids.item,
            ids.user,
            PermissionSet::full(),
        ));
        let resolver = PermissionResolver::new(&fixture);

        assert!(!resolver.resolve(&item_query(&ids), Permission::View));
    }

    #[test]
    fn test_delegate_without_set_is_view_only() {
        let (mut fixture, ids) = setup();
        fixture.memberships.upsert(Membership::delegate(ids.container, ids.user, None));
        let resolver = PermissionResolver::new(&fixture);
        let query = AccessQuery::container(ids.container, ids.user);

        assert_eq!(resolver.effective_permissions(&query), PermissionSet::view_only());
        assert_eq!(resolver.display_role(&query), RoleLabel::Reviewer);
    }

    #[test]
    fn test_revoked_delegate_has_no_access() {
        let (mut fixture, ids) = setup();
        fixture.memberships.upsert(Membership::delegate(
            ids.container,
            ids.user,
            Some(PermissionSet::full()),
        ));
        fixture.memberships.revoke(ids.container, ids.user, Utc::now());
        let resolver = PermissionResolver::new(&fixture);

        assert!(!resolver.resolve(&AccessQuery::container(ids.container, ids.user), Permission::View));
    }

    #[test]
    fn test_grant_scenario_view_only_delegate() {
        let (mut fixture, ids) = setup();
        fixture.memberships.upsert(Membership::delegate(
            ids.container,
            ids.user,
            Some(PermissionSet::view_only()),
        ));

        // Grant {View, !Edit} on the item
        fixture.grants.upsert(item_grant(&ids, PermissionSet::view_only()));
        assert!(!PermissionResolver::new(&fixture).resolve(&item_query(&ids), Permission::Edit));

        // Grant removed: back to the membership
        let id = trove_tree::grant::grant_id(ScopeType::Item, ids.item, ids.user);
        fixture.grants.remove(&id);
        assert!(!PermissionResolver::new(&fixture).resolve(&item_query(&ids), Permission::Edit));

        // Grant {View, Edit}
        fixture.grants.upsert(item_grant(
            &ids,
            PermissionSet::view_only().with(Permission::Edit),
        ));
        assert!(PermissionResolver::new(&fixture).resolve(&item_query(&ids), Permission::Edit));
    }

    #[test]
    fn test_display_role_from_grant() {
        let (mut fixture, ids) = setup();
        fixture.grants.upsert(item_grant(
            &ids,
            PermissionSet::view_only().with(Permission::Move),
        ));
        let resolver = PermissionResolver::new(&fixture);

        assert_eq!(resolver.display_role(&item_query(&ids)), RoleLabel::Manager);
    }

    #[test]
    fn test_require_denied_names_target() {
        let (fixture, ids) = setup();
        let resolver = PermissionResolver::new(&fixture);

        let err = resolver
            .require(&item_query(&ids), Permission::Edit)
            .unwrap_err();
        match err {
            AccessError::Denied {
                user_id,
                permission,
                target,
            } => {
                assert_eq!(user_id, ids.user);
                assert_eq!(permission, Permission::Edit);
                assert_eq!(target, path::item(ids.container, ids.item));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_require_owner() {
        let (mut fixture, ids) = setup();
        let delegate = Membership::delegate(ids.container, ids.user, Some(PermissionSet::full()));
        fixture.memberships.upsert(delegate);
        let resolver = PermissionResolver::new(&fixture);

        assert!(resolver.require_owner(ids.container, ids.owner).is_ok());
        assert_eq!(
            resolver.require_owner(ids.container, ids.user),
            Err(AccessError::NotOwner {
                user_id: ids.user,
                container_id: ids.container,
            })
        );
    }

    #[test]
    fn test_query_for_item_carries_sub_container() {
        let container = Uuid::now_v7();
        let sub = Uuid::now_v7();
        let item = Item::new(container, "Lamp", Uuid::now_v7()).in_sub_container(sub);
        let user = Uuid::now_v7();

        let query = AccessQuery::for_item(&item, user);
        assert_eq!(query.sub_container_id, Some(sub));
        assert_eq!(query.item_id, Some(item.id));
    }
}
