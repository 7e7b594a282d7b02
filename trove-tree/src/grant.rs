//! Scoped permission grants
//!
//! A grant overrides a user's container-wide membership at one sub-container
//! or item. Grants are authoritative for their scope even when they are more
//! restrictive than the membership.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use trove_rbac::{PermissionSet, ScopeType};

/// Build the deterministic grant id `scopeType:scopeId:userId`.
///
/// # Examples
///
/// ```
/// use uuid::Uuid;
/// use trove_rbac::ScopeType;
/// use trove_tree::grant::grant_id;
///
/// let scope_id = Uuid::nil();
/// let user_id = Uuid::nil();
/// assert_eq!(
///     grant_id(ScopeType::Item, scope_id, user_id),
///     format!("ITEM:{scope_id}:{user_id}")
/// );
/// ```
pub fn grant_id(scope_type: ScopeType, scope_id: Uuid, user_id: Uuid) -> String {
    format!("{}:{}:{}", scope_type.as_str(), scope_id, user_id)
}

/// Split a grant id back into its parts.
pub fn parse_grant_id(id: &str) -> Option<(ScopeType, Uuid, Uuid)> {
    let mut parts = id.splitn(3, ':');
    let scope_type = ScopeType::parse(parts.next()?)?;
    let scope_id = parts.next()?.parse().ok()?;
    let user_id = parts.next()?.parse().ok()?;
    Some((scope_type, scope_id, user_id))
}

/// Per-(scope, user) permission override.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermissionGrant {
    /// `scopeType:scopeId:userId`
    pub id: String,

    pub user_id: Uuid,

    /// Container the scope lives in
    pub container_id: Uuid,

    pub scope_type: ScopeType,

    /// Sub-container or item id
    pub scope_id: Uuid,

    pub permissions: PermissionSet,

    pub assigned_at: DateTime<Utc>,

    #[serde(default)]
    pub assigned_by: Option<Uuid>,
}

impl PermissionGrant {
    /// Creates a grant; the id is derived from scope and user.
    pub fn new(
        container_id: Uuid,
        scope_type: ScopeType,
        scope_id: Uuid,
        user_id: Uuid,
        permissions: PermissionSet,
    ) -> Self {
        Self {
            id: grant_id(scope_type, scope_id, user_id),
            user_id,
            container_id,
            scope_type,
            scope_id,
            permissions,
            assigned_at: Utc::now(),
            assigned_by: None,
        }
    }

    /// Set the assignment timestamp.
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.assigned_at = now;
        self
    }

    /// Set who assigned the grant.
    pub fn with_assigner(mut self, assigner_id: Uuid) -> Self {
        self.assigned_by = Some(assigner_id);
        self
    }

    /// Check the stored id matches the scope fields.
    pub fn is_consistent(&self) -> bool {
        self.id == grant_id(self.scope_type, self.scope_id, self.user_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use trove_rbac::Permission;

    #[test]
    fn test_grant_id_round_trip() {
        let scope_id = Uuid::now_v7();
        let user_id = Uuid::now_v7();
        let id = grant_id(ScopeType::SubContainer, scope_id, user_id);

        assert_eq!(
            parse_grant_id(&id),
            Some((ScopeType::SubContainer, scope_id, user_id))
        );
        assert_eq!(parse_grant_id("ITEM:nope"), None);
        assert_eq!(parse_grant_id("FOLDER:x:y"), None);
    }

    #[test]
    fn test_grant_creation() {
        let grant = PermissionGrant::new(
            Uuid::now_v7(),
            ScopeType::Item,
            Uuid::now_v7(),
            Uuid::now_v7(),
            PermissionSet::view_only().with(Permission::Edit),
        );
        assert!(grant.is_consistent());
        assert!(grant.permissions.has(Permission::Edit));
    }

    #[test]
    fn test_grant_wire_format() {
        let grant = PermissionGrant::new(
            Uuid::now_v7(),
            ScopeType::Item,
            Uuid::now_v7(),
            Uuid::now_v7(),
            PermissionSet::view_only(),
        );
        let json = serde_json::to_value(&grant).unwrap();
        assert_eq!(json["scopeType"], "ITEM");
        assert!(json["id"].as_str().unwrap().starts_with("ITEM:"));
    }
}
