//! Container domain model
//!
//! Containers are the top level of the resource tree. They own
//! sub-containers, items, memberships, grants and the audit trail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::{clamp_name, EntityKind, TreeEntity};
use crate::media;

/// A top-level resource.
///
/// # Architecture
///
/// ```text
/// Container
///   ├─ SubContainers
///   │    └─ Items (optional parent)
///   ├─ Items
///   ├─ Memberships (OWNER / DELEGATE)
///   └─ Grants (SUBCONTAINER / ITEM scope)
/// ```
///
/// # Examples
///
/// ```
/// use uuid::Uuid;
/// use trove_tree::Container;
///
/// let owner_id = Uuid::now_v7();
/// let container = Container::new("Kitchen", owner_id);
/// assert_eq!(container.name, "Kitchen");
/// assert_eq!(container.owner_id, owner_id);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Container {
    /// Unique identifier for the container
    pub id: Uuid,

    /// Display name (at most 35 characters)
    pub name: String,

    /// Free-text description
    #[serde(default)]
    pub description: String,

    /// Media references (at most 4)
    #[serde(default)]
    pub media: Vec<String>,

    /// Primary media reference, always a member of `media`
    #[serde(default)]
    pub primary_media: Option<String>,

    /// Legacy owner of record.
    ///
    /// Superseded by OWNER memberships but still consulted as a fallback
    /// authority by the resolver.
    pub owner_id: Uuid,

    pub created_at: DateTime<Utc>,
    pub viewed_at: DateTime<Utc>,
    pub edited_at: DateTime<Utc>,
}

impl Container {
    /// Creates a new container owned by `owner_id`.
    ///
    /// The name is clamped and all three timestamps are set to now.
    pub fn new(name: impl Into<String>, owner_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            name: clamp_name(&name.into()),
            description: String::new(),
            media: Vec::new(),
            primary_media: None,
            owner_id,
            created_at: now,
            viewed_at: now,
            edited_at: now,
        }
    }

    /// Set all three timestamps to `now`.
    pub fn at(mut self, now: DateTime<Utc>) -> Self {
        self.created_at = now;
        self.viewed_at = now;
        self.edited_at = now;
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Set the media references and requested primary.
    ///
    /// The media invariants are applied, so the stored primary may differ
    /// from the requested one.
    pub fn with_media(mut self, media: Vec<String>, primary: Option<String>) -> Self {
        self.media = media;
        self.primary_media = primary;
        media::normalize(&mut self.media, &mut self.primary_media);
        self
    }
}

impl TreeEntity for Container {
    const KIND: EntityKind = EntityKind::Container;

    fn id(&self) -> Uuid {
        self.id
    }

    fn container_id(&self) -> Uuid {
        self.id
    }

    fn edited_at(&self) -> DateTime<Utc> {
        self.edited_at
    }

    fn owner_id(&self) -> Uuid {
        self.owner_id
    }
}
