//! Item domain model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::{clamp_name, EntityKind, TreeEntity};
use crate::media;

/// A leaf resource.
///
/// Items always belong to a container and may additionally sit inside one of
/// that container's sub-containers.
///
/// # Examples
///
/// ```
/// use uuid::Uuid;
/// use trove_tree::Item;
///
/// let container_id = Uuid::now_v7();
/// let sub_id = Uuid::now_v7();
/// let item = Item::new(container_id, "Whisk", Uuid::now_v7()).in_sub_container(sub_id);
/// assert_eq!(item.sub_container_id, Some(sub_id));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: Uuid,

    /// Container this item belongs to
    pub container_id: Uuid,

    /// Optional sub-container inside `container_id`
    #[serde(default)]
    pub sub_container_id: Option<Uuid>,

    pub name: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub media: Vec<String>,

    #[serde(default)]
    pub primary_media: Option<String>,

    /// Legacy owner of record (the creator)
    pub owner_id: Uuid,

    pub created_at: DateTime<Utc>,
    pub viewed_at: DateTime<Utc>,
    pub edited_at: DateTime<Utc>,
}

impl Item {
    /// Creates a new item directly in `container_id`.
    pub fn new(container_id: Uuid, name: impl Into<String>, owner_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            container_id,
            sub_container_id: None,
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

    /// Place the item inside a sub-container.
    pub fn in_sub_container(mut self, sub_container_id: Uuid) -> Self {
        self.sub_container_id = Some(sub_container_id);
        self
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
    pub fn with_media(mut self, media: Vec<String>, primary: Option<String>) -> Self {
        self.media = media;
        self.primary_media = primary;
        media::normalize(&mut self.media, &mut self.primary_media);
        self
    }
}

impl TreeEntity for Item {
    const KIND: EntityKind = EntityKind::Item;

    fn id(&self) -> Uuid {
        self.id
    }

    fn container_id(&self) -> Uuid {
        self.container_id
    }

    fn edited_at(&self) -> DateTime<Utc> {
        self.edited_at
    }

    fn owner_id(&self) -> Uuid {
        self.owner_id
    }
}
