//! Sub-container domain model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::entity::{clamp_name, EntityKind, TreeEntity};
use crate::media;

/// A grouping inside a container.
///
/// Sub-containers inherit their access scope from the container; grants at
/// SUBCONTAINER scope override it for individual users.
///
/// # Examples
///
/// ```
/// use uuid::Uuid;
/// use trove_tree::SubContainer;
///
/// let container_id = Uuid::now_v7();
/// let shelf = SubContainer::new(container_id, "Top shelf", Uuid::now_v7());
/// assert_eq!(shelf.container_id, container_id);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubContainer {
    pub id: Uuid,

    /// Container this sub-container belongs to
    pub container_id: Uuid,

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

impl SubContainer {
    /// Creates a new sub-container in `container_id`.
    pub fn new(container_id: Uuid, name: impl Into<String>, owner_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            container_id,
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
    pub fn with_media(mut self, media: Vec<String>, primary: Option<String>) -> Self {
        self.media = media;
        self.primary_media = primary;
        media::normalize(&mut self.media, &mut self.primary_media);
        self
    }
}

impl TreeEntity for SubContainer {
    const KIND: EntityKind = EntityKind::SubContainer;

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
