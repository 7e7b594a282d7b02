//! Shared entity vocabulary
//!
//! Kinds, typed references and the behavior common to the three tree levels.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::path;

/// Maximum length, in characters, of a display name.
pub const MAX_NAME_CHARS: usize = 35;

/// Clamp a display name to [`MAX_NAME_CHARS`] characters.
///
/// Counts characters, not bytes, so multi-byte names are never split.
///
/// # Examples
///
/// ```
/// use trove_tree::entity::clamp_name;
///
/// assert_eq!(clamp_name("Short"), "Short");
/// assert_eq!(clamp_name(&"x".repeat(50)).chars().count(), 35);
/// ```
pub fn clamp_name(name: &str) -> String {
    name.chars().take(MAX_NAME_CHARS).collect()
}

/// The three levels of the resource tree.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Top level
    Container,
    /// Middle level, always inside a container
    SubContainer,
    /// Leaf, inside a container and optionally a sub-container
    Item,
}

impl EntityKind {
    /// Get string representation of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Container => "container",
            Self::SubContainer => "sub_container",
            Self::Item => "item",
        }
    }

    /// Prefix used for this kind's audit event types (`ITEM_CREATED`, ...).
    pub fn audit_prefix(&self) -> &'static str {
        match self {
            Self::Container => "CONTAINER",
            Self::SubContainer => "SUBCONTAINER",
            Self::Item => "ITEM",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed address of one entity in the tree.
///
/// Every non-container reference carries its owning container so the
/// document path can be built without a lookup.
///
/// # Examples
///
/// ```
/// use uuid::Uuid;
/// use trove_tree::EntityRef;
///
/// let container_id = Uuid::now_v7();
/// let item_id = Uuid::now_v7();
/// let item = EntityRef::item(container_id, item_id);
/// assert_eq!(item.container_id(), container_id);
/// assert_eq!(item.path(), format!("containers/{container_id}/items/{item_id}"));
/// ```
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EntityRef {
    /// A container
    Container { id: Uuid },
    /// A sub-container of `container_id`
    SubContainer { container_id: Uuid, id: Uuid },
    /// An item of `container_id`
    Item { container_id: Uuid, id: Uuid },
}

impl EntityRef {
    /// Reference a container.
    pub fn container(id: Uuid) -> Self {
        Self::Container { id }
    }

    /// Reference a sub-container.
    pub fn sub_container(container_id: Uuid, id: Uuid) -> Self {
        Self::SubContainer { container_id, id }
    }

    /// Reference an item.
    pub fn item(container_id: Uuid, id: Uuid) -> Self {
        Self::Item { container_id, id }
    }

    /// The kind of entity referenced.
    pub fn kind(&self) -> EntityKind {
        match self {
            Self::Container { .. } => EntityKind::Container,
            Self::SubContainer { .. } => EntityKind::SubContainer,
            Self::Item { .. } => EntityKind::Item,
        }
    }

    /// The referenced entity's own id.
    pub fn id(&self) -> Uuid {
        match self {
            Self::Container { id } | Self::SubContainer { id, .. } | Self::Item { id, .. } => *id,
        }
    }

    /// The container this entity belongs to (itself for containers).
    pub fn container_id(&self) -> Uuid {
        match self {
            Self::Container { id } => *id,
            Self::SubContainer { container_id, .. } | Self::Item { container_id, .. } => {
                *container_id
            }
        }
    }

    /// Document path of the entity.
    pub fn path(&self) -> String {
        match self {
            Self::Container { id } => path::container(*id),
            Self::SubContainer { container_id, id } => path::sub_container(*container_id, *id),
            Self::Item { container_id, id } => path::item(*container_id, *id),
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// Behavior shared by [`Container`](crate::Container),
/// [`SubContainer`](crate::SubContainer) and [`Item`](crate::Item).
pub trait TreeEntity {
    /// Kind of this entity type.
    const KIND: EntityKind;

    /// Entity id.
    fn id(&self) -> Uuid;

    /// Owning container (itself for containers).
    fn container_id(&self) -> Uuid;

    /// Last edit stamp, used for optimistic concurrency.
    fn edited_at(&self) -> DateTime<Utc>;

    /// Legacy owner of record.
    fn owner_id(&self) -> Uuid;

    /// Typed reference to this entity.
    fn entity_ref(&self) -> EntityRef {
        match Self::KIND {
            EntityKind::Container => EntityRef::container(self.id()),
            EntityKind::SubContainer => EntityRef::sub_container(self.container_id(), self.id()),
            EntityKind::Item => EntityRef::item(self.container_id(), self.id()),
        }
    }
}
