//! Document paths
//!
//! Every document lives under its container:
//!
//! ```text
//! containers/{id}
//!   ├─ subcontainers/{id}
//!   ├─ items/{id}
//!   ├─ memberships/{userId}
//!   ├─ grants/{scopeType:scopeId:userId}
//!   └─ auditEvents/{id}
//! ```

use uuid::Uuid;

/// Root collection of containers.
pub const CONTAINERS: &str = "containers";

/// Collections nested under a container document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChildCollection {
    SubContainers,
    Items,
    Memberships,
    Grants,
    AuditEvents,
}

impl ChildCollection {
    /// Collections a live channel streams for a container.
    pub const STREAMED: [ChildCollection; 4] = [
        ChildCollection::SubContainers,
        ChildCollection::Items,
        ChildCollection::Memberships,
        ChildCollection::Grants,
    ];

    /// Collection segment name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SubContainers => "subcontainers",
            Self::Items => "items",
            Self::Memberships => "memberships",
            Self::Grants => "grants",
            Self::AuditEvents => "auditEvents",
        }
    }

    /// Full collection path under `container_id`.
    pub fn path(&self, container_id: Uuid) -> String {
        format!("{}/{}", container(container_id), self.name())
    }

    /// Full document path of `doc_id` in this collection.
    pub fn doc(&self, container_id: Uuid, doc_id: &str) -> String {
        format!("{}/{}", self.path(container_id), doc_id)
    }
}

pub fn container(id: Uuid) -> String {
    format!("{CONTAINERS}/{id}")
}

pub fn sub_container(container_id: Uuid, id: Uuid) -> String {
    ChildCollection::SubContainers.doc(container_id, &id.to_string())
}

pub fn item(container_id: Uuid, id: Uuid) -> String {
    ChildCollection::Items.doc(container_id, &id.to_string())
}

pub fn membership(container_id: Uuid, user_id: Uuid) -> String {
    ChildCollection::Memberships.doc(container_id, &user_id.to_string())
}

pub fn grant(container_id: Uuid, grant_id: &str) -> String {
    ChildCollection::Grants.doc(container_id, grant_id)
}

pub fn audit_event(container_id: Uuid, event_id: Uuid) -> String {
    ChildCollection::AuditEvents.doc(container_id, &event_id.to_string())
}

/// Extract the container id from any path under `containers/{id}`.
pub fn container_of(path: &str) -> Option<Uuid> {
    let mut segments = path.split('/');
    if segments.next()? != CONTAINERS {
        return None;
    }
    segments.next()?.parse().ok()
}

/// Parent collection of a document path (`a/b/c/d` -> `a/b/c`).
pub fn parent_collection(doc_path: &str) -> Option<&str> {
    doc_path.rsplit_once('/').map(|(parent, _)| parent)
}
