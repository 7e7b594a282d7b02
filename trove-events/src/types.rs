//! Audit event types
//!
//! The stored audit record and the vocabulary of event types this core
//! emits directly.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use trove_tree::EntityKind;
use uuid::Uuid;

use crate::fingerprint::fingerprint;

/// Append-only audit record.
///
/// Events are never mutated or deleted by this core; pruning belongs to an
/// external retention process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    /// Unique event ID
    pub id: Uuid,

    /// Container the event belongs to
    pub container_id: Uuid,

    /// Event type (e.g., "ITEM_CREATED", "CONTAINER_VIEWED")
    #[serde(rename = "type")]
    pub event_type: String,

    /// User who triggered the event
    pub actor_id: Uuid,

    /// Already-normalized payload
    pub payload: serde_json::Value,

    /// Server-observed creation time, stored as epoch milliseconds
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,

    /// FNV-1a over type, container, actor and payload
    pub fingerprint: u32,
}

impl AuditEvent {
    /// Create a new event, computing its fingerprint.
    pub fn new(
        container_id: Uuid,
        event_type: impl Into<String>,
        actor_id: Uuid,
        payload: serde_json::Value,
        created_at: DateTime<Utc>,
    ) -> Self {
        let event_type = event_type.into();
        let fingerprint = fingerprint(&event_type, container_id, actor_id, &payload);
        Self {
            id: Uuid::now_v7(),
            container_id,
            event_type,
            actor_id,
            payload,
            created_at,
            fingerprint,
        }
    }

    /// Parse the payload into a specific type.
    pub fn parse_payload<T: for<'de> Deserialize<'de>>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.payload.clone())
    }
}

/// Lifecycle transitions recorded for every entity kind.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LifecycleAction {
    Created,
    Updated,
    Shared,
    AccessRevoked,
    DeleteRequested,
    OwnershipTransferred,
}

impl LifecycleAction {
    pub fn all() -> [LifecycleAction; 6] {
        [
            Self::Created,
            Self::Updated,
            Self::Shared,
            Self::AccessRevoked,
            Self::DeleteRequested,
            Self::OwnershipTransferred,
        ]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Created => "CREATED",
            Self::Updated => "UPDATED",
            Self::Shared => "SHARED",
            Self::AccessRevoked => "ACCESS_REVOKED",
            Self::DeleteRequested => "DELETE_REQUESTED",
            Self::OwnershipTransferred => "OWNERSHIP_TRANSFERRED",
        }
    }
}

/// Side of a move. A move is recorded as two events, one against the source
/// and one against the destination.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MoveDirection {
    Out,
    In,
}

impl MoveDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Out => "MOVED_OUT",
            Self::In => "MOVED_IN",
        }
    }
}

/// Typed form of the event types this core appends itself.
///
/// # Example
///
/// ```
/// use trove_events::{AuditKind, LifecycleAction};
/// use trove_tree::EntityKind;
///
/// let kind = AuditKind::Lifecycle(EntityKind::Item, LifecycleAction::Created);
/// assert_eq!(kind.event_type(), "ITEM_CREATED");
/// assert_eq!(AuditKind::parse("ITEM_CREATED"), Some(kind));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuditKind {
    /// `{KIND}_VIEWED`
    Viewed(EntityKind),
    /// `{KIND}_{ACTION}`
    Lifecycle(EntityKind, LifecycleAction),
    /// `ITEM_MOVED_OUT`, `SUBCONTAINER_MOVED_IN`, ...
    ///
    /// Only items and sub-containers move.
    Moved(EntityKind, MoveDirection),
}

impl AuditKind {
    /// The wire event type string.
    pub fn event_type(&self) -> String {
        match self {
            Self::Viewed(kind) => format!("{}_VIEWED", kind.audit_prefix()),
            Self::Lifecycle(kind, action) => format!("{}_{}", kind.audit_prefix(), action.as_str()),
            Self::Moved(kind, direction) => {
                format!("{}_{}", kind.audit_prefix(), direction.as_str())
            }
        }
    }

    /// Parse a wire event type. Returns `None` for anything outside the
    /// vocabulary, including moves of containers.
    pub fn parse(event_type: &str) -> Option<Self> {
        let (kind, rest) = split_prefix(event_type)?;
        if rest == "VIEWED" {
            return Some(Self::Viewed(kind));
        }
        if let Some(action) = LifecycleAction::all().into_iter().find(|a| a.as_str() == rest) {
            return Some(Self::Lifecycle(kind, action));
        }
        let direction = match rest {
            "MOVED_OUT" => MoveDirection::Out,
            "MOVED_IN" => MoveDirection::In,
            _ => return None,
        };
        match kind {
            EntityKind::Container => None,
            _ => Some(Self::Moved(kind, direction)),
        }
    }

    /// Every typed event type, used to seed the write policy.
    pub fn all() -> Vec<AuditKind> {
        let kinds = [EntityKind::Container, EntityKind::SubContainer, EntityKind::Item];
        let mut all = Vec::new();
        for kind in kinds {
            all.push(Self::Viewed(kind));
            for action in LifecycleAction::all() {
                all.push(Self::Lifecycle(kind, action));
            }
        }
        for kind in [EntityKind::Item, EntityKind::SubContainer] {
            all.push(Self::Moved(kind, MoveDirection::Out));
            all.push(Self::Moved(kind, MoveDirection::In));
        }
        all
    }
}

impl fmt::Display for AuditKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.event_type())
    }
}

fn split_prefix(event_type: &str) -> Option<(EntityKind, &str)> {
    for kind in [EntityKind::SubContainer, EntityKind::Container, EntityKind::Item] {
        if let Some(rest) = event_type
            .strip_prefix(kind.audit_prefix())
            .and_then(|r| r.strip_prefix('_'))
        {
            return Some((kind, rest));
        }
    }
    None
}
