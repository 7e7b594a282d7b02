//! Write policy
//!
//! Only view events and entity lifecycle events are appended by this core.
//! Fine-grained mutation events come from a trusted external trigger and are
//! skipped here so the two sources never compete.

use std::collections::HashSet;

use crate::types::AuditKind;

const VIEWED_SUFFIX: &str = "_VIEWED";

/// Allow-list of event types the audit log appends directly.
///
/// # Example
///
/// ```
/// use trove_events::WritePolicy;
///
/// let policy = WritePolicy::default();
/// assert!(policy.allows("ITEM_MOVED_IN"));
/// assert!(policy.allows("REPORT_VIEWED"));
/// assert!(!policy.allows("ITEM_RENAMED"));
/// ```
#[derive(Debug, Clone)]
pub struct WritePolicy {
    allowed: HashSet<String>,
}

impl WritePolicy {
    /// Policy with only the typed lifecycle vocabulary and the view rule.
    pub fn new() -> Self {
        Self {
            allowed: AuditKind::all().iter().map(AuditKind::event_type).collect(),
        }
    }

    /// Allow one more exact event type.
    pub fn with_type(mut self, event_type: impl Into<String>) -> Self {
        self.allowed.insert(event_type.into());
        self
    }

    /// Check whether `event_type` may be appended directly.
    pub fn allows(&self, event_type: &str) -> bool {
        is_view_event(event_type) || self.allowed.contains(event_type)
    }
}

impl Default for WritePolicy {
    fn default() -> Self {
        Self::new()
    }
}

fn is_view_event(event_type: &str) -> bool {
    event_type.len() > VIEWED_SUFFIX.len() && event_type.ends_with(VIEWED_SUFFIX)
}
