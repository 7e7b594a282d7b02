//! Partial updates to tree entities.
//!
//! A [`Patch`] is a set of top-level fields to overwrite. Before it touches a
//! document it is sanitized: stamps and identity fields are dropped and
//! names are clamped.

use serde::Serialize;
use serde_json::{Map, Value};

use trove_tree::entity::clamp_name;
use trove_tree::media;

use crate::error::{SyncError, SyncResult};

/// Fields a patch may never set.
///
/// Stamps are owned by the coordinator; parent links and ownership change
/// only through their lifecycle operations.
pub const PROTECTED_FIELDS: [&str; 7] = [
    "editedAt",
    "viewedAt",
    "id",
    "containerId",
    "createdAt",
    "ownerId",
    "subContainerId",
];

/// Fields clamped to the maximum name length.
pub const CLAMPED_FIELDS: [&str; 2] = ["name", "title"];

const MEDIA: &str = "media";
const PRIMARY_MEDIA: &str = "primaryMedia";

/// Field-level partial update.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use trove_sync::Patch;
///
/// let patch = Patch::new()
///     .set("name", "x".repeat(50))
///     .set("editedAt", "2020-01-01T00:00:00Z")
///     .sanitized();
///
/// assert_eq!(patch.get("name").unwrap().as_str().unwrap().len(), 35);
/// assert!(patch.get("editedAt").is_none());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Patch {
    fields: Map<String, Value>,
}

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field. Values that fail to serialize are stored as null.
    pub fn set(mut self, field: impl Into<String>, value: impl Serialize) -> Self {
        let value = serde_json::to_value(value).unwrap_or(Value::Null);
        self.fields.insert(field.into(), value);
        self
    }

    /// Build from a JSON object.
    pub fn from_value(value: Value) -> SyncResult<Self> {
        match value {
            Value::Object(fields) => Ok(Self { fields }),
            other => Err(SyncError::InvalidRequest(format!(
                "patch must be an object, got {other}"
            ))),
        }
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Whether applying this patch re-derives media fields.
    pub fn touches_media(&self) -> bool {
        self.fields.contains_key(MEDIA) || self.fields.contains_key(PRIMARY_MEDIA)
    }

    /// Drop protected fields and clamp names.
    pub fn sanitized(mut self) -> Self {
        for field in PROTECTED_FIELDS {
            self.fields.remove(field);
        }
        for field in CLAMPED_FIELDS {
            if let Some(Value::String(s)) = self.fields.get_mut(field) {
                *s = clamp_name(s);
            }
        }
        self
    }

    /// Overwrite the patched fields of `document`, then restore the media
    /// invariants if media was touched.
    pub fn apply_to(&self, document: &mut Map<String, Value>) {
        for (field, value) in &self.fields {
            document.insert(field.clone(), value.clone());
        }
        if self.touches_media() {
            normalize_media(document);
        }
    }

    /// Fields whose values may differ after [`apply_to`](Self::apply_to).
    pub fn affected_fields(&self) -> Vec<String> {
        let mut fields: Vec<String> = self.fields.keys().cloned().collect();
        if self.touches_media() {
            for derived in [MEDIA, PRIMARY_MEDIA] {
                if !self.fields.contains_key(derived) {
                    fields.push(derived.to_string());
                }
            }
        }
        fields
    }
}

/// Re-establish the media rules on a raw document.
///
/// Non-string references are dropped.
pub fn normalize_media(document: &mut Map<String, Value>) {
    let mut refs: Vec<String> = match document.get(MEDIA) {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|v| v.as_str().map(str::to_string))
            .collect(),
        _ => Vec::new(),
    };
    let mut primary = document
        .get(PRIMARY_MEDIA)
        .and_then(Value::as_str)
        .map(str::to_string);

    media::normalize(&mut refs, &mut primary);

    document.insert(
        MEDIA.to_string(),
        Value::Array(refs.into_iter().map(Value::String).collect()),
    );
    document.insert(
        PRIMARY_MEDIA.to_string(),
        primary.map(Value::String).unwrap_or(Value::Null),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_sanitize_strips_protected_fields() {
        let patch = Patch::from_value(json!({
            "name": "ok",
            "editedAt": "x",
            "viewedAt": "x",
            "id": "x",
            "containerId": "x",
            "createdAt": "x",
            "ownerId": "x",
            "subContainerId": "x"
        }))
        .unwrap()
        .sanitized();

        let keys: Vec<&str> = patch.keys().collect();
        assert_eq!(keys, vec!["name"]);
    }

    #[test]
    fn test_sanitize_clamps_title() {
        let patch = Patch::new().set("title", "é".repeat(40)).sanitized();
        assert_eq!(
            patch.get("title").unwrap().as_str().unwrap().chars().count(),
            35
        );
    }

    #[test]
    fn test_from_value_rejects_non_object() {
        assert!(Patch::from_value(json!([1, 2])).is_err());
    }

    #[test]
    fn test_apply_rederives_primary_media() {
        let mut document = json!({
            "name": "Box",
            "media": ["a"],
            "primaryMedia": "a"
        })
        .as_object()
        .cloned()
        .unwrap();

        let patch = Patch::new().set("media", vec!["b", "c", "b", "d", "e", "f"]);
        patch.apply_to(&mut document);

        assert_eq!(document["media"], json!(["b", "c", "d", "e"]));
        assert_eq!(document["primaryMedia"], json!("b"));
        assert!(patch
            .affected_fields()
            .contains(&"primaryMedia".to_string()));
    }

    #[test]
    fn test_apply_leaves_other_fields() {
        let mut document = json!({"name": "Box", "description": "d"})
            .as_object()
            .cloned()
            .unwrap();
        Patch::new().set("name", "Crate").apply_to(&mut document);

        assert_eq!(document["name"], json!("Crate"));
        assert_eq!(document["description"], json!("d"));
        assert!(!document.contains_key("media"));
    }
}
