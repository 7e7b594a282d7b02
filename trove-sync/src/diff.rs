//! Field-level change detection for audit payloads.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

use trove_events::normalize::normalize_value;

/// Before and after value of one field, both normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    pub from: Value,
    pub to: Value,
}

/// Changes keyed by field name.
pub type Changes = BTreeMap<String, FieldChange>;

/// Compare `fields` between two documents.
///
/// Missing fields compare as null. A field appears in the result only when
/// its normalized values differ, so cosmetic changes beyond the
/// normalization bounds are not reported.
///
/// # Examples
///
/// ```
/// use serde_json::json;
/// use trove_sync::diff::diff_fields;
///
/// let before = json!({"name": "A", "description": "same"});
/// let after = json!({"name": "B", "description": "same"});
/// let changes = diff_fields(
///     before.as_object().unwrap(),
///     after.as_object().unwrap(),
///     ["name", "description"],
/// );
///
/// assert_eq!(changes.len(), 1);
/// assert_eq!(changes["name"].from, json!("A"));
/// assert_eq!(changes["name"].to, json!("B"));
/// ```
pub fn diff_fields<I, S>(before: &Map<String, Value>, after: &Map<String, Value>, fields: I) -> Changes
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut changes = Changes::new();
    for field in fields {
        let field = field.as_ref();
        let from = normalize_value(before.get(field).unwrap_or(&Value::Null));
        let to = normalize_value(after.get(field).unwrap_or(&Value::Null));
        if from != to {
            changes.insert(field.to_string(), FieldChange { from, to });
        }
    }
    changes
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn obj(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_noop_is_empty() {
        let doc = obj(json!({"name": "A", "media": ["x"]}));
        assert!(diff_fields(&doc, &doc, ["name", "media"]).is_empty());
    }

    #[test]
    fn test_missing_field_is_null() {
        let before = obj(json!({}));
        let after = obj(json!({"description": "new"}));
        let changes = diff_fields(&before, &after, ["description"]);
        assert_eq!(changes["description"].from, Value::Null);
    }

    #[test]
    fn test_difference_beyond_truncation_is_hidden() {
        let prefix = "p".repeat(180);
        let before = obj(json!({"description": format!("{prefix}a")}));
        let after = obj(json!({"description": format!("{prefix}b")}));
        assert!(diff_fields(&before, &after, ["description"]).is_empty());
    }

    #[test]
    fn test_values_are_normalized() {
        let before = obj(json!({"tags": []}));
        let after = obj(json!({"tags": (0..20).collect::<Vec<_>>()}));
        let changes = diff_fields(&before, &after, ["tags"]);
        assert_eq!(changes["tags"].to, json!({"type": "array", "length": 20}));
    }
}
