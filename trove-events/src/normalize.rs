//! Payload normalization
//!
//! Bounds the size of values written into audit payloads regardless of what
//! a client sends:
//! - strings longer than [`MAX_STRING_CHARS`] are cut and get [`ELLIPSIS`]
//! - arrays of at most [`MAX_ARRAY_ITEMS`] are normalized element-wise,
//!   longer ones collapse to `{"type": "array", "length": n}`
//! - objects are serialized and cut at [`MAX_OBJECT_CHARS`]
//! - values that cannot be serialized become [`UNSERIALIZABLE`]

use serde::Serialize;
use serde_json::{json, Value};

pub const MAX_STRING_CHARS: usize = 180;
pub const MAX_OBJECT_CHARS: usize = 220;
pub const MAX_ARRAY_ITEMS: usize = 8;

/// Marker appended to truncated text.
pub const ELLIPSIS: &str = "…";

/// Stand-in for values that failed to serialize.
pub const UNSERIALIZABLE: &str = "[unserializable]";

/// Normalize any serializable value.
///
/// # Example
///
/// ```
/// use serde_json::json;
/// use trove_events::normalize::normalize;
///
/// assert_eq!(normalize(&"short"), json!("short"));
/// assert_eq!(normalize(&vec![0u8; 20]), json!({"type": "array", "length": 20}));
/// ```
pub fn normalize<T: Serialize + ?Sized>(value: &T) -> Value {
    match serde_json::to_value(value) {
        Ok(v) => normalize_value(&v),
        Err(_) => Value::String(UNSERIALIZABLE.to_string()),
    }
}

/// Normalize an already-parsed JSON value.
pub fn normalize_value(value: &Value) -> Value {
    match value {
        Value::Null | Value::Bool(_) | Value::Number(_) => value.clone(),
        Value::String(s) => Value::String(truncate(s, MAX_STRING_CHARS)),
        Value::Array(items) if items.len() <= MAX_ARRAY_ITEMS => {
            Value::Array(items.iter().map(normalize_value).collect())
        }
        Value::Array(items) => json!({ "type": "array", "length": items.len() }),
        Value::Object(_) => Value::String(truncate(&value.to_string(), MAX_OBJECT_CHARS)),
    }
}

fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}{}", &s[..cut], ELLIPSIS),
        None => s.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_scalars_pass_through() {
        assert_eq!(normalize_value(&json!(null)), json!(null));
        assert_eq!(normalize_value(&json!(true)), json!(true));
        assert_eq!(normalize_value(&json!(42.5)), json!(42.5));
    }

    #[test]
    fn test_long_string_is_truncated() {
        let long = "x".repeat(200);
        let normalized = normalize_value(&json!(long));
        let s = normalized.as_str().unwrap();

        assert!(s.ends_with(ELLIPSIS));
        assert_eq!(s.chars().count(), MAX_STRING_CHARS + 1);
    }

    #[test]
    fn test_string_at_limit_is_untouched() {
        let exact = "y".repeat(MAX_STRING_CHARS);
        assert_eq!(normalize_value(&json!(exact.clone())), json!(exact));
    }

    #[test]
    fn test_short_array_normalized_elementwise() {
        let long = "z".repeat(300);
        let normalized = normalize_value(&json!(["a", long, 3]));
        let items = normalized.as_array().unwrap();

        assert_eq!(items.len(), 3);
        assert_eq!(items[0], "a");
        assert!(items[1].as_str().unwrap().ends_with(ELLIPSIS));
        assert_eq!(items[2], 3);
    }

    #[test]
    fn test_long_array_collapses() {
        let normalized = normalize_value(&json!([1, 2, 3, 4, 5, 6, 7, 8, 9]));
        assert_eq!(normalized, json!({"type": "array", "length": 9}));
    }

    #[test]
    fn test_object_serialized_and_truncated() {
        let small = normalize_value(&json!({"a": 1}));
        assert_eq!(small, json!(r#"{"a":1}"#));

        let mut big = BTreeMap::new();
        for i in 0..100 {
            big.insert(format!("key{i}"), i);
        }
        let normalized = normalize(&big);
        let s = normalized.as_str().unwrap();
        assert!(s.ends_with(ELLIPSIS));
        assert_eq!(s.chars().count(), MAX_OBJECT_CHARS + 1);
    }

    #[test]
    fn test_unserializable_value_gets_sentinel() {
        // Maps with non-string keys cannot become JSON objects.
        let mut map = std::collections::HashMap::new();
        map.insert(vec![1u8], 1);
        assert_eq!(normalize(&map), json!(UNSERIALIZABLE));
    }
}
