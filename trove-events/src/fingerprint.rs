//! Audit event fingerprints
//!
//! A 32-bit FNV-1a hash over the identifying fields of an event. It is
//! non-cryptographic and only used for short-window duplicate detection.

use serde_json::Value;
use uuid::Uuid;

const FNV_OFFSET_BASIS: u32 = 0x811c_9dc5;
const FNV_PRIME: u32 = 0x0100_0193;

/// FNV-1a, 32-bit.
pub fn fnv1a_32(bytes: &[u8]) -> u32 {
    bytes.iter().fold(FNV_OFFSET_BASIS, |hash, byte| {
        (hash ^ u32::from(*byte)).wrapping_mul(FNV_PRIME)
    })
}

/// Fingerprint of `type|containerId|actorId|JSON(payload)`.
///
/// Payload objects serialize with sorted keys, so two payloads that are
/// equal as JSON values always fingerprint the same.
pub fn fingerprint(event_type: &str, container_id: Uuid, actor_id: Uuid, payload: &Value) -> u32 {
    let input = format!("{event_type}|{container_id}|{actor_id}|{payload}");
    fnv1a_32(input.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_fnv1a_reference_vectors() {
        assert_eq!(fnv1a_32(b""), 0x811c_9dc5);
        assert_eq!(fnv1a_32(b"a"), 0xe40c_292c);
        assert_eq!(fnv1a_32(b"foobar"), 0xbf9c_f968);
    }

    #[test]
    fn test_fingerprint_is_key_order_independent() {
        let container = Uuid::now_v7();
        let actor = Uuid::now_v7();
        let a: Value = serde_json::from_str(r#"{"x": 1, "y": 2}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"y": 2, "x": 1}"#).unwrap();

        assert_eq!(
            fingerprint("ITEM_VIEWED", container, actor, &a),
            fingerprint("ITEM_VIEWED", container, actor, &b)
        );
    }

    #[test]
    fn test_fingerprint_covers_every_field() {
        let container = Uuid::now_v7();
        let actor = Uuid::now_v7();
        let payload = json!({"itemId": "i1"});
        let base = fingerprint("ITEM_VIEWED", container, actor, &payload);

        assert_ne!(base, fingerprint("ITEM_CREATED", container, actor, &payload));
        assert_ne!(base, fingerprint("ITEM_VIEWED", Uuid::now_v7(), actor, &payload));
        assert_ne!(base, fingerprint("ITEM_VIEWED", container, Uuid::now_v7(), &payload));
        assert_ne!(base, fingerprint("ITEM_VIEWED", container, actor, &json!({"itemId": "i2"})));
    }
}
