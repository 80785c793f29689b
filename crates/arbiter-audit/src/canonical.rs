//! Deterministic re-serialization of JSON values.
//!
//! Object keys are sorted, null-valued fields are dropped, and arrays keep
//! their order, so payloads that differ only in key order or in absent
//! optional fields serialize to the same bytes.

use serde_json::{Map, Value};

pub fn canonicalize(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(&String, &Value)> =
                map.iter().filter(|(_, v)| !v.is_null()).collect();
            entries.sort_by(|(a, _), (b, _)| a.cmp(b));
            let mut out = Map::with_capacity(entries.len());
            for (key, value) in entries {
                out.insert(key.clone(), canonicalize(value));
            }
            Value::Object(out)
        }
        Value::Array(items) => Value::Array(items.iter().map(canonicalize).collect()),
        other => other.clone(),
    }
}

/// Compact canonical serialization.
pub fn canonical_string(value: &Value) -> String {
    canonicalize(value).to_string()
}

/// UTF-8 byte size of the canonical serialization.
pub fn canonical_size(value: &Value) -> usize {
    canonical_string(value).len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn keys_are_sorted_recursively() {
        let value = json!({"b": 1, "a": {"z": true, "c": [ {"y": 1, "x": 2} ]}});
        assert_eq!(
            canonical_string(&value),
            r#"{"a":{"c":[{"x":2,"y":1}],"z":true},"b":1}"#
        );
    }

    #[test]
    fn null_fields_are_dropped_but_array_slots_kept() {
        let value = json!({"keep": [null, 1], "drop": null, "nested": {"gone": null}});
        assert_eq!(canonical_string(&value), r#"{"keep":[null,1],"nested":{}}"#);
    }

    #[test]
    fn array_order_is_significant() {
        assert_ne!(
            canonical_string(&json!([1, 2])),
            canonical_string(&json!([2, 1]))
        );
    }

    #[test]
    fn size_counts_utf8_bytes() {
        assert_eq!(canonical_size(&json!("é")), 4);
        assert_eq!(canonical_size(&json!({})), 2);
    }
}
