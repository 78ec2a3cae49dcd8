//! Canonical JSON codec for queue entries.
//!
//! Every entry is the compact JSON encoding of the producer's value with
//! object keys sorted at every depth and non-ASCII text left as is, so equal
//! values always produce equal entries regardless of which producer wrote
//! them.

use serde::Serialize;
use serde_json::{Map, Value};

/// Encode a value into its canonical entry form.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String, serde_json::Error> {
    let value = canonicalize(serde_json::to_value(value)?);
    serde_json::to_string(&value)
}

/// Decode one entry.
pub fn decode(raw: &str) -> Result<Value, serde_json::Error> {
    serde_json::from_str(raw)
}

/// Rebuild every object with its keys in sorted order.
///
/// Independent of whether `serde_json` was built with `preserve_order`.
pub fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut sorted = Map::new();
            for (key, value) in entries {
                sorted.insert(key, canonicalize(value));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use serde_json::json;

    use super::*;

    #[test]
    fn keys_are_sorted_at_every_depth() {
        let value = json!({"b": 1, "a": {"z": [{"y": 1, "x": 2}], "c": null}});
        assert_eq!(
            encode(&value).unwrap(),
            r#"{"a":{"c":null,"z":[{"x":2,"y":1}]},"b":1}"#
        );
    }

    #[test]
    fn hash_map_insertion_order_does_not_matter() {
        let mut first = HashMap::new();
        first.insert("k2", 2);
        first.insert("k1", 1);
        let mut second = HashMap::new();
        second.insert("k1", 1);
        second.insert("k2", 2);
        assert_eq!(encode(&first).unwrap(), encode(&second).unwrap());
    }

    #[test]
    fn non_ascii_is_preserved() {
        let encoded = encode(&json!({"name": "café ☕"})).unwrap();
        assert_eq!(encoded, r#"{"name":"café ☕"}"#);
        assert_eq!(decode(&encoded).unwrap(), json!({"name": "café ☕"}));
    }
}
