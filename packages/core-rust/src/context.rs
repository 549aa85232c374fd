//! Evaluation context helpers.
//!
//! A context is a plain `serde_json::Value`. Expressions read from it through
//! dotted paths and composite operators grow it by merging named results.

use serde_json::{Map, Value};

/// Key under which a non-object context is preserved when results are merged into it.
pub const SOURCE_KEY: &str = "source";

/// Merges `result` into `context` under `key` and returns the grown context.
///
/// Object contexts gain (or overwrite) the `key` field. Any other context is
/// first wrapped as `{"source": context}` so later readers can still reach it.
#[must_use]
pub fn merge_result(context: Value, key: &str, result: Value) -> Value {
    let mut fields = match context {
        Value::Object(fields) => fields,
        other => {
            let mut wrapped = Map::new();
            wrapped.insert(SOURCE_KEY.to_string(), other);
            wrapped
        }
    };
    fields.insert(key.to_string(), result);
    Value::Object(fields)
}

/// Resolves a dotted path (`"user.address.city"`, `"items.0"`) against `data`.
///
/// An empty path returns the whole value. Numeric segments index into arrays.
#[must_use]
pub fn lookup_path<'a>(data: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(data);
    }
    path.split('.').try_fold(data, |current, segment| match current {
        Value::Object(fields) => fields.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::json;

    use super::*;

    #[test]
    fn merge_into_object_adds_key() {
        let merged = merge_result(json!({"in": "x"}), "res", json!(1));
        assert_eq!(merged, json!({"in": "x", "res": 1}));
    }

    #[test]
    fn merge_overwrites_existing_key() {
        let merged = merge_result(json!({"res": "old"}), "res", json!("new"));
        assert_eq!(merged, json!({"res": "new"}));
    }

    #[test]
    fn merge_wraps_scalar_under_source() {
        let merged = merge_result(json!("payload"), "res", json!(true));
        assert_eq!(merged, json!({"source": "payload", "res": true}));
    }

    #[test]
    fn merge_wraps_array_under_source() {
        let merged = merge_result(json!([1, 2]), "res", Value::Null);
        assert_eq!(merged, json!({"source": [1, 2], "res": null}));
    }

    #[test]
    fn lookup_nested_object_and_array() {
        let data = json!({"user": {"tags": ["a", "b"]}});
        assert_eq!(lookup_path(&data, "user.tags.1"), Some(&json!("b")));
        assert_eq!(lookup_path(&data, "user.missing"), None);
        assert_eq!(lookup_path(&data, ""), Some(&data));
    }

    proptest! {
        #[test]
        fn merged_result_is_readable_by_key(key in "[a-z]{1,8}", n in any::<i64>(), scalar in any::<bool>()) {
            let context = if scalar { json!(n) } else { json!({"in": n}) };
            let merged = merge_result(context, &key, json!(n));
            prop_assert_eq!(lookup_path(&merged, &key), Some(&json!(n)));
            if scalar && key != SOURCE_KEY {
                prop_assert_eq!(lookup_path(&merged, SOURCE_KEY), Some(&json!(n)));
            }
        }
    }

    #[test]
    fn lookup_through_scalar_is_absent() {
        let data = json!({"name": "x"});
        assert_eq!(lookup_path(&data, "name.first"), None);
    }
}
