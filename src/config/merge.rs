//! Deep merge for configuration trees.
//!
//! Mappings are merged field-by-field with the higher-priority source winning
//! at the leaves. Sequences and scalars are replaced entirely, not
//! concatenated.

use serde_json::{Map, Value};

/// Deep merge `src` into `dst` in place, with `src` taking precedence.
///
/// - Both mappings: merged recursively, key by key
/// - Anything else (scalars, sequences, null, mapping over non-mapping):
///   `src` replaces `dst` wholesale
///
/// # Example
/// ```
/// use serde_json::json;
/// use cfgm::config::merge;
///
/// let mut dst = json!({
///     "server": { "port": 8080, "host": "localhost" },
///     "features": ["a", "b"]
/// });
/// let src = json!({
///     "server": { "port": 9000 },
///     "features": ["c"]
/// });
/// merge(&mut dst, src);
/// assert_eq!(dst, json!({
///     "server": { "port": 9000, "host": "localhost" },
///     "features": ["c"]
/// }));
/// ```
pub fn merge(dst: &mut Value, src: Value) {
    match (dst, src) {
        (Value::Object(dst_map), Value::Object(src_map)) => merge_maps(dst_map, src_map),
        (dst_slot, src) => *dst_slot = src,
    }
}

/// [`merge`] for two mapping nodes.
pub fn merge_maps(dst: &mut Map<String, Value>, src: Map<String, Value>) {
    for (key, src_value) in src {
        match dst.get_mut(&key) {
            Some(existing) => merge(existing, src_value),
            None => {
                dst.insert(key, src_value);
            }
        }
    }
}

/// Merge multiple trees in order, with later trees taking precedence.
pub fn merge_all(values: impl IntoIterator<Item = Value>) -> Value {
    values.into_iter().fold(Value::Object(Map::new()), |mut acc, value| {
        merge(&mut acc, value);
        acc
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn merged(mut dst: Value, src: Value) -> Value {
        merge(&mut dst, src);
        dst
    }

    #[test]
    fn test_merge_simple_objects() {
        let result = merged(json!({"a": 1, "b": 2}), json!({"b": 3, "c": 4}));
        assert_eq!(result, json!({"a": 1, "b": 3, "c": 4}));
    }

    #[test]
    fn test_merge_nested_objects() {
        let base = json!({
            "server": {"host": "localhost", "port": 8080},
            "debug": true
        });
        let overlay = json!({
            "server": {"port": 9000}
        });
        assert_eq!(
            merged(base, overlay),
            json!({
                "server": {"host": "localhost", "port": 9000},
                "debug": true
            })
        );
    }

    #[test]
    fn test_arrays_replaced_not_merged() {
        let result = merged(json!({"items": [1, 2, 3]}), json!({"items": [4, 5]}));
        assert_eq!(result, json!({"items": [4, 5]}));
    }

    #[test]
    fn test_null_replaces_value() {
        let result = merged(json!({"a": 1, "b": {"c": 2}}), json!({"a": null}));
        assert_eq!(result, json!({"a": null, "b": {"c": 2}}));
    }

    #[test]
    fn test_deep_nested_merge() {
        let base = json!({
            "level1": {
                "level2": {
                    "level3": {"a": 1, "b": 2}
                }
            }
        });
        let overlay = json!({
            "level1": {
                "level2": {
                    "level3": {"b": 3, "c": 4}
                }
            }
        });
        assert_eq!(
            merged(base, overlay),
            json!({
                "level1": {
                    "level2": {
                        "level3": {"a": 1, "b": 3, "c": 4}
                    }
                }
            })
        );
    }

    #[test]
    fn test_merge_all() {
        let values = vec![json!({"a": 1}), json!({"b": 2}), json!({"a": 3, "c": 4})];
        assert_eq!(merge_all(values), json!({"a": 3, "b": 2, "c": 4}));
    }

    #[test]
    fn test_src_replaces_primitive_with_object() {
        let result = merged(json!({"value": 42}), json!({"value": {"nested": true}}));
        assert_eq!(result, json!({"value": {"nested": true}}));
    }

    #[test]
    fn test_src_replaces_object_with_primitive() {
        let result = merged(json!({"value": {"nested": true}}), json!({"value": 42}));
        assert_eq!(result, json!({"value": 42}));
    }

    #[test]
    fn test_merge_with_self_is_idempotent() {
        let tree = json!({"a": {"b": [1, 2], "c": "x"}, "d": 1.5});
        assert_eq!(merged(tree.clone(), tree.clone()), tree);
    }

    #[test]
    fn test_merge_empty_is_identity() {
        let tree = json!({"a": {"b": 1}});
        assert_eq!(merged(tree.clone(), json!({})), tree);
    }

    #[test]
    fn test_merge_is_not_commutative() {
        let a = json!({"k": 1});
        let b = json!({"k": 2});
        assert_ne!(merged(a.clone(), b.clone()), merged(b, a));
    }
}
