//! Untyped configuration trees.
//!
//! Every source is converted to a `serde_json::Value` tree before merging; the
//! typed value is only rebuilt at the very end by the decoder.

use super::schema::{Configurable, Kind, KeyPath, Schema};
use crate::error::{ConfigError, Result};
use serde_json::{Map, Value};

/// Convert a typed value into a tree shaped by its schema.
///
/// Fields without a canonical key are dropped, a nested record that is
/// absent (`None`) becomes an empty mapping, and an absent leaf is omitted.
pub fn build_tree<T: Configurable>(value: &T) -> Result<Map<String, Value>> {
    let raw = serde_json::to_value(value).map_err(ConfigError::Serialize)?;
    match raw {
        Value::Object(map) => Ok(shape_record(map, &T::schema())),
        _ => Err(ConfigError::NotMapping),
    }
}

fn shape_record(mut raw: Map<String, Value>, schema: &Schema) -> Map<String, Value> {
    let mut out = Map::new();
    for field in schema.fields() {
        let Some(name) = field.name() else {
            continue;
        };
        let value = raw.remove(name).unwrap_or(Value::Null);
        match (&field.kind, value) {
            (Kind::Record(child), Value::Object(map)) => {
                out.insert(name.to_string(), Value::Object(shape_record(map, child)));
            }
            (Kind::Record(_), _) => {
                out.insert(name.to_string(), Value::Object(Map::new()));
            }
            (_, Value::Null) => {}
            (_, value) => {
                out.insert(name.to_string(), value);
            }
        }
    }
    out
}

/// Write `value` at `path`, creating (or replacing non-mapping) intermediate
/// nodes with mappings.
pub fn set_path(tree: &mut Map<String, Value>, path: &KeyPath, value: Value) {
    let Some((last, parents)) = path.segments().split_last() else {
        return;
    };
    let mut current = tree;
    for segment in parents {
        let slot = current
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        let Value::Object(map) = slot else {
            return;
        };
        current = map;
    }
    current.insert(last.clone(), value);
}

/// Read the value at `path`, if every segment resolves.
pub fn get_path<'a>(tree: &'a Map<String, Value>, path: &KeyPath) -> Option<&'a Value> {
    let (last, parents) = path.segments().split_last()?;
    let mut current = tree;
    for segment in parents {
        current = current.get(segment)?.as_object()?;
    }
    current.get(last)
}

/// Mutable access to the value at `path`, if every segment resolves.
pub fn get_path_mut<'a>(tree: &'a mut Map<String, Value>, path: &KeyPath) -> Option<&'a mut Value> {
    let (last, parents) = path.segments().split_last()?;
    let mut current = tree;
    for segment in parents {
        current = current.get_mut(segment)?.as_object_mut()?;
    }
    current.get_mut(last)
}

/// Whether merging `tree` over another tree would replace the value at `path`.
///
/// True when the path resolves, or when one of its parents is present as a
/// non-mapping (which replaces the whole subtree).
pub fn covers_path(tree: &Map<String, Value>, path: &KeyPath) -> bool {
    let mut current = tree;
    for segment in path.segments() {
        match current.get(segment) {
            None => return false,
            Some(Value::Object(child)) => current = child,
            Some(_) => return true,
        }
    }
    !path.segments().is_empty()
}

/// Flatten a tree into dot-joined key-paths of its leaves.
///
/// Empty mappings count as leaves so they are still reported.
pub fn flatten_keys(tree: &Map<String, Value>) -> Vec<String> {
    let mut keys = Vec::new();
    flatten_into(tree, &KeyPath::root(), &mut keys);
    keys
}

fn flatten_into(tree: &Map<String, Value>, prefix: &KeyPath, keys: &mut Vec<String>) {
    for (key, value) in tree {
        let path = prefix.child(key);
        match value {
            Value::Object(child) if !child.is_empty() => flatten_into(child, &path, keys),
            _ => keys.push(path.to_string()),
        }
    }
}
