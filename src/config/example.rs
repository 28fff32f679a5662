//! Artifacts derived from a schema: a commented YAML example, a JSON dump and
//! a list of keys a file sets that the schema does not know.

use super::schema::{Configurable, Kind, KeyPath, Schema};
use super::tree::{build_tree, flatten_keys};
use crate::error::{ConfigError, Result};
use serde_json::{Map, Value};
use std::fmt::Write;

/// Render `value` as YAML with each field's description as a comment.
pub fn example_yaml<T: Configurable>(value: &T) -> Result<String> {
    let tree = build_tree(value)?;
    let mut out = String::new();
    write_record(&mut out, &tree, &T::schema(), 0);
    Ok(out)
}

fn write_record(out: &mut String, tree: &Map<String, Value>, schema: &Schema, depth: usize) {
    let indent = "  ".repeat(depth);
    for field in schema.fields() {
        let Some(name) = field.name() else {
            continue;
        };
        for line in field.description.lines().filter(|l| !l.trim().is_empty()) {
            let _ = writeln!(out, "{indent}# {}", line.trim());
        }
        match (&field.kind, tree.get(name)) {
            (Kind::Record(child), Some(Value::Object(map))) if !map.is_empty() => {
                let _ = writeln!(out, "{indent}{name}:");
                write_record(out, map, child, depth + 1);
            }
            (Kind::Record(_), _) => {
                let _ = writeln!(out, "{indent}{name}: {{}}");
            }
            (_, Some(value)) => {
                let _ = writeln!(out, "{indent}{name}: {value}");
            }
            (_, None) => {
                let _ = writeln!(out, "{indent}{name}: null");
            }
        }
    }
}

/// Render the schema-shaped tree of `value` as indented JSON.
pub fn to_json_pretty<T: Configurable>(value: &T) -> Result<String> {
    let tree = build_tree(value)?;
    serde_json::to_string_pretty(&Value::Object(tree)).map_err(ConfigError::Serialize)
}

/// Key-paths set in `tree` that `T`'s schema does not declare.
///
/// Anything below a declared leaf (map entries, list items) counts as known.
pub fn unknown_keys<T: Configurable>(tree: &Map<String, Value>) -> Vec<String> {
    let schema = T::schema();
    flatten_keys(tree)
        .into_iter()
        .filter(|key| !is_known(&schema, &KeyPath::parse(key)))
        .collect()
}

fn is_known(schema: &Schema, path: &KeyPath) -> bool {
    let mut current = schema;
    for segment in path.segments() {
        match current.get(segment).map(|f| &f.kind) {
            Some(Kind::Record(child)) => current = child,
            Some(_) => return true,
            None => return false,
        }
    }
    true
}
