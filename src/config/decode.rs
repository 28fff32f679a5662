//! Decoding merged trees into typed configuration.
//!
//! Values arrive from YAML, JSON, environment variables and flags, so the
//! decoder is weakly typed: each leaf is coerced to the representation its
//! declared [`Kind`] expects before serde builds the final value.

use super::duration;
use super::schema::{Configurable, Kind, Schema};
use crate::error::{ConfigError, Result};
use chrono::{DateTime, FixedOffset};
use serde_json::{Map, Number, Value};

/// Decode a merged tree into `T`.
///
/// Keys the schema does not declare are ignored; null values are dropped so
/// the type's serde defaults apply.
pub fn decode<T: Configurable>(tree: Value) -> Result<T> {
    let Value::Object(map) = tree else {
        return Err(ConfigError::NotMapping);
    };
    let coerced = coerce_record(map, &T::schema(), "")?;
    serde_json::from_value(Value::Object(coerced)).map_err(ConfigError::Unmarshal)
}

fn join(prefix: &str, key: &str) -> String {
    if prefix.is_empty() {
        key.to_string()
    } else {
        format!("{prefix}.{key}")
    }
}

fn coerce_record(map: Map<String, Value>, schema: &Schema, prefix: &str) -> Result<Map<String, Value>> {
    let mut out = Map::new();
    for (key, value) in map {
        if value.is_null() {
            continue;
        }
        let coerced = match schema.get(&key) {
            Some(field) => coerce(value, &field.kind, &join(prefix, &key))?,
            None => value,
        };
        out.insert(key, coerced);
    }
    Ok(out)
}

fn coerce(value: Value, kind: &Kind, path: &str) -> Result<Value> {
    let result = match kind {
        Kind::String => to_string(value),
        Kind::Bool => to_bool(&value).map(Value::Bool),
        Kind::I8 => to_int::<i8>(&value),
        Kind::I16 => to_int::<i16>(&value),
        Kind::I32 => to_int::<i32>(&value),
        Kind::I64 => to_int::<i64>(&value),
        Kind::Isize => to_int::<isize>(&value),
        Kind::U8 => to_int::<u8>(&value),
        Kind::U16 => to_int::<u16>(&value),
        Kind::U32 => to_int::<u32>(&value),
        Kind::U64 => to_int::<u64>(&value),
        Kind::Usize => to_int::<usize>(&value),
        Kind::F32 | Kind::F64 => to_float(&value),
        Kind::Duration => to_duration(&value),
        Kind::Timestamp => to_timestamp(value),
        Kind::List(inner) => return coerce_list(value, inner, path),
        Kind::Map(inner) => return coerce_map(value, inner, path),
        Kind::Record(schema) => match value {
            Value::Object(map) => return coerce_record(map, schema, path).map(Value::Object),
            other => Err(format!("expected a mapping, got {}", type_name(&other))),
        },
    };
    result.map_err(|message| ConfigError::decode(path, message))
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "sequence",
        Value::Object(_) => "mapping",
    }
}

fn to_string(value: Value) -> std::result::Result<Value, String> {
    match value {
        Value::String(_) => Ok(value),
        Value::Bool(b) => Ok(Value::String(b.to_string())),
        Value::Number(n) => Ok(Value::String(n.to_string())),
        other => Err(format!("expected a string, got {}", type_name(&other))),
    }
}

/// Boolean spellings accepted from text.
fn parse_bool(text: &str) -> Option<bool> {
    match text.trim() {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "" | "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}

fn to_bool(value: &Value) -> std::result::Result<bool, String> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) => Ok(n.as_f64().is_some_and(|f| f != 0.0)),
        Value::String(s) => parse_bool(s).ok_or_else(|| format!("cannot parse {s:?} as bool")),
        other => Err(format!("expected a bool, got {}", type_name(other))),
    }
}

fn to_i128(value: &Value) -> std::result::Result<i128, String> {
    match value {
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(i128::from(i))
            } else if let Some(u) = n.as_u64() {
                Ok(i128::from(u))
            } else {
                float_to_i128(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        Value::Bool(b) => Ok(i128::from(*b)),
        Value::String(s) => {
            let text = s.trim();
            match text.parse::<i128>() {
                Ok(i) => Ok(i),
                Err(_) => text
                    .parse::<f64>()
                    .map_err(|_| format!("cannot parse {s:?} as an integer"))
                    .and_then(float_to_i128),
            }
        }
        other => Err(format!("expected an integer, got {}", type_name(other))),
    }
}

fn float_to_i128(f: f64) -> std::result::Result<i128, String> {
    if f.is_finite() && f.fract() == 0.0 && f.abs() < 1e38 {
        Ok(f as i128)
    } else {
        Err(format!("{f} is not an integer"))
    }
}

fn to_int<T>(value: &Value) -> std::result::Result<Value, String>
where
    T: TryFrom<i128> + Into<Value>,
{
    let n = to_i128(value)?;
    T::try_from(n)
        .map(Into::into)
        .map_err(|_| format!("{n} is out of range for {}", std::any::type_name::<T>()))
}

fn to_float(value: &Value) -> std::result::Result<Value, String> {
    let f = match value {
        Value::Number(n) => n.as_f64().unwrap_or(f64::NAN),
        Value::Bool(b) => f64::from(u8::from(*b)),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| format!("cannot parse {s:?} as a float"))?,
        other => return Err(format!("expected a float, got {}", type_name(other))),
    };
    Number::from_f64(f)
        .map(Value::Number)
        .ok_or_else(|| format!("{f} is not a finite number"))
}

fn to_duration(value: &Value) -> std::result::Result<Value, String> {
    let parsed = match value {
        Value::String(s) => duration::parse(s)?,
        Value::Number(n) => match n.as_u64() {
            Some(nanos) => std::time::Duration::from_nanos(nanos),
            None => return Err(format!("{n} is not a non-negative nanosecond count")),
        },
        other => return Err(format!("expected a duration, got {}", type_name(other))),
    };
    Ok(Value::String(duration::format(parsed)))
}

fn to_timestamp(value: Value) -> std::result::Result<Value, String> {
    match value {
        Value::String(s) => DateTime::<FixedOffset>::parse_from_rfc3339(s.trim())
            .map(|t| Value::String(t.to_rfc3339()))
            .map_err(|e| format!("cannot parse {s:?} as an RFC 3339 timestamp: {e}")),
        other => Err(format!("expected a timestamp string, got {}", type_name(&other))),
    }
}

fn coerce_list(value: Value, inner: &Kind, path: &str) -> Result<Value> {
    let items = match value {
        Value::Array(items) => items,
        Value::String(s) => split_list(&s).into_iter().map(Value::String).collect(),
        Value::Object(_) => {
            return Err(ConfigError::decode(path, "expected a sequence, got mapping"));
        }
        scalar => vec![scalar],
    };
    items
        .into_iter()
        .enumerate()
        .map(|(idx, item)| coerce(item, inner, &format!("{path}[{idx}]")))
        .collect::<Result<Vec<_>>>()
        .map(Value::Array)
}

fn split_list(text: &str) -> Vec<String> {
    if text.trim().is_empty() {
        return Vec::new();
    }
    text.split(',').map(|s| s.trim().to_string()).collect()
}

fn coerce_map(value: Value, inner: &Kind, path: &str) -> Result<Value> {
    let entries = match value {
        Value::Object(map) => map,
        Value::String(s) => parse_pairs(&s).map_err(|message| ConfigError::decode(path, message))?,
        other => {
            return Err(ConfigError::decode(
                path,
                format!("expected a mapping, got {}", type_name(&other)),
            ));
        }
    };
    let mut out = Map::new();
    for (key, item) in entries {
        let coerced = coerce(item, inner, &join(path, &key))?;
        out.insert(key, coerced);
    }
    Ok(Value::Object(out))
}

/// Parse `k=v,k2=v2` into a mapping of strings.
pub(crate) fn parse_pairs(text: &str) -> std::result::Result<Map<String, Value>, String> {
    let mut out = Map::new();
    for pair in text.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| format!("expected key=value, got {pair:?}"))?;
        out.insert(key.trim().to_string(), Value::String(value.trim().to_string()));
    }
    Ok(out)
}
