//! Command-line flag binding.
//!
//! Flag names come from key-paths with `.` replaced by `-`; hyphens already in
//! a key are kept (`server.url` -> `--server-url`, `tls.skip_verify` ->
//! `--tls-skip_verify`). Only flags the user actually typed override lower
//! layers.

use super::duration;
use super::schema::{Kind, KeyPath, Leaf, Schema};
use super::tree::set_path;
use chrono::{DateTime, Utc};
use clap::parser::ValueSource;
use clap::{Arg, ArgAction, ArgMatches, Command, value_parser};
use serde_json::{Map, Value};
use std::any::Any;
use std::time::Duration;
use tracing::debug;

/// Access to parsed command-line flags.
pub trait FlagSource {
    /// Whether the user explicitly supplied `name` (defaults do not count).
    fn is_set(&self, name: &str) -> bool;

    /// Single typed value of `name`.
    fn one<T: Any + Clone + Send + Sync + 'static>(&self, name: &str) -> Option<T>;

    /// All typed values of a repeated `name`.
    fn many<T: Any + Clone + Send + Sync + 'static>(&self, name: &str) -> Option<Vec<T>>;
}

impl FlagSource for ArgMatches {
    fn is_set(&self, name: &str) -> bool {
        matches!(self.try_contains_id(name), Ok(true))
            && self.value_source(name) == Some(ValueSource::CommandLine)
    }

    fn one<T: Any + Clone + Send + Sync + 'static>(&self, name: &str) -> Option<T> {
        self.try_get_one::<T>(name).ok().flatten().cloned()
    }

    fn many<T: Any + Clone + Send + Sync + 'static>(&self, name: &str) -> Option<Vec<T>> {
        self.try_get_many::<T>(name)
            .ok()
            .flatten()
            .map(|values| values.cloned().collect())
    }
}

impl<T: FlagSource> FlagSource for &T {
    fn is_set(&self, name: &str) -> bool {
        (**self).is_set(name)
    }

    fn one<V: Any + Clone + Send + Sync + 'static>(&self, name: &str) -> Option<V> {
        (**self).one(name)
    }

    fn many<V: Any + Clone + Send + Sync + 'static>(&self, name: &str) -> Option<Vec<V>> {
        (**self).many(name)
    }
}

/// Flag name bound to `path`.
pub fn flag_name(path: &KeyPath) -> String {
    path.join("-")
}

/// Whether values of `kind` can be bound from a flag.
pub fn supports(kind: &Kind) -> bool {
    match kind {
        Kind::Record(_) => false,
        Kind::List(inner) => !matches!(
            inner.as_ref(),
            Kind::Bool | Kind::List(_) | Kind::Map(_) | Kind::Record(_)
        ),
        Kind::Map(inner) => matches!(inner.as_ref(), Kind::String),
        _ => true,
    }
}

fn parse_timestamp(text: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    DateTime::parse_from_rfc3339(text.trim()).map(|t| t.with_timezone(&Utc))
}

fn parse_key_value(text: &str) -> Result<(String, String), String> {
    text.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got {text:?}"))
}

/// Declare one typed flag per supported leaf of `schema`.
///
/// Flags already declared on `cmd` (for example with a short alias) are left
/// as they are.
pub fn register_flags(mut cmd: Command, schema: &Schema) -> Command {
    for leaf in schema.leaves() {
        if !supports(leaf.kind) {
            continue;
        }
        let name = flag_name(&leaf.path);
        if cmd.get_arguments().any(|arg| arg.get_id() == name.as_str()) {
            continue;
        }
        let arg = Arg::new(name.clone())
            .long(name)
            .help(leaf.description.to_string());
        cmd = cmd.arg(typed_arg(arg, leaf.kind));
    }
    cmd
}

fn typed_arg(arg: Arg, kind: &Kind) -> Arg {
    match kind {
        Kind::Bool => arg
            .value_parser(value_parser!(bool))
            .num_args(0..=1)
            .require_equals(true)
            .default_missing_value("true"),
        Kind::List(inner) => {
            scalar_arg(arg, inner).action(ArgAction::Append).value_delimiter(',')
        }
        Kind::Map(_) => arg
            .value_parser(parse_key_value)
            .action(ArgAction::Append)
            .value_delimiter(',')
            .value_name("KEY=VALUE"),
        kind => scalar_arg(arg, kind),
    }
}

fn scalar_arg(arg: Arg, kind: &Kind) -> Arg {
    match kind {
        Kind::I8 => arg.value_parser(value_parser!(i8)),
        Kind::I16 => arg.value_parser(value_parser!(i16)),
        Kind::I32 => arg.value_parser(value_parser!(i32)),
        Kind::I64 => arg.value_parser(value_parser!(i64)),
        Kind::Isize => arg.value_parser(value_parser!(isize)),
        Kind::U8 => arg.value_parser(value_parser!(u8)),
        Kind::U16 => arg.value_parser(value_parser!(u16)),
        Kind::U32 => arg.value_parser(value_parser!(u32)),
        Kind::U64 => arg.value_parser(value_parser!(u64)),
        Kind::Usize => arg.value_parser(value_parser!(usize)),
        Kind::F32 => arg.value_parser(value_parser!(f32)),
        Kind::F64 => arg.value_parser(value_parser!(f64)),
        Kind::Duration => arg.value_parser(duration::parse).value_name("DURATION"),
        Kind::Timestamp => arg.value_parser(parse_timestamp).value_name("RFC3339"),
        _ => arg.value_parser(value_parser!(String)),
    }
}

/// Write every explicitly-set flag into `tree`, typed by its leaf kind.
///
/// Leaves whose kind has no flag support are skipped. Returns the key-paths
/// written.
pub fn bind_flags<F: FlagSource>(tree: &mut Map<String, Value>, leaves: &[Leaf<'_>], flags: &F) -> Vec<KeyPath> {
    let mut bound = Vec::new();
    for leaf in leaves {
        if !supports(leaf.kind) {
            continue;
        }
        let name = flag_name(&leaf.path);
        if !flags.is_set(&name) {
            continue;
        }
        if let Some(value) = flag_value(flags, &name, leaf.kind) {
            debug!(flag = %name, path = %leaf.path, "Loaded CLI flag");
            set_path(tree, &leaf.path, value);
            bound.push(leaf.path.clone());
        }
    }
    bound
}

fn flag_value<F: FlagSource>(flags: &F, name: &str, kind: &Kind) -> Option<Value> {
    match kind {
        Kind::String => flags.one::<String>(name).map(Value::from),
        Kind::Bool => flags.one::<bool>(name).map(Value::from),

        Kind::I8 => flags.one::<i8>(name).map(Value::from),
        Kind::I16 => flags.one::<i16>(name).map(Value::from),
        Kind::I32 => flags.one::<i32>(name).map(Value::from),
        Kind::I64 => flags.one::<i64>(name).map(Value::from),
        Kind::Isize => flags.one::<isize>(name).map(Value::from),

        Kind::U8 => flags.one::<u8>(name).map(Value::from),
        Kind::U16 => flags.one::<u16>(name).map(Value::from),
        Kind::U32 => flags.one::<u32>(name).map(Value::from),
        Kind::U64 => flags.one::<u64>(name).map(Value::from),
        Kind::Usize => flags.one::<usize>(name).map(Value::from),

        Kind::F32 => flags.one::<f32>(name).map(Value::from),
        Kind::F64 => flags.one::<f64>(name).map(Value::from),

        Kind::Duration => flags
            .one::<Duration>(name)
            .map(|d| Value::String(duration::format(d))),
        Kind::Timestamp => flags
            .one::<DateTime<Utc>>(name)
            .map(|t| Value::String(t.to_rfc3339())),

        Kind::List(inner) => list_value(flags, name, inner),
        Kind::Map(inner) if matches!(inner.as_ref(), Kind::String) => {
            flags.many::<(String, String)>(name).map(|pairs| {
                Value::Object(
                    pairs
                        .into_iter()
                        .map(|(k, v)| (k, Value::String(v)))
                        .collect(),
                )
            })
        }
        _ => None,
    }
}

fn many_json<T, F>(flags: &F, name: &str) -> Option<Value>
where
    T: Any + Clone + Send + Sync + 'static + Into<Value>,
    F: FlagSource,
{
    flags
        .many::<T>(name)
        .map(|values| Value::Array(values.into_iter().map(Into::into).collect()))
}

fn list_value<F: FlagSource>(flags: &F, name: &str, inner: &Kind) -> Option<Value> {
    match inner {
        Kind::String => many_json::<String, F>(flags, name),

        Kind::I8 => many_json::<i8, F>(flags, name),
        Kind::I16 => many_json::<i16, F>(flags, name),
        Kind::I32 => many_json::<i32, F>(flags, name),
        Kind::I64 => many_json::<i64, F>(flags, name),
        Kind::Isize => many_json::<isize, F>(flags, name),

        Kind::U8 => many_json::<u8, F>(flags, name),
        Kind::U16 => many_json::<u16, F>(flags, name),
        Kind::U32 => many_json::<u32, F>(flags, name),
        Kind::U64 => many_json::<u64, F>(flags, name),
        Kind::Usize => many_json::<usize, F>(flags, name),

        Kind::F32 => many_json::<f32, F>(flags, name),
        Kind::F64 => many_json::<f64, F>(flags, name),

        Kind::Duration => flags.many::<Duration>(name).map(|values| {
            Value::Array(
                values
                    .into_iter()
                    .map(|d| Value::String(duration::format(d)))
                    .collect(),
            )
        }),
        Kind::Timestamp => flags.many::<DateTime<Utc>>(name).map(|values| {
            Value::Array(
                values
                    .into_iter()
                    .map(|t| Value::String(t.to_rfc3339()))
                    .collect(),
            )
        }),
        _ => None,
    }
}
