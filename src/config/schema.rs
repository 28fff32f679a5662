//! Explicit schema descriptions for configuration types.
//!
//! A [`Configurable`] type describes its fields once: key name, [`Kind`] and a
//! human description. Everything else (key-paths, env and flag names, tree
//! shaping, weak-typed decoding, example generation) is driven by that
//! description.

use serde::{Serialize, de::DeserializeOwned};
use std::fmt;

/// A configuration type with a registered schema.
///
/// Field keys in the schema must match the serde field names of the type
/// (use `#[serde(rename = "...")]` for hyphenated keys), and the type should
/// carry `#[serde(default)]` so keys missing from the merged tree fall back to
/// `Default`.
///
/// Fields declared as [`Kind::Duration`] must use
/// `#[serde(with = "cfgm::config::duration::serde")]`. A plain `Duration`
/// serializes as `{secs, nanos}`, which is neither a duration string in the
/// default tree nor something env and flag values can merge with.
///
/// ```
/// use cfgm::config::{Configurable, Kind, Schema, build_tree};
/// use serde::{Deserialize, Serialize};
/// use std::time::Duration;
///
/// #[derive(Serialize, Deserialize)]
/// #[serde(default)]
/// struct Client {
///     url: String,
///     #[serde(with = "cfgm::config::duration::serde")]
///     timeout: Duration,
/// }
///
/// impl Default for Client {
///     fn default() -> Self {
///         Self { url: "http://localhost".into(), timeout: Duration::from_secs(30) }
///     }
/// }
///
/// impl Configurable for Client {
///     fn schema() -> Schema {
///         Schema::new()
///             .field("url", Kind::String, "API endpoint")
///             .field("timeout", Kind::Duration, "request timeout")
///     }
/// }
///
/// let tree = build_tree(&Client::default()).unwrap();
/// assert_eq!(tree["timeout"], "30s");
/// ```
pub trait Configurable: Serialize + DeserializeOwned {
    fn schema() -> Schema;
}

/// Declared type of a configuration field.
#[derive(Debug, Clone, PartialEq)]
pub enum Kind {
    String,
    Bool,
    I8,
    I16,
    I32,
    I64,
    Isize,
    U8,
    U16,
    U32,
    U64,
    Usize,
    F32,
    F64,
    /// `std::time::Duration`, written as `30s`, `1h 30m`, ...
    Duration,
    /// `chrono::DateTime<Utc>`, written as RFC 3339.
    Timestamp,
    /// Homogeneous sequence.
    List(Box<Kind>),
    /// Mapping from string keys to a homogeneous value type.
    Map(Box<Kind>),
    /// Nested record, recursed into by key-path enumeration.
    Record(Schema),
}

impl Kind {
    pub fn list(inner: Kind) -> Self {
        Kind::List(Box::new(inner))
    }

    pub fn map(inner: Kind) -> Self {
        Kind::Map(Box::new(inner))
    }

    pub fn record<T: Configurable>() -> Self {
        Kind::Record(T::schema())
    }

    /// Leaves bind to a single env/flag value. Durations and timestamps are
    /// leaves even though they are structured values.
    pub fn is_leaf(&self) -> bool {
        !matches!(self, Kind::Record(_))
    }

    pub fn is_integer(&self) -> bool {
        matches!(
            self,
            Kind::I8
                | Kind::I16
                | Kind::I32
                | Kind::I64
                | Kind::Isize
                | Kind::U8
                | Kind::U16
                | Kind::U32
                | Kind::U64
                | Kind::Usize
        )
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Kind::F32 | Kind::F64)
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Kind::String => write!(f, "string"),
            Kind::Bool => write!(f, "bool"),
            Kind::I8 => write!(f, "i8"),
            Kind::I16 => write!(f, "i16"),
            Kind::I32 => write!(f, "i32"),
            Kind::I64 => write!(f, "i64"),
            Kind::Isize => write!(f, "isize"),
            Kind::U8 => write!(f, "u8"),
            Kind::U16 => write!(f, "u16"),
            Kind::U32 => write!(f, "u32"),
            Kind::U64 => write!(f, "u64"),
            Kind::Usize => write!(f, "usize"),
            Kind::F32 => write!(f, "f32"),
            Kind::F64 => write!(f, "f64"),
            Kind::Duration => write!(f, "duration"),
            Kind::Timestamp => write!(f, "timestamp"),
            Kind::List(inner) => write!(f, "list<{inner}>"),
            Kind::Map(inner) => write!(f, "map<string, {inner}>"),
            Kind::Record(_) => write!(f, "record"),
        }
    }
}

/// One declared field.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Raw key as declared; see [`canonical_key`].
    pub key: String,
    pub kind: Kind,
    pub description: String,
}

impl Field {
    /// Canonical key, or `None` when the field is excluded from configuration.
    pub fn name(&self) -> Option<&str> {
        canonical_key(&self.key)
    }
}

/// Canonical name of a declared key.
///
/// Declared keys follow serialization-tag conventions: `"name,omitempty"` is
/// named `name`, while `""` and `"-"` have no name at all.
pub fn canonical_key(key: &str) -> Option<&str> {
    let name = key.split(',').next().unwrap_or_default().trim();
    if name.is_empty() || name == "-" {
        None
    } else {
        Some(name)
    }
}

/// Ordered description of a record's fields.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Schema {
    fields: Vec<Field>,
}

impl Schema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a field. Re-declaring a key replaces the earlier field in place.
    pub fn field(mut self, key: impl Into<String>, kind: Kind, description: impl Into<String>) -> Self {
        let field = Field {
            key: key.into(),
            kind,
            description: description.into(),
        };
        let existing = field.name().and_then(|name| {
            self.fields
                .iter()
                .position(|f| f.name() == Some(name))
        });
        match existing {
            Some(idx) => self.fields[idx] = field,
            None => self.fields.push(field),
        }
        self
    }

    /// Declare a nested record field.
    pub fn record<T: Configurable>(self, key: impl Into<String>, description: impl Into<String>) -> Self {
        self.field(key, Kind::record::<T>(), description)
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Look up a field by canonical key.
    pub fn get(&self, key: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name() == Some(key))
    }

    /// Resolve a key-path to the kind declared at that position.
    pub fn lookup(&self, path: &KeyPath) -> Option<&Kind> {
        let (last, parents) = path.segments().split_last()?;
        let mut schema = self;
        for segment in parents {
            match &schema.get(segment)?.kind {
                Kind::Record(child) => schema = child,
                _ => return None,
            }
        }
        schema.get(last).map(|f| &f.kind)
    }

    /// Enumerate all leaf key-paths in declaration order.
    pub fn leaves(&self) -> Vec<Leaf<'_>> {
        let mut leaves = Vec::new();
        self.collect_leaves(&KeyPath::root(), &mut leaves);
        leaves
    }

    fn collect_leaves<'a>(&'a self, prefix: &KeyPath, out: &mut Vec<Leaf<'a>>) {
        for field in &self.fields {
            let Some(name) = field.name() else {
                continue;
            };
            let path = prefix.child(name);
            match &field.kind {
                Kind::Record(child) => child.collect_leaves(&path, out),
                kind => out.push(Leaf {
                    path,
                    kind,
                    description: &field.description,
                }),
            }
        }
    }
}

/// A leaf field with its full key-path.
#[derive(Debug, Clone, PartialEq)]
pub struct Leaf<'a> {
    pub path: KeyPath,
    pub kind: &'a Kind,
    pub description: &'a str,
}

/// Dot-joined address of a configuration value, e.g. `server.addr`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct KeyPath(Vec<String>);

impl KeyPath {
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a dot-joined path. Empty segments are dropped.
    pub fn parse(path: &str) -> Self {
        Self(
            path.split('.')
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
        )
    }

    pub fn child(&self, segment: &str) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.to_string());
        Self(segments)
    }

    pub fn segments(&self) -> &[String] {
        &self.0
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    /// Join segments with an arbitrary separator.
    pub fn join(&self, sep: &str) -> String {
        self.0.join(sep)
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.join("."))
    }
}

impl From<&str> for KeyPath {
    fn from(path: &str) -> Self {
        Self::parse(path)
    }
}
