//! Config file discovery and parsing.
//!
//! Candidate paths are tried in order and the first readable file wins; the
//! remaining candidates are never consulted. A file is expanded (`${VAR}`),
//! parsed as YAML or JSON and normalized into a string-keyed tree.

use super::env::Environment;
use crate::error::{ConfigError, ParseError, Result};
use crate::expand::expand_with;
use serde_json::{Map, Number, Value};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Format of a config file, chosen by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Yaml,
    Json,
}

impl Format {
    /// `.json` (any case) is JSON; everything else is YAML.
    pub fn from_path(path: &Path) -> Self {
        match path.extension().and_then(|ext| ext.to_str()) {
            Some(ext) if ext.eq_ignore_ascii_case("json") => Format::Json,
            _ => Format::Yaml,
        }
    }
}

impl std::fmt::Display for Format {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Format::Yaml => write!(f, "yaml"),
            Format::Json => write!(f, "json"),
        }
    }
}

/// Default search order for config files, highest priority first.
///
/// With an application name:
/// 1. `./.{app}.yaml`
/// 2. `~/.{app}.yaml`
/// 3. `/etc/{app}/config.yaml`
///
/// and always:
/// 4. `config.yaml`
/// 5. `config/config.yaml`
pub fn default_paths(app_name: Option<&str>) -> Vec<PathBuf> {
    let mut paths = Vec::new();

    if let Some(name) = app_name.filter(|n| !n.is_empty()) {
        let dotfile = format!(".{name}.yaml");
        paths.push(PathBuf::from(&dotfile));
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(&dotfile));
        }
        paths.push(PathBuf::from("/etc").join(name).join("config.yaml"));
    }

    paths.push(PathBuf::from("config.yaml"));
    paths.push(PathBuf::from("config").join("config.yaml"));
    paths
}

/// Resolve relative candidates against `base_dir`; absolute paths are kept.
pub fn resolve_candidates(paths: &[PathBuf], base_dir: Option<&Path>) -> Vec<PathBuf> {
    paths
        .iter()
        .map(|p| match base_dir {
            Some(base) if p.is_relative() => base.join(p),
            _ => p.clone(),
        })
        .collect()
}

/// A config file picked from the candidates, before parsing.
#[derive(Debug, Clone)]
pub struct ResolvedFile {
    pub content: String,
    pub path: PathBuf,
}

impl ResolvedFile {
    pub fn format(&self) -> Format {
        Format::from_path(&self.path)
    }
}

/// Find the first candidate that can be read.
///
/// Missing and unreadable files are treated the same: skip to the next one.
pub fn find_file(candidates: &[PathBuf]) -> Option<ResolvedFile> {
    candidates.iter().find_map(|path| match std::fs::read_to_string(path) {
        Ok(content) => Some(ResolvedFile {
            content,
            path: path.clone(),
        }),
        Err(e) => {
            debug!(path = %path.display(), error = %e, "Config candidate not readable");
            None
        }
    })
}

/// A parsed config file.
#[derive(Debug, Clone)]
pub struct LoadedFile {
    pub path: PathBuf,
    pub tree: Map<String, Value>,
}

/// Load the first readable candidate.
///
/// With `expansion` set, `${...}` references are expanded against a fresh
/// session of that environment before parsing. Returns `Ok(None)` when no
/// candidate exists.
pub fn load_first(candidates: &[PathBuf], expansion: Option<&Environment>) -> Result<Option<LoadedFile>> {
    let Some(file) = find_file(candidates) else {
        return Ok(None);
    };
    let format = file.format();

    let content = match expansion {
        Some(env) => expand_with(&file.content, &mut env.session()).map_err(|source| {
            ConfigError::Expand {
                path: file.path.clone(),
                source,
            }
        })?,
        None => file.content,
    };

    let tree = parse_str(format, &content).map_err(|source| ConfigError::Parse {
        path: file.path.clone(),
        source,
    })?;

    debug!(path = %file.path.display(), %format, expanded = expansion.is_some(), "Loaded config from file");
    Ok(Some(LoadedFile {
        path: file.path,
        tree,
    }))
}

/// Parse a document into a string-keyed mapping.
///
/// An empty document is an empty mapping; any other non-mapping root is an
/// error.
pub fn parse_str(format: Format, content: &str) -> std::result::Result<Map<String, Value>, ParseError> {
    let blank = content
        .lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with('#'));
    if blank && format == Format::Yaml {
        return Ok(Map::new());
    }

    let value = match format {
        Format::Json => serde_json::from_str::<Value>(content)?,
        Format::Yaml => normalize_yaml(serde_yaml::from_str::<serde_yaml::Value>(content)?),
    };
    match value {
        Value::Object(map) => Ok(map),
        Value::Null => Ok(Map::new()),
        _ => Err(ParseError::RootNotMapping),
    }
}

/// Convert a YAML tree to a JSON tree, stringifying non-string keys and
/// dropping tags.
fn normalize_yaml(value: serde_yaml::Value) -> Value {
    use serde_yaml::Value as Yaml;

    match value {
        Yaml::Null => Value::Null,
        Yaml::Bool(b) => Value::Bool(b),
        Yaml::Number(n) => yaml_number(&n),
        Yaml::String(s) => Value::String(s),
        Yaml::Sequence(items) => Value::Array(items.into_iter().map(normalize_yaml).collect()),
        Yaml::Mapping(mapping) => Value::Object(
            mapping
                .into_iter()
                .map(|(k, v)| (yaml_key(k), normalize_yaml(v)))
                .collect(),
        ),
        Yaml::Tagged(tagged) => normalize_yaml(tagged.value),
    }
}

fn yaml_number(n: &serde_yaml::Number) -> Value {
    if let Some(i) = n.as_i64() {
        Value::from(i)
    } else if let Some(u) = n.as_u64() {
        Value::from(u)
    } else {
        n.as_f64()
            .and_then(Number::from_f64)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(n.to_string()))
    }
}

fn yaml_key(key: serde_yaml::Value) -> String {
    use serde_yaml::Value as Yaml;

    match key {
        Yaml::String(s) => s,
        Yaml::Bool(b) => b.to_string(),
        Yaml::Number(n) => n.to_string(),
        Yaml::Null => "null".to_string(),
        Yaml::Tagged(tagged) => yaml_key(tagged.value),
        other => serde_yaml::to_string(&other)
            .map(|s| s.trim_end().to_string())
            .unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_format_from_path() {
        assert_eq!(Format::from_path(Path::new("a.json")), Format::Json);
        assert_eq!(Format::from_path(Path::new("a.JSON")), Format::Json);
        assert_eq!(Format::from_path(Path::new("a.yaml")), Format::Yaml);
        assert_eq!(Format::from_path(Path::new("a.yml")), Format::Yaml);
        assert_eq!(Format::from_path(Path::new("config")), Format::Yaml);
    }

    #[test]
    fn test_default_paths_with_app_name() {
        let paths = default_paths(Some("myapp"));
        assert_eq!(paths.first(), Some(&PathBuf::from(".myapp.yaml")));
        assert!(paths.contains(&PathBuf::from("/etc/myapp/config.yaml")));
        let tail: Vec<_> = paths.iter().rev().take(2).collect();
        assert_eq!(
            tail,
            vec![&PathBuf::from("config/config.yaml"), &PathBuf::from("config.yaml")]
        );
    }

    #[test]
    fn test_default_paths_without_app_name() {
        assert_eq!(
            default_paths(None),
            vec![PathBuf::from("config.yaml"), PathBuf::from("config/config.yaml")]
        );
        assert_eq!(default_paths(Some("")), default_paths(None));
    }

    #[test]
    fn test_resolve_candidates() {
        let base = Path::new("/srv/app");
        let resolved = resolve_candidates(
            &[PathBuf::from("config.yaml"), PathBuf::from("/etc/app/config.yaml")],
            Some(base),
        );
        assert_eq!(
            resolved,
            vec![
                PathBuf::from("/srv/app/config.yaml"),
                PathBuf::from("/etc/app/config.yaml")
            ]
        );
    }

    #[test]
    fn test_first_existing_file_wins() {
        let temp = TempDir::new().unwrap();
        let first = temp.path().join("first.yaml");
        let second = temp.path().join("second.yaml");
        std::fs::write(&second, "name: second").unwrap();

        let loaded = load_first(&[first.clone(), second.clone()], None)
            .unwrap()
            .unwrap();
        assert_eq!(loaded.path, second);

        std::fs::write(&first, "name: first").unwrap();
        let loaded = load_first(&[first.clone(), second], None).unwrap().unwrap();
        assert_eq!(loaded.path, first);
        assert_eq!(Value::Object(loaded.tree), json!({"name": "first"}));
    }

    #[test]
    fn test_no_candidates_is_not_an_error() {
        let temp = TempDir::new().unwrap();
        let loaded = load_first(&[temp.path().join("missing.yaml")], None).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn test_expansion_runs_before_parsing() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(&path, "api_key: \"${API_KEY}\"\nmodel: ${MODEL:-gpt-4}\n").unwrap();

        let env = Environment::fixed([("API_KEY", "sk-12345")]);
        let loaded = load_first(&[path.clone()], Some(&env)).unwrap().unwrap();
        assert_eq!(
            Value::Object(loaded.tree),
            json!({"api_key": "sk-12345", "model": "gpt-4"})
        );

        let raw = load_first(&[path], None).unwrap().unwrap();
        assert_eq!(raw.tree["model"], json!("${MODEL:-gpt-4}"));
    }

    #[test]
    fn test_expansion_failure_names_file_and_variable() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("config.yaml");
        std::fs::write(&path, "token: ${TOKEN:?token is required}\n").unwrap();

        let err = load_first(&[path.clone()], Some(&Environment::fixed::<String, String>([])))
            .unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains(&path.display().to_string()), "{msg}");
        assert!(msg.contains("TOKEN"), "{msg}");
        assert!(msg.contains("token is required"), "{msg}");
    }

    #[test]
    fn test_parse_error_names_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("broken.json");
        std::fs::write(&path, "{\"a\": ").unwrap();

        let err = load_first(&[path.clone()], None).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
        assert!(err.to_string().contains("broken.json"));
    }

    #[test]
    fn test_yaml_keys_are_normalized() {
        let tree = parse_str(Format::Yaml, "1: one\ntrue: yes\nnested:\n  2.5: x\n").unwrap();
        assert_eq!(
            Value::Object(tree),
            json!({"1": "one", "true": "yes", "nested": {"2.5": "x"}})
        );
    }

    #[test]
    fn test_empty_document_is_empty_mapping() {
        assert!(parse_str(Format::Yaml, "").unwrap().is_empty());
        assert!(parse_str(Format::Yaml, "# only a comment\n").unwrap().is_empty());
    }

    #[test]
    fn test_non_mapping_root_is_rejected() {
        assert!(matches!(
            parse_str(Format::Yaml, "- a\n- b\n"),
            Err(ParseError::RootNotMapping)
        ));
        assert!(matches!(
            parse_str(Format::Json, "[1, 2]"),
            Err(ParseError::RootNotMapping)
        ));
    }

    #[test]
    fn test_tagged_values_are_unwrapped() {
        let tree = parse_str(Format::Yaml, "port: !custom 8080\n").unwrap();
        assert_eq!(Value::Object(tree), json!({"port": 8080}));
    }
}
