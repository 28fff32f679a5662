//! Configuration loader with tier-based merging.
//!
//! Resolves a typed configuration from four tiers, lowest priority first:
//! defaults, one config file, environment variables and explicit flags.

use super::decode::decode;
use super::env::{Environment, bind_env};
use super::files::{self, default_paths, resolve_candidates};
use super::flags::{FlagSource, bind_flags};
use super::merge::merge;
use super::schema::{Configurable, KeyPath};
use super::tree::{build_tree, covers_path, get_path_mut};
use crate::error::{ConfigError, Result};
use crate::expand::expand_tree;
use clap::ArgMatches;
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Configuration tier priority (lowest to highest).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ConfigTier {
    /// Typed default value (lowest priority)
    Defaults = 0,
    /// First config file found on the search path
    File = 1,
    /// Prefixed environment variables
    Environment = 2,
    /// Flags typed on the command line (highest priority)
    Flags = 3,
}

impl std::fmt::Display for ConfigTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigTier::Defaults => write!(f, "defaults"),
            ConfigTier::File => write!(f, "file"),
            ConfigTier::Environment => write!(f, "environment"),
            ConfigTier::Flags => write!(f, "flags"),
        }
    }
}

/// Directory that relative candidate paths are resolved against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum BaseDir {
    /// Nearest ancestor of the working directory holding a `Cargo.toml` or
    /// `.git`, falling back to the working directory.
    #[default]
    Auto,
    /// The process working directory.
    CurrentDir,
    /// A fixed directory.
    Explicit(PathBuf),
}

impl BaseDir {
    fn resolve(&self) -> Option<PathBuf> {
        match self {
            BaseDir::Explicit(dir) => Some(dir.clone()),
            BaseDir::CurrentDir => std::env::current_dir().ok(),
            BaseDir::Auto => {
                let cwd = std::env::current_dir().ok()?;
                Some(find_project_root(&cwd).unwrap_or(cwd))
            }
        }
    }
}

/// Walk up from `start` to the first directory containing a project marker.
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    const MARKERS: [&str; 2] = ["Cargo.toml", ".git"];

    start
        .ancestors()
        .find(|dir| MARKERS.iter().any(|m| dir.join(m).exists()))
        .map(Path::to_path_buf)
}

/// Options for one resolution call.
///
/// ```no_run
/// use cfgm::config::ConfigLoader;
/// use cfgm::settings::AppConfig;
///
/// let loaded = ConfigLoader::new()
///     .with_app_name("cfgm")
///     .with_env_prefix("CFGM_")
///     .load(&AppConfig::default())?;
/// println!("listening on {}", loaded.config().server.addr);
/// # Ok::<(), cfgm::error::ConfigError>(())
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader<F = ArgMatches> {
    app_name: Option<String>,
    config_paths: Option<Vec<PathBuf>>,
    base_dir: BaseDir,
    env_prefix: String,
    flags: Option<F>,
    expand: bool,
    environment: Environment,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Loader with no file search, no env prefix and no flags.
    pub fn new() -> Self {
        Self {
            app_name: None,
            config_paths: None,
            base_dir: BaseDir::Auto,
            env_prefix: String::new(),
            flags: None,
            expand: true,
            environment: Environment::Process,
        }
    }
}

impl<F: FlagSource> ConfigLoader<F> {
    /// Use the default search path for `name` (`.{name}.yaml`, ...).
    pub fn with_app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = Some(name.into());
        self
    }

    /// Replace the search path with explicit candidates, highest priority first.
    pub fn with_config_paths<P: Into<PathBuf>>(mut self, paths: impl IntoIterator<Item = P>) -> Self {
        self.config_paths = Some(paths.into_iter().map(Into::into).collect());
        self
    }

    pub fn with_base_dir(mut self, base_dir: BaseDir) -> Self {
        self.base_dir = base_dir;
        self
    }

    /// Bind `{prefix}{KEY_PATH}` variables. An empty prefix disables env binding.
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// Bind explicitly-set flags from `flags`.
    pub fn with_flags<G: FlagSource>(self, flags: G) -> ConfigLoader<G> {
        ConfigLoader {
            app_name: self.app_name,
            config_paths: self.config_paths,
            base_dir: self.base_dir,
            env_prefix: self.env_prefix,
            flags: Some(flags),
            expand: self.expand,
            environment: self.environment,
        }
    }

    /// Skip `${...}` expansion of file text and default strings.
    pub fn without_expansion(mut self) -> Self {
        self.expand = false;
        self
    }

    /// Read variables from `environment` instead of the process environment.
    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Candidate config files in priority order, resolved against the base dir.
    pub fn candidate_paths(&self) -> Vec<PathBuf> {
        let paths = match &self.config_paths {
            Some(paths) => paths.clone(),
            None => default_paths(self.app_name.as_deref()),
        };
        resolve_candidates(&paths, self.base_dir.resolve().as_deref())
    }

    /// Resolve the configuration, starting from `defaults`.
    ///
    /// Default strings are expanded after every tier is bound, so a
    /// `${VAR:?}` default only fails when nothing overrode it.
    pub fn load<T: Configurable>(&self, defaults: &T) -> Result<LoadedConfig<T>> {
        let schema = T::schema();
        let leaves = schema.leaves();

        let mut tree = Value::Object(build_tree(defaults)?);
        debug!(tier = %ConfigTier::Defaults, leaves = leaves.len(), "Built default tree");

        let mut overridden: HashSet<KeyPath> = HashSet::new();

        let candidates = self.candidate_paths();
        let expansion = self.expand.then_some(&self.environment);
        let config_path = match files::load_first(&candidates, expansion)? {
            Some(file) => {
                debug!(tier = %ConfigTier::File, path = %file.path.display(), "Merging config file");
                overridden.extend(
                    leaves
                        .iter()
                        .filter(|leaf| covers_path(&file.tree, &leaf.path))
                        .map(|leaf| leaf.path.clone()),
                );
                merge(&mut tree, Value::Object(file.tree));
                Some(file.path)
            }
            None => {
                debug!(candidates = candidates.len(), "No config file found");
                None
            }
        };

        let Value::Object(map) = &mut tree else {
            return Err(ConfigError::NotMapping);
        };

        let env_paths = if self.env_prefix.is_empty() {
            Vec::new()
        } else {
            bind_env(map, &self.env_prefix, &leaves, &self.environment)
        };
        let env_bound = env_paths.len();
        overridden.extend(env_paths);
        debug!(tier = %ConfigTier::Environment, prefix = %self.env_prefix, bound = env_bound, "Bound environment");

        let flag_paths = match &self.flags {
            Some(flags) => bind_flags(map, &leaves, flags),
            None => Vec::new(),
        };
        let flags_bound = flag_paths.len();
        overridden.extend(flag_paths);
        debug!(tier = %ConfigTier::Flags, bound = flags_bound, "Bound flags");

        if self.expand {
            let mut session = self.environment.session();
            for leaf in leaves.iter().filter(|leaf| !overridden.contains(&leaf.path)) {
                let Some(value) = get_path_mut(map, &leaf.path) else {
                    continue;
                };
                expand_tree(value, &mut session).map_err(|(sub, source)| {
                    let key = if sub.is_empty() {
                        leaf.path.to_string()
                    } else {
                        format!("{}.{sub}", leaf.path)
                    };
                    ConfigError::ExpandDefault { key, source }
                })?;
            }
            debug!(tier = %ConfigTier::Defaults, kept = leaves.len().saturating_sub(overridden.len()), "Expanded defaults");
        }

        let config = decode(tree)?;
        Ok(LoadedConfig {
            config,
            config_path,
            env_bound,
            flags_bound,
        })
    }
}

/// Result of a resolution call.
#[derive(Debug, Clone)]
pub struct LoadedConfig<T> {
    config: T,
    config_path: Option<PathBuf>,
    env_bound: usize,
    flags_bound: usize,
}

impl<T> LoadedConfig<T> {
    /// Get the loaded configuration.
    pub fn config(&self) -> &T {
        &self.config
    }

    /// Consume the result and return the configuration.
    pub fn into_config(self) -> T {
        self.config
    }

    /// Get the config file path that was used.
    pub fn config_path(&self) -> Option<&Path> {
        self.config_path.as_deref()
    }

    /// Number of environment variables that overrode a value.
    pub fn env_bound(&self) -> usize {
        self.env_bound
    }

    /// Number of flags that overrode a value.
    pub fn flags_bound(&self) -> usize {
        self.flags_bound
    }
}
