//! Layered configuration resolution.
//!
//! A typed value is resolved from four tiers, each overriding the one before:
//! 1. **Defaults** - the typed value handed to [`ConfigLoader::load`]
//! 2. **File** - the first existing candidate (`.{app}.yaml`, `~/.{app}.yaml`,
//!    `/etc/{app}/config.yaml`, `config.yaml`, `config/config.yaml`)
//! 3. **Environment** - `{PREFIX}{KEY_PATH}`, e.g. `CFGM_REDIS_MAX_LEN`
//! 4. **Flags** - `--key-path` flags the user actually typed
//!
//! ## Merge Strategy
//! All tiers are converted to `serde_json::Value` trees and deep-merged
//! field-by-field; anything that is not a mapping replaces wholesale.
//!
//! ## Expansion
//! File text goes through [`crate::expand`] before parsing, so
//! `${REDIS_URL:-redis://localhost}` works there. Default strings are expanded
//! last, in schema order, and only where no file, env or flag value replaced
//! them.

pub mod duration;
mod decode;
mod env;
mod example;
mod files;
mod flags;
mod loader;
mod merge;
mod schema;
mod tree;

pub use decode::decode;
pub use env::{Environment, bind_env, env_var_name};
pub use example::{example_yaml, to_json_pretty, unknown_keys};
pub use files::{Format, LoadedFile, ResolvedFile, default_paths, find_file, load_first, parse_str, resolve_candidates};
pub use flags::{FlagSource, bind_flags, flag_name, register_flags};
pub use loader::{BaseDir, ConfigLoader, ConfigTier, LoadedConfig, find_project_root};
pub use merge::{merge, merge_all, merge_maps};
pub use schema::{Configurable, Field, KeyPath, Kind, Leaf, Schema, canonical_key};
pub use tree::{build_tree, covers_path, flatten_keys, get_path, get_path_mut, set_path};
