//! Environment variable binding.
//!
//! Every leaf key-path gets one variable: `.` and `-` become `_`, the result is
//! upper-cased and the prefix is prepended. With prefix `APP_`,
//! `client.rev-auth-user` binds to `APP_CLIENT_REV_AUTH_USER`.

use super::schema::{KeyPath, Leaf};
use super::tree::set_path;
use crate::expand::Session;
use serde_json::{Map, Value};
use std::collections::HashMap;
use tracing::debug;

/// Where environment variables are read from.
#[derive(Debug, Clone, Default)]
pub enum Environment {
    /// The live process environment.
    #[default]
    Process,
    /// A fixed set of variables, e.g. for tests or embedding.
    Fixed(HashMap<String, String>),
}

impl Environment {
    pub fn fixed<K, V>(vars: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Environment::Fixed(
            vars.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Read one variable. Unset and non-unicode values are `None`.
    pub fn get(&self, name: &str) -> Option<String> {
        match self {
            Environment::Process => std::env::var(name).ok(),
            Environment::Fixed(vars) => vars.get(name).cloned(),
        }
    }

    /// Start a parameter-expansion session over these variables.
    pub fn session(&self) -> Session {
        match self {
            Environment::Process => Session::from_env(),
            Environment::Fixed(vars) => Session::with_vars(vars.clone()),
        }
    }
}

/// Environment variable name bound to `path`.
pub fn env_var_name(prefix: &str, path: &KeyPath) -> String {
    let key = path.to_string().replace(['.', '-'], "_").to_uppercase();
    format!("{prefix}{key}")
}

/// Write every non-empty bound variable into `tree` as a raw string.
///
/// Empty values count as unset so they never override lower layers. Returns
/// the key-paths written.
pub fn bind_env(
    tree: &mut Map<String, Value>,
    prefix: &str,
    leaves: &[Leaf<'_>],
    env: &Environment,
) -> Vec<KeyPath> {
    let mut bound = Vec::new();
    for leaf in leaves {
        let name = env_var_name(prefix, &leaf.path);
        match env.get(&name) {
            Some(value) if !value.is_empty() => {
                debug!(env = %name, path = %leaf.path, "Loaded env binding");
                set_path(tree, &leaf.path, Value::String(value));
                bound.push(leaf.path.clone());
            }
            _ => {}
        }
    }
    bound
}
