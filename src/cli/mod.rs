//! CLI command definitions for cfgm
//!
//! This module defines the CLI structure using clap's derive macros. Every
//! leaf of [`AppConfig`] is added as a `--key-path` flag to the subcommands
//! that resolve configuration (see [`build_command`]).

use crate::config::{
    BaseDir, ConfigLoader, Configurable, Environment, build_tree, decode, load_first, merge,
    register_flags, unknown_keys,
};
use crate::settings::AppConfig;
use anyhow::{Context, Result};
use clap::{ArgMatches, CommandFactory, Parser, Subcommand};
use serde_json::Value;
use std::path::{Path, PathBuf};

/// Application name; drives the config search path (`.cfgm.yaml`, ...).
pub const APP_NAME: &str = "cfgm";

/// Prefix of environment variables bound to config keys.
pub const ENV_PREFIX: &str = "CFGM_";

/// Layered configuration resolver and HTTP service
#[derive(Parser, Debug)]
#[command(name = "cfgm", author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (replaces the search path)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Do not expand ${VAR} references in config files and defaults
    #[arg(long, global = true)]
    pub no_expand: bool,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Logging output: 0/off, 1/stdout, 2/stderr (default), or filename
    #[arg(short, long, default_value = "2", global = true)]
    pub log: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the HTTP server (default if no subcommand given)
    Serve,

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the resolved configuration as JSON
    Show,

    /// Print a commented example config file
    Example,

    /// Validate a config file and report keys the schema does not know
    Check {
        /// Config file to check
        path: PathBuf,
    },
}

/// The full command, with one flag per configuration leaf on `serve` and
/// `config show`.
pub fn build_command() -> clap::Command {
    let schema = AppConfig::schema();
    Cli::command()
        .mut_subcommand("serve", |cmd| register_flags(cmd, &schema))
        .mut_subcommand("config", |cmd| {
            cmd.mut_subcommand("show", |cmd| register_flags(cmd, &schema))
        })
}

/// Matches of the subcommand that carries configuration flags, if any.
pub fn flag_matches(matches: &ArgMatches) -> Option<&ArgMatches> {
    match matches.subcommand() {
        Some(("serve", sub)) => Some(sub),
        Some(("config", sub)) => sub.subcommand_matches("show"),
        _ => None,
    }
}

/// Loader for the binary's own configuration.
pub fn loader(cli: &Cli) -> ConfigLoader {
    let mut loader = ConfigLoader::new()
        .with_app_name(APP_NAME)
        .with_env_prefix(ENV_PREFIX);
    if let Some(path) = &cli.config {
        loader = loader
            .with_config_paths([path.clone()])
            .with_base_dir(BaseDir::CurrentDir);
    }
    if cli.no_expand {
        loader = loader.without_expansion();
    }
    loader
}

/// Outcome of `cfgm config check`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckReport {
    pub path: PathBuf,
    pub unknown_keys: Vec<String>,
}

/// Load `path` on top of the defaults, decode it and list unknown keys.
pub fn check_file(path: &Path, environment: Option<&Environment>) -> Result<CheckReport> {
    let file = load_first(&[path.to_path_buf()], environment)?
        .with_context(|| format!("config file not found: {}", path.display()))?;

    let mut unknown = unknown_keys::<AppConfig>(&file.tree);
    unknown.sort();

    let mut tree = Value::Object(build_tree(&AppConfig::default())?);
    merge(&mut tree, Value::Object(file.tree));
    decode::<AppConfig>(tree)?;

    Ok(CheckReport {
        path: file.path,
        unknown_keys: unknown,
    })
}
