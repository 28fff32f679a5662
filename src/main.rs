//! cfgm
//!
//! Resolves the application configuration from defaults, a config file,
//! `CFGM_*` environment variables and flags, then serves HTTP or inspects the
//! result.

use anyhow::{Result, bail};
use cfgm::cli::{self, Cli, Command, ConfigAction};
use cfgm::config::{Environment, example_yaml, to_json_pretty};
use cfgm::settings::AppConfig;
use cfgm::{logging, server};
use clap::{ArgMatches, FromArgMatches};
use tracing::{debug, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let matches = cli::build_command().get_matches();
    let cli = Cli::from_arg_matches(&matches)?;

    logging::init(&cli.log, cli.verbose)?;

    match &cli.command {
        None | Some(Command::Serve) => {
            let config = load_config(&cli, cli::flag_matches(&matches))?;
            server::run(&config.server).await
        }
        Some(Command::Config { action }) => match action {
            ConfigAction::Show => {
                let config = load_config(&cli, cli::flag_matches(&matches))?;
                println!("{}", to_json_pretty(&config)?);
                Ok(())
            }
            ConfigAction::Example => {
                print!("{}", example_yaml(&AppConfig::default())?);
                Ok(())
            }
            ConfigAction::Check { path } => run_check(&cli, path),
        },
    }
}

fn load_config(cli: &Cli, flags: Option<&ArgMatches>) -> Result<AppConfig> {
    let loader = cli::loader(cli);
    let loaded = match flags {
        Some(flags) => loader.with_flags(flags).load(&AppConfig::default())?,
        None => loader.load(&AppConfig::default())?,
    };

    match loaded.config_path() {
        Some(path) => info!("Loaded config from {}", path.display()),
        None if cli.config.is_some() => {
            warn!("Config file not found, using defaults")
        }
        None => debug!("No config file found, using defaults"),
    }
    debug!(
        env = loaded.env_bound(),
        flags = loaded.flags_bound(),
        "Applied overrides"
    );
    Ok(loaded.into_config())
}

fn run_check(cli: &Cli, path: &std::path::Path) -> Result<()> {
    let environment = Environment::Process;
    let expansion = (!cli.no_expand).then_some(&environment);
    let report = cli::check_file(path, expansion)?;

    if report.unknown_keys.is_empty() {
        println!("{}: ok", report.path.display());
        return Ok(());
    }
    for key in &report.unknown_keys {
        println!("{}: unknown key {}", report.path.display(), key);
    }
    bail!(
        "{} unknown key(s) in {}",
        report.unknown_keys.len(),
        report.path.display()
    )
}
