//! Integration tests for layered configuration resolution.
//!
//! Each test resolves `AppConfig` against a temp directory, a fixed
//! environment and real clap matches, so nothing touches the process
//! environment.

use cfgm::cli;
use cfgm::config::{BaseDir, ConfigLoader, Environment};
use cfgm::error::ConfigError;
use cfgm::settings::AppConfig;
use clap::ArgMatches;
use std::fs;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;

/// Loader over `dir` with the binary's search path and env prefix.
fn loader_in(dir: &Path, env: &[(&str, &str)]) -> ConfigLoader {
    ConfigLoader::new()
        .with_app_name(cli::APP_NAME)
        .with_env_prefix(cli::ENV_PREFIX)
        .with_base_dir(BaseDir::Explicit(dir.to_path_buf()))
        .with_environment(Environment::fixed(env.iter().copied()))
}

fn serve_matches(args: &[&str]) -> ArgMatches {
    let mut argv = vec!["cfgm", "serve"];
    argv.extend_from_slice(args);
    let matches = cli::build_command()
        .try_get_matches_from(argv)
        .expect("Failed to parse args");
    cli::flag_matches(&matches)
        .cloned()
        .expect("serve matches")
}

/// Config file that sets every tier's test key.
fn app_yaml() -> &'static str {
    r#"
server:
  addr: ":8000"
  timeout: 20s
client:
  retries: 5
redis:
  prefix: file
"#
}

#[test]
fn test_missing_files_equal_defaults() {
    let temp = TempDir::new().unwrap();
    let loaded = loader_in(temp.path(), &[])
        .without_expansion()
        .load(&AppConfig::default())
        .unwrap();

    assert!(loaded.config_path().is_none());
    assert_eq!(loaded.config(), &AppConfig::default());
}

#[test]
fn test_priority_chain() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join(".cfgm.yaml"), app_yaml()).unwrap();

    let flags = serve_matches(&["--server-addr", ":9999"]);
    let loaded = loader_in(
        temp.path(),
        &[("CFGM_SERVER_ADDR", ":7000"), ("CFGM_CLIENT_RETRIES", "9")],
    )
    .with_flags(&flags)
    .load(&AppConfig::default())
    .unwrap();
    let config = loaded.config();

    // flag > env > file > default
    assert_eq!(config.server.addr, ":9999");
    assert_eq!(config.client.retries, 9);
    assert_eq!(config.server.timeout, Duration::from_secs(20));
    assert_eq!(config.redis.prefix, "file");
    assert_eq!(config.server.idletime, Duration::from_secs(60));

    assert_eq!(loaded.env_bound(), 2);
    assert_eq!(loaded.flags_bound(), 1);
    assert_eq!(
        loaded.config_path(),
        Some(temp.path().join(".cfgm.yaml").as_path())
    );
}

#[test]
fn test_flag_defaults_do_not_override() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("config.yaml"), "redis:\n  disabled: true\n").unwrap();

    let flags = serve_matches(&[]);
    let loaded = loader_in(temp.path(), &[])
        .with_flags(&flags)
        .load(&AppConfig::default())
        .unwrap();

    assert!(loaded.config().redis.disabled);
    assert_eq!(loaded.flags_bound(), 0);
}

#[test]
fn test_typed_flags() {
    let temp = TempDir::new().unwrap();
    let flags = serve_matches(&[
        "--redis-max-len=5000",
        "--redis-dial-timeout",
        "1m 30s",
        "--redis-disabled",
    ]);
    let config = loader_in(temp.path(), &[])
        .with_flags(&flags)
        .load(&AppConfig::default())
        .unwrap()
        .into_config();

    assert_eq!(config.redis.max_len, 5000);
    assert_eq!(config.redis.dial_timeout, Duration::from_secs(90));
    assert!(config.redis.disabled);
}

#[test]
fn test_env_values_are_weakly_typed() {
    let temp = TempDir::new().unwrap();
    let config = loader_in(
        temp.path(),
        &[
            ("CFGM_REDIS_MAX_LEN", "250"),
            ("CFGM_REDIS_READ_TIMEOUT", "2500000000"),
            ("CFGM_REDIS_DISABLED", "1"),
            ("CFGM_CLIENT_TIMEOUT", ""),
        ],
    )
    .load(&AppConfig::default())
    .unwrap()
    .into_config();

    assert_eq!(config.redis.max_len, 250);
    assert_eq!(config.redis.read_timeout, Duration::from_millis(2500));
    assert!(config.redis.disabled);
    // empty means unset
    assert_eq!(config.client.timeout, Duration::from_secs(30));
}

#[test]
fn test_invalid_env_value_names_key() {
    let temp = TempDir::new().unwrap();
    let err = loader_in(temp.path(), &[("CFGM_CLIENT_RETRIES", "lots")])
        .load(&AppConfig::default())
        .unwrap_err();

    assert!(matches!(&err, ConfigError::Decode { key, .. } if key == "client.retries"));
}

#[test]
fn test_first_existing_file_wins() {
    let temp = TempDir::new().unwrap();
    fs::create_dir_all(temp.path().join("config")).unwrap();
    fs::write(temp.path().join("config.yaml"), "client:\n  retries: 1\n").unwrap();
    fs::write(
        temp.path().join("config").join("config.yaml"),
        "client:\n  retries: 2\nredis:\n  prefix: lower\n",
    )
    .unwrap();

    let config = loader_in(temp.path(), &[])
        .load(&AppConfig::default())
        .unwrap()
        .into_config();

    assert_eq!(config.client.retries, 1);
    // files are not accumulated
    assert_eq!(config.redis.prefix, "");
}

#[test]
fn test_json_selected_by_extension() {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join("settings.JSON"),
        r#"{"server": {"docs": "site"}, "client": {"timeout": "45s"}}"#,
    )
    .unwrap();

    let config = loader_in(temp.path(), &[])
        .with_config_paths(["settings.JSON"])
        .load(&AppConfig::default())
        .unwrap()
        .into_config();

    assert_eq!(config.server.docs, "site");
    assert_eq!(config.client.timeout, Duration::from_secs(45));
}

#[test]
fn test_file_is_expanded() {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join("config.yaml"),
        "redis:\n  url: ${CACHE_URL:-redis://fallback:6379}\n  prefix: ${PREFIX:=app}-${PREFIX}\n",
    )
    .unwrap();

    let config = loader_in(temp.path(), &[])
        .load(&AppConfig::default())
        .unwrap()
        .into_config();
    assert_eq!(config.redis.url, "redis://fallback:6379");
    assert_eq!(config.redis.prefix, "app-app");

    let raw = loader_in(temp.path(), &[])
        .without_expansion()
        .load(&AppConfig::default())
        .unwrap()
        .into_config();
    assert_eq!(raw.redis.url, "${CACHE_URL:-redis://fallback:6379}");
}

#[test]
fn test_expansion_error_aborts() {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join("config.yaml"),
        "redis:\n  password: ${REDIS_PASSWORD:?must be set}\n",
    )
    .unwrap();

    let err = loader_in(temp.path(), &[])
        .load(&AppConfig::default())
        .unwrap_err();

    assert!(matches!(err, ConfigError::Expand { .. }));
    let msg = err.to_string();
    assert!(msg.contains("config.yaml"), "{msg}");
    assert!(msg.contains("REDIS_PASSWORD: must be set"), "{msg}");
}

#[test]
fn test_parse_error_aborts() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("config.yaml"), "server: [unclosed\n").unwrap();

    let err = loader_in(temp.path(), &[])
        .load(&AppConfig::default())
        .unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
}

#[test]
fn test_non_mapping_file_is_rejected() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("config.yaml"), "just a string\n").unwrap();

    let err = loader_in(temp.path(), &[])
        .load(&AppConfig::default())
        .unwrap_err();
    assert!(matches!(err, ConfigError::Parse { .. }));
}

#[test]
fn test_unknown_file_keys_are_ignored() {
    let temp = TempDir::new().unwrap();
    fs::write(
        temp.path().join("config.yaml"),
        "legacy:\n  enabled: true\nserver:\n  port: 1\n",
    )
    .unwrap();

    let config = loader_in(temp.path(), &[])
        .without_expansion()
        .load(&AppConfig::default())
        .unwrap()
        .into_config();
    assert_eq!(config, AppConfig::default());
}

#[test]
fn test_null_in_file_keeps_default() {
    let temp = TempDir::new().unwrap();
    fs::write(temp.path().join("config.yaml"), "client:\n  retries: ~\n").unwrap();

    let config = loader_in(temp.path(), &[])
        .load(&AppConfig::default())
        .unwrap()
        .into_config();
    assert_eq!(config.client.retries, 3);
}

#[test]
fn test_defaults_expand_in_schema_order() {
    let temp = TempDir::new().unwrap();
    // `server` is declared before `client` but sorts after it
    let mut defaults = AppConfig::default();
    defaults.server.addr = "${LISTEN_SLOT:=from-server}".to_string();
    defaults.client.url = "${LISTEN_SLOT:=from-client}".to_string();

    let config = loader_in(temp.path(), &[])
        .load(&defaults)
        .unwrap()
        .into_config();

    assert_eq!(config.server.addr, "from-server");
    assert_eq!(config.client.url, "from-server");
}

#[test]
fn test_env_satisfies_required_default() {
    let temp = TempDir::new().unwrap();
    let mut defaults = AppConfig::default();
    defaults.redis.password = "${REDIS_PW:?required}".to_string();

    let err = loader_in(temp.path(), &[])
        .load(&defaults)
        .unwrap_err();
    assert!(matches!(&err, ConfigError::ExpandDefault { key, .. } if key == "redis.password"));

    let config = loader_in(temp.path(), &[("CFGM_REDIS_PASSWORD", "hunter2")])
        .load(&defaults)
        .unwrap()
        .into_config();
    assert_eq!(config.redis.password, "hunter2");
}
