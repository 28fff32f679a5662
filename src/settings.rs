//! Configuration of the `cfgm` binary itself.

use crate::config::{Configurable, Kind, Schema};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub client: ClientConfig,
    pub redis: RedisConfig,
}

impl Configurable for AppConfig {
    fn schema() -> Schema {
        Schema::new()
            .record::<ServerConfig>("server", "Server settings")
            .record::<ClientConfig>("client", "Client settings")
            .record::<RedisConfig>("redis", "Redis settings")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub addr: String,
    pub docs: String,
    #[serde(with = "crate::config::duration::serde")]
    pub timeout: Duration,
    #[serde(with = "crate::config::duration::serde")]
    pub idletime: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: ":40117".to_string(),
            docs: "docs/.vitepress/dist".to_string(),
            timeout: Duration::from_secs(15),
            idletime: Duration::from_secs(60),
        }
    }
}

impl Configurable for ServerConfig {
    fn schema() -> Schema {
        Schema::new()
            .field("addr", Kind::String, "Listen address")
            .field("docs", Kind::String, "Directory served under /docs")
            .field("timeout", Kind::Duration, "HTTP request timeout")
            .field("idletime", Kind::Duration, "HTTP idle connection timeout")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    pub url: String,
    #[serde(with = "crate::config::duration::serde")]
    pub timeout: Duration,
    pub retries: u32,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: "${API_BASE_URL:-:40117}".to_string(),
            timeout: Duration::from_secs(30),
            retries: 3,
        }
    }
}

impl Configurable for ClientConfig {
    fn schema() -> Schema {
        Schema::new()
            .field("url", Kind::String, "Server address")
            .field("timeout", Kind::Duration, "Request timeout")
            .field("retries", Kind::U32, "Retry count")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisConfig {
    pub url: String,
    pub password: String,
    pub prefix: String,
    #[serde(rename = "max-len")]
    pub max_len: i64,
    #[serde(rename = "dial-timeout", with = "crate::config::duration::serde")]
    pub dial_timeout: Duration,
    #[serde(rename = "read-timeout", with = "crate::config::duration::serde")]
    pub read_timeout: Duration,
    #[serde(rename = "write-timeout", with = "crate::config::duration::serde")]
    pub write_timeout: Duration,
    pub disabled: bool,
}

impl Default for RedisConfig {
    fn default() -> Self {
        Self {
            url: "${REDIS_URL:-redis://localhost:6379/0}".to_string(),
            password: "${REDISCLI_AUTH:-}".to_string(),
            prefix: String::new(),
            max_len: 0,
            dial_timeout: Duration::ZERO,
            read_timeout: Duration::ZERO,
            write_timeout: Duration::ZERO,
            disabled: false,
        }
    }
}

impl Configurable for RedisConfig {
    fn schema() -> Schema {
        Schema::new()
            .field("url", Kind::String, "Redis URL")
            .field("password", Kind::String, "Redis password (REDISCLI_AUTH)")
            .field("prefix", Kind::String, "Redis key prefix")
            .field("max-len", Kind::I64, "Maximum log length")
            .field("dial-timeout", Kind::Duration, "Connect timeout")
            .field("read-timeout", Kind::Duration, "Read timeout")
            .field("write-timeout", Kind::Duration, "Write timeout")
            .field("disabled", Kind::Bool, "Disable Redis")
    }
}
