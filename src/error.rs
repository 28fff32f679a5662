//! Error types for configuration resolution.

use crate::expand::ExpandError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors raised while parsing one configuration document.
#[derive(Debug, Error)]
pub enum ParseError {
    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error("config root must be a mapping")]
    RootNotMapping,
}

/// Errors returned by configuration resolution.
///
/// A missing config file is never an error; every variant here aborts the
/// whole resolution.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A config file was found but could not be parsed.
    #[error("parse config file {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: ParseError,
    },
    /// A required `${VAR:?}` reference in a config file was not satisfied.
    #[error("expand template in {}: {source}", path.display())]
    Expand {
        path: PathBuf,
        #[source]
        source: ExpandError,
    },
    /// A required `${VAR:?}` reference in a default value was not satisfied.
    #[error("expand default value {key}: {source}")]
    ExpandDefault {
        key: String,
        #[source]
        source: ExpandError,
    },
    /// The tree handed to the decoder (or built from defaults) is not a mapping.
    #[error("config root must be a mapping")]
    NotMapping,
    /// A value could not be coerced to the type declared for its key.
    #[error("invalid value for {key}: {message}")]
    Decode { key: String, message: String },
    /// The default value could not be serialized into a tree.
    #[error("failed to serialize config: {0}")]
    Serialize(#[source] serde_json::Error),
    /// The coerced tree did not deserialize into the target type.
    #[error("failed to unmarshal config: {0}")]
    Unmarshal(#[source] serde_json::Error),
}

impl ConfigError {
    pub(crate) fn decode(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode {
            key: key.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, ConfigError>;
