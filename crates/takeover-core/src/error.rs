//! Error types for configuration loading.

use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Errors raised while loading or validating `config.toml`.
///
/// These are fatal at startup; nothing past configuration raises them.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("{0} is empty")]
    Missing(&'static str),

    #[error("{field} is invalid: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("no [ecloud] section configured")]
    EcloudMissing,
}
