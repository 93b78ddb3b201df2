//! Error types for the settings module.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while loading, validating or saving settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Settings file not found at expected path
    #[error("Settings file not found: {0}")]
    NotFound(PathBuf),

    /// Failed to read settings file
    #[error("Failed to read settings file '{path}': {source}")]
    ReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse TOML
    #[error("Failed to parse settings: {0}")]
    ParseError(#[from] toml::de::Error),

    /// Failed to serialize settings
    #[error("Failed to serialize settings: {0}")]
    SerializeError(#[from] toml::ser::Error),

    /// Failed to write settings file
    #[error("Failed to write settings file '{path}': {source}")]
    WriteError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Invalid settings value
    #[error("Invalid value for '{key}': {message}")]
    ValidationError { key: String, message: String },

    /// Environment variable parse error
    #[error("Failed to parse environment variable '{var}': {message}")]
    EnvParseError { var: String, message: String },

    /// Missing required setting
    #[error("Missing required setting: {0}")]
    MissingRequired(String),
}

impl SettingsError {
    /// Create a validation error
    pub fn validation<K: Into<String>, M: Into<String>>(key: K, message: M) -> Self {
        Self::ValidationError {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Create an env parse error
    pub fn env_parse<V: Into<String>, M: Into<String>>(var: V, message: M) -> Self {
        Self::EnvParseError {
            var: var.into(),
            message: message.into(),
        }
    }
}

/// Result type for settings operations.
pub type SettingsResult<T> = Result<T, SettingsError>;
