//! Core error types for ProxDeck

use std::path::PathBuf;
use thiserror::Error;

/// Configuration-related errors
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Configuration file does not exist
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    /// Configuration is invalid or unreadable
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    /// TOML parse error
    #[error("Failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),

    /// TOML serialize error
    #[error("Failed to serialize configuration: {0}")]
    Serialize(#[from] toml::ser::Error),
}
