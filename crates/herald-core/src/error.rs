//! Startup error types shared across the workspace.

use thiserror::Error;

/// Errors that abort startup before the engine serves anything.
#[derive(Error, Debug)]
pub enum CoreError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("Invalid configuration file: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing error
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

/// Result type alias using CoreError.
pub type CoreResult<T> = Result<T, CoreError>;
