//! Common error types for tagsync

use thiserror::Error;

/// Common result type for tagsync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types shared by the tagsync crates
#[derive(Error, Debug)]
pub enum Error {
    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error, e.g. a corrupt cache or catalog file
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parse error in the configuration file
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}
