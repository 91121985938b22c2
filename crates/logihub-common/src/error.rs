//! Error types shared across Logihub crates

use thiserror::Error;

/// Result type alias for Logihub operations
pub type Result<T> = std::result::Result<T, LogihubError>;

/// Main error type for Logihub
#[derive(Error, Debug)]
pub enum LogihubError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}
