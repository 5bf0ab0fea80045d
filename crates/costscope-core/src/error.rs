//! Error types for costscope core.
//!
//! The analytics pipeline itself never fails: arithmetic edge cases fall back to
//! zero and validator failures are reported in the result. Errors only come from
//! the row-source I/O boundary and from loading configuration.

use costscope_source::SourceError;
use thiserror::Error;

/// Core error type for engine operations.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Fetching rows or the latest charge date failed.
    #[error("row source error: {0}")]
    Source(#[from] SourceError),

    /// Configuration values are invalid.
    #[error("configuration error: {0}")]
    Config(String),

    /// Configuration file could not be parsed.
    #[error("configuration parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
