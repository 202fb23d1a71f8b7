//! Error types for the feed consolidation library.

use thiserror::Error;

/// Result type used throughout the library.
pub type Result<T> = std::result::Result<T, Error>;

/// Error types that can occur while building a digest.
///
/// Individual malformed feed items never surface here; they are skipped
/// during extraction. These variants describe failures of a whole page,
/// source, or configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Error {
    /// Feed page payload could not be decoded as a feed
    #[error("Invalid payload: {0}")]
    InvalidPayload(String),

    /// Parse error for a single value (timestamp, TOML document, ...)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Configuration values out of range
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Failure reported by a feed source
    #[error("Source error: {0}")]
    Source(String),

    /// I/O error while reading configuration or raw inputs
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::InvalidPayload(err.to_string())
    }
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Parse(err.to_string())
    }
}
