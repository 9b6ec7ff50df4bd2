//! Error types for afterglow

use thiserror::Error;

/// The main error type for afterglow operations
#[derive(Debug, Error)]
pub enum AfterglowError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParseError(String),

    #[error("TOML serialization error: {0}")]
    TomlSerError(String),
}

/// Result type alias for afterglow operations
pub type Result<T> = std::result::Result<T, AfterglowError>;

impl From<toml::de::Error> for AfterglowError {
    fn from(err: toml::de::Error) -> Self {
        AfterglowError::TomlParseError(err.to_string())
    }
}

impl From<toml::ser::Error> for AfterglowError {
    fn from(err: toml::ser::Error) -> Self {
        AfterglowError::TomlSerError(err.to_string())
    }
}
