//! Error types for the voice dispatch pipeline

use thiserror::Error;

/// Result type alias for voice dispatch operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can escape the public API
///
/// Command processing itself never fails with one of these except for
/// [`Error::NotInitialized`]; every other failure is reported on the
/// returned [`CommandResult`](crate::CommandResult).
#[derive(Debug, Error)]
pub enum Error {
    /// `process_command` called before `initialize`
    #[error("command service not initialized")]
    NotInitialized,

    /// Pattern rejected at registration
    #[error("invalid command pattern: {0}")]
    InvalidPattern(String),

    /// Handler name rejected at registration
    #[error("invalid command handler: {0}")]
    InvalidHandler(String),

    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
