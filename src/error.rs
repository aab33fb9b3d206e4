//! Error types for the Turnstile quota core.

use thiserror::Error;

/// Main error type for Turnstile operations.
///
/// A rejected request is not an error: it is reported as a
/// [`LimitVerdict`](crate::ratelimit::LimitVerdict) with `admitted == false`.
#[derive(Error, Debug)]
pub enum TurnstileError {
    /// The bucket store could not be read or written
    #[error("Bucket store unavailable: {0}")]
    StoreUnavailable(String),

    /// The caller supplied a non-positive limit or window
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// Configuration file errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl TurnstileError {
    /// Stable machine-readable code for this error.
    pub fn kind(&self) -> &'static str {
        match self {
            TurnstileError::StoreUnavailable(_) => "STORE_UNAVAILABLE",
            TurnstileError::InvalidConfiguration(_) => "INVALID_CONFIGURATION",
            TurnstileError::Config(_) => "CONFIGURATION_ERROR",
            TurnstileError::Io(_) => "IO_ERROR",
        }
    }
}

impl From<config::ConfigError> for TurnstileError {
    fn from(err: config::ConfigError) -> Self {
        TurnstileError::Config(err.to_string())
    }
}

/// Result type alias for Turnstile operations.
pub type Result<T> = std::result::Result<T, TurnstileError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds_are_distinct() {
        let store = TurnstileError::StoreUnavailable("down".to_string());
        let invalid = TurnstileError::InvalidConfiguration("limit".to_string());

        assert_eq!(store.kind(), "STORE_UNAVAILABLE");
        assert_eq!(invalid.kind(), "INVALID_CONFIGURATION");
        assert_eq!(store.to_string(), "Bucket store unavailable: down");
    }
}
