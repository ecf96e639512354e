//! Error types for the Floodgate library.

use thiserror::Error;

/// Main error type for Floodgate operations.
#[derive(Error, Debug)]
pub enum FloodgateError {
    /// Configuration-related errors: unknown algorithm selectors or
    /// invalid (non-positive, non-finite) limiter parameters.
    #[error("Configuration error: {0}")]
    Config(String),

    /// No limiter is registered under the given name.
    #[error("No limiter registered under name `{0}`")]
    UnknownLimiter(String),

    /// I/O errors from configuration file loading
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for Floodgate operations.
pub type Result<T> = std::result::Result<T, FloodgateError>;
