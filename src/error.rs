//! Error types for the PingyThingy service.

use thiserror::Error;

/// Main error type for PingyThingy operations.
///
/// Every variant is a startup-time failure; admission decisions themselves
/// never produce an error.
#[derive(Error, Debug)]
pub enum PingyError {
    /// Configuration-related errors, including invalid limiter parameters
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors raised while layering configuration sources
    #[error("Settings error: {0}")]
    Settings(#[from] config::ConfigError),

    /// Token encoding errors
    #[error("Token error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for PingyThingy operations.
pub type Result<T> = std::result::Result<T, PingyError>;
