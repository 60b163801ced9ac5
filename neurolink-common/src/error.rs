//! Common error types for NeuroLink

use thiserror::Error;

/// Common result type for NeuroLink operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across NeuroLink crates
#[derive(Error, Debug)]
pub enum Error {
    /// Database operation error (wraps sqlx::Error)
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Requested resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid user input or request parameter
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Frame payload could not be decoded into pixels
    #[error("Frame decode error: {0}")]
    Decode(String),

    /// Emotion classifier failed or returned an unusable result
    #[error("Classifier error: {0}")]
    Classifier(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}
