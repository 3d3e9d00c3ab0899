//! Common error types for studybank

use thiserror::Error;

/// Common result type for studybank operations
pub type Result<T> = std::result::Result<T, Error>;

/// Common error types across the studybank service
///
/// The split follows the response taxonomy: `InvalidInput`, `NotFound` and
/// `Unauthorized` are reportable to the caller verbatim; everything else is
/// surfaced as an opaque server error.
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

    /// Wrong or missing researcher password
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}
