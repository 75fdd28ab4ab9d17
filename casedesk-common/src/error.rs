//! Common error types for casedesk

use thiserror::Error;

/// Common result type for casedesk operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by the record engines and the HTTP surface
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

    /// Malformed id, missing required field, value outside an allowed set
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Role or ownership violation
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Referenced record or user does not exist
    #[error("Not found: {0}")]
    NotFound(String),

    /// Unique constraint collision that survived the internal retry
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// True when the wrapped database error is a UNIQUE constraint violation
    pub fn is_unique_violation(&self) -> bool {
        match self {
            Error::Database(sqlx::Error::Database(db_err)) => db_err.is_unique_violation(),
            _ => false,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Internal(format!("JSON column error: {}", err))
    }
}
