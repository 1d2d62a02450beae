//! Common error types for examhub

use thiserror::Error;

/// Common result type for examhub operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by the entity store, the synchronizer and the HTTP layer
#[derive(Error, Debug)]
pub enum Error {
    /// Persistence layer unreachable or rejected a write (wraps sqlx::Error)
    #[error("Store error: {0}")]
    Store(#[from] sqlx::Error),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored document could not be encoded or decoded
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Referenced entity absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Duplicate enrollment, name, email or completed report
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Malformed input: missing field, bad question shape, unparseable payload
    #[error("Validation error: {0}")]
    Validation(String),

    /// Answer or question id that does not belong to the exam
    #[error("Invalid reference: {0}")]
    InvalidReference(String),

    /// Blob storage or identity provider failure
    #[error("Upstream error: {0}")]
    Upstream(String),
}

impl Error {
    /// Message without the category prefix, as shown to API clients
    pub fn message(&self) -> String {
        match self {
            Error::Config(msg)
            | Error::NotFound(msg)
            | Error::Conflict(msg)
            | Error::Validation(msg)
            | Error::InvalidReference(msg)
            | Error::Upstream(msg) => msg.clone(),
            other => other.to_string(),
        }
    }

    /// True for errors caused by the caller rather than by a fault
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::NotFound(_) | Error::Conflict(_) | Error::Validation(_) | Error::InvalidReference(_)
        )
    }
}
