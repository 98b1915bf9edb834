//! Error types for store clients.

use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur while talking to the source or destination store.
#[derive(Error, Debug)]
pub enum StoreError {
    /// Error from the Redis driver.
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Error from the MongoDB driver.
    #[error("mongodb error: {0}")]
    Mongo(#[from] mongodb::error::Error),

    /// A key's stored value did not parse as JSON.
    #[error("invalid JSON value for key {key}: {message}")]
    InvalidJson {
        /// Key whose value failed to parse.
        key: String,
        /// Parser error message.
        message: String,
    },

    /// A record's JSON root is not an object, so it cannot be written as a
    /// destination document.
    #[error("record for {id} is not a JSON object: {message}")]
    RecordNotDocument {
        /// Destination document identifier.
        id: String,
        /// Conversion error message.
        message: String,
    },

    /// The change subscription failed or was lost.
    #[error("subscription error: {0}")]
    Subscription(String),

    /// Generic backend failure (used by the in-memory doubles).
    #[error("backend error: {0}")]
    Backend(String),
}

impl StoreError {
    /// Creates an [`StoreError::InvalidJson`] error.
    pub fn invalid_json(key: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidJson {
            key: key.into(),
            message: message.into(),
        }
    }

    /// Creates a [`StoreError::RecordNotDocument`] error.
    pub fn record_not_document(id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RecordNotDocument {
            id: id.into(),
            message: message.into(),
        }
    }

    /// Creates a [`StoreError::Subscription`] error.
    pub fn subscription(message: impl Into<String>) -> Self {
        Self::Subscription(message.into())
    }

    /// Creates a [`StoreError::Backend`] error.
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }
}
