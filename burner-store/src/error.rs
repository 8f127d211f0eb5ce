//! Error types for the burner-store crate.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing service refused or failed a request.
    #[error("Store backend error: {0}")]
    Backend(String),

    /// A record could not be encoded or decoded.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Invalid store configuration.
    #[error("Invalid store configuration: {0}")]
    Config(String),

    /// Internal error (lock poisoning, etc.).
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Specialized `Result` type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;

impl<T> From<std::sync::PoisonError<T>> for StoreError {
    fn from(e: std::sync::PoisonError<T>) -> Self {
        Self::Internal(format!("Lock poisoned: {e}"))
    }
}

#[cfg(feature = "redis")]
impl From<redis::RedisError> for StoreError {
    fn from(e: redis::RedisError) -> Self {
        Self::Backend(e.to_string())
    }
}

#[cfg(feature = "redis")]
impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}
