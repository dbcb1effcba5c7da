use thiserror::Error;

/// Errors that can occur when interacting with the key/value cache store
#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Failed to connect to cache: {0}")]
    ConnectionError(String),

    #[error("Cache operation failed: {0}")]
    OperationError(String),

    #[error("Failed to encode cache value: {0}")]
    SerializationError(String),

    #[error("Other cache error: {0}")]
    Other(#[from] anyhow::Error),
}
