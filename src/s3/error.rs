use thiserror::Error;

/// Errors that can occur when interacting with the asset blob store
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Failed to connect to storage: {0}")]
    ConnectionError(String),

    #[error("Failed to upload asset {0}: {1}")]
    WriteError(String, String),

    #[error("Failed to delete asset {0}: {1}")]
    DeleteError(String, String),

    #[error("Asset with key {0} not found")]
    ObjectNotFound(String),

    #[error("Other storage error: {0}")]
    Other(#[from] anyhow::Error),
}
