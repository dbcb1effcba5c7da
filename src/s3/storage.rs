use crate::s3::error::StorageError;
use async_trait::async_trait;
use bytes::Bytes;
use std::sync::Arc;

/// AssetStore trait defining the interface for the campaign image blob store.
///
/// Both calls are synchronous, at-most-once network operations; failures are
/// surfaced to the caller verbatim and never retried here.
#[async_trait]
pub trait AssetStore: Send + Sync + 'static {
    /// Upload a binary asset under the given object key
    async fn put(&self, name: &str, data: Bytes) -> Result<(), StorageError>;

    /// Delete the asset stored under the given object key
    async fn delete(&self, name: &str) -> Result<(), StorageError>;

    /// Read an asset back (test-only)
    #[cfg(test)]
    async fn get(&self, name: &str) -> Result<Bytes, StorageError>;
}

/// Implementation of AssetStore for Arc<T> where T implements AssetStore
#[async_trait]
impl<T: AssetStore + ?Sized> AssetStore for Arc<T> {
    async fn put(&self, name: &str, data: Bytes) -> Result<(), StorageError> {
        (**self).put(name, data).await
    }

    async fn delete(&self, name: &str) -> Result<(), StorageError> {
        (**self).delete(name).await
    }

    #[cfg(test)]
    async fn get(&self, name: &str) -> Result<Bytes, StorageError> {
        (**self).get(name).await
    }
}
