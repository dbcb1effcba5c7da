use crate::cache::error::CacheError;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

/// CacheStore trait defining the interface to the external key/value store.
///
/// Plain GET/SET with a TTL; there are no transactions. The TTL is the only
/// consistency device the store offers.
#[async_trait]
pub trait CacheStore: Send + Sync + 'static {
    /// Read a value; None when the key is absent or has expired
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    /// Write a value with a time-to-live
    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;
}

/// Implementation of CacheStore for Arc<T> where T implements CacheStore
#[async_trait]
impl<T: CacheStore + ?Sized> CacheStore for Arc<T> {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        (**self).set(key, value, ttl).await
    }
}
