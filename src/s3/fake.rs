use crate::s3::error::StorageError;
use crate::s3::storage::AssetStore;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::Mutex;

/// `FakeAssetStore` is an in-memory implementation of the `AssetStore` trait
/// for testing. Individual keys can be made to fail to simulate upload or
/// delete outages.
#[derive(Clone)]
pub struct FakeAssetStore {
    data: Arc<Mutex<HashMap<String, Bytes>>>,
    fail_puts: Arc<Mutex<HashSet<String>>>,
    fail_deletes: Arc<Mutex<HashSet<String>>>,
}

#[allow(dead_code)]
impl FakeAssetStore {
    /// Create a new empty FakeAssetStore instance
    pub fn new() -> Self {
        FakeAssetStore {
            data: Arc::new(Mutex::new(HashMap::new())),
            fail_puts: Arc::new(Mutex::new(HashSet::new())),
            fail_deletes: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Simulate an upload failure for a specific key
    pub async fn fake_fail_put(&self, name: &str) {
        let mut fail_puts = self.fail_puts.lock().await;
        fail_puts.insert(name.to_string());
    }

    /// Simulate a delete failure for a specific key
    pub async fn fake_fail_delete(&self, name: &str) {
        let mut fail_deletes = self.fail_deletes.lock().await;
        fail_deletes.insert(name.to_string());
    }

    /// Check whether an asset exists, bypassing the trait
    pub async fn fake_has_object(&self, name: &str) -> bool {
        let data = self.data.lock().await;
        data.contains_key(name)
    }

    /// Read an asset directly, bypassing the trait
    pub async fn fake_get_object(&self, name: &str) -> Option<Bytes> {
        let data = self.data.lock().await;
        data.get(name).cloned()
    }
}

impl Default for FakeAssetStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AssetStore for FakeAssetStore {
    async fn put(&self, name: &str, data: Bytes) -> Result<(), StorageError> {
        let fail_puts = self.fail_puts.lock().await;
        if fail_puts.contains(name) {
            return Err(StorageError::WriteError(
                name.to_string(),
                "injected upload failure".to_string(),
            ));
        }
        drop(fail_puts);

        let mut storage = self.data.lock().await;
        storage.insert(name.to_string(), data);
        Ok(())
    }

    async fn delete(&self, name: &str) -> Result<(), StorageError> {
        let fail_deletes = self.fail_deletes.lock().await;
        if fail_deletes.contains(name) {
            return Err(StorageError::DeleteError(
                name.to_string(),
                "injected delete failure".to_string(),
            ));
        }
        drop(fail_deletes);

        let mut storage = self.data.lock().await;
        storage.remove(name);
        Ok(())
    }

    #[cfg(test)]
    async fn get(&self, name: &str) -> Result<Bytes, StorageError> {
        let data = self.data.lock().await;
        match data.get(name) {
            Some(bytes) => Ok(bytes.clone()),
            None => Err(StorageError::ObjectNotFound(name.to_string())),
        }
    }
}
