use crate::cache::error::CacheError;
use crate::cache::store::CacheStore;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// An in-memory implementation of the CacheStore trait for testing.
/// Entries carry real deadlines; `fake_expire` drops an entry to simulate
/// TTL lapse without sleeping.
#[derive(Clone)]
pub struct FakeCacheStore {
    entries: Arc<Mutex<HashMap<String, (String, Instant)>>>,
    fail_sets: Arc<Mutex<bool>>,
}

#[allow(dead_code)]
impl FakeCacheStore {
    /// Create a new empty FakeCacheStore
    pub fn new() -> Self {
        FakeCacheStore {
            entries: Arc::new(Mutex::new(HashMap::new())),
            fail_sets: Arc::new(Mutex::new(false)),
        }
    }

    /// Make every subsequent set fail with an operation error
    pub async fn fake_fail_sets(&self, fail: bool) {
        *self.fail_sets.lock().await = fail;
    }

    /// Drop an entry as if its TTL had expired
    pub async fn fake_expire(&self, key: &str) {
        let mut entries = self.entries.lock().await;
        entries.remove(key);
    }

    /// Read a raw entry regardless of expiry, bypassing the trait
    pub async fn fake_get_raw(&self, key: &str) -> Option<String> {
        let entries = self.entries.lock().await;
        entries.get(key).map(|(value, _)| value.clone())
    }
}

impl Default for FakeCacheStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheStore for FakeCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some((value, deadline)) if Instant::now() < *deadline => Ok(Some(value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError> {
        if *self.fail_sets.lock().await {
            return Err(CacheError::OperationError(
                "injected set failure".to_string(),
            ));
        }

        let mut entries = self.entries.lock().await;
        entries.insert(key.to_string(), (value.to_string(), Instant::now() + ttl));
        Ok(())
    }
}
