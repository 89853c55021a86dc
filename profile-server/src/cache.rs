//! Key-value profile cache.
//!
//! Profiles are flat string hashes keyed by email. Writes merge into the
//! existing hash. A write followed by a read is not atomic across callers;
//! each operation is atomic on its own.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::ProfileError;

/// Field/value pairs of one profile.
pub type Fields = BTreeMap<String, String>;

#[async_trait]
pub trait ProfileCache: Send + Sync {
    async fn exists(&self, key: &str) -> Result<bool, ProfileError>;

    async fn read_fields(&self, key: &str) -> Result<Option<Fields>, ProfileError>;

    /// Merge `fields` into the hash stored at `key`, creating it if needed.
    async fn write_fields(&self, key: &str, fields: Fields) -> Result<(), ProfileError>;

    /// Returns whether a hash was removed.
    async fn remove(&self, key: &str) -> Result<bool, ProfileError>;

    async fn keys(&self) -> Result<Vec<String>, ProfileError>;
}

/// In-process cache. Clones share the same storage.
#[derive(Debug, Clone, Default)]
pub struct MemoryCache {
    entries: Arc<RwLock<HashMap<String, Fields>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProfileCache for MemoryCache {
    async fn exists(&self, key: &str) -> Result<bool, ProfileError> {
        Ok(self.entries.read().await.contains_key(key))
    }

    async fn read_fields(&self, key: &str) -> Result<Option<Fields>, ProfileError> {
        Ok(self.entries.read().await.get(key).cloned())
    }

    async fn write_fields(&self, key: &str, fields: Fields) -> Result<(), ProfileError> {
        self.entries
            .write()
            .await
            .entry(key.to_string())
            .or_default()
            .extend(fields);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool, ProfileError> {
        Ok(self.entries.write().await.remove(key).is_some())
    }

    async fn keys(&self) -> Result<Vec<String>, ProfileError> {
        let mut keys: Vec<String> = self.entries.read().await.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }
}
