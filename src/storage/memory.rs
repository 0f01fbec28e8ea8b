//! In-memory storage double for tests and ephemeral runs

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::RwLock;

use super::{Storage, StorageError};

/// Map-backed storage, no durability
#[derive(Default)]
pub struct MemoryStorage {
    map: RwLock<HashMap<String, String>>,
}

impl MemoryStorage {
    /// Create an empty storage
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a storage pre-seeded with a single entry (test setup)
    pub fn with_entry(key: &str, value: &str) -> Self {
        let storage = Self::new();
        storage
            .map
            .write()
            .insert(key.to_string(), value.to_string());
        storage
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.map.read().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.map.write().insert(key.to_string(), value.to_string());
        Ok(())
    }
}
