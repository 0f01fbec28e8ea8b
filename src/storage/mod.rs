//! Pluggable key-value storage
//!
//! The image library persists through a narrow get/set-by-key capability so
//! it can run against SQLite in production and a plain map in tests.

mod memory;
mod sqlite;

use async_trait::async_trait;
use thiserror::Error;

pub use memory::MemoryStorage;
pub use sqlite::{Database, SqliteStorage};

/// Storage failure (capacity, I/O, or backend-specific)
#[derive(Debug, Error)]
#[error("storage error: {0}")]
pub struct StorageError(pub String);

impl From<sqlx::Error> for StorageError {
    fn from(e: sqlx::Error) -> Self {
        StorageError(e.to_string())
    }
}

/// String-valued key-value storage capability
#[async_trait]
pub trait Storage: Send + Sync {
    /// Read the value stored under `key`, if any
    async fn get(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// Write `value` under `key`, replacing any prior value
    async fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;
}
