//! Key-value store backends for the snapshot cache.
//!
//! One minimal get/set/increment/add-if-absent/delete contract with three
//! implementations: a shared TTL-bearing redis store for multi-instance
//! deployments, a local-filesystem store for a single long-lived process,
//! and an in-memory store for development and tests.

pub mod file;
pub mod memory;
pub mod remote;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::CacheConfig;
use crate::{NovynyError, Result};

pub use file::FileStore;
pub use memory::MemoryStore;
pub use remote::RedisStore;

/// Minimal key-value contract shared by all cache backends.
///
/// Absent keys are `Ok(None)`, never an error. TTLs are honored by the
/// redis and memory backends; the file backend ignores them for plain
/// values and applies them only to `add_if_absent` staleness takeover.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Get a single value.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Get several values at once. Missing keys are simply absent from
    /// the returned map.
    async fn get_multi(&self, keys: &[&str]) -> Result<HashMap<String, String>>;

    /// Set a single value with an optional TTL.
    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()>;

    /// Set several values as one write. Returns `false` when the backend
    /// rejects the payload as too large; the caller is expected to shrink
    /// and retry.
    async fn set_multi(&self, entries: &[(&str, String)], ttl: Option<Duration>) -> Result<bool>;

    /// Atomically create a key only if it does not exist. Returns `true`
    /// when this caller created it.
    async fn add_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool>;

    /// Increment a counter, creating it at `initial + delta` when absent.
    async fn increment(&self, key: &str, delta: i64, initial: i64) -> Result<i64>;

    /// Delete a key. Deleting an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<()>;
}

/// Shared handle to a store backend.
pub type SharedStore = Arc<dyn KeyValueStore>;

/// Build the store backend selected by the configuration.
pub async fn open_store(config: &CacheConfig) -> Result<SharedStore> {
    match config.backend.as_str() {
        "redis" => {
            let store = RedisStore::connect(&config.redis_url, config.max_value_size).await?;
            Ok(Arc::new(store))
        }
        "file" => {
            let store = FileStore::open(&config.dir)?;
            Ok(Arc::new(store))
        }
        "memory" => Ok(Arc::new(MemoryStore::new())),
        other => Err(NovynyError::Config(format!(
            "unknown cache backend: {other}"
        ))),
    }
}
