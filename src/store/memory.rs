//! In-memory store backend.
//!
//! Used for development and tests. Honors TTLs and can impose a value-size
//! ceiling like the shared backend so degradation paths stay testable.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::Result;

use super::KeyValueStore;

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(at) => Instant::now() >= at,
            None => false,
        }
    }
}

/// In-memory key-value store.
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
    /// Maximum size in bytes of one value accepted by `set_multi`
    /// (0 disables the ceiling).
    max_value_size: usize,
}

impl MemoryStore {
    /// Create an unbounded in-memory store.
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_value_size: 0,
        }
    }

    /// Create a store that rejects `set_multi` payloads with any value
    /// larger than `max_value_size` bytes.
    pub fn with_max_value_size(max_value_size: usize) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            max_value_size,
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut entries = self.entries.lock().await;
        if let Some(entry) = entries.get(key) {
            if entry.is_expired() {
                entries.remove(key);
                return Ok(None);
            }
            return Ok(Some(entry.value.clone()));
        }
        Ok(None)
    }

    async fn get_multi(&self, keys: &[&str]) -> Result<HashMap<String, String>> {
        let mut entries = self.entries.lock().await;
        let mut result = HashMap::new();
        for &key in keys {
            if let Some(entry) = entries.get(key) {
                if entry.is_expired() {
                    entries.remove(key);
                } else {
                    result.insert(key.to_string(), entry.value.clone());
                }
            }
        }
        Ok(result)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let mut entries = self.entries.lock().await;
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: ttl.map(|t| Instant::now() + t),
            },
        );
        Ok(())
    }

    async fn set_multi(&self, entries: &[(&str, String)], ttl: Option<Duration>) -> Result<bool> {
        if self.max_value_size > 0
            && entries.iter().any(|(_, v)| v.len() > self.max_value_size)
        {
            return Ok(false);
        }
        let mut map = self.entries.lock().await;
        let expires_at = ttl.map(|t| Instant::now() + t);
        for (key, value) in entries {
            map.insert(
                key.to_string(),
                Entry {
                    value: value.clone(),
                    expires_at,
                },
            );
        }
        Ok(true)
    }

    async fn add_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let mut entries = self.entries.lock().await;
        if let Some(existing) = entries.get(key) {
            if !existing.is_expired() {
                return Ok(false);
            }
        }
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(true)
    }

    async fn increment(&self, key: &str, delta: i64, initial: i64) -> Result<i64> {
        let mut entries = self.entries.lock().await;
        // An expired entry restarts the counter; its dead expiry must not
        // carry over to the new value.
        let (current, expires_at) = match entries.get(key) {
            Some(entry) if !entry.is_expired() => {
                (entry.value.parse::<i64>().unwrap_or(0), entry.expires_at)
            }
            _ => (initial, None),
        };
        let next = current + delta;
        entries.insert(
            key.to_string(),
            Entry {
                value: next.to_string(),
                expires_at,
            },
        );
        Ok(next)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.lock().await.remove(key);
        Ok(())
    }
}
