//! Shared redis store backend.
//!
//! Used when the aggregator runs as one of many stateless instances: all
//! instances see the same snapshot, the same refresh lock and the same
//! counters. Every key carries a TTL where the caller asks for one, and
//! `set_multi` enforces a value-size ceiling so an oversized snapshot is
//! reported back to the caller instead of written.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use redis::aio::ConnectionManager;

use crate::Result;

use super::KeyValueStore;

/// Redis-backed key-value store.
pub struct RedisStore {
    conn: ConnectionManager,
    /// Maximum size in bytes of one value accepted by `set_multi`
    /// (0 disables the ceiling).
    max_value_size: usize,
}

impl RedisStore {
    /// Connect to redis at `url`.
    pub async fn connect(url: &str, max_value_size: usize) -> Result<Self> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self {
            conn,
            max_value_size,
        })
    }

    fn ttl_secs(ttl: Duration) -> u64 {
        ttl.as_secs().max(1)
    }
}

#[async_trait]
impl KeyValueStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut conn = self.conn.clone();
        let value: Option<String> = redis::cmd("GET").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn get_multi(&self, keys: &[&str]) -> Result<HashMap<String, String>> {
        if keys.is_empty() {
            return Ok(HashMap::new());
        }
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("MGET");
        for &key in keys {
            cmd.arg(key);
        }
        let values: Vec<Option<String>> = cmd.query_async(&mut conn).await?;
        let mut result = HashMap::new();
        for (&key, value) in keys.iter().zip(values) {
            if let Some(value) = value {
                result.insert(key.to_string(), value);
            }
        }
        Ok(result)
    }

    async fn set(&self, key: &str, value: &str, ttl: Option<Duration>) -> Result<()> {
        let mut conn = self.conn.clone();
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl {
            cmd.arg("EX").arg(Self::ttl_secs(ttl));
        }
        cmd.query_async::<_, ()>(&mut conn).await?;
        Ok(())
    }

    async fn set_multi(&self, entries: &[(&str, String)], ttl: Option<Duration>) -> Result<bool> {
        if self.max_value_size > 0
            && entries.iter().any(|(_, v)| v.len() > self.max_value_size)
        {
            return Ok(false);
        }
        let mut conn = self.conn.clone();
        let mut pipe = redis::pipe();
        // MULTI/EXEC so readers see all fields change together.
        pipe.atomic();
        for (key, value) in entries {
            let mut cmd = redis::cmd("SET");
            cmd.arg(key).arg(value);
            if let Some(ttl) = ttl {
                cmd.arg("EX").arg(Self::ttl_secs(ttl));
            }
            pipe.add_command(cmd).ignore();
        }
        pipe.query_async::<_, ()>(&mut conn).await?;
        Ok(true)
    }

    async fn add_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let mut conn = self.conn.clone();
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("EX")
            .arg(Self::ttl_secs(ttl))
            .query_async(&mut conn)
            .await?;
        Ok(reply.is_some())
    }

    async fn increment(&self, key: &str, delta: i64, initial: i64) -> Result<i64> {
        let mut conn = self.conn.clone();
        if initial != 0 {
            redis::cmd("SET")
                .arg(key)
                .arg(initial)
                .arg("NX")
                .query_async::<_, Option<String>>(&mut conn)
                .await?;
        }
        let next: i64 = redis::cmd("INCRBY")
            .arg(key)
            .arg(delta)
            .query_async(&mut conn)
            .await?;
        Ok(next)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut conn = self.conn.clone();
        redis::cmd("DEL")
            .arg(key)
            .query_async::<_, ()>(&mut conn)
            .await?;
        Ok(())
    }
}
