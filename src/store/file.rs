//! Local-filesystem store backend.
//!
//! One file per logical key under a configured directory. Writes go to a
//! temporary file first and are renamed into place, so readers only ever
//! see a complete value. Plain values carry no TTL; `add_if_absent` uses
//! exclusive file creation, stamping the holder's expiry into the file's
//! mtime so a takeover only happens after the TTL the holder asked for.
//! Best-effort exclusion within a single host.

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;

use crate::{NovynyError, Result};

use super::KeyValueStore;

/// Filesystem-backed key-value store.
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    /// Open a store rooted at `dir`, creating the directory if needed.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    fn path_for(&self, key: &str) -> Result<PathBuf> {
        // Keys are internal well-known names; reject anything that could
        // escape the store directory.
        if key.is_empty() || key.contains(['/', '\\', '.']) {
            return Err(NovynyError::Store(format!("invalid store key: {key}")));
        }
        Ok(self.dir.join(key))
    }

    async fn write_atomic(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key)?;
        let tmp = self.dir.join(format!(".{key}.tmp"));
        let mut file = fs::File::create(&tmp).await?;
        file.write_all(value.as_bytes()).await?;
        file.flush().await?;
        fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn read_key(&self, key: &str) -> Result<Option<String>> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path).await {
            Ok(value) => Ok(Some(value)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl KeyValueStore for FileStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.read_key(key).await
    }

    async fn get_multi(&self, keys: &[&str]) -> Result<HashMap<String, String>> {
        let mut result = HashMap::new();
        for &key in keys {
            if let Some(value) = self.read_key(key).await? {
                result.insert(key.to_string(), value);
            }
        }
        Ok(result)
    }

    async fn set(&self, key: &str, value: &str, _ttl: Option<Duration>) -> Result<()> {
        self.write_atomic(key, value).await
    }

    async fn set_multi(&self, entries: &[(&str, String)], _ttl: Option<Duration>) -> Result<bool> {
        // No payload size limit on local disk; writes never degrade.
        for (key, value) in entries {
            self.write_atomic(key, value).await?;
        }
        Ok(true)
    }

    async fn add_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let path = self.path_for(key)?;
        loop {
            match fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(mut file) => {
                    file.write_all(value.as_bytes()).await?;
                    file.flush().await?;
                    // The expiry lives in the mtime, so a later contender
                    // judges staleness by this holder's TTL, not its own.
                    let file = file.into_std().await;
                    file.set_modified(SystemTime::now() + ttl)?;
                    return Ok(true);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    // A holder that died leaves the file behind; take over
                    // once its stamped expiry has passed.
                    let stale = match fs::metadata(&path).await {
                        Ok(meta) => match meta.modified() {
                            Ok(expires_at) => expires_at <= SystemTime::now(),
                            Err(_) => false,
                        },
                        // Holder released between our open and stat; retry.
                        Err(e) if e.kind() == ErrorKind::NotFound => continue,
                        Err(e) => return Err(e.into()),
                    };
                    if !stale {
                        return Ok(false);
                    }
                    match fs::remove_file(&path).await {
                        Ok(()) => continue,
                        Err(e) if e.kind() == ErrorKind::NotFound => continue,
                        Err(e) => return Err(e.into()),
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    async fn increment(&self, key: &str, delta: i64, initial: i64) -> Result<i64> {
        let current = match self.read_key(key).await? {
            Some(raw) => raw.trim().parse::<i64>().unwrap_or(0),
            None => initial,
        };
        let next = current + delta;
        self.write_atomic(key, &next.to_string()).await?;
        Ok(next)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let path = self.path_for(key)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
