//! Bounded in-process cache tier.
//!
//! Entries are kept in insertion order; when full, the oldest entry is
//! evicted. Expiry is checked lazily on read and by [`MemoryTier::sweep`].

use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use indexmap::IndexMap;

use crate::error::CacheError;
use crate::tier::{glob_match, CacheTier};

struct Entry {
    value: String,
    expires_at: Instant,
}

pub struct MemoryTier {
    entries: Mutex<IndexMap<String, Entry>>,
    capacity: usize,
}

impl MemoryTier {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Mutex::new(IndexMap::with_capacity(capacity.min(4096))),
            capacity: capacity.max(1),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, IndexMap<String, Entry>>, CacheError> {
        self.entries
            .lock()
            .map_err(|_| CacheError::Unavailable("memory tier lock poisoned".into()))
    }

    /// Drop all expired entries. Returns the number removed.
    pub fn sweep(&self) -> usize {
        let Ok(mut entries) = self.lock() else {
            return 0;
        };
        let now = Instant::now();
        let before = entries.len();
        entries.retain(|_, e| e.expires_at > now);
        before - entries.len()
    }

    /// Number of entries currently held, expired or not.
    pub fn len(&self) -> usize {
        self.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl CacheTier for MemoryTier {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> Result<Option<String>, CacheError> {
        let mut entries = self.lock()?;
        match entries.get(key) {
            Some(e) if e.expires_at > Instant::now() => Ok(Some(e.value.clone())),
            Some(_) => {
                entries.shift_remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), CacheError> {
        if ttl.is_zero() {
            return Ok(());
        }
        let mut entries = self.lock()?;
        // Re-insert so an overwritten key moves to the back of the queue.
        entries.shift_remove(key);
        while entries.len() >= self.capacity {
            entries.shift_remove_index(0);
        }
        entries.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: Instant::now() + ttl,
            },
        );
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        Ok(self.lock()?.shift_remove(key).is_some())
    }

    async fn delete_pattern(&self, pattern: &str) -> Result<u64, CacheError> {
        let mut entries = self.lock()?;
        let before = entries.len();
        entries.retain(|k, _| !glob_match(pattern, k));
        Ok((before - entries.len()) as u64)
    }

    async fn exists_pattern(&self, pattern: &str) -> Result<bool, CacheError> {
        let now = Instant::now();
        Ok(self
            .lock()?
            .iter()
            .any(|(k, e)| e.expires_at > now && glob_match(pattern, k)))
    }
}
