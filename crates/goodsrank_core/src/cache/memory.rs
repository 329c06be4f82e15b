//! Process-local cache backend.

use super::{CacheError, CacheResult, GoodsCache};
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct MemoryEntry {
    payload: String,
    expires_at: Instant,
}

impl MemoryEntry {
    fn is_live(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// In-memory TTL cache. Concurrent `get`/`put` resolve to last write wins.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, MemoryEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included until purged.
    pub fn len(&self) -> usize {
        self.entries.read().map_or(0, |entries| entries.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drops every expired entry.
    pub fn purge_expired(&self) -> CacheResult<usize> {
        let mut entries = self.entries.write().map_err(|_| CacheError::Poisoned)?;
        let now = Instant::now();
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        Ok(before - entries.len())
    }
}

impl GoodsCache for MemoryCache {
    fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let entries = self.entries.read().map_err(|_| CacheError::Poisoned)?;
        let now = Instant::now();
        Ok(entries
            .get(key)
            .filter(|entry| entry.is_live(now))
            .map(|entry| entry.payload.clone()))
    }

    fn put(&self, key: &str, payload: &str, ttl: Duration) -> CacheResult<()> {
        let mut entries = self.entries.write().map_err(|_| CacheError::Poisoned)?;
        let now = Instant::now();
        entries.retain(|_, entry| entry.is_live(now));
        entries.insert(
            key.to_string(),
            MemoryEntry {
                payload: payload.to_string(),
                expires_at: now + ttl,
            },
        );
        Ok(())
    }

    fn remove(&self, key: &str) -> CacheResult<()> {
        let mut entries = self.entries.write().map_err(|_| CacheError::Poisoned)?;
        entries.remove(key);
        Ok(())
    }

    fn remove_prefix(&self, prefix: &str) -> CacheResult<usize> {
        let mut entries = self.entries.write().map_err(|_| CacheError::Poisoned)?;
        let before = entries.len();
        entries.retain(|key, _| !key.starts_with(prefix));
        Ok(before - entries.len())
    }
}
