//! Read-through cache for goods listings.
//!
//! # Responsibility
//! - Define the cache backend contract and the key scheme for goods queries.
//! - Absorb every cache failure at the [`ReadThrough`] boundary.
//!
//! # Invariants
//! - The cache is never a source of truth: a failed or missing entry always
//!   falls back to the record store.
//! - Entries expire after their TTL; writes only invalidate them when
//!   [`CachePolicy::InvalidateOnWrite`] is selected.

use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;
use std::time::Duration;

mod memory;
mod read_through;
mod sqlite;

pub use memory::MemoryCache;
pub use read_through::{CacheSource, ReadThrough};
pub use sqlite::SqliteCache;

/// Key holding the full snapshot of every good row.
pub const ALL_GOODS_KEY: &str = "all_goods";

/// Prefix shared by every page key.
pub const PAGE_KEY_PREFIX: &str = "goods_";

/// Default entry lifetime.
pub const DEFAULT_TTL: Duration = Duration::from_secs(60);

/// Key of one `limit`/`offset` page of the id-ordered listing.
pub fn page_key(limit: u32, offset: u32) -> String {
    format!("{PAGE_KEY_PREFIX}{limit}_{offset}")
}

/// Consistency policy between writes and cached listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CachePolicy {
    /// Writes leave cached entries alone; readers may see stale data until
    /// the TTL lapses.
    #[default]
    TtlOnly,
    /// Committed writes drop `all_goods` and every page entry.
    InvalidateOnWrite,
}

pub type CacheResult<T> = Result<T, CacheError>;

/// Cache backend failure. Never surfaced past [`ReadThrough`].
#[derive(Debug)]
pub enum CacheError {
    Sqlite(rusqlite::Error),
    Serialization(serde_json::Error),
    Poisoned,
}

impl Display for CacheError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "cache store error: {err}"),
            Self::Serialization(err) => write!(f, "cache payload error: {err}"),
            Self::Poisoned => write!(f, "cache lock poisoned"),
        }
    }
}

impl Error for CacheError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::Serialization(err) => Some(err),
            Self::Poisoned => None,
        }
    }
}

impl From<rusqlite::Error> for CacheError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}

impl From<serde_json::Error> for CacheError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value)
    }
}

/// Key/value cache backend holding serialized payloads with a TTL.
pub trait GoodsCache {
    /// Returns the payload when present and unexpired.
    fn get(&self, key: &str) -> CacheResult<Option<String>>;
    /// Stores `payload` under `key`, replacing any previous entry.
    fn put(&self, key: &str, payload: &str, ttl: Duration) -> CacheResult<()>;
    /// Drops one entry. Missing keys are not an error.
    fn remove(&self, key: &str) -> CacheResult<()>;
    /// Drops every entry whose key starts with `prefix`; returns the count.
    fn remove_prefix(&self, prefix: &str) -> CacheResult<usize>;
}

impl<C: GoodsCache + ?Sized> GoodsCache for Arc<C> {
    fn get(&self, key: &str) -> CacheResult<Option<String>> {
        (**self).get(key)
    }

    fn put(&self, key: &str, payload: &str, ttl: Duration) -> CacheResult<()> {
        (**self).put(key, payload, ttl)
    }

    fn remove(&self, key: &str) -> CacheResult<()> {
        (**self).remove(key)
    }

    fn remove_prefix(&self, prefix: &str) -> CacheResult<usize> {
        (**self).remove_prefix(prefix)
    }
}

impl<C: GoodsCache + ?Sized> GoodsCache for Box<C> {
    fn get(&self, key: &str) -> CacheResult<Option<String>> {
        (**self).get(key)
    }

    fn put(&self, key: &str, payload: &str, ttl: Duration) -> CacheResult<()> {
        (**self).put(key, payload, ttl)
    }

    fn remove(&self, key: &str) -> CacheResult<()> {
        (**self).remove(key)
    }

    fn remove_prefix(&self, prefix: &str) -> CacheResult<usize> {
        (**self).remove_prefix(prefix)
    }
}
