//! Out-of-process cache backend stored in its own SQLite file.
//!
//! Entries survive the process, so separate invocations sharing the file
//! observe the same TTL window.

use super::{CacheError, CacheResult, GoodsCache};
use crate::time::now_epoch_ms;
use log::info;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

const CACHE_SCHEMA_SQL: &str = "CREATE TABLE IF NOT EXISTS cache_entries (
    key TEXT PRIMARY KEY NOT NULL,
    payload TEXT NOT NULL,
    expires_at INTEGER NOT NULL
);";

/// SQLite-backed TTL cache.
pub struct SqliteCache {
    conn: Mutex<Connection>,
}

impl SqliteCache {
    /// Opens (or creates) the cache file at `path`.
    pub fn open(path: impl AsRef<Path>) -> CacheResult<Self> {
        let conn = Connection::open(path)?;
        Self::bootstrap(conn, "file")
    }

    pub fn open_in_memory() -> CacheResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::bootstrap(conn, "memory")
    }

    fn bootstrap(conn: Connection, mode: &'static str) -> CacheResult<Self> {
        conn.busy_timeout(Duration::from_secs(1))?;
        conn.execute_batch(CACHE_SCHEMA_SQL)?;
        info!("event=cache_open module=cache status=ok backend=sqlite mode={mode}");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Drops every expired entry.
    pub fn purge_expired(&self) -> CacheResult<usize> {
        let conn = self.conn.lock().map_err(|_| CacheError::Poisoned)?;
        let removed = conn.execute(
            "DELETE FROM cache_entries WHERE expires_at <= ?1;",
            [now_epoch_ms()],
        )?;
        Ok(removed)
    }
}

impl GoodsCache for SqliteCache {
    fn get(&self, key: &str) -> CacheResult<Option<String>> {
        let conn = self.conn.lock().map_err(|_| CacheError::Poisoned)?;
        let payload = conn
            .query_row(
                "SELECT payload
                 FROM cache_entries
                 WHERE key = ?1
                   AND expires_at > ?2;",
                params![key, now_epoch_ms()],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(payload)
    }

    fn put(&self, key: &str, payload: &str, ttl: Duration) -> CacheResult<()> {
        let conn = self.conn.lock().map_err(|_| CacheError::Poisoned)?;
        let ttl_ms = i64::try_from(ttl.as_millis()).unwrap_or(i64::MAX);
        conn.execute(
            "INSERT INTO cache_entries (key, payload, expires_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET
                payload = excluded.payload,
                expires_at = excluded.expires_at;",
            params![key, payload, now_epoch_ms().saturating_add(ttl_ms)],
        )?;
        Ok(())
    }

    fn remove(&self, key: &str) -> CacheResult<()> {
        let conn = self.conn.lock().map_err(|_| CacheError::Poisoned)?;
        conn.execute("DELETE FROM cache_entries WHERE key = ?1;", [key])?;
        Ok(())
    }

    fn remove_prefix(&self, prefix: &str) -> CacheResult<usize> {
        let conn = self.conn.lock().map_err(|_| CacheError::Poisoned)?;
        let removed = conn.execute(
            "DELETE FROM cache_entries WHERE substr(key, 1, length(?1)) = ?1;",
            [prefix],
        )?;
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::SqliteCache;
    use crate::cache::GoodsCache;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn entries_round_trip_until_expiry() {
        let cache = SqliteCache::open_in_memory().unwrap();
        cache
            .put("all_goods", "[{\"id\":1}]", Duration::from_millis(50))
            .unwrap();
        assert_eq!(
            cache.get("all_goods").unwrap().as_deref(),
            Some("[{\"id\":1}]")
        );

        thread::sleep(Duration::from_millis(80));
        assert_eq!(cache.get("all_goods").unwrap(), None);
        assert_eq!(cache.purge_expired().unwrap(), 1);
    }

    #[test]
    fn put_replaces_previous_payload() {
        let cache = SqliteCache::open_in_memory().unwrap();
        let ttl = Duration::from_secs(60);
        cache.put("goods_10_0", "[]", ttl).unwrap();
        cache.put("goods_10_0", "[1]", ttl).unwrap();
        assert_eq!(cache.get("goods_10_0").unwrap().as_deref(), Some("[1]"));
    }

    #[test]
    fn file_backed_entries_are_shared_between_handles() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.sqlite3");
        let ttl = Duration::from_secs(60);

        SqliteCache::open(&path)
            .unwrap()
            .put("goods_10_0", "[]", ttl)
            .unwrap();
        let second = SqliteCache::open(&path).unwrap();
        assert_eq!(second.get("goods_10_0").unwrap().as_deref(), Some("[]"));

        second.put("goods_5_0", "[]", ttl).unwrap();
        assert_eq!(second.remove_prefix("goods_").unwrap(), 2);
    }
}
