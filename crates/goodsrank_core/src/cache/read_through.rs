//! Read-through wrapper that turns every cache failure into a miss.

use super::{GoodsCache, ALL_GOODS_KEY, PAGE_KEY_PREFIX};
use log::{debug, warn};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

/// Where a read-through value came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
    Cache,
    Store,
}

impl CacheSource {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cache => "cache",
            Self::Store => "store",
        }
    }
}

/// Best-effort JSON cache in front of the record store.
pub struct ReadThrough<C: GoodsCache> {
    backend: C,
    ttl: Duration,
}

impl<C: GoodsCache> ReadThrough<C> {
    pub fn new(backend: C, ttl: Duration) -> Self {
        Self { backend, ttl }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    pub fn backend(&self) -> &C {
        &self.backend
    }

    /// Serves `key` from the cache, or runs `load` and caches its result.
    ///
    /// Store errors from `load` propagate unchanged; cache errors never do.
    pub fn get_or_load<T, E, F>(&self, key: &str, load: F) -> Result<(T, CacheSource), E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Result<T, E>,
    {
        if let Some(value) = self.fetch(key) {
            return Ok((value, CacheSource::Cache));
        }

        let value = load()?;
        self.store(key, &value);
        Ok((value, CacheSource::Store))
    }

    /// Returns the decoded entry, or `None` on miss or any cache failure.
    pub fn fetch<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let payload = match self.backend.get(key) {
            Ok(Some(payload)) => payload,
            Ok(None) => {
                debug!("event=cache_get module=cache status=miss key={key}");
                return None;
            }
            Err(err) => {
                warn!("event=cache_get module=cache status=error key={key} error={err}");
                return None;
            }
        };

        match serde_json::from_str(&payload) {
            Ok(value) => {
                debug!("event=cache_get module=cache status=hit key={key}");
                Some(value)
            }
            Err(err) => {
                warn!(
                    "event=cache_get module=cache status=error key={key} error_code=decode_failed error={err}"
                );
                None
            }
        }
    }

    /// Caches `value` under `key` for the configured TTL. Failures are logged.
    pub fn store<T: Serialize + ?Sized>(&self, key: &str, value: &T) {
        let payload = match serde_json::to_string(value) {
            Ok(payload) => payload,
            Err(err) => {
                warn!(
                    "event=cache_put module=cache status=error key={key} error_code=encode_failed error={err}"
                );
                return;
            }
        };

        match self.backend.put(key, &payload, self.ttl) {
            Ok(()) => debug!(
                "event=cache_put module=cache status=ok key={key} ttl_ms={}",
                self.ttl.as_millis()
            ),
            Err(err) => warn!("event=cache_put module=cache status=error key={key} error={err}"),
        }
    }

    /// Drops the full snapshot and every page entry. Failures are logged.
    pub fn invalidate_goods(&self) {
        if let Err(err) = self.backend.remove(ALL_GOODS_KEY) {
            warn!(
                "event=cache_invalidate module=cache status=error key={ALL_GOODS_KEY} error={err}"
            );
        }
        match self.backend.remove_prefix(PAGE_KEY_PREFIX) {
            Ok(count) => debug!(
                "event=cache_invalidate module=cache status=ok prefix={PAGE_KEY_PREFIX} removed={count}"
            ),
            Err(err) => warn!(
                "event=cache_invalidate module=cache status=error prefix={PAGE_KEY_PREFIX} error={err}"
            ),
        }
    }
}
