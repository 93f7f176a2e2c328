//! TTL cache in front of a backend.
//!
//! Values are stored as JSON strings so the cache never holds a stale
//! borrow of backend types. Every method is a non-panicking best effort:
//! cache trouble degrades to a miss, never an error. The [`CacheLayer::Null`]
//! variant keeps call sites unconditional when caching is off.

use std::num::NonZeroUsize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use log::warn;
use lru::LruCache;
use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::config::CacheConfig;

struct CacheEntry {
    value: String,
    expires_at: Instant,
}

pub struct MemoryCache {
    entries: Mutex<LruCache<String, CacheEntry>>,
    default_ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
}

pub enum CacheLayer {
    Memory(MemoryCache),
    Null,
}

/// A point-in-time view of cache behavior, for status output.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheStatistics {
    pub enabled: bool,
    pub entries: u64,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
}

impl CacheLayer {
    /// Build a cache from configuration. Disabled or unrecognized
    /// configurations produce the null cache.
    pub fn from_config(config: &CacheConfig) -> Self {
        if !config.enabled {
            return Self::Null;
        }
        if config.cache_type != "memory" {
            warn!(
                "unknown cache type '{}', caching disabled",
                config.cache_type
            );
            return Self::Null;
        }
        let capacity = NonZeroUsize::new(config.max_size.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self::Memory(MemoryCache {
            entries: Mutex::new(LruCache::new(capacity)),
            default_ttl: Duration::from_secs(config.default_ttl),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        })
    }

    pub fn null() -> Self {
        Self::Null
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Memory(_))
    }

    /// Fetch and deserialize a cached value. Expired entries are dropped
    /// on access.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let Self::Memory(cache) = self else {
            return None;
        };
        let mut entries = cache.entries.lock();
        let expired = entries
            .get(key)
            .map(|entry| entry.expires_at <= Instant::now())
            .unwrap_or(false);
        if expired {
            entries.pop(key);
        }
        let Some(entry) = entries.get(key) else {
            cache.misses.fetch_add(1, Ordering::Relaxed);
            return None;
        };
        match serde_json::from_str(&entry.value) {
            Ok(value) => {
                cache.hits.fetch_add(1, Ordering::Relaxed);
                Some(value)
            }
            Err(e) => {
                warn!("cached value under '{key}' failed to deserialize: {e}");
                entries.pop(key);
                cache.misses.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Serialize and store a value. Returns whether the value was stored.
    pub fn set<T: Serialize>(&self, key: &str, value: &T, ttl: Option<Duration>) -> bool {
        let Self::Memory(cache) = self else {
            return false;
        };
        let serialized = match serde_json::to_string(value) {
            Ok(serialized) => serialized,
            Err(e) => {
                warn!("value for cache key '{key}' failed to serialize: {e}");
                return false;
            }
        };
        let ttl = ttl.unwrap_or(cache.default_ttl);
        cache.entries.lock().put(
            key.to_string(),
            CacheEntry {
                value: serialized,
                expires_at: Instant::now() + ttl,
            },
        );
        true
    }

    pub fn delete(&self, key: &str) -> bool {
        let Self::Memory(cache) = self else {
            return false;
        };
        cache.entries.lock().pop(key).is_some()
    }

    /// Drop every key matching a glob pattern, e.g. `catalog:*`. Returns
    /// how many entries went away.
    pub fn invalidate(&self, pattern: &str) -> usize {
        let Self::Memory(cache) = self else {
            return 0;
        };
        let matcher = match glob::Pattern::new(pattern) {
            Ok(matcher) => matcher,
            Err(e) => {
                warn!("bad cache invalidation pattern '{pattern}': {e}");
                return 0;
            }
        };
        let mut entries = cache.entries.lock();
        let doomed: Vec<String> = entries
            .iter()
            .filter(|(key, _)| matcher.matches(key))
            .map(|(key, _)| key.clone())
            .collect();
        for key in &doomed {
            entries.pop(key);
        }
        doomed.len()
    }

    pub fn clear(&self) {
        if let Self::Memory(cache) = self {
            cache.entries.lock().clear();
        }
    }

    pub fn statistics(&self) -> CacheStatistics {
        match self {
            Self::Memory(cache) => {
                let entries = cache.entries.lock().len() as u64;
                let hits = cache.hits.load(Ordering::Relaxed);
                let misses = cache.misses.load(Ordering::Relaxed);
                let total = hits + misses;
                CacheStatistics {
                    enabled: true,
                    entries,
                    hits,
                    misses,
                    hit_rate: if total == 0 {
                        0.0
                    } else {
                        hits as f64 / total as f64
                    },
                }
            }
            Self::Null => CacheStatistics {
                enabled: false,
                entries: 0,
                hits: 0,
                misses: 0,
                hit_rate: 0.0,
            },
        }
    }
}
