use std::num::NonZeroUsize;
use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use lru::LruCache;

use super::CacheBackend;
use crate::error::ExecutorError;

const DEFAULT_CAPACITY: usize = 1024;

struct Entry {
    value: serde_json::Value,
    stored_at: Instant,
}

/// Bounded LRU cache with optional time-to-live.
pub struct MemoryCache {
    entries: Mutex<LruCache<String, Entry>>,
    ttl: Option<Duration>,
}

impl MemoryCache {
    pub fn new(capacity: usize, ttl: Option<Duration>) -> Self {
        let capacity = NonZeroUsize::new(capacity)
            .or(NonZeroUsize::new(DEFAULT_CAPACITY))
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    pub fn len(&self) -> usize {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, None)
    }
}

impl CacheBackend for MemoryCache {
    fn get(&self, key: &str) -> Option<serde_json::Value> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        let expired = match entries.get(key) {
            None => return None,
            Some(entry) => self
                .ttl
                .is_some_and(|ttl| entry.stored_at.elapsed() >= ttl),
        };
        if expired {
            entries.pop(key);
            return None;
        }
        entries.get(key).map(|e| e.value.clone())
    }

    fn set(&self, key: &str, value: serde_json::Value) -> Result<(), ExecutorError> {
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        entries.put(
            key.to_string(),
            Entry {
                value,
                stored_at: Instant::now(),
            },
        );
        Ok(())
    }
}
