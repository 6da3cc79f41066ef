//! Bounded in-memory LRU translation cache keyed by content fingerprint.

use std::num::NonZeroUsize;

use lru::LruCache;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

use super::fingerprint::Fingerprint;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub size: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate: f64,
}

struct CacheInner {
    entries: LruCache<Fingerprint, String>,
    hits: u64,
    misses: u64,
}

/// Only confirmed translations are ever stored here.
pub struct TranslationCache {
    inner: Mutex<CacheInner>,
    capacity: usize,
}

impl TranslationCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            inner: Mutex::new(CacheInner {
                entries: LruCache::new(capacity),
                hits: 0,
                misses: 0,
            }),
            capacity: capacity.get(),
        }
    }

    /// Look up a translation, promoting it to most recently used on a hit.
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<String> {
        let mut inner = self.inner.lock();
        match inner.entries.get(fingerprint).cloned() {
            Some(translation) => {
                inner.hits += 1;
                Some(translation)
            }
            None => {
                inner.misses += 1;
                None
            }
        }
    }

    /// Like `get`, but leaves the hit/miss counters alone.
    pub fn peek(&self, fingerprint: &Fingerprint) -> Option<String> {
        self.inner.lock().entries.get(fingerprint).cloned()
    }

    /// Insert or update a translation, evicting the least recently used
    /// entry when full.
    pub fn set(&self, fingerprint: Fingerprint, translation: String) {
        self.inner.lock().entries.put(fingerprint, translation);
    }

    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> CacheStats {
        let inner = self.inner.lock();
        let lookups = inner.hits + inner.misses;
        CacheStats {
            size: inner.entries.len(),
            capacity: self.capacity,
            hits: inner.hits,
            misses: inner.misses,
            hit_rate: if lookups > 0 {
                inner.hits as f64 / lookups as f64
            } else {
                0.0
            },
        }
    }
}
