//! In-process cache backend.

use super::{CacheError, CacheStore, KeyPattern};
use crate::primitives::{CACHE_SWEEP_INTERVAL, MAX_CACHE_TTL_SECS};
use parking_lot::Mutex;
use std::collections::BTreeMap;
use std::time::{Duration, Instant};

#[derive(Debug)]
struct Entry {
    value: Vec<u8>,
    expires_at: Instant,
}

#[derive(Debug, Default)]
struct Entries {
    map: BTreeMap<String, Entry>,
    writes: u64,
}

impl Entries {
    fn sweep(&mut self, now: Instant) {
        self.map.retain(|_, e| e.expires_at > now);
    }
}

/// Expiry instant for `ttl`, clamped to [`MAX_CACHE_TTL_SECS`].
fn expiry(now: Instant, ttl: Duration) -> Instant {
    let ceiling = Duration::from_secs(MAX_CACHE_TTL_SECS);
    now.checked_add(ttl.min(ceiling))
        .or_else(|| now.checked_add(ceiling))
        .unwrap_or(now)
}

/// A TTL-bound map guarded by a mutex.
///
/// Expired entries are dropped on access, on key listing, and in a full sweep
/// every [`CACHE_SWEEP_INTERVAL`] writes, so keys that are never read again
/// are still reclaimed.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<Entries>,
}

impl MemoryCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries.
    #[must_use]
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .map
            .values()
            .filter(|e| e.expires_at > now)
            .count()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CacheStore for MemoryCache {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        let mut entries = self.entries.lock();
        let now = Instant::now();
        match entries.map.get(key) {
            Some(entry) if entry.expires_at > now => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.map.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), CacheError> {
        let now = Instant::now();
        let mut entries = self.entries.lock();
        entries.writes = entries.writes.wrapping_add(1);
        if entries.writes % CACHE_SWEEP_INTERVAL == 0 {
            entries.sweep(now);
        }
        entries.map.insert(
            key.to_string(),
            Entry {
                value,
                expires_at: expiry(now, ttl),
            },
        );
        Ok(())
    }

    fn delete_matching(&self, pattern: &str) -> Result<usize, CacheError> {
        let pattern = KeyPattern::new(pattern)?;
        let mut entries = self.entries.lock();
        let before = entries.map.len();
        entries.map.retain(|key, _| !pattern.matches(key));
        Ok(before - entries.map.len())
    }

    fn keys(&self, pattern: &str) -> Result<Vec<String>, CacheError> {
        let pattern = KeyPattern::new(pattern)?;
        let mut entries = self.entries.lock();
        entries.sweep(Instant::now());
        Ok(entries
            .map
            .keys()
            .filter(|k| pattern.matches(k))
            .cloned()
            .collect())
    }
}
