//! Bounded least-recently-used map.
//!
//! Backs the per-user preference, context and behavior caches so they cannot
//! grow without limit. Not synchronized: callers wrap it in a mutex.

use std::collections::BTreeMap;

#[derive(Debug)]
pub(crate) struct BoundedLru<K: Ord + Clone, V> {
    capacity: usize,
    tick: u64,
    entries: BTreeMap<K, (u64, V)>,
    /// Last-use tick to key. The first entry is the eviction candidate.
    recency: BTreeMap<u64, K>,
}

impl<K: Ord + Clone, V> BoundedLru<K, V> {
    pub(crate) fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            tick: 0,
            entries: BTreeMap::new(),
            recency: BTreeMap::new(),
        }
    }

    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }

    /// Evict least recently used entries until one more fits.
    fn make_room(&mut self) {
        while self.entries.len() >= self.capacity {
            let Some((_, oldest)) = self.recency.pop_first() else {
                break;
            };
            self.entries.remove(&oldest);
        }
    }

    /// Value for `key`, marking it most recently used.
    pub(crate) fn get(&mut self, key: &K) -> Option<&V> {
        let tick = self.next_tick();
        let (last, value) = self.entries.get_mut(key)?;
        self.recency.remove(last);
        *last = tick;
        self.recency.insert(tick, key.clone());
        Some(value)
    }

    /// Mutable value for `key`, inserting `make()` first when absent.
    pub(crate) fn get_or_insert_with(&mut self, key: K, make: impl FnOnce() -> V) -> &mut V {
        if !self.entries.contains_key(&key) {
            self.make_room();
        }
        let tick = self.next_tick();
        let slot = self
            .entries
            .entry(key.clone())
            .or_insert_with(|| (tick, make()));
        if slot.0 != tick {
            self.recency.remove(&slot.0);
            slot.0 = tick;
        }
        self.recency.insert(tick, key);
        &mut slot.1
    }

    /// Store `value` under `key`, replacing any previous value.
    pub(crate) fn insert(&mut self, key: K, value: V) {
        match self.entries.remove(&key) {
            Some((last, _)) => {
                self.recency.remove(&last);
            }
            None => self.make_room(),
        }
        let tick = self.next_tick();
        self.recency.insert(tick, key.clone());
        self.entries.insert(key, (tick, value));
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }
}
