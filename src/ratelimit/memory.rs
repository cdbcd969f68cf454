//! In-process counter store.

use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::debug;

use super::counter::Counter;
use super::key::RateKey;
use super::store::{CounterStore, StoreError, Versioned};

/// A counter store backed by a sharded concurrent map.
///
/// Compare-and-set holds the shard lock for the key only, so unrelated keys
/// never wait on each other.
///
/// Versions come from one store-wide sequence, so a key that is evicted and
/// created again never reuses a version an earlier reader may still hold.
#[derive(Debug, Default)]
pub struct MemoryStore {
    counters: DashMap<RateKey, Versioned<Counter>>,
    versions: AtomicU64,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the number of live counters.
    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counters.is_empty()
    }

    /// Clear all counters.
    pub fn clear(&self) {
        self.counters.clear();
    }

    fn next_version(&self) -> u64 {
        self.versions.fetch_add(1, Ordering::Relaxed) + 1
    }
}

#[async_trait]
impl CounterStore for MemoryStore {
    async fn get(&self, key: &RateKey) -> Result<Option<Versioned<Counter>>, StoreError> {
        Ok(self.counters.get(key).map(|entry| *entry.value()))
    }

    async fn compare_and_set(
        &self,
        key: &RateKey,
        expected: Option<u64>,
        counter: Counter,
    ) -> Result<bool, StoreError> {
        match (self.counters.entry(key.clone()), expected) {
            (Entry::Vacant(slot), None) => {
                slot.insert(Versioned {
                    value: counter,
                    version: self.next_version(),
                });
                Ok(true)
            }
            (Entry::Occupied(mut slot), Some(version)) if slot.get().version == version => {
                slot.insert(Versioned {
                    value: counter,
                    version: self.next_version(),
                });
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn evict_idle(&self, now_ms: u64, idle: Duration) -> Result<usize, StoreError> {
        let before = self.counters.len();
        self.counters
            .retain(|_, stored| !stored.value.is_idle(now_ms, idle));
        let evicted = before.saturating_sub(self.counters.len());

        if evicted > 0 {
            debug!(evicted, remaining = self.counters.len(), "Evicted idle counters");
        }
        Ok(evicted)
    }
}
