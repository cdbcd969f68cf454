//! Counter store trait for abstracting in-process and shared backends.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

use super::counter::Counter;
use super::key::RateKey;

/// Errors raised by a counter store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Counter store unavailable: {0}")]
    Unavailable(String),
    #[error("Counter store timed out after {0:?}")]
    Timeout(Duration),
    #[error("Counter store contention: gave up after {0} attempts")]
    Contention(usize),
}

/// A stored value together with the version it was written at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Versioned<T> {
    pub value: T,
    pub version: u64,
}

/// Trait for counter store implementations.
///
/// The limiter only needs two primitives: read a counter with its version,
/// and replace it if nobody else has written since. This lets the same
/// admission algorithm run against an in-process map or a shared store.
#[async_trait]
pub trait CounterStore: Send + Sync {
    /// Read the counter for `key`, if one exists.
    async fn get(&self, key: &RateKey) -> Result<Option<Versioned<Counter>>, StoreError>;

    /// Write `counter` for `key` if the stored version still matches.
    ///
    /// `expected = None` means "only if absent". Returns `false` when another
    /// writer got there first; the caller should re-read and retry. A version
    /// is never handed out twice for a key, even after it was evicted.
    async fn compare_and_set(
        &self,
        key: &RateKey,
        expected: Option<u64>,
        counter: Counter,
    ) -> Result<bool, StoreError>;

    /// Drop counters whose window ended at least `idle` before `now_ms`.
    ///
    /// Stores with their own expiry can leave this as a no-op.
    async fn evict_idle(&self, _now_ms: u64, _idle: Duration) -> Result<usize, StoreError> {
        Ok(0)
    }
}
