//! Core rate limiter implementation.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use super::clock::{Clock, SystemClock};
use super::counter::Counter;
use super::key::RateKey;
use super::store::{CounterStore, StoreError};

/// Default upper bound on a single store round-trip.
const DEFAULT_STORE_TIMEOUT: Duration = Duration::from_millis(250);
/// Compare-and-set attempts before the check is treated as a store failure.
const MAX_CAS_ATTEMPTS: usize = 1024;

/// What the limiter does when the counter store fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Admit the call without counting it.
    #[default]
    Open,
    /// Refuse the call.
    Closed,
}

/// Outcome of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The call was counted and may proceed.
    Admitted { remaining: u32, reset_after: Duration },
    /// The window is full.
    Limited { retry_after: Duration },
    /// The store failed and the fail-open policy let the call through uncounted.
    Unchecked,
    /// The store failed and the fail-closed policy refused the call.
    Unavailable,
}

impl Decision {
    /// Whether the caller must not proceed.
    pub fn is_limited(&self) -> bool {
        matches!(self, Decision::Limited { .. } | Decision::Unavailable)
    }
}

/// The core rate limiter.
///
/// Every check is a read followed by a compare-and-set against the store,
/// retried until it lands. Two concurrent checks for the same key can
/// therefore never both take the last slot.
pub struct RateLimiter {
    store: Arc<dyn CounterStore>,
    clock: Arc<dyn Clock>,
    policy: FailurePolicy,
    store_timeout: Duration,
}

impl RateLimiter {
    /// Create a new rate limiter over `store` with the system clock and fail-open policy.
    pub fn new(store: Arc<dyn CounterStore>) -> Self {
        Self {
            store,
            clock: Arc::new(SystemClock),
            policy: FailurePolicy::default(),
            store_timeout: DEFAULT_STORE_TIMEOUT,
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_store_timeout(mut self, timeout: Duration) -> Self {
        self.store_timeout = timeout;
        self
    }

    /// Returns `true` if the call must be rejected.
    pub async fn is_rate_limited(
        &self,
        operation: &str,
        limit: u32,
        window_secs: u64,
        identity: &str,
    ) -> bool {
        self.check(operation, limit, window_secs, identity)
            .await
            .is_limited()
    }

    /// Check and count one call for `(operation, identity)`.
    pub async fn check(
        &self,
        operation: &str,
        limit: u32,
        window_secs: u64,
        identity: &str,
    ) -> Decision {
        let key = RateKey::new(operation, identity);

        trace!(key = %key, limit, window_secs, "Checking rate limit");

        match self.try_check(&key, limit, window_secs).await {
            Ok(decision) => {
                if let Decision::Limited { retry_after } = decision {
                    debug!(
                        key = %key,
                        limit,
                        retry_after_ms = retry_after.as_millis() as u64,
                        "Rate limit exceeded"
                    );
                }
                decision
            }
            Err(err) => match self.policy {
                FailurePolicy::Open => {
                    warn!(key = %key, error = %err, "Counter store failed, admitting uncounted");
                    Decision::Unchecked
                }
                FailurePolicy::Closed => {
                    warn!(key = %key, error = %err, "Counter store failed, refusing");
                    Decision::Unavailable
                }
            },
        }
    }

    async fn try_check(
        &self,
        key: &RateKey,
        limit: u32,
        window_secs: u64,
    ) -> Result<Decision, StoreError> {
        for _ in 0..MAX_CAS_ATTEMPTS {
            let now_ms = self.clock.now_ms();
            let stored = self.timed(self.store.get(key)).await?;

            let (mut counter, expected) = match stored {
                Some(stored) => (stored.value, Some(stored.version)),
                None => (Counter::new(limit, window_secs, now_ms), None),
            };
            counter.limit = limit;
            counter.window_secs = window_secs;

            if !counter.try_admit(now_ms) {
                return Ok(Decision::Limited {
                    retry_after: counter.duration_until_reset(now_ms),
                });
            }

            if self
                .timed(self.store.compare_and_set(key, expected, counter))
                .await?
            {
                return Ok(Decision::Admitted {
                    remaining: counter.remaining(),
                    reset_after: counter.duration_until_reset(now_ms),
                });
            }

            trace!(key = %key, "Lost compare-and-set race, retrying");
            tokio::task::yield_now().await;
        }

        Err(StoreError::Contention(MAX_CAS_ATTEMPTS))
    }

    async fn timed<T, F>(&self, fut: F) -> Result<T, StoreError>
    where
        F: std::future::Future<Output = Result<T, StoreError>>,
    {
        tokio::time::timeout(self.store_timeout, fut)
            .await
            .map_err(|_| StoreError::Timeout(self.store_timeout))?
    }

    /// Evict counters idle for at least `idle`. Store errors count as zero evictions.
    pub async fn evict_idle(&self, idle: Duration) -> usize {
        match self.store.evict_idle(self.clock.now_ms(), idle).await {
            Ok(evicted) => evicted,
            Err(err) => {
                warn!(error = %err, "Counter eviction failed");
                0
            }
        }
    }

    /// Spawn a task that evicts idle counters every `every`.
    pub fn spawn_sweeper(self: Arc<Self>, every: Duration, idle: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // The first tick completes immediately.
            ticker.tick().await;
            loop {
                ticker.tick().await;
                self.evict_idle(idle).await;
            }
        })
    }
}
