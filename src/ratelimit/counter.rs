//! Fixed-window rate limit counter.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A fixed-window counter for one rate key.
///
/// The counter is a plain value: it is read from a store, advanced with
/// [`Counter::try_admit`], and written back with compare-and-set. All
/// timestamps are milliseconds since the UNIX epoch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counter {
    /// Admitted calls in the current window
    pub count: u32,
    /// When the current window started
    pub window_start_ms: u64,
    /// Maximum admitted calls per window
    pub limit: u32,
    /// Window length in seconds
    pub window_secs: u64,
}

impl Counter {
    /// Create a new, empty counter whose window starts at `now_ms`.
    pub fn new(limit: u32, window_secs: u64, now_ms: u64) -> Self {
        Self {
            count: 0,
            window_start_ms: now_ms,
            limit,
            window_secs,
        }
    }

    fn window_ms(&self) -> u64 {
        self.window_secs.saturating_mul(1000)
    }

    /// Whether the current window has run its full length.
    pub fn is_expired(&self, now_ms: u64) -> bool {
        now_ms.saturating_sub(self.window_start_ms) >= self.window_ms()
    }

    /// Admit one call if the window has room.
    ///
    /// Expired windows are reset first. Returns `true` if the call was
    /// admitted (and counted), `false` if the window is full. A rejected
    /// call leaves the count untouched.
    pub fn try_admit(&mut self, now_ms: u64) -> bool {
        if self.is_expired(now_ms) {
            self.count = 0;
            self.window_start_ms = now_ms;
        }

        if self.count >= self.limit {
            return false;
        }

        self.count += 1;
        true
    }

    /// Get the remaining quota in the current window.
    pub fn remaining(&self) -> u32 {
        self.limit.saturating_sub(self.count)
    }

    /// Get the duration until the current window resets.
    pub fn duration_until_reset(&self, now_ms: u64) -> Duration {
        let window_end = self.window_start_ms.saturating_add(self.window_ms());
        Duration::from_millis(window_end.saturating_sub(now_ms))
    }

    /// Whether the counter's window ended at least `idle` ago.
    pub fn is_idle(&self, now_ms: u64, idle: Duration) -> bool {
        let window_end = self.window_start_ms.saturating_add(self.window_ms());
        now_ms.saturating_sub(window_end) >= idle.as_millis() as u64 && self.is_expired(now_ms)
    }
}
