//! Rate limiting logic and counter storage.

mod clock;
mod counter;
mod key;
mod limiter;
mod memory;
mod rules;
mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use counter::Counter;
pub use key::RateKey;
pub use limiter::{Decision, FailurePolicy, RateLimiter};
pub use memory::MemoryStore;
pub use rules::{Operation, OperationConfig, RateLimitRule, RateLimitRules, TimeUnit};
pub use store::{CounterStore, StoreError, Versioned};
