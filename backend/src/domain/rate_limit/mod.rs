//! Per-identity rate limiting based on minimum inter-request spacing.
//!
//! The limiter owns no global state: each [`RateLimiter`] wraps an
//! injectable [`RateLimitStore`] and a clock, and a `GatewayClient` owns its
//! limiter. The store performs check-and-update atomically.

use std::sync::Arc;
use std::time::Duration;

use mockable::Clock;

use crate::domain::Identity;
use crate::domain::ports::{RateLimitStore, RateLimitStoreError};

mod policy;
mod store;

pub use policy::{RateLimitDecision, RateLimitEntry, RateLimitPolicy};
pub use store::{EvictionPolicy, InMemoryRateLimitStore};

/// Rate limiter facade combining a store with a clock.
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Build a limiter over a bounded in-memory store.
    ///
    /// ```rust
    /// use std::sync::Arc;
    /// use gateway::domain::Identity;
    /// use gateway::domain::rate_limit::{EvictionPolicy, RateLimitPolicy, RateLimiter};
    ///
    /// let limiter = RateLimiter::in_memory(EvictionPolicy::default(), Arc::new(mockable::DefaultClock));
    /// let identity = Identity::new("u1").expect("identity");
    /// let policy = RateLimitPolicy::from_millis(60_000);
    /// assert!(limiter.check(&identity, &policy).expect("state").is_admitted());
    /// assert!(!limiter.check(&identity, &policy).expect("state").is_admitted());
    /// ```
    pub fn in_memory(eviction: EvictionPolicy, clock: Arc<dyn Clock>) -> Self {
        Self::with_store(Arc::new(InMemoryRateLimitStore::new(eviction)), clock)
    }

    /// Build a limiter over an injected store.
    pub fn with_store(store: Arc<dyn RateLimitStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Check `identity` against `policy`, recording the admission when
    /// allowed.
    ///
    /// # Errors
    ///
    /// Returns an error when the store's state is unavailable.
    pub fn check(
        &self,
        identity: &Identity,
        policy: &RateLimitPolicy,
    ) -> Result<RateLimitDecision, RateLimitStoreError> {
        self.store.try_admit(identity, policy, self.clock.utc())
    }

    /// Boolean form of [`Self::check`]: `true` when admitted.
    ///
    /// # Errors
    ///
    /// Returns an error when the store's state is unavailable.
    pub fn check_rate_limit(
        &self,
        identity: &Identity,
        min_interval: Duration,
        max_per_interval: u32,
    ) -> Result<bool, RateLimitStoreError> {
        let policy = RateLimitPolicy::new(min_interval).with_max_per_interval(max_per_interval);
        Ok(self.check(identity, &policy)?.is_admitted())
    }

    /// Evict stale entries now. Returns the number evicted.
    ///
    /// # Errors
    ///
    /// Returns an error when the store's state is unavailable.
    pub fn sweep(&self) -> Result<usize, RateLimitStoreError> {
        self.store.sweep(self.clock.utc())
    }

    /// Number of identities currently tracked.
    ///
    /// # Errors
    ///
    /// Returns an error when the store's state is unavailable.
    pub fn tracked_identities(&self) -> Result<usize, RateLimitStoreError> {
        self.store.tracked_identities()
    }
}
