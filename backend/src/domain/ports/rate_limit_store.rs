//! Driven port for the per-identity rate-limit state.

use chrono::{DateTime, Utc};

use super::define_port_error;
use crate::domain::Identity;
use crate::domain::rate_limit::{RateLimitDecision, RateLimitPolicy};

define_port_error! {
    /// Errors raised by rate-limit stores.
    pub enum RateLimitStoreError {
        /// The backing state cannot be read or updated.
        StateUnavailable { message: String } =>
            "rate limit state unavailable: {message}",
    }
}

/// Storage for rate-limit entries keyed by identity.
///
/// `try_admit` must perform the check and the update as one atomic step:
/// two concurrent calls for the same identity inside one window must never
/// both be admitted.
pub trait RateLimitStore: Send + Sync {
    /// Decide whether `identity` may proceed at `now` and record the
    /// admission when it may.
    fn try_admit(
        &self,
        identity: &Identity,
        policy: &RateLimitPolicy,
        now: DateTime<Utc>,
    ) -> Result<RateLimitDecision, RateLimitStoreError>;

    /// Evict entries that can no longer influence a decision. Returns the
    /// number of evicted identities.
    fn sweep(&self, now: DateTime<Utc>) -> Result<usize, RateLimitStoreError>;

    /// Number of identities currently tracked.
    fn tracked_identities(&self) -> Result<usize, RateLimitStoreError>;
}
