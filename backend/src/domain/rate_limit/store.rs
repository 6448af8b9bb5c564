//! Bounded in-memory rate-limit store.
//!
//! Eviction policy:
//! - an entry is stale once its newest admission is `idle_multiplier`
//!   windows old; stale entries can never influence a decision again;
//! - stale entries are swept every `sweep_every` admissions and whenever a
//!   new identity would exceed `max_identities`;
//! - if the store is still full after a sweep, the least recently admitted
//!   entry whose window has fully elapsed is evicted;
//! - an entry still inside its window is never evicted, so when every
//!   tracked identity is active the new identity is rejected until the
//!   soonest window elapses.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use super::policy::{RateLimitDecision, RateLimitEntry, RateLimitPolicy};
use crate::domain::Identity;
use crate::domain::ports::{RateLimitStore, RateLimitStoreError};

/// Limits keeping the store's memory bounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EvictionPolicy {
    /// Maximum identities tracked at once. New identities are rejected while
    /// the store is full of identities still inside their windows.
    pub max_identities: usize,
    /// Idle windows after which an entry is stale.
    pub idle_multiplier: u32,
    /// Admissions between periodic sweeps.
    pub sweep_every: u32,
}

impl Default for EvictionPolicy {
    fn default() -> Self {
        Self {
            max_identities: 10_000,
            idle_multiplier: 4,
            sweep_every: 256,
        }
    }
}

#[derive(Debug, Default)]
struct StoreState {
    entries: HashMap<Identity, RateLimitEntry>,
    admissions_since_sweep: u32,
}

impl StoreState {
    fn sweep(&mut self, now: DateTime<Utc>, idle_multiplier: u32) -> usize {
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| !entry.is_stale(now, idle_multiplier));
        self.admissions_since_sweep = 0;
        before - self.entries.len()
    }

    /// Drop the least recently admitted entry that no longer restricts its
    /// identity. Returns `false` when every entry is still inside its window.
    fn evict_least_recent(&mut self, now: DateTime<Utc>) -> bool {
        let oldest = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.released_in(now).is_zero())
            .min_by_key(|(_, entry)| entry.last_admitted_at())
            .map(|(identity, _)| identity.clone());
        let Some(identity) = oldest else {
            return false;
        };
        debug!(identity = %identity.fingerprint(), "evicting least recently admitted identity");
        self.entries.remove(&identity);
        true
    }

    fn soonest_release(&self, now: DateTime<Utc>) -> Duration {
        self.entries
            .values()
            .map(|entry| entry.released_in(now))
            .min()
            .unwrap_or(Duration::ZERO)
    }
}

/// Process-local store guarded by one mutex.
///
/// # Examples
/// ```
/// use chrono::Utc;
/// use gateway::domain::Identity;
/// use gateway::domain::ports::RateLimitStore;
/// use gateway::domain::rate_limit::{InMemoryRateLimitStore, RateLimitPolicy};
///
/// let store = InMemoryRateLimitStore::default();
/// let identity = Identity::new("u1").expect("identity");
/// let policy = RateLimitPolicy::from_millis(500);
/// let now = Utc::now();
///
/// assert!(store.try_admit(&identity, &policy, now).expect("state").is_admitted());
/// assert!(!store.try_admit(&identity, &policy, now).expect("state").is_admitted());
/// ```
#[derive(Debug, Default)]
pub struct InMemoryRateLimitStore {
    eviction: EvictionPolicy,
    state: Mutex<StoreState>,
}

impl InMemoryRateLimitStore {
    /// Create a store with an explicit eviction policy.
    pub fn new(eviction: EvictionPolicy) -> Self {
        Self {
            eviction: EvictionPolicy {
                max_identities: eviction.max_identities.max(1),
                idle_multiplier: eviction.idle_multiplier.max(1),
                sweep_every: eviction.sweep_every.max(1),
            },
            state: Mutex::new(StoreState::default()),
        }
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, StoreState>, RateLimitStoreError> {
        self.state
            .lock()
            .map_err(|_| RateLimitStoreError::state_unavailable("rate limit state poisoned"))
    }
}

impl RateLimitStore for InMemoryRateLimitStore {
    fn try_admit(
        &self,
        identity: &Identity,
        policy: &RateLimitPolicy,
        now: DateTime<Utc>,
    ) -> Result<RateLimitDecision, RateLimitStoreError> {
        let mut state = self.lock_state()?;

        if !state.entries.contains_key(identity)
            && state.entries.len() >= self.eviction.max_identities
        {
            let swept = state.sweep(now, self.eviction.idle_multiplier);
            debug!(swept, "rate limit store at capacity; swept stale entries");
            if state.entries.len() >= self.eviction.max_identities
                && !state.evict_least_recent(now)
            {
                let retry_after = state.soonest_release(now);
                warn!(
                    tracked = state.entries.len(),
                    retry_after_ms = u64::try_from(retry_after.as_millis()).unwrap_or(u64::MAX),
                    "rate limit store full of active identities; rejecting new identity"
                );
                return Ok(RateLimitDecision::Rejected { retry_after });
            }
        }

        let decision = state
            .entries
            .entry(identity.clone())
            .or_default()
            .try_admit(now, policy);

        if decision.is_admitted() {
            state.admissions_since_sweep = state.admissions_since_sweep.saturating_add(1);
            if state.admissions_since_sweep >= self.eviction.sweep_every {
                state.sweep(now, self.eviction.idle_multiplier);
            }
        }
        Ok(decision)
    }

    fn sweep(&self, now: DateTime<Utc>) -> Result<usize, RateLimitStoreError> {
        let mut state = self.lock_state()?;
        Ok(state.sweep(now, self.eviction.idle_multiplier))
    }

    fn tracked_identities(&self) -> Result<usize, RateLimitStoreError> {
        Ok(self.lock_state()?.entries.len())
    }
}
