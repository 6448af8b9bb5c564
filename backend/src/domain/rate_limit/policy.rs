//! Admission policy for one identity.
//!
//! Pure state transitions with no locking or clock access; the store wraps
//! them in its lock and feeds in the current instant.

use std::collections::VecDeque;
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};

/// Minimum spacing between admitted calls for one identity.
///
/// # Examples
/// ```
/// use gateway::domain::rate_limit::RateLimitPolicy;
/// use std::time::Duration;
///
/// let policy = RateLimitPolicy::from_millis(500);
/// assert_eq!(policy.min_interval(), Duration::from_millis(500));
/// assert_eq!(policy.max_per_interval(), 1);
///
/// let burst = policy.with_max_per_interval(0);
/// assert_eq!(burst.max_per_interval(), 1, "clamped to at least one call");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    min_interval: Duration,
    max_per_interval: u32,
}

impl RateLimitPolicy {
    /// One admitted call per `min_interval`.
    pub const fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            max_per_interval: 1,
        }
    }

    /// One admitted call per `millis` milliseconds.
    pub const fn from_millis(millis: u64) -> Self {
        Self::new(Duration::from_millis(millis))
    }

    /// Allow up to `max` admitted calls per window (at least one).
    #[must_use]
    pub fn with_max_per_interval(mut self, max: u32) -> Self {
        self.max_per_interval = max.max(1);
        self
    }

    /// Window length.
    pub const fn min_interval(&self) -> Duration {
        self.min_interval
    }

    /// Admitted calls allowed per window.
    pub const fn max_per_interval(&self) -> u32 {
        self.max_per_interval
    }

    fn window(&self) -> TimeDelta {
        TimeDelta::from_std(self.min_interval).unwrap_or(TimeDelta::MAX)
    }
}

impl Default for RateLimitPolicy {
    fn default() -> Self {
        Self::from_millis(1_000)
    }
}

/// Outcome of one rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    /// The call may proceed; its admission was recorded.
    Admitted,
    /// The call must not proceed; state was left untouched.
    Rejected {
        /// Time until the oldest admission in the window expires.
        retry_after: Duration,
    },
}

impl RateLimitDecision {
    /// Whether the call was admitted.
    pub fn is_admitted(&self) -> bool {
        matches!(self, Self::Admitted)
    }
}

/// Recent admission instants for one identity, oldest first.
#[derive(Debug, Clone)]
pub struct RateLimitEntry {
    admissions: VecDeque<DateTime<Utc>>,
    window: TimeDelta,
}

impl Default for RateLimitEntry {
    fn default() -> Self {
        Self {
            admissions: VecDeque::new(),
            window: TimeDelta::zero(),
        }
    }
}

impl RateLimitEntry {
    /// Check `policy` at `now` and record the admission when allowed.
    pub fn try_admit(&mut self, now: DateTime<Utc>, policy: &RateLimitPolicy) -> RateLimitDecision {
        let window = policy.window();
        self.window = window;
        while self
            .admissions
            .front()
            .is_some_and(|admitted_at| now - *admitted_at >= window)
        {
            self.admissions.pop_front();
        }

        let capacity = usize::try_from(policy.max_per_interval()).unwrap_or(usize::MAX);
        if self.admissions.len() < capacity {
            self.admissions.push_back(now);
            return RateLimitDecision::Admitted;
        }

        let retry_after = self
            .admissions
            .front()
            .and_then(|oldest| window.checked_sub(&(now - *oldest)))
            .and_then(|remaining| remaining.to_std().ok())
            .unwrap_or(policy.min_interval());
        RateLimitDecision::Rejected { retry_after }
    }

    /// Most recent admission, if any.
    pub fn last_admitted_at(&self) -> Option<DateTime<Utc>> {
        self.admissions.back().copied()
    }

    /// Time until every recorded admission leaves the window. Zero once
    /// the entry no longer restricts its identity.
    pub fn released_in(&self, now: DateTime<Utc>) -> Duration {
        self.last_admitted_at()
            .and_then(|last| self.window.checked_sub(&(now - last)))
            .and_then(|remaining| remaining.to_std().ok())
            .unwrap_or(Duration::ZERO)
    }

    /// Whether the entry is idle for at least `idle_multiplier` windows and
    /// can be dropped without changing any future decision.
    pub fn is_stale(&self, now: DateTime<Utc>, idle_multiplier: u32) -> bool {
        let Some(last) = self.last_admitted_at() else {
            return true;
        };
        let idle_limit = self
            .window
            .checked_mul(i32::try_from(idle_multiplier.max(1)).unwrap_or(i32::MAX))
            .unwrap_or(TimeDelta::MAX);
        now - last >= idle_limit
    }
}
