//! Deadline enforcement for asynchronous operations.
//!
//! The operation runs as its own tokio task and the caller races the task
//! handle against the budget. On expiry the task is detached, not aborted:
//! it keeps running and may still produce side effects. Callers must treat a
//! timeout as "outcome unknown", never as "did not happen".

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio::task::JoinError;

/// Why a guarded operation produced no value.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeoutError {
    /// The budget elapsed before the operation settled.
    #[error("operation exceeded its {budget:?} budget")]
    Elapsed { budget: Duration },
    /// The operation's task panicked or was cancelled by the runtime.
    #[error("operation failed before completing: {message}")]
    Panicked { message: String },
}

impl TimeoutError {
    fn from_join(error: JoinError) -> Self {
        let message = if error.is_panic() {
            let payload = error.into_panic();
            payload
                .downcast_ref::<&str>()
                .map(|text| (*text).to_owned())
                .or_else(|| payload.downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "task panicked".to_owned())
        } else {
            error.to_string()
        };
        Self::Panicked { message }
    }
}

/// Run `operation` with at most `budget` of wall-clock time.
///
/// Must be called from within a tokio runtime.
///
/// # Errors
///
/// Returns [`TimeoutError::Elapsed`] when the budget runs out first and
/// [`TimeoutError::Panicked`] when the operation's task panics.
///
/// # Examples
/// ```
/// use std::time::Duration;
/// use gateway::domain::timeout::with_timeout;
///
/// # tokio::runtime::Runtime::new().expect("runtime").block_on(async {
/// let value = with_timeout(async { 7 }, Duration::from_secs(1)).await;
/// assert_eq!(value, Ok(7));
/// # });
/// ```
pub async fn with_timeout<F>(operation: F, budget: Duration) -> Result<F::Output, TimeoutError>
where
    F: Future + Send + 'static,
    F::Output: Send + 'static,
{
    let handle = tokio::spawn(operation);
    match tokio::time::timeout(budget, handle).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(join_error)) => Err(TimeoutError::from_join(join_error)),
        Err(_) => Err(TimeoutError::Elapsed { budget }),
    }
}
