//! Per-request memoisation scoped through task-local storage.
//!
//! A cache exists only while [`RequestCache::scope`] is running and is
//! dropped when the scoped future completes. Tokio task-locals are not
//! inherited by spawned tasks; work spawned inside a scope sees no cache
//! unless it is wrapped in its own [`RequestCache::scope_with`].

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::{Arc, Mutex};

use tokio::task_local;
use tracing::trace;

task_local! {
    static REQUEST_CACHE: RequestCache;
}

/// Cache key: an operation name plus its serialised arguments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    operation: String,
    arguments: String,
}

impl CacheKey {
    pub fn new(operation: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            arguments: arguments.into(),
        }
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }
}

type CachedValue = Arc<dyn Any + Send + Sync>;

/// Handle to the active request's memoised values.
///
/// # Examples
/// ```
/// use gateway::domain::request_cache::{CacheKey, RequestCache};
///
/// # tokio::runtime::Runtime::new().expect("runtime").block_on(async {
/// let (first, second) = RequestCache::scope(async {
///     let key = CacheKey::new("users.get", "42");
///     let first = RequestCache::memoize(key.clone(), || async { 1 }).await;
///     let second = RequestCache::memoize(key, || async { 2 }).await;
///     (first, second)
/// })
/// .await;
/// assert_eq!((first, second), (1, 1));
/// # });
/// ```
#[derive(Clone, Default)]
pub struct RequestCache {
    entries: Arc<Mutex<HashMap<CacheKey, CachedValue>>>,
}

impl fmt::Debug for RequestCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let len = self.entries.lock().map_or(0, |entries| entries.len());
        f.debug_struct("RequestCache").field("entries", &len).finish()
    }
}

impl RequestCache {
    /// Run `fut` with a fresh, empty cache in scope.
    pub async fn scope<Fut>(fut: Fut) -> Fut::Output
    where
        Fut: Future,
    {
        Self::scope_with(Self::default(), fut).await
    }

    /// Run `fut` with `cache` in scope, sharing it with the caller.
    pub async fn scope_with<Fut>(cache: Self, fut: Fut) -> Fut::Output
    where
        Fut: Future,
    {
        REQUEST_CACHE.scope(cache, fut).await
    }

    /// The cache in scope, if any.
    #[must_use]
    pub fn current() -> Option<Self> {
        REQUEST_CACHE.try_with(Clone::clone).ok()
    }

    /// Whether a cache is in scope.
    #[must_use]
    pub fn is_active() -> bool {
        REQUEST_CACHE.try_with(|_| ()).is_ok()
    }

    /// Cached value for `key`, if present and of type `T`.
    pub fn lookup<T>(&self, key: &CacheKey) -> Option<T>
    where
        T: Clone + Send + Sync + 'static,
    {
        let entries = self.entries.lock().ok()?;
        entries
            .get(key)
            .and_then(|value| value.downcast_ref::<T>())
            .cloned()
    }

    /// Store `value` under `key`, replacing any previous value.
    pub fn store<T>(&self, key: CacheKey, value: T)
    where
        T: Send + Sync + 'static,
    {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key, Arc::new(value));
        }
    }

    /// Number of memoised values.
    pub fn len(&self) -> usize {
        self.entries.lock().map_or(0, |entries| entries.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the value cached under `key` in the active scope, or compute
    /// and cache it. Outside a scope `compute` always runs.
    ///
    /// Concurrent misses for one key may both compute; the last write wins.
    pub async fn memoize<T, F, Fut>(key: CacheKey, compute: F) -> T
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
    {
        Self::memoize_if(key, compute, |_| true).await
    }

    /// Like [`Self::memoize`] but only caches values accepted by `keep`.
    pub async fn memoize_if<T, F, Fut, P>(key: CacheKey, compute: F, keep: P) -> T
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = T>,
        P: FnOnce(&T) -> bool,
    {
        let Some(cache) = Self::current() else {
            return compute().await;
        };
        if let Some(hit) = cache.lookup::<T>(&key) {
            trace!(operation = %key.operation(), "request cache hit");
            return hit;
        }
        let value = compute().await;
        if keep(&value) {
            cache.store(key, value.clone());
        }
        value
    }
}
