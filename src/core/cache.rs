use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::core::error::Result;

/// Lifetime of an entry stored without an explicit TTL.
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Pluggable key/value backing store with optional per-entry expiry.
#[async_trait]
pub trait Cache<K, V>: Send + Sync
where
    K: Send + Sync,
    V: Clone + Send + Sync,
{
    /// Returns the value unless it is absent or expired.
    async fn get(&self, key: &K) -> Option<V>;

    async fn put(&self, key: K, value: V, ttl: Option<Duration>);

    async fn remove(&self, key: &K);

    async fn clear(&self);

    /// Drops every expired entry and returns how many were removed.
    async fn purge_expired(&self) -> usize;
}

/// Get-or-create front end over any string-keyed [`Cache`].
///
/// Concurrent misses on the same key are not deduplicated: each caller
/// runs its own factory and the last write wins.
pub struct CacheService<V>
where
    V: Clone + Send + Sync + 'static,
{
    store: Arc<dyn Cache<String, V>>,
    default_ttl: Duration,
}

impl<V> Clone for CacheService<V>
where
    V: Clone + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            default_ttl: self.default_ttl,
        }
    }
}

impl<V> CacheService<V>
where
    V: Clone + Send + Sync + 'static,
{
    pub fn new(store: Arc<dyn Cache<String, V>>) -> Self {
        Self {
            store,
            default_ttl: DEFAULT_TTL,
        }
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// Returns the cached value for `key`, or runs `factory` and caches a
    /// `Some` result for `ttl` (the default TTL when `None`).
    ///
    /// Factory errors propagate and nothing is stored. A `None` from the
    /// factory is returned as-is and is not cached. Each miss also sweeps
    /// expired entries, so keys that are never read again do not pile up.
    pub async fn get_or_create<F, Fut>(
        &self,
        key: &str,
        factory: F,
        ttl: Option<Duration>,
    ) -> Result<Option<V>>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<V>>>,
    {
        let key = key.to_string();
        if let Some(cached) = self.store.get(&key).await {
            debug!(%key, "Serving from cache");
            return Ok(Some(cached));
        }

        debug!(%key, "Cache miss, invoking factory");
        let purged = self.store.purge_expired().await;
        if purged > 0 {
            debug!(purged, "Swept expired cache entries");
        }
        let created = factory().await?;
        if let Some(value) = &created {
            self.store
                .put(key, value.clone(), Some(ttl.unwrap_or(self.default_ttl)))
                .await;
        }
        Ok(created)
    }

    pub async fn remove(&self, key: &str) {
        self.store.remove(&key.to_string()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::error::RateError;
    use crate::store::memory::MemoryCache;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn service() -> CacheService<i32> {
        CacheService::new(Arc::new(MemoryCache::<String, i32>::new()))
    }

    #[tokio::test]
    async fn test_factory_runs_once_within_ttl() {
        let cache = service();
        let calls = AtomicUsize::new(0);

        let first = cache
            .get_or_create(
                "answer",
                || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(Some(42))
                },
                Some(Duration::from_secs(60)),
            )
            .await
            .unwrap();
        let second = cache
            .get_or_create(
                "answer",
                || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(Some(7))
                },
                Some(Duration::from_secs(60)),
            )
            .await
            .unwrap();

        assert_eq!(first, Some(42));
        assert_eq!(second, Some(42));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_none_is_not_cached() {
        let cache = service();
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let value = cache
                .get_or_create(
                    "missing",
                    || async {
                        calls.fetch_add(1, Ordering::SeqCst);
                        Ok(None)
                    },
                    None,
                )
                .await
                .unwrap();
            assert_eq!(value, None);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_factory_error_is_not_cached() {
        let cache = service();

        let result = cache
            .get_or_create(
                "flaky",
                || async { Err(RateError::UpstreamUnavailable) },
                None,
            )
            .await;
        assert_eq!(result, Err(RateError::UpstreamUnavailable));

        let value = cache
            .get_or_create("flaky", || async { Ok(Some(1)) }, None)
            .await
            .unwrap();
        assert_eq!(value, Some(1));
    }

    #[tokio::test]
    async fn test_expired_entry_is_recomputed() {
        let cache = service();

        cache
            .get_or_create("short", || async { Ok(Some(1)) }, Some(Duration::from_millis(10)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        let value = cache
            .get_or_create("short", || async { Ok(Some(2)) }, None)
            .await
            .unwrap();
        assert_eq!(value, Some(2));
    }

    #[test]
    fn test_default_ttl_is_five_minutes() {
        assert_eq!(DEFAULT_TTL, Duration::from_secs(300));
    }

    #[tokio::test]
    async fn test_default_ttl_applies_without_explicit_ttl() {
        let cache = CacheService::new(Arc::new(MemoryCache::<String, i32>::new()))
            .with_default_ttl(Duration::from_millis(10));
        let calls = AtomicUsize::new(0);
        let factory = || async {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(Some(1))
        };

        cache.get_or_create("key", factory, None).await.unwrap();
        cache.get_or_create("key", factory, None).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        tokio::time::sleep(Duration::from_millis(20)).await;
        cache.get_or_create("key", factory, None).await.unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_miss_sweeps_expired_entries() {
        let store = Arc::new(MemoryCache::<String, i32>::new());
        let cache = CacheService::new(Arc::clone(&store) as Arc<dyn Cache<String, i32>>);

        cache
            .get_or_create("page_1", || async { Ok(Some(1)) }, Some(Duration::from_millis(10)))
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;

        cache
            .get_or_create("page_2", || async { Ok(Some(2)) }, None)
            .await
            .unwrap();
        // page_1 was never read again but is already gone
        assert_eq!(store.purge_expired().await, 0);
        assert_eq!(store.get(&"page_2".to_string()).await, Some(2));
    }

    #[tokio::test]
    async fn test_remove_evicts() {
        let cache = service();

        cache
            .get_or_create("key", || async { Ok(Some(1)) }, None)
            .await
            .unwrap();
        cache.remove("key").await;

        let value = cache
            .get_or_create("key", || async { Ok(Some(2)) }, None)
            .await
            .unwrap();
        assert_eq!(value, Some(2));
    }
}
