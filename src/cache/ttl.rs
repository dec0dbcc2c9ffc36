//! Expiring memoization cache with single-flight computation per key

use crate::metrics;
use crate::Result;
use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;

/// Expiry and size limits for one cache
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CachePolicy {
    /// How long a computed value stays fresh
    pub ttl: Duration,

    /// Maximum number of live entries; the oldest is evicted first
    pub capacity: usize,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(300), // 5 minutes
            capacity: 1,
        }
    }
}

struct Entry<V> {
    value: V,
    inserted_at: Instant,
    /// `None` when the TTL runs past the clock's range
    expires_at: Option<Instant>,
}

impl<V> Entry<V> {
    fn is_fresh(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |expires_at| now < expires_at)
    }
}

/// Per-key expiring cache
///
/// `get_or_compute` returns a fresh value without touching `compute`, or runs
/// `compute` and stores its result for `ttl`. Concurrent callers for the same
/// key queue on a per-key gate, so at most one computation per key is in flight;
/// callers for different keys never wait on each other. Failed computations are
/// returned to the caller and leave the cache untouched.
pub struct TtlCache<K, V> {
    name: &'static str,
    policy: CachePolicy,
    entries: Mutex<HashMap<K, Entry<V>>>,
    gates: Mutex<HashMap<K, Arc<tokio::sync::Mutex<()>>>>,
}

/// Poisoning only means another caller panicked mid-update; the map itself is
/// still consistent because every critical section is a single insert/remove.
fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl<K, V> TtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create an empty cache. `name` labels metrics and log lines.
    pub fn new(name: &'static str, policy: CachePolicy) -> Self {
        Self {
            name,
            policy,
            entries: Mutex::new(HashMap::new()),
            gates: Mutex::new(HashMap::new()),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn policy(&self) -> CachePolicy {
        self.policy
    }

    /// Return the cached value for `key`, computing and storing it on a miss
    pub async fn get_or_compute<F, Fut>(&self, key: K, compute: F) -> Result<V>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V>>,
    {
        if let Some(value) = self.get(&key) {
            metrics::record_cache_hit(self.name);
            return Ok(value);
        }

        let gate = self.gate(&key);
        let result = {
            let _permit = gate.lock().await;

            // Whoever held the gate before us may have filled the entry.
            if let Some(value) = self.get(&key) {
                metrics::record_cache_hit(self.name);
                Ok(value)
            } else {
                metrics::record_cache_miss(self.name);
                let start = Instant::now();
                match compute().await {
                    Ok(value) => {
                        self.insert(key.clone(), value.clone());
                        tracing::debug!(
                            cache = self.name,
                            elapsed_ms = start.elapsed().as_millis() as u64,
                            "Cache refreshed"
                        );
                        Ok(value)
                    }
                    Err(e) => {
                        tracing::warn!(cache = self.name, error = %e, "Cache computation failed");
                        Err(e)
                    }
                }
            }
        };
        self.release_gate(&key, gate);

        result
    }

    /// Peek at a fresh value without computing. Expired entries are dropped.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut entries = lock(&self.entries);
        let now = Instant::now();

        match entries.get(key) {
            Some(entry) if entry.is_fresh(now) => Some(entry.value.clone()),
            Some(_) => {
                entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Drop the entry for `key`, forcing the next call to recompute
    pub fn invalidate(&self, key: &K) {
        lock(&self.entries).remove(key);
    }

    /// Number of stored entries, including ones that expired but were not yet dropped
    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert(&self, key: K, value: V) {
        if self.policy.capacity == 0 {
            return;
        }

        let mut entries = lock(&self.entries);
        let now = Instant::now();
        entries.retain(|_, entry| entry.is_fresh(now));

        if !entries.contains_key(&key) && entries.len() >= self.policy.capacity {
            let oldest = entries
                .iter()
                .min_by_key(|(_, entry)| entry.inserted_at)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                entries.remove(&oldest);
                tracing::trace!(cache = self.name, "Evicted oldest entry");
            }
        }

        entries.insert(
            key,
            Entry {
                value,
                inserted_at: now,
                expires_at: now.checked_add(self.policy.ttl),
            },
        );
    }

    fn gate(&self, key: &K) -> Arc<tokio::sync::Mutex<()>> {
        lock(&self.gates)
            .entry(key.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone()
    }

    /// Remove the gate once nobody else is queued on it
    fn release_gate(&self, key: &K, gate: Arc<tokio::sync::Mutex<()>>) {
        let mut gates = lock(&self.gates);
        // One reference in the map, one held here.
        if Arc::strong_count(&gate) <= 2 {
            gates.remove(key);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::IndexerError;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn policy(ttl_secs: u64, capacity: usize) -> CachePolicy {
        CachePolicy {
            ttl: Duration::from_secs(ttl_secs),
            capacity,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_ttl_never_expires() {
        let cache: TtlCache<(), u64> = TtlCache::new(
            "test",
            CachePolicy {
                ttl: Duration::MAX,
                capacity: 1,
            },
        );
        let calls = AtomicUsize::new(0);

        for _ in 0..2 {
            let value = cache
                .get_or_compute((), || async {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(1)
                })
                .await
                .unwrap();
            assert_eq!(value, 1);
            tokio::time::advance(Duration::from_secs(86_400 * 365)).await;
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_call_within_ttl_is_cached() {
        let cache: TtlCache<(), u64> = TtlCache::new("test", policy(300, 1));
        let calls = AtomicUsize::new(0);

        let first = cache
            .get_or_compute((), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(42)
            })
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(299)).await;

        let second = cache
            .get_or_compute((), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(99)
            })
            .await
            .unwrap();

        assert_eq!(first, 42);
        assert_eq!(second, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_recomputes_after_expiry() {
        let cache: TtlCache<(), u64> = TtlCache::new("test", policy(300, 1));
        let calls = AtomicUsize::new(0);

        cache
            .get_or_compute((), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(1)
            })
            .await
            .unwrap();

        tokio::time::advance(Duration::from_secs(301)).await;
        assert!(cache.get(&()).is_none());

        let value = cache
            .get_or_compute((), || async {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(2)
            })
            .await
            .unwrap();

        assert_eq!(value, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_failure_is_not_cached() {
        let cache: TtlCache<(), u64> = TtlCache::new("test", policy(300, 1));

        let result = cache
            .get_or_compute((), || async {
                Err(IndexerError::UpstreamUnavailable("down".to_string()))
            })
            .await;
        assert!(result.is_err());
        assert!(cache.is_empty());

        let value = cache.get_or_compute((), || async { Ok(7) }).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_does_not_refresh_expired_entry() {
        let cache: TtlCache<(), u64> = TtlCache::new("test", policy(10, 1));
        cache.get_or_compute((), || async { Ok(5) }).await.unwrap();

        tokio::time::advance(Duration::from_secs(11)).await;

        let result = cache
            .get_or_compute((), || async { Err(IndexerError::Upstream("bad".to_string())) })
            .await;
        assert!(result.is_err());
        assert!(cache.get(&()).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_callers_share_one_computation() {
        let cache: TtlCache<(), u64> = TtlCache::new("test", policy(300, 1));
        let calls = AtomicUsize::new(0);
        let (cache, calls) = (&cache, &calls);

        let callers = (0..16).map(move |_| {
            cache.get_or_compute((), move || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(50)).await;
                Ok(1234)
            })
        });
        let results = futures::future::join_all(callers).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(results.into_iter().all(|r| r.unwrap() == 1234));
    }

    #[tokio::test]
    async fn test_distinct_keys_do_not_block_each_other() {
        let cache: Arc<TtlCache<u8, u64>> = Arc::new(TtlCache::new("test", policy(300, 4)));
        let release = Arc::new(tokio::sync::Notify::new());

        let slow = {
            let cache = cache.clone();
            let release = release.clone();
            tokio::spawn(async move {
                cache
                    .get_or_compute(1, || async move {
                        release.notified().await;
                        Ok(1)
                    })
                    .await
            })
        };
        tokio::task::yield_now().await;

        // Key 2 must complete while key 1 is still computing.
        let fast = tokio::time::timeout(
            Duration::from_secs(5),
            cache.get_or_compute(2, || async { Ok(2) }),
        )
        .await
        .expect("key 2 blocked behind key 1")
        .unwrap();
        assert_eq!(fast, 2);

        release.notify_one();
        assert_eq!(slow.await.unwrap().unwrap(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_capacity_evicts_oldest() {
        let cache: TtlCache<u8, u64> = TtlCache::new("test", policy(300, 2));

        cache.get_or_compute(1, || async { Ok(10) }).await.unwrap();
        tokio::time::advance(Duration::from_secs(1)).await;
        cache.get_or_compute(2, || async { Ok(20) }).await.unwrap();
        tokio::time::advance(Duration::from_secs(1)).await;
        cache.get_or_compute(3, || async { Ok(30) }).await.unwrap();

        assert_eq!(cache.len(), 2);
        assert!(cache.get(&1).is_none());
        assert_eq!(cache.get(&2), Some(20));
        assert_eq!(cache.get(&3), Some(30));
    }

    #[tokio::test]
    async fn test_invalidate_forces_recompute() {
        let cache: TtlCache<(), u64> = TtlCache::new("test", policy(300, 1));
        cache.get_or_compute((), || async { Ok(1) }).await.unwrap();

        cache.invalidate(&());

        let value = cache.get_or_compute((), || async { Ok(2) }).await.unwrap();
        assert_eq!(value, 2);
    }
}
