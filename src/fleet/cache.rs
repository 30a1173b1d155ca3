//! Get-or-create cache primitive with at-most-once construction per key.
//!
//! [`CacheMap`] is a mutex-guarded map of per-key once-cells. The map lock is
//! held only to resolve the slot, never across construction, so a slow build
//! for one key does not serialize access to other keys. Concurrent first
//! lookups for the same key all wait on the same cell and observe exactly one
//! underlying construction; a failed construction leaves the slot empty so the
//! next caller retries.

use std::collections::HashMap;
use std::future::Future;
use std::hash::Hash;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};

pub struct CacheMap<K, V> {
    slots: Mutex<HashMap<K, Arc<OnceCell<V>>>>,
}

impl<K, V> Default for CacheMap<K, V> {
    fn default() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }
}

impl<K, V> CacheMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Return the cached value for `key`, constructing it with `build` if
    /// absent. At most one construction runs per key; other callers wait for
    /// its outcome.
    pub async fn get_or_try_create<F, Fut, E>(&self, key: &K, build: F) -> Result<V, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<V, E>>,
    {
        let cell = {
            let mut slots = self.slots.lock().await;
            slots
                .entry(key.clone())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };
        cell.get_or_try_init(build).await.map(|value| value.clone())
    }

    /// The cached value for `key`, if one was already constructed.
    pub async fn get(&self, key: &K) -> Option<V> {
        let slots = self.slots.lock().await;
        slots.get(key).and_then(|cell| cell.get().cloned())
    }

    pub async fn contains(&self, key: &K) -> bool {
        self.get(key).await.is_some()
    }

    /// Remove one slot, returning its value if it was constructed.
    pub async fn remove(&self, key: &K) -> Option<V> {
        let mut slots = self.slots.lock().await;
        slots.remove(key).and_then(|cell| cell.get().cloned())
    }

    /// Remove every slot whose key matches the predicate, returning the
    /// constructed values.
    pub async fn remove_matching<P>(&self, mut predicate: P) -> Vec<(K, V)>
    where
        P: FnMut(&K) -> bool,
    {
        let mut slots = self.slots.lock().await;
        let matching: Vec<K> = slots
            .keys()
            .filter(|key| predicate(key))
            .cloned()
            .collect();
        matching
            .into_iter()
            .filter_map(|key| {
                let cell = slots.remove(&key)?;
                cell.get().cloned().map(|value| (key, value))
            })
            .collect()
    }

    /// Remove every slot, returning the constructed values.
    pub async fn drain(&self) -> Vec<(K, V)> {
        let mut slots = self.slots.lock().await;
        slots
            .drain()
            .filter_map(|(key, cell)| cell.get().cloned().map(|value| (key, value)))
            .collect()
    }

    pub async fn len(&self) -> usize {
        self.slots.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.slots.lock().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_constructs_once_per_key() {
        let cache: CacheMap<String, usize> = CacheMap::new();
        let built = AtomicUsize::new(0);

        for _ in 0..3 {
            let value = cache
                .get_or_try_create(&"a".to_string(), || async {
                    built.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, ()>(7)
                })
                .await
                .unwrap();
            assert_eq!(value, 7);
        }
        assert_eq!(built.load(Ordering::SeqCst), 1);

        cache
            .get_or_try_create(&"b".to_string(), || async {
                built.fetch_add(1, Ordering::SeqCst);
                Ok::<_, ()>(8)
            })
            .await
            .unwrap();
        assert_eq!(built.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_concurrent_first_access() {
        let cache: Arc<CacheMap<String, u32>> = Arc::new(CacheMap::new());
        let built = Arc::new(AtomicUsize::new(0));

        let mut handles = Vec::new();
        for _ in 0..16 {
            let cache = cache.clone();
            let built = built.clone();
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_try_create(&"shared".to_string(), || async move {
                        built.fetch_add(1, Ordering::SeqCst);
                        tokio::task::yield_now().await;
                        Ok::<_, ()>(42)
                    })
                    .await
                    .unwrap()
            }));
        }

        for handle in handles {
            assert_eq!(handle.await.unwrap(), 42);
        }
        assert_eq!(built.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_construction_is_retryable() {
        let cache: CacheMap<String, u32> = CacheMap::new();
        let key = "flaky".to_string();

        let failed: Result<u32, String> = cache
            .get_or_try_create(&key, || async { Err("unreachable".to_string()) })
            .await;
        assert!(failed.is_err());
        assert!(cache.get(&key).await.is_none());

        let value = cache
            .get_or_try_create(&key, || async { Ok::<_, String>(1) })
            .await
            .unwrap();
        assert_eq!(value, 1);
    }

    #[tokio::test]
    async fn test_remove_matching_is_scoped() {
        let cache: CacheMap<(String, String), u32> = CacheMap::new();
        for (cluster, connect, value) in [("a", "x", 1), ("a", "y", 2), ("b", "x", 3)] {
            cache
                .get_or_try_create(&(cluster.to_string(), connect.to_string()), || async move {
                    Ok::<_, ()>(value)
                })
                .await
                .unwrap();
        }

        let removed = cache.remove_matching(|(cluster, _)| cluster == "a").await;
        assert_eq!(removed.len(), 2);
        assert_eq!(cache.len().await, 1);
        assert!(cache
            .contains(&("b".to_string(), "x".to_string()))
            .await);
    }
}
