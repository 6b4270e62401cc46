//! Read-through keyed cache guarded by a read/write lock.
//!
//! Used for the subdomain → tenant map and the per-tenant identity client map.
//! Readers take the read lock; a miss constructs the value outside the lock and
//! then re-checks under the write lock so concurrent misses converge on a single
//! stored value. Entries never expire; callers evict explicitly.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{PoisonError, RwLock};

/// Explicitly owned cache (no process-global instance).
#[derive(Debug)]
pub struct KeyedCache<K, V> {
    inner: RwLock<HashMap<K, V>>,
}

impl<K, V> KeyedCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let map = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        map.get(key).cloned()
    }

    /// Return the cached value or build and store one.
    ///
    /// `build` runs without holding any lock. If another caller stored a value
    /// for `key` in the meantime, that value wins and is returned.
    pub fn get_or_try_insert_with<E, F>(&self, key: K, build: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        if let Some(v) = self.get(&key) {
            return Ok(v);
        }
        let built = build()?;
        Ok(self.insert_if_absent(key, built))
    }

    /// Store `value` unless an entry already exists; return the stored entry.
    ///
    /// This is the write half of the double-checked pattern for values that are
    /// loaded asynchronously by the caller.
    pub fn insert_if_absent(&self, key: K, value: V) -> V {
        let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        map.entry(key).or_insert(value).clone()
    }

    /// Evict one entry. Returns the evicted value, if any.
    pub fn invalidate(&self, key: &K) -> Option<V> {
        let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        map.remove(key)
    }

    /// Evict every entry whose value matches `pred`.
    pub fn invalidate_where<F>(&self, mut pred: F) -> usize
    where
        F: FnMut(&K, &V) -> bool,
    {
        let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        let before = map.len();
        map.retain(|k, v| !pred(k, v));
        before - map.len()
    }

    pub fn clear(&self) {
        let mut map = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        map.clear();
    }

    pub fn len(&self) -> usize {
        self.inner.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V> Default for KeyedCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[test]
    fn miss_builds_once_then_hits() {
        let cache: KeyedCache<String, u32> = KeyedCache::new();
        let calls = AtomicUsize::new(0);

        for _ in 0..3 {
            let v = cache
                .get_or_try_insert_with("a".to_string(), || {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok::<_, ()>(7)
                })
                .unwrap();
            assert_eq!(v, 7);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failed_build_is_not_cached() {
        let cache: KeyedCache<&'static str, u32> = KeyedCache::new();
        assert!(cache.get_or_try_insert_with("a", || Err::<u32, _>("boom")).is_err());
        assert!(cache.get(&"a").is_none());
    }

    #[test]
    fn first_writer_wins_on_race() {
        let cache: KeyedCache<&'static str, u32> = KeyedCache::new();
        assert_eq!(cache.insert_if_absent("k", 1), 1);
        assert_eq!(cache.insert_if_absent("k", 2), 1);
    }

    #[test]
    fn invalidate_removes_entry() {
        let cache: KeyedCache<&'static str, u32> = KeyedCache::new();
        cache.insert_if_absent("k", 1);
        cache.insert_if_absent("j", 2);
        assert_eq!(cache.invalidate(&"k"), Some(1));
        assert_eq!(cache.invalidate_where(|_, v| *v == 2), 1);
        assert!(cache.is_empty());
    }

    #[test]
    fn concurrent_misses_converge() {
        let cache: Arc<KeyedCache<u32, usize>> = Arc::new(KeyedCache::new());
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let cache = cache.clone();
                std::thread::spawn(move || cache.get_or_try_insert_with(1, || Ok::<_, ()>(i)).unwrap())
            })
            .collect();
        let seen: Vec<usize> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        assert!(seen.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(cache.len(), 1);
    }
}
