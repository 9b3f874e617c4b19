//! Thread-safe associative container backing every node of the tree.
//!
//! [`ConcurrentMap`] wraps a `HashMap` in a `RwLock`. Every operation takes
//! the lock for its full duration, so single-key operations are atomic and
//! iteration only ever sees whole entries. The backing map is never handed
//! out; iteration goes through [`ConcurrentMap::snapshot`],
//! [`ConcurrentMap::values`] or [`ConcurrentMap::for_each`].

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::RwLock;

/// A `HashMap` behind a `RwLock`.
pub struct ConcurrentMap<K, V> {
    inner: RwLock<HashMap<K, V>>,
}

impl<K, V> ConcurrentMap<K, V>
where
    K: Eq + Hash,
{
    /// Create a new empty map.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }

    /// Insert or overwrite `key`, returning the previous value if any.
    pub fn set(&self, key: K, value: V) -> Option<V> {
        self.inner.write().expect("lock poisoned").insert(key, value)
    }

    /// Remove `key`, returning the removed value. No-op if absent.
    pub fn delete<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.inner.write().expect("lock poisoned").remove(key)
    }

    /// Whether `key` is present.
    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.inner.read().expect("lock poisoned").contains_key(key)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.inner.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the map is empty.
    pub fn is_empty(&self) -> bool {
        self.inner.read().expect("lock poisoned").is_empty()
    }

    /// Remove every entry.
    pub fn clear(&self) {
        self.inner.write().expect("lock poisoned").clear();
    }

    /// Visit every entry while holding the read lock.
    ///
    /// Writers block until the traversal finishes. `f` must not call back
    /// into a writing method of the same map.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&K, &V),
    {
        let map = self.inner.read().expect("lock poisoned");
        for (k, v) in map.iter() {
            f(k, v);
        }
    }
}

impl<K, V> ConcurrentMap<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Clone out the value stored under `key`.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.inner.read().expect("lock poisoned").get(key).cloned()
    }

    /// Return the value under `key`, inserting `make()` first if absent.
    ///
    /// The lookup and the insert happen under one write lock, so two
    /// concurrent callers always get the same value back and `make` runs
    /// at most once per insert.
    pub fn get_or_insert_with<F>(&self, key: K, make: F) -> V
    where
        F: FnOnce() -> V,
    {
        if let Some(existing) = self.get(&key) {
            return existing;
        }
        let mut map = self.inner.write().expect("lock poisoned");
        map.entry(key).or_insert_with(make).clone()
    }

    /// Point-in-time copy of all values, order unspecified.
    pub fn values(&self) -> Vec<V> {
        self.inner
            .read()
            .expect("lock poisoned")
            .values()
            .cloned()
            .collect()
    }

    /// Point-in-time copy of all keys, order unspecified.
    pub fn keys(&self) -> Vec<K> {
        self.inner
            .read()
            .expect("lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    /// Point-in-time copy of all entries, order unspecified.
    pub fn snapshot(&self) -> Vec<(K, V)> {
        self.inner
            .read()
            .expect("lock poisoned")
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }
}

impl<K, V> Default for ConcurrentMap<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> std::fmt::Debug for ConcurrentMap<K, V>
where
    K: Eq + Hash,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConcurrentMap")
            .field("len", &self.len())
            .finish()
    }
}
