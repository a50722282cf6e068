//! Lock-protected map shared by the player and room stores.

use std::collections::HashMap;
use std::hash::Hash;

use parking_lot::RwLock;

/// A concurrent map. Each operation takes the lock once, so readers never
/// see a partial write. It enforces no invariants about its contents.
#[derive(Debug)]
pub struct Store<K, V> {
    inner: RwLock<HashMap<K, V>>,
}

impl<K, V> Default for Store<K, V> {
    fn default() -> Self {
        Self {
            inner: RwLock::new(HashMap::new()),
        }
    }
}

impl<K: Eq + Hash + Clone, V: Clone> Store<K, V> {
    /// Empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of the value under `key`.
    pub fn get(&self, key: &K) -> Option<V> {
        self.inner.read().get(key).cloned()
    }

    /// Whether `key` is present.
    pub fn contains(&self, key: &K) -> bool {
        self.inner.read().contains_key(key)
    }

    /// Insert or replace. Returns the previous value.
    pub fn set(&self, key: K, value: V) -> Option<V> {
        self.inner.write().insert(key, value)
    }

    /// Remove `key`. Returns the removed value.
    pub fn delete(&self, key: &K) -> Option<V> {
        self.inner.write().remove(key)
    }

    /// Number of entries.
    pub fn count(&self) -> usize {
        self.inner.read().len()
    }

    /// Visit every entry under one read lock.
    ///
    /// The visitor sees a point-in-time view; it must not call back into
    /// this store's write operations.
    pub fn for_each(&self, mut visitor: impl FnMut(&K, &V)) {
        let guard = self.inner.read();
        for (k, v) in guard.iter() {
            visitor(k, v);
        }
    }

    /// Copy every entry out.
    pub fn snapshot(&self) -> Vec<(K, V)> {
        self.inner
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Mutate the value under `key` in place. Returns `false` if absent.
    pub fn update(&self, key: &K, f: impl FnOnce(&mut V)) -> bool {
        match self.inner.write().get_mut(key) {
            Some(v) => {
                f(v);
                true
            }
            None => false,
        }
    }
}
