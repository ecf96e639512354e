//! Concurrency-safe per-key state storage.

use std::borrow::Borrow;
use std::hash::Hash;

use dashmap::DashMap;

/// A sharded map from identity key to algorithm-specific state.
///
/// Each limiter instance owns exactly one store; callers never touch the
/// state directly. State for an unseen key is created lazily inside the
/// same critical section as the first admission check, so two threads
/// racing on a brand-new key cannot create divergent entries.
#[derive(Debug)]
pub struct KeyedStore<K, S>
where
    K: Eq + Hash,
{
    entries: DashMap<K, S>,
}

impl<K, S> KeyedStore<K, S>
where
    K: Eq + Hash,
{
    /// Create an empty store.
    pub fn new() -> Self {
        Self {
            entries: DashMap::new(),
        }
    }

    /// Run a read-modify-write closure against the state for `key`,
    /// initializing it with `init` if the key has not been seen before.
    ///
    /// The closure runs while the entry's shard lock is held: operations on
    /// the same key are serialized, operations on keys in other shards
    /// proceed concurrently.
    pub fn with_entry<R>(
        &self,
        key: K,
        init: impl FnOnce() -> S,
        f: impl FnOnce(&K, &mut S) -> R,
    ) -> R {
        let mut entry = self.entries.entry(key).or_insert_with(init);
        let (key, state) = entry.pair_mut();
        f(key, state)
    }

    /// Run a read-only closure against the state for `key`, if any.
    ///
    /// Unlike [`with_entry`](Self::with_entry), an unseen key creates no
    /// state; observers use this so that only admission checks populate
    /// the store.
    pub fn read_entry<Q, R>(&self, key: &Q, f: impl FnOnce(&S) -> R) -> Option<R>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.entries.get(key).map(|entry| f(entry.value()))
    }

    /// Number of keys with tracked state.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether any key has tracked state.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop all per-key state. Primarily useful for tests and admin resets.
    pub fn clear(&self) {
        self.entries.clear();
    }
}

impl<K, S> Default for KeyedStore<K, S>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}
