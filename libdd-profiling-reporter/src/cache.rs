// Copyright 2025-Present Datadog, Inc. https://www.datadoghq.com/
// SPDX-License-Identifier: Apache-2.0

//! A fixed-capacity, least-recently-used, thread-safe key/value store.
//!
//! Every piece of state the reporter keeps between report intervals lives in
//! one of these. Eviction is silent: a dropped entry simply turns into an
//! "UNKNOWN" placeholder further down the pipeline.

use crate::error::CacheError;
use lru::LruCache;
use parking_lot::Mutex;
use std::hash::{BuildHasherDefault, Hash};
use std::num::NonZeroUsize;
use std::time::Duration;
use tokio::time::Instant;

type Hasher = BuildHasherDefault<rustc_hash::FxHasher>;

#[derive(Clone, Debug)]
struct Entry<V> {
    value: V,
    expires_at: Option<Instant>,
}

impl<V> Entry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| deadline <= now)
    }
}

pub struct BoundedCache<K, V> {
    inner: Mutex<LruCache<K, Entry<V>, Hasher>>,
}

impl<K: Hash + Eq + Clone, V: Clone> BoundedCache<K, V> {
    pub fn new(capacity: u32) -> Result<Self, CacheError> {
        let capacity = usize::try_from(capacity)
            .ok()
            .and_then(NonZeroUsize::new)
            .ok_or(CacheError::ZeroCapacity)?;
        Ok(Self {
            inner: Mutex::new(LruCache::with_hasher(capacity, Hasher::default())),
        })
    }

    /// Inserts or overwrites `key`, evicting the least recently used entry
    /// if the cache is full.
    pub fn add(&self, key: K, value: V) {
        self.inner.lock().put(
            key,
            Entry {
                value,
                expires_at: None,
            },
        );
    }

    /// Like [`BoundedCache::add`], but the entry disappears once `lifetime`
    /// has elapsed.
    pub fn add_with_lifetime(&self, key: K, value: V, lifetime: Duration) {
        self.inner.lock().put(
            key,
            Entry {
                value,
                expires_at: Some(Instant::now() + lifetime),
            },
        );
    }

    /// Returns a copy of the value and marks it as recently used.
    pub fn get(&self, key: &K) -> Option<V> {
        let mut cache = self.inner.lock();
        let now = Instant::now();
        let expired = match cache.get(key) {
            Some(entry) if !entry.is_expired(now) => return Some(entry.value.clone()),
            Some(_) => true,
            None => false,
        };
        if expired {
            cache.pop(key);
        }
        None
    }

    /// Returns a copy of the value without touching its recency.
    pub fn peek(&self, key: &K) -> Option<V> {
        let cache = self.inner.lock();
        cache
            .peek(key)
            .filter(|entry| !entry.is_expired(Instant::now()))
            .map(|entry| entry.value.clone())
    }

    /// Removes the entry and hands back its value, if it was live.
    pub fn remove(&self, key: &K) -> Option<V> {
        self.inner
            .lock()
            .pop(key)
            .filter(|entry| !entry.is_expired(Instant::now()))
            .map(|entry| entry.value)
    }

    /// Applies `f` to the live value, or to a default one that is then
    /// inserted. Runs under one lock acquisition and marks the entry as
    /// recently used, so concurrent updates of the same key never interleave.
    pub fn upsert<F>(&self, key: K, f: F)
    where
        V: Default,
        F: FnOnce(&mut V),
    {
        let mut cache = self.inner.lock();
        let now = Instant::now();
        match cache.get_mut(&key) {
            Some(entry) if !entry.is_expired(now) => {
                f(&mut entry.value);
                return;
            }
            _ => {}
        }
        let mut value = V::default();
        f(&mut value);
        cache.put(
            key,
            Entry {
                value,
                expires_at: None,
            },
        );
    }

    /// Runs `f` against the live value without copying it out, marking the
    /// entry as recently used.
    pub fn get_with<R>(&self, key: &K, f: impl FnOnce(&V) -> R) -> Option<R> {
        let mut cache = self.inner.lock();
        let now = Instant::now();
        cache
            .get(key)
            .filter(|entry| !entry.is_expired(now))
            .map(|entry| f(&entry.value))
    }

    /// Inserts only if no live entry exists. Returns whether it inserted.
    pub fn add_if_absent(&self, key: K, value: V) -> bool {
        let mut cache = self.inner.lock();
        let now = Instant::now();
        if cache.peek(&key).is_some_and(|entry| !entry.is_expired(now)) {
            return false;
        }
        cache.put(
            key,
            Entry {
                value,
                expires_at: None,
            },
        );
        true
    }

    /// A snapshot of the live keys, least recently used first.
    pub fn keys(&self) -> Vec<K> {
        let cache = self.inner.lock();
        let now = Instant::now();
        cache
            .iter()
            .rev()
            .filter(|(_, entry)| !entry.is_expired(now))
            .map(|(key, _)| key.clone())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_capacity_is_rejected() {
        assert_eq!(
            BoundedCache::<u32, u32>::new(0).err(),
            Some(CacheError::ZeroCapacity)
        );
    }

    #[test]
    fn evicts_least_recently_used() {
        let cache = BoundedCache::new(2).unwrap();
        cache.add(1, "one");
        cache.add(2, "two");
        // Touch 1 so that 2 becomes the eviction candidate.
        assert_eq!(cache.get(&1), Some("one"));
        cache.add(3, "three");

        assert_eq!(cache.peek(&2), None);
        assert_eq!(cache.peek(&1), Some("one"));
        assert_eq!(cache.peek(&3), Some("three"));
        assert_eq!(cache.keys(), vec![1, 3]);
    }

    #[test]
    fn peek_does_not_promote() {
        let cache = BoundedCache::new(2).unwrap();
        cache.add(1, "one");
        cache.add(2, "two");
        assert_eq!(cache.peek(&1), Some("one"));
        cache.add(3, "three");

        assert_eq!(cache.peek(&1), None);
        assert_eq!(cache.peek(&2), Some("two"));
    }

    #[test]
    fn keys_are_oldest_first() {
        let cache = BoundedCache::new(4).unwrap();
        cache.add('a', 1);
        cache.add('b', 2);
        cache.add('c', 3);
        cache.get(&'a');
        assert_eq!(cache.keys(), vec!['b', 'c', 'a']);
    }

    #[test]
    fn remove_returns_value() {
        let cache = BoundedCache::new(4).unwrap();
        cache.add("k", vec![1, 2]);
        assert_eq!(cache.remove(&"k"), Some(vec![1, 2]));
        assert_eq!(cache.remove(&"k"), None);
        assert!(cache.keys().is_empty());
    }

    #[test]
    fn upsert_sees_previous_value() {
        let cache = BoundedCache::new(4).unwrap();
        cache.upsert("n", |n: &mut u32| *n += 1);
        cache.upsert("n", |n: &mut u32| *n += 1);
        assert_eq!(cache.peek(&"n"), Some(2));
    }

    #[test]
    fn get_with_borrows_value() {
        let cache = BoundedCache::new(4).unwrap();
        cache.add("k", vec![1, 2, 3]);
        assert_eq!(cache.get_with(&"k", |v| v.len()), Some(3));
        assert_eq!(cache.get_with(&"missing", |v| v.len()), None);
    }

    #[test]
    fn add_if_absent_keeps_first_writer() {
        let cache = BoundedCache::new(4).unwrap();
        assert!(cache.add_if_absent(1, "first"));
        assert!(!cache.add_if_absent(1, "second"));
        assert_eq!(cache.peek(&1), Some("first"));
    }

    #[tokio::test(start_paused = true)]
    async fn entries_expire() {
        let cache = BoundedCache::new(4).unwrap();
        cache.add_with_lifetime(1, false, Duration::from_secs(60));
        cache.add(2, false);

        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(cache.get(&1), Some(false));

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(cache.get(&1), None);
        assert_eq!(cache.peek(&2), Some(false));
        assert_eq!(cache.keys(), vec![2]);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entry_can_be_replaced() {
        let cache = BoundedCache::new(4).unwrap();
        cache.add_with_lifetime(1, "old", Duration::from_secs(1));
        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(cache.add_if_absent(1, "new"));
        assert_eq!(cache.get(&1), Some("new"));
    }
}
