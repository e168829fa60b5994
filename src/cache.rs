//! Bounded, thread-safe TTL cache
//!
//! Holds at most `capacity` entries, each of which expires `ttl` after it was
//! last set. Expiry is lazy: an expired entry is treated as absent and removed
//! when it is looked up, or when room is needed for a new key. There is no
//! background sweeper; [`BoundedTtlCache::purge_expired`] is available for
//! callers that store many keys that are never read again.
//!
//! Eviction is least-recently-set: when a new key arrives and the cache is
//! still full after purging expired entries, the entry whose last `set` is
//! oldest is dropped. Reads do not affect eviction order.
//!
//! Every operation runs under one mutex, so a lookup, its expiry check and any
//! resulting removal are atomic with respect to concurrent writers.

use parking_lot::Mutex;
use std::borrow::Borrow;
use std::collections::{BTreeMap, HashMap};
use std::hash::Hash;
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
struct Entry<V> {
    value: V,
    expires_at: Instant,
    seq: u64,
}

impl<V> Entry<V> {
    fn is_expired(&self, now: Instant) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug)]
struct Inner<K, V> {
    entries: HashMap<K, Entry<V>>,
    /// Set order: sequence number -> key, oldest first
    order: BTreeMap<u64, K>,
    next_seq: u64,
}

impl<K: Eq + Hash + Clone, V> Inner<K, V> {
    fn remove_entry<Q>(&mut self, key: &Q) -> Option<Entry<V>>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        let entry = self.entries.remove(key)?;
        self.order.remove(&entry.seq);
        Some(entry)
    }

    fn purge_expired(&mut self, now: Instant) -> usize {
        let expired: Vec<(u64, K)> = self
            .entries
            .iter()
            .filter(|(_, e)| e.is_expired(now))
            .map(|(k, e)| (e.seq, k.clone()))
            .collect();

        for (seq, key) in &expired {
            self.entries.remove(key);
            self.order.remove(seq);
        }
        expired.len()
    }

    fn evict_oldest(&mut self) -> Option<K> {
        let (_, key) = self.order.pop_first()?;
        self.entries.remove(&key);
        Some(key)
    }
}

/// Fixed-capacity key-value cache with per-entry time-to-live
#[derive(Debug)]
pub struct BoundedTtlCache<K, V> {
    inner: Mutex<Inner<K, V>>,
    capacity: usize,
    ttl: Duration,
}

impl<K, V> BoundedTtlCache<K, V>
where
    K: Eq + Hash + Clone,
    V: Clone,
{
    /// Create an empty cache
    ///
    /// A capacity of zero is raised to one; configuration validation rejects
    /// zero before it gets here.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = capacity.max(1);
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::with_capacity(capacity.min(1024)),
                order: BTreeMap::new(),
                next_seq: 0,
            }),
            capacity,
            ttl,
        }
    }

    /// Return the value for `key` if present and not expired
    ///
    /// An expired entry found here is removed.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        let now = Instant::now();
        let mut inner = self.inner.lock();

        let lookup = inner
            .entries
            .get(key)
            .map(|entry| (!entry.is_expired(now)).then(|| entry.value.clone()));

        match lookup {
            Some(Some(value)) => Some(value),
            Some(None) => {
                inner.remove_entry(key);
                None
            }
            None => None,
        }
    }

    /// Insert or overwrite `key`, restarting its time-to-live
    ///
    /// Inserting a new key into a full cache first drops expired entries and
    /// then, if still full, the least recently set entry.
    pub fn set(&self, key: K, value: V) {
        let now = Instant::now();
        let mut inner = self.inner.lock();

        if inner.remove_entry(&key).is_none() && inner.entries.len() >= self.capacity {
            inner.purge_expired(now);
            while inner.entries.len() >= self.capacity {
                if inner.evict_oldest().is_none() {
                    break;
                }
            }
        }

        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.order.insert(seq, key.clone());
        inner.entries.insert(
            key,
            Entry {
                value,
                expires_at: now + self.ttl,
                seq,
            },
        );
    }

    /// Remove `key`, returning its value if it was present and fresh
    pub fn remove<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        let now = Instant::now();
        let mut inner = self.inner.lock();
        inner
            .remove_entry(key)
            .filter(|e| !e.is_expired(now))
            .map(|e| e.value)
    }

    /// Drop every expired entry, returning how many were removed
    pub fn purge_expired(&self) -> usize {
        self.inner.lock().purge_expired(Instant::now())
    }

    /// Drop every entry
    pub fn clear(&self) {
        let mut inner = self.inner.lock();
        inner.entries.clear();
        inner.order.clear();
    }

    /// Number of physically stored entries, including expired ones not yet purged
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }
}
