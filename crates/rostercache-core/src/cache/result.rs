//! Per-query result cache.
//!
//! Entries carry their own absolute expiry; eviction is lazy on read, with
//! an opportunistic prune of expired entries once the map grows past a size
//! threshold. Purging is fenced with per-key epochs: a computation records
//! the epoch before it starts, and its write is discarded if the key was
//! purged in the meantime, so no caller can ever read a value computed
//! before an invalidation.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::debug;

use super::to_chrono;
use crate::clock::Clock;

struct Entry<T> {
    value: T,
    expires_at: DateTime<Utc>,
}

struct Inner<T> {
    entries: HashMap<String, Entry<T>>,
    /// Bumped on purge. A key is registered here the first time its epoch is
    /// read, so purge_all can fence every in-flight computation.
    epochs: HashMap<String, u64>,
}

pub struct ResultCache<T> {
    inner: Mutex<Inner<T>>,
    clock: Arc<dyn Clock>,
    max_entries: usize,
}

impl<T: Clone> ResultCache<T> {
    pub fn new(clock: Arc<dyn Clock>, max_entries: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                entries: HashMap::new(),
                epochs: HashMap::new(),
            }),
            clock,
            max_entries,
        }
    }

    /// Current value for `key`, evicting it first if expired.
    pub fn get(&self, key: &str) -> Option<T> {
        let now = self.clock.now();
        let mut inner = self.lock();
        let live = match inner.entries.get(key) {
            None => return None,
            Some(entry) if now < entry.expires_at => Some(entry.value.clone()),
            Some(_) => None,
        };
        if live.is_none() {
            inner.entries.remove(key);
            debug!(key = key, "Result cache entry expired");
        }
        live
    }

    /// Epoch to pass back into [`set`](Self::set). Registers the key so a
    /// later `purge_all` invalidates computations already in flight.
    pub fn epoch(&self, key: &str) -> u64 {
        let mut inner = self.lock();
        *inner.epochs.entry(key.to_string()).or_insert(0)
    }

    /// Store `value` under `key` with the given TTL, unless the key was
    /// purged since `epoch` was read.
    pub fn set(&self, key: &str, value: T, ttl: Duration, epoch: u64) {
        let expires_at = self.clock.now() + to_chrono(ttl);
        let mut inner = self.lock();
        let current = inner.epochs.entry(key.to_string()).or_insert(0);
        if *current != epoch {
            debug!(key = key, "Discarding result computed before a purge");
            return;
        }
        if inner.entries.len() >= self.max_entries {
            let now = self.clock.now();
            let before = inner.entries.len();
            inner.entries.retain(|_, entry| now < entry.expires_at);
            debug!(
                evicted = before - inner.entries.len(),
                "Pruned expired result cache entries"
            );
        }
        inner.entries.insert(key.to_string(), Entry { value, expires_at });
    }

    /// Drop one entry and fence out in-flight computations for its key.
    pub fn purge(&self, key: &str) {
        let mut inner = self.lock();
        inner.entries.remove(key);
        *inner.epochs.entry(key.to_string()).or_insert(0) += 1;
    }

    /// Drop every entry whose key satisfies the predicate.
    pub fn purge_matching(&self, pred: impl Fn(&str) -> bool) {
        let mut inner = self.lock();
        let keys: std::collections::HashSet<String> = inner
            .entries
            .keys()
            .chain(inner.epochs.keys())
            .filter(|k| pred(k))
            .cloned()
            .collect();
        for key in keys {
            inner.entries.remove(&key);
            *inner.epochs.entry(key).or_insert(0) += 1;
        }
    }

    /// Drop everything and fence out every in-flight computation.
    pub fn purge_all(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        for epoch in inner.epochs.values_mut() {
            *epoch += 1;
        }
    }

    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
