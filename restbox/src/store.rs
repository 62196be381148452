//! TTL cache store.
//!
//! [`QueryCache`] maps a [`CacheKey`] to the last settled outcome for it.
//! Entries never expire on their own: freshness is evaluated when an entry
//! is looked up, against the TTL of the caller, and a stale entry is removed
//! at that point.
//!
//! ## Deletion and listeners
//!
//! Explicit deletions ([`delete_by`](QueryCache::delete_by),
//! [`delete_by_name`](QueryCache::delete_by_name),
//! [`clear_all`](QueryCache::clear_all), [`remove`](QueryCache::remove))
//! first take the entries out of the store, then fire the listeners of each
//! removed entry before returning. Listeners may therefore read or refill the
//! store. Lazy expiry and replacement drop listeners without firing them.
//!
//! ## Snapshots
//!
//! [`QueryCache::serialize`] exports the successful entries in insertion
//! order; [`QueryCache::deserialize`] loads a snapshot back without checking
//! freshness.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use parking_lot::Mutex;
use restbox_core::{CacheKey, CacheState, Clock, QueryCacheItem, SystemClock};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use crate::metrics;
use crate::notify::{Notifier, Subscription};

/// Result of a cache lookup.
#[derive(Debug, Clone)]
pub enum Lookup {
    /// The entry is younger than the TTL.
    Fresh(QueryCacheItem),
    /// The entry reached the TTL and was removed.
    Expired,
    /// No entry for the key.
    Missing,
}

impl Lookup {
    /// Returns the fresh item, if any.
    pub fn fresh(self) -> Option<QueryCacheItem> {
        match self {
            Lookup::Fresh(item) => Some(item),
            Lookup::Expired | Lookup::Missing => None,
        }
    }
}

/// Serializable export of a [`QueryCache`].
///
/// Serialized as an ordered map from key to entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot {
    entries: IndexMap<CacheKey, QueryCacheItem>,
}

impl Snapshot {
    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the snapshot holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Returns the entry for `key`.
    pub fn get(&self, key: &CacheKey) -> Option<&QueryCacheItem> {
        self.entries.get(key)
    }

    /// Iterates over entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&CacheKey, &QueryCacheItem)> {
        self.entries.iter()
    }
}

impl FromIterator<(CacheKey, QueryCacheItem)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (CacheKey, QueryCacheItem)>>(iter: I) -> Self {
        Snapshot {
            entries: iter.into_iter().collect(),
        }
    }
}

/// Keyed store of settled outcomes.
pub struct QueryCache {
    entries: Mutex<IndexMap<CacheKey, QueryCacheItem>>,
    notifier: Notifier,
    clock: Arc<dyn Clock>,
}

impl QueryCache {
    /// Creates an empty store reading the system clock.
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Creates an empty store reading `clock`.
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        QueryCache {
            entries: Mutex::new(IndexMap::new()),
            notifier: Notifier::new(),
            clock,
        }
    }

    /// Creates a store holding the entries of `snapshot`.
    pub fn from_snapshot(snapshot: Snapshot, clock: Arc<dyn Clock>) -> Self {
        QueryCache {
            entries: Mutex::new(snapshot.entries),
            notifier: Notifier::new(),
            clock,
        }
    }

    /// Returns the clock used for freshness checks.
    pub fn clock(&self) -> &Arc<dyn Clock> {
        &self.clock
    }

    /// Returns the current time according to the store's clock.
    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Returns the listener registry of this store.
    pub fn notifier(&self) -> &Notifier {
        &self.notifier
    }

    /// Registers a deletion listener. See [`Notifier::subscribe`].
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&QueryCacheItem) + Send + Sync + 'static,
    {
        self.notifier.subscribe(listener)
    }

    /// Looks `key` up at the current time.
    pub fn lookup(&self, key: &CacheKey, ttl: Duration) -> Lookup {
        self.lookup_at(key, ttl, self.clock.now())
    }

    /// Looks `key` up at `now`.
    ///
    /// A fresh entry has its `last_access` updated. An entry whose age
    /// reached `ttl` is removed and its listeners are dropped silently.
    pub fn lookup_at(&self, key: &CacheKey, ttl: Duration, now: DateTime<Utc>) -> Lookup {
        let mut entries = self.entries.lock();
        let Some(item) = entries.get_mut(key) else {
            return Lookup::Missing;
        };
        match item.cache_state(ttl, now) {
            CacheState::Actual => {
                item.touch(now);
                Lookup::Fresh(item.clone())
            }
            CacheState::Expired => {
                entries.shift_remove(key);
                drop(entries);
                self.notifier.discard(key);
                debug!(%key, ?ttl, "cache entry expired");
                Lookup::Expired
            }
        }
    }

    /// Returns the entry for `key` without freshness check or bookkeeping.
    pub fn peek(&self, key: &CacheKey) -> Option<QueryCacheItem> {
        self.entries.lock().get(key).cloned()
    }

    /// Stores `item` under `key`.
    ///
    /// A replaced entry keeps its position; its listeners are dropped
    /// silently.
    pub fn store(&self, key: CacheKey, item: QueryCacheItem) {
        trace!(%key, name = item.name(), "storing cache entry");
        let replaced = self.entries.lock().insert(key.clone(), item);
        if replaced.is_some() {
            self.notifier.discard(&key);
        }
    }

    /// Deletes every entry matching `predicate` and fires their listeners.
    ///
    /// Returns the number of deleted entries.
    pub fn delete_by<F>(&self, mut predicate: F) -> usize
    where
        F: FnMut(&QueryCacheItem) -> bool,
    {
        let removed: Vec<(CacheKey, QueryCacheItem)> = {
            let mut entries = self.entries.lock();
            let (removed, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut *entries)
                .into_iter()
                .partition(|(_, item)| predicate(item));
            *entries = kept.into_iter().collect();
            removed
        };
        self.evicted(removed)
    }

    /// Deletes every entry produced by the operation `name`.
    pub fn delete_by_name(&self, name: &str) -> usize {
        self.delete_by(|item| item.name() == name)
    }

    /// Deletes every entry.
    pub fn clear_all(&self) -> usize {
        let removed: Vec<_> = std::mem::take(&mut *self.entries.lock())
            .into_iter()
            .collect();
        self.evicted(removed)
    }

    /// Deletes the entry at `key`, if any, and fires its listeners.
    pub fn remove(&self, key: &CacheKey) -> bool {
        let removed = self.entries.lock().shift_remove_entry(key);
        match removed {
            Some(entry) => self.evicted(vec![entry]) == 1,
            None => false,
        }
    }

    fn evicted(&self, removed: Vec<(CacheKey, QueryCacheItem)>) -> usize {
        if removed.is_empty() {
            return 0;
        }
        debug!(count = removed.len(), "deleting cache entries");
        metrics::record_evicted(removed.len());
        for (key, item) in &removed {
            self.notifier.notify(key, item);
        }
        removed.len()
    }

    /// Returns every entry in insertion order.
    pub fn values(&self) -> Vec<QueryCacheItem> {
        self.entries.lock().values().cloned().collect()
    }

    /// Returns every key in insertion order.
    pub fn keys(&self) -> Vec<CacheKey> {
        self.entries.lock().keys().cloned().collect()
    }

    /// Returns the number of entries.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Returns `true` if an entry exists for `key`, fresh or not.
    pub fn contains_key(&self, key: &CacheKey) -> bool {
        self.entries.lock().contains_key(key)
    }

    /// Exports the entries that hold a response, in insertion order.
    pub fn serialize(&self) -> Snapshot {
        self.entries
            .lock()
            .iter()
            .filter(|(_, item)| item.error().is_none())
            .map(|(key, item)| (key.clone(), item.clone()))
            .collect()
    }

    /// Replaces the content of the store with `snapshot`.
    ///
    /// Entries are loaded as they are, stale or not. Listeners of the
    /// previous entries are dropped silently.
    pub fn deserialize(&self, snapshot: Snapshot) {
        let previous = std::mem::replace(&mut *self.entries.lock(), snapshot.entries);
        for key in previous.keys() {
            self.notifier.discard(key);
        }
    }
}

impl Default for QueryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryCache")
            .field("entries", &self.len())
            .field("clock", &self.clock)
            .finish()
    }
}
