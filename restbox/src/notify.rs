//! Invalidation listeners.
//!
//! A listener is a callback registered with [`Notifier::subscribe`]. It can
//! be attached to at most one cache entry at a time; attaching it elsewhere
//! silently moves it. When an attached entry is deleted, the store fires
//! every listener of that entry in attachment order and forgets the
//! association, so each attachment fires at most once.
//!
//! The returned [`Subscription`] is the disposer: dropping it (or calling
//! [`Subscription::unsubscribe`]) removes the listener for good.
//!
//! ```
//! use std::sync::Arc;
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use restbox::notify::Notifier;
//! use restbox_core::CacheKey;
//!
//! let notifier = Notifier::new();
//! let fired = Arc::new(AtomicUsize::new(0));
//! let counter = fired.clone();
//! let subscription = notifier.subscribe(move |_| {
//!     counter.fetch_add(1, Ordering::SeqCst);
//! });
//!
//! notifier.attach(&CacheKey::new("/a"), &subscription);
//! assert_eq!(subscription.entry(), Some(CacheKey::new("/a")));
//!
//! subscription.detach();
//! assert_eq!(notifier.listener_count(&CacheKey::new("/a")), 0);
//! # assert_eq!(fired.load(Ordering::SeqCst), 0);
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use indexmap::IndexSet;
use parking_lot::Mutex;
use restbox_core::{CacheKey, QueryCacheItem};
use tracing::{debug, warn};

/// Callback fired with the removed entry.
pub type Listener = Arc<dyn Fn(&QueryCacheItem) + Send + Sync>;

/// Identity of a registered listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ListenerId(u64);

#[derive(Default)]
struct Registry {
    next_id: u64,
    listeners: HashMap<ListenerId, Listener>,
    by_entry: HashMap<CacheKey, IndexSet<ListenerId>>,
    by_listener: HashMap<ListenerId, CacheKey>,
}

impl Registry {
    fn detach(&mut self, id: ListenerId) -> Option<CacheKey> {
        let key = self.by_listener.remove(&id)?;
        if let Some(set) = self.by_entry.get_mut(&key) {
            set.shift_remove(&id);
            if set.is_empty() {
                self.by_entry.remove(&key);
            }
        }
        Some(key)
    }

    fn take(&mut self, key: &CacheKey) -> Vec<Listener> {
        let Some(ids) = self.by_entry.remove(key) else {
            return Vec::new();
        };
        ids.into_iter()
            .filter_map(|id| {
                self.by_listener.remove(&id);
                self.listeners.get(&id).cloned()
            })
            .collect()
    }
}

/// Bidirectional entry/listener registry.
///
/// Cloning a notifier yields another handle to the same registry.
#[derive(Clone, Default)]
pub struct Notifier {
    registry: Arc<Mutex<Registry>>,
}

impl Notifier {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `listener` and returns its disposer.
    ///
    /// The listener is not attached to any entry yet.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&QueryCacheItem) + Send + Sync + 'static,
    {
        let mut registry = self.registry.lock();
        let id = ListenerId(registry.next_id);
        registry.next_id += 1;
        registry.listeners.insert(id, Arc::new(listener));
        Subscription {
            id,
            notifier: self.clone(),
        }
    }

    /// Attaches `subscription` to the entry at `key`.
    ///
    /// A previous attachment of the same listener is discarded without
    /// notification.
    pub fn attach(&self, key: &CacheKey, subscription: &Subscription) {
        if !Arc::ptr_eq(&self.registry, &subscription.notifier.registry) {
            warn!(%key, "subscription belongs to another notifier, not attaching");
            return;
        }
        let mut registry = self.registry.lock();
        if !registry.listeners.contains_key(&subscription.id) {
            return;
        }
        registry.detach(subscription.id);
        registry
            .by_entry
            .entry(key.clone())
            .or_default()
            .insert(subscription.id);
        registry.by_listener.insert(subscription.id, key.clone());
    }

    /// Fires every listener of the entry at `key`, in attachment order.
    ///
    /// Both directions of the mapping are cleared before the first listener
    /// runs, and no lock is held while listeners run.
    pub fn notify(&self, key: &CacheKey, item: &QueryCacheItem) -> usize {
        let listeners = self.registry.lock().take(key);
        if !listeners.is_empty() {
            debug!(%key, listeners = listeners.len(), "notifying listeners");
        }
        for listener in &listeners {
            listener(item);
        }
        listeners.len()
    }

    /// Forgets every listener of the entry at `key` without firing them.
    pub fn discard(&self, key: &CacheKey) {
        self.registry.lock().take(key);
    }

    /// Returns the number of listeners attached to the entry at `key`.
    pub fn listener_count(&self, key: &CacheKey) -> usize {
        self.registry
            .lock()
            .by_entry
            .get(key)
            .map_or(0, IndexSet::len)
    }

    /// Returns the number of live subscriptions.
    pub fn subscription_count(&self) -> usize {
        self.registry.lock().listeners.len()
    }
}

impl fmt::Debug for Notifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registry = self.registry.lock();
        f.debug_struct("Notifier")
            .field("listeners", &registry.listeners.len())
            .field("entries", &registry.by_entry.len())
            .finish()
    }
}

/// Disposer of a registered listener.
pub struct Subscription {
    id: ListenerId,
    notifier: Notifier,
}

impl Subscription {
    /// Returns the listener identity.
    pub fn id(&self) -> ListenerId {
        self.id
    }

    /// Returns the key of the entry this listener is attached to.
    pub fn entry(&self) -> Option<CacheKey> {
        self.notifier
            .registry
            .lock()
            .by_listener
            .get(&self.id)
            .cloned()
    }

    /// Detaches the listener from its entry but keeps it registered.
    pub fn detach(&self) {
        self.notifier.registry.lock().detach(self.id);
    }

    /// Detaches and forgets the listener.
    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let mut registry = self.notifier.registry.lock();
        registry.detach(self.id);
        registry.listeners.remove(&self.id);
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription").field("id", &self.id).finish()
    }
}
