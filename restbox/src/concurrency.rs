use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::FutureExt;
use futures::future::BoxFuture;
use restbox_core::{ApiError, CacheKey, Group};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, trace};

use crate::metrics;

/// Outcome shared by every caller of one in-flight request.
pub type Settlement = Result<Group, ApiError>;

/// Future resolving to the settlement of another caller's request.
pub type AwaitResponseFuture = BoxFuture<'static, Result<Settlement, ConcurrencyError>>;

/// Errors observed while waiting on another caller's request.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConcurrencyError {
    /// The waiter fell behind the broadcast channel.
    #[error("waiter lagged behind by {0} messages")]
    Lagged(u64),
    /// The request owner went away without settling.
    #[error("in-flight request was dropped before settling")]
    Closed,
}

impl From<broadcast::error::RecvError> for ConcurrencyError {
    fn from(error: broadcast::error::RecvError) -> Self {
        match error {
            broadcast::error::RecvError::Lagged(n) => ConcurrencyError::Lagged(n),
            broadcast::error::RecvError::Closed => ConcurrencyError::Closed,
        }
    }
}

/// Result of a concurrency check: fetch yourself or wait for someone else.
pub enum ConcurrencyDecision {
    /// No request is in flight for the key; the holder of the permit must
    /// fetch and then [`complete`](InFlightPermit::complete) it.
    Proceed(InFlightPermit),
    /// Await the settlement of the request already in flight.
    Await(AwaitResponseFuture),
}

impl fmt::Debug for ConcurrencyDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConcurrencyDecision::Proceed(permit) => f.debug_tuple("Proceed").field(permit).finish(),
            ConcurrencyDecision::Await(_) => f.write_str("Await(..)"),
        }
    }
}

/// Trait for deduplicating concurrent requests with the same key.
pub trait ConcurrencyManager: Send + Sync {
    /// Joins the request in flight for `key`, if any.
    fn join(&self, key: &CacheKey) -> Option<AwaitResponseFuture>;

    /// Joins the request in flight for `key` or registers a new one.
    ///
    /// The check and the registration happen atomically: of several callers
    /// racing on the same key exactly one receives a permit.
    fn check(&self, key: &CacheKey) -> ConcurrencyDecision;

    /// Returns the number of requests currently in flight.
    fn in_flight(&self) -> usize;
}

impl<T: ConcurrencyManager + ?Sized> ConcurrencyManager for Arc<T> {
    fn join(&self, key: &CacheKey) -> Option<AwaitResponseFuture> {
        self.as_ref().join(key)
    }

    fn check(&self, key: &CacheKey) -> ConcurrencyDecision {
        self.as_ref().check(key)
    }

    fn in_flight(&self) -> usize {
        self.as_ref().in_flight()
    }
}

type Registry = DashMap<CacheKey, broadcast::Sender<Settlement>>;

struct Registration {
    key: CacheKey,
    sender: broadcast::Sender<Settlement>,
    registry: Arc<Registry>,
}

impl Registration {
    fn unregister(&self) {
        let removed = self
            .registry
            .remove_if(&self.key, |_, sender| sender.same_channel(&self.sender))
            .is_some();
        if removed {
            metrics::in_flight_decrement();
        }
    }
}

/// Exclusive right to fetch for a key.
///
/// The registration is removed when the permit is completed or dropped,
/// whichever comes first. A permit dropped without completing closes the
/// channel, so waiters see [`ConcurrencyError::Closed`].
#[must_use = "dropping the permit releases the in-flight registration"]
pub struct InFlightPermit {
    registration: Option<Registration>,
}

impl InFlightPermit {
    /// A permit that is not tied to any registry.
    pub fn detached() -> Self {
        InFlightPermit { registration: None }
    }

    /// Returns the key this permit was issued for.
    pub fn key(&self) -> Option<&CacheKey> {
        self.registration.as_ref().map(|r| &r.key)
    }

    /// Unregisters the key, broadcasts `settlement` to every waiter and
    /// returns it back.
    pub fn complete(mut self, settlement: Settlement) -> Settlement {
        if let Some(registration) = self.registration.take() {
            registration.unregister();
            // No receivers simply means nobody joined.
            let receivers = registration.sender.send(settlement.clone()).unwrap_or(0);
            trace!(key = %registration.key, receivers, "in-flight request settled");
        }
        settlement
    }
}

impl Drop for InFlightPermit {
    fn drop(&mut self) {
        if let Some(registration) = self.registration.take() {
            debug!(key = %registration.key, "in-flight permit dropped without settling");
            registration.unregister();
        }
    }
}

impl fmt::Debug for InFlightPermit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InFlightPermit")
            .field("key", &self.key())
            .finish()
    }
}

/// Deduplicates requests with a broadcast channel per in-flight key.
///
/// The first caller for a key gets a permit; everyone arriving before it
/// settles subscribes to the channel and receives a clone of the same
/// settlement.
#[derive(Clone, Default)]
pub struct BroadcastConcurrencyManager {
    registry: Arc<Registry>,
}

impl BroadcastConcurrencyManager {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if a request for `key` is in flight.
    pub fn is_in_flight(&self, key: &CacheKey) -> bool {
        self.registry.contains_key(key)
    }
}

impl fmt::Debug for BroadcastConcurrencyManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BroadcastConcurrencyManager")
            .field("in_flight", &self.registry.len())
            .finish()
    }
}

fn wait(mut receiver: broadcast::Receiver<Settlement>) -> AwaitResponseFuture {
    async move { receiver.recv().await.map_err(ConcurrencyError::from) }.boxed()
}

impl ConcurrencyManager for BroadcastConcurrencyManager {
    fn join(&self, key: &CacheKey) -> Option<AwaitResponseFuture> {
        let receiver = self.registry.get(key)?.subscribe();
        debug!(%key, "joining in-flight request");
        Some(wait(receiver))
    }

    fn check(&self, key: &CacheKey) -> ConcurrencyDecision {
        match self.registry.entry(key.clone()) {
            Entry::Occupied(entry) => {
                debug!(%key, "joining in-flight request");
                ConcurrencyDecision::Await(wait(entry.get().subscribe()))
            }
            Entry::Vacant(entry) => {
                let (sender, _) = broadcast::channel(1);
                entry.insert(sender.clone());
                metrics::in_flight_increment();
                debug!(%key, "registered in-flight request");
                ConcurrencyDecision::Proceed(InFlightPermit {
                    registration: Some(Registration {
                        key: key.clone(),
                        sender,
                        registry: self.registry.clone(),
                    }),
                })
            }
        }
    }

    fn in_flight(&self) -> usize {
        self.registry.len()
    }
}

/// No-op implementation that always allows requests to proceed.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopConcurrencyManager;

impl ConcurrencyManager for NoopConcurrencyManager {
    fn join(&self, _key: &CacheKey) -> Option<AwaitResponseFuture> {
        None
    }

    fn check(&self, _key: &CacheKey) -> ConcurrencyDecision {
        ConcurrencyDecision::Proceed(InFlightPermit::detached())
    }

    fn in_flight(&self) -> usize {
        0
    }
}
