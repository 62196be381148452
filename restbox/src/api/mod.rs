//! Query and mutation facade.
//!
//! [`Api`] ties a [`Fetcher`], a [`Grouper`], a [`QueryCache`] and a
//! [`ConcurrencyManager`] together.
//!
//! ## Queries
//!
//! [`Api::query`] reads through the cache:
//!
//! 1. a request already in flight for the key is joined,
//! 2. a fresh entry is returned as is (stored errors included),
//! 3. otherwise the caller registers the key and spawns the fetch; callers
//!    arriving before it settles join it.
//!
//! The fetch runs in its own task, so dropping the future of any caller,
//! the first one included, never cancels the transport call. The settlement
//! is stored when the resolved TTL is non-zero and is then broadcast. If
//! the fetch task dies without settling, its waiters go back through the
//! registry and one of them fetches again.
//!
//! ## Mutations
//!
//! [`Api::mutate`] always reaches the fetcher. It neither reads nor fills the
//! cache; its [`effect_on_success`](Mutation::effect_on_success) may.

mod builder;
mod operation;

pub use builder::{ApiBuilder, NotSet};
pub use operation::{Effect, Mutation, Query};

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use restbox_core::{
    ApiError, CacheKey, Fetcher, Group, Grouper, Matchers, QueryCacheItem, RequestData, SUCCESS,
};
use smol_str::SmolStr;
use tokio::task::JoinError;
use tracing::{Instrument, debug, debug_span, error, warn};

use crate::concurrency::{ConcurrencyDecision, ConcurrencyManager, InFlightPermit, Settlement};
use crate::config::ApiConfig;
use crate::metrics;
use crate::notify::Subscription;
use crate::store::{Lookup, QueryCache};

struct Inner {
    fetcher: Arc<dyn Fetcher>,
    grouper: Arc<dyn Grouper>,
    cache: Arc<QueryCache>,
    concurrency: Arc<dyn ConcurrencyManager>,
    config: ApiConfig,
}

/// Data-access engine.
///
/// Cloning is cheap and yields a handle to the same engine.
#[derive(Clone)]
pub struct Api {
    inner: Arc<Inner>,
}

/// Everything a spawned fetch needs, detached from the caller's borrows.
#[derive(Clone)]
struct Call {
    name: SmolStr,
    matchers: Matchers,
    request: RequestData,
    key: CacheKey,
    ttl: Duration,
}

impl Api {
    /// Creates a new [`ApiBuilder`].
    pub fn builder() -> ApiBuilder<NotSet, NotSet> {
        ApiBuilder::new()
    }

    /// Returns the store.
    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.inner.cache
    }

    /// Returns the configuration.
    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    /// Returns the number of requests currently in flight.
    pub fn in_flight(&self) -> usize {
        self.inner.concurrency.in_flight()
    }

    /// Registers a deletion listener on the store.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&QueryCacheItem) + Send + Sync + 'static,
    {
        self.inner.cache.subscribe(listener)
    }

    /// Runs `query` with `params`.
    pub fn query<P>(
        &self,
        query: &Query<P>,
        params: P,
    ) -> impl Future<Output = Result<Group, ApiError>> + Send + use<P> {
        let api = self.clone();
        let call = api.call(query, params);
        let span = debug_span!("query", name = %call.name, key = %call.key);
        async move { api.resolve(call).await }.instrument(span)
    }

    /// Runs `query` with `params` and attaches `subscription` to the entry
    /// holding the result.
    ///
    /// The listener fires once, when that entry is deleted. Nothing is
    /// attached when the result was not cached.
    pub fn query_observed<'a, P>(
        &self,
        query: &Query<P>,
        params: P,
        subscription: &'a Subscription,
    ) -> impl Future<Output = Result<Group, ApiError>> + Send + use<'a, P> {
        let api = self.clone();
        let call = api.call(query, params);
        let span = debug_span!("query", name = %call.name, key = %call.key);
        async move {
            let key = call.key.clone();
            let cacheable = !call.ttl.is_zero();
            let cache = api.inner.cache.clone();
            let settlement = api.resolve(call).await;
            if cacheable && cache.contains_key(&key) {
                cache.notifier().attach(&key, subscription);
            }
            settlement
        }
        .instrument(span)
    }

    /// Runs `mutation` with `params`.
    ///
    /// If the grouper tagged the response `success` and a rule accepted it,
    /// the mutation's effect runs once before the future resolves. Renaming
    /// rules do not change that decision.
    pub fn mutate<P>(
        &self,
        mutation: &Mutation<P>,
        params: P,
    ) -> impl Future<Output = Result<Group, ApiError>> + Send + use<P> {
        let api = self.clone();
        let request = mutation.request(params);
        let name = mutation.name_owned();
        let matchers = mutation.matchers().clone();
        let effect = mutation.effect();
        let span = debug_span!("mutation", name = %name, url = request.url());
        async move {
            let (grouped, result) = api.exchange(&matchers, request).await;
            metrics::record_mutation(&name, result_kind(&result));
            if let (Ok(_), Some(effect)) = (&result, effect)
                && grouped.as_deref() == Some(SUCCESS)
                && let Err(err) = effect(api.inner.cache.as_ref())
            {
                error!(name = %name, error = %err, "mutation side effect failed");
            }
            result
        }
        .instrument(span)
    }

    fn call<P>(&self, query: &Query<P>, params: P) -> Call {
        let request = query.request(params);
        Call {
            name: query.name_owned(),
            matchers: query.matchers().clone(),
            key: request.cache_key(),
            ttl: self.inner.config.ttl_for(&request),
            request,
        }
    }

    async fn resolve(self, call: Call) -> Settlement {
        let concurrency = &self.inner.concurrency;

        loop {
            let waiting = match concurrency.join(&call.key) {
                Some(waiting) => {
                    metrics::record_joined(&call.name);
                    waiting
                }
                None => {
                    match self.inner.cache.lookup(&call.key, call.ttl) {
                        Lookup::Fresh(item) => {
                            debug!("cache hit");
                            metrics::record_hit(&call.name);
                            return item.result();
                        }
                        Lookup::Expired => debug!("cache entry expired"),
                        Lookup::Missing => debug!("cache miss"),
                    }
                    metrics::record_miss(&call.name);

                    match concurrency.check(&call.key) {
                        ConcurrencyDecision::Await(waiting) => {
                            metrics::record_joined(&call.name);
                            waiting
                        }
                        ConcurrencyDecision::Proceed(permit) => {
                            match self.spawn_fetch(permit, call.clone()).await {
                                Ok(settlement) => return settlement,
                                Err(err) => {
                                    warn!(error = %err, "fetch task cancelled, retrying");
                                    continue;
                                }
                            }
                        }
                    }
                }
            };

            // A lost wait goes back through the registry so a single caller
            // takes over the fetch.
            match waiting.await {
                Ok(settlement) => return settlement,
                Err(err) => warn!(error = %err, "in-flight request lost, retrying"),
            }
        }
    }

    /// Runs the fetch in its own task. A panic inside it is resumed here.
    async fn spawn_fetch(
        &self,
        permit: InFlightPermit,
        call: Call,
    ) -> Result<Settlement, JoinError> {
        let api = self.clone();
        let task = tokio::spawn(
            async move {
                let settlement = api.fetch_and_store(call).await;
                permit.complete(settlement)
            }
            .in_current_span(),
        );
        match task.await {
            Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
            joined => joined,
        }
    }

    async fn fetch_and_store(&self, call: Call) -> Settlement {
        let cache = &self.inner.cache;
        let requested_at = cache.now();
        let (_, result) = self.exchange(&call.matchers, call.request.clone()).await;
        let loading_dur = cache
            .now()
            .signed_duration_since(requested_at)
            .to_std()
            .unwrap_or(Duration::ZERO);
        metrics::record_fetch(&call.name, loading_dur);

        if call.ttl.is_zero() {
            debug!("ttl is zero, not caching");
        } else {
            debug!(kind = result_kind(&result), "storing settlement");
            let item = QueryCacheItem::new(
                call.name,
                call.request,
                result.clone(),
                requested_at,
                loading_dur,
            );
            cache.store(call.key, item);
        }
        result
    }

    /// Fetches, groups and classifies `request`.
    ///
    /// Also returns the grouper's tag, which is absent for transport and
    /// parse failures.
    async fn exchange(
        &self,
        matchers: &Matchers,
        request: RequestData,
    ) -> (Option<SmolStr>, Settlement) {
        let outcome = self.inner.fetcher.fetch(request.clone()).await;
        let response = match outcome.into_response(&request) {
            Ok(response) => response,
            Err(err) => return (None, Err(err)),
        };
        let group = self.inner.grouper.group(&response);
        let grouped = SmolStr::new(group.tag());
        (Some(grouped), matchers.classify(&response, group))
    }
}

fn result_kind(result: &Settlement) -> &str {
    match result {
        Ok(group) => group.tag(),
        Err(err) => err.kind(),
    }
}

impl fmt::Debug for Api {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Api")
            .field("cache", &self.inner.cache)
            .field("config", &self.inner.config)
            .field("in_flight", &self.in_flight())
            .finish()
    }
}
