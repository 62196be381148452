use std::sync::Arc;

use restbox_core::{Clock, Fetcher, Grouper};
use tracing::debug;

use crate::concurrency::{BroadcastConcurrencyManager, ConcurrencyManager};
use crate::config::ApiConfig;
use crate::store::QueryCache;

use super::{Api, Inner};

/// Marker type for unset builder fields.
///
/// When you see `NotSet` in a compiler error, it means you haven't called
/// the corresponding builder method yet.
#[derive(Debug, Clone, Copy)]
pub struct NotSet;

/// Builder for [`Api`].
///
/// A fetcher and a grouper are required; everything else has a default:
///
/// - `config`: [`ApiConfig::default`]
/// - `cache`: a new [`QueryCache`] reading `clock`
/// - `concurrency_manager`: a new [`BroadcastConcurrencyManager`]
/// - `clock`: the system clock
pub struct ApiBuilder<F, G> {
    fetcher: F,
    grouper: G,
    config: ApiConfig,
    cache: Option<Arc<QueryCache>>,
    concurrency_manager: Option<Arc<dyn ConcurrencyManager>>,
    clock: Option<Arc<dyn Clock>>,
}

impl ApiBuilder<NotSet, NotSet> {
    /// Creates a new builder with no fields set.
    pub fn new() -> Self {
        ApiBuilder {
            fetcher: NotSet,
            grouper: NotSet,
            config: ApiConfig::default(),
            cache: None,
            concurrency_manager: None,
            clock: None,
        }
    }
}

impl Default for ApiBuilder<NotSet, NotSet> {
    fn default() -> Self {
        Self::new()
    }
}

impl<F, G> ApiBuilder<F, G> {
    /// Sets the transport.
    pub fn fetcher<NewF: Fetcher>(self, fetcher: NewF) -> ApiBuilder<NewF, G> {
        ApiBuilder {
            fetcher,
            grouper: self.grouper,
            config: self.config,
            cache: self.cache,
            concurrency_manager: self.concurrency_manager,
            clock: self.clock,
        }
    }

    /// Sets the grouper mapping raw responses to variants.
    pub fn grouper<NewG: Grouper>(self, grouper: NewG) -> ApiBuilder<F, NewG> {
        ApiBuilder {
            fetcher: self.fetcher,
            grouper,
            config: self.config,
            cache: self.cache,
            concurrency_manager: self.concurrency_manager,
            clock: self.clock,
        }
    }

    /// Sets the configuration.
    pub fn config(self, config: ApiConfig) -> Self {
        ApiBuilder { config, ..self }
    }

    /// Uses an existing store, possibly shared with other engines.
    ///
    /// The store keeps its own clock; [`clock`](Self::clock) is then ignored.
    pub fn cache(self, cache: Arc<QueryCache>) -> Self {
        ApiBuilder {
            cache: Some(cache),
            ..self
        }
    }

    /// Uses an existing in-flight registry, possibly shared with other
    /// engines.
    pub fn concurrency_manager<C>(self, manager: C) -> Self
    where
        C: ConcurrencyManager + 'static,
    {
        ApiBuilder {
            concurrency_manager: Some(Arc::new(manager)),
            ..self
        }
    }

    /// Sets the clock of the store created by [`build`](Self::build).
    pub fn clock(self, clock: Arc<dyn Clock>) -> Self {
        ApiBuilder {
            clock: Some(clock),
            ..self
        }
    }
}

impl<F: Fetcher, G: Grouper> ApiBuilder<F, G> {
    /// Builds the engine.
    pub fn build(self) -> Api {
        let cache = match (self.cache, self.clock) {
            (Some(cache), Some(_)) => {
                debug!("shared cache supplied, ignoring builder clock");
                cache
            }
            (Some(cache), None) => cache,
            (None, Some(clock)) => Arc::new(QueryCache::with_clock(clock)),
            (None, None) => Arc::new(QueryCache::new()),
        };
        let concurrency = self
            .concurrency_manager
            .unwrap_or_else(|| Arc::new(BroadcastConcurrencyManager::new()));
        Api {
            inner: Arc::new(Inner {
                fetcher: Arc::new(self.fetcher),
                grouper: Arc::new(self.grouper),
                cache,
                concurrency,
                config: self.config,
            }),
        }
    }
}
