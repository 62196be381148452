#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]
//! # restbox
//!
//! A client-side data-access engine for REST services. It wraps a transport
//! ([`Fetcher`]) with:
//!
//! - a keyed response cache with TTL expiration ([`QueryCache`]),
//! - deduplication of concurrent identical requests
//!   ([`BroadcastConcurrencyManager`]),
//! - classification of responses into tagged variants ([`Matchers`]),
//! - listeners notified when a cached entry is deleted ([`Subscription`]).
//!
//! ## Example
//!
//! ```
//! use restbox::prelude::*;
//! use serde_json::json;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let api = Api::builder()
//!     .fetcher(|req: RequestData| async move {
//!         FetchOutcome::response(200, json!({"url": req.url()}))
//!     })
//!     .grouper(StatusGroups)
//!     .build();
//!
//! let user = Query::new("user", |id: u32| get(format!("/users/{id}")), Matchers::new().on_success());
//! let first = api.query(&user, 1).await.unwrap();
//! assert_eq!(first.value(), &json!({"url": "/users/1"}));
//! assert_eq!(api.cache().len(), 1);
//! # }
//! ```
//!
//! ## Crates
//!
//! Transport-independent types live in `restbox-core` and are re-exported
//! here. `restbox-reqwest` provides a [`Fetcher`] backed by `reqwest`.

/// Request deduplication.
///
/// The first caller for a key receives an [`InFlightPermit`](concurrency::InFlightPermit)
/// and fetches; everyone else awaits its settlement through a broadcast
/// channel.
pub mod concurrency;

/// Engine configuration and TTL resolution.
pub mod config;

/// Metrics collection.
///
/// When the `metrics` feature is enabled, this module declares counters for
/// cache hits, misses, joined requests, deletions and mutations, a fetch
/// duration histogram and an in-flight gauge.
pub mod metrics;

pub mod notify;
pub mod store;

/// Query and mutation facade.
pub mod api;

pub use api::{Api, ApiBuilder, Effect, Mutation, NotSet, Query};
pub use concurrency::{
    BroadcastConcurrencyManager, ConcurrencyDecision, ConcurrencyError, ConcurrencyManager,
    InFlightPermit, NoopConcurrencyManager, Settlement,
};
pub use config::{ApiConfig, ConfigError, DEFAULT_TTL};
pub use notify::{ListenerId, Notifier, Subscription};
pub use store::{Lookup, QueryCache, Snapshot};

pub use restbox_core::{
    ApiError, BoxError, CacheKey, CacheState, Clock, FAILED, FetchOutcome, Fetcher, Group,
    Grouper, INVALID_RESPONSE, Matcher, Matchers, Method, QueryCacheItem, RequestData,
    ResponseData, SUCCESS, SharedError, StatusGroups, SystemClock, UNACCEPTABLE_RESPONSE, group,
    request,
};

/// The `restbox` prelude.
pub mod prelude {
    pub use crate::request::{delete, get, post, put};
    pub use crate::{
        Api, ApiConfig, ApiError, FetchOutcome, Fetcher, Group, Matchers, Mutation, Query,
        QueryCache, RequestData, SUCCESS, StatusGroups, Subscription, group,
    };
}
