#![warn(missing_docs)]
//! # restbox-core
//!
//! Core traits and types for the restbox request cache.
//!
//! This crate holds everything that does not need shared mutable state:
//! the tagged result variant ([`Group`]), request descriptors
//! ([`RequestData`]), raw transport outcomes ([`FetchOutcome`]), the
//! classification rules ([`Matchers`]) and the settled cache record
//! ([`QueryCacheItem`]). The `restbox` crate builds the in-flight registry,
//! the TTL store and the invalidation notifier on top of these types.
//!
//! ## Architecture
//!
//! A request travels through the following steps:
//!
//! - **Describe** the call with [`RequestData`] (see [`request::get`] and friends)
//! - **Fetch** it through a [`Fetcher`], producing a [`FetchOutcome`]
//! - **Group** a successful outcome into a [`Group`] with a [`Grouper`]
//! - **Classify** the group with an ordered list of [`Matchers`]
//!
//! Transport failures never reach the grouper: they are converted into
//! [`ApiError::Failed`] or [`ApiError::UnacceptableResponse`] first.

pub mod clock;
pub mod error;
pub mod fetcher;
pub mod group;
pub mod key;
pub mod matcher;
pub mod request;
pub mod response;
pub mod value;

pub use clock::{Clock, SystemClock};
pub use error::{ApiError, BoxError, SharedError};
pub use fetcher::Fetcher;
pub use group::{FAILED, Group, INVALID_RESPONSE, SUCCESS, UNACCEPTABLE_RESPONSE, group};
pub use key::CacheKey;
pub use matcher::{Matcher, Matchers};
pub use request::{Method, RequestData};
pub use response::{FetchOutcome, Grouper, ResponseData, StatusGroups};
#[doc(hidden)]
pub use smol_str::SmolStr;
pub use value::{CacheState, QueryCacheItem};
