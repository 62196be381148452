//! Settled cache records.
//!
//! A [`QueryCacheItem`] is what the store keeps for a key once a fetch has
//! settled: either a classified [`Group`] or an [`ApiError`], plus the
//! bookkeeping needed for TTL checks.
//!
//! ## Expiration
//!
//! Items carry their issue time, not an expiry time, because the TTL is
//! resolved per call. [`QueryCacheItem::cache_state`] compares the age of an
//! item against a TTL and returns:
//!
//! - [`CacheState::Actual`] - the item is younger than the TTL
//! - [`CacheState::Expired`] - the item's age reached the TTL
//!
//! ```
//! use std::time::Duration;
//! use chrono::{TimeDelta, Utc};
//! use restbox_core::{group, CacheState, QueryCacheItem, SUCCESS};
//! use restbox_core::request::get;
//!
//! let issued = Utc::now();
//! let item = QueryCacheItem::new("user", get("/u/1"), Ok(group(SUCCESS, 1)), issued, Duration::ZERO);
//! let ttl = Duration::from_secs(1);
//!
//! assert_eq!(item.cache_state(ttl, issued + TimeDelta::milliseconds(999)), CacheState::Actual);
//! assert_eq!(item.cache_state(ttl, issued + TimeDelta::milliseconds(1000)), CacheState::Expired);
//! ```

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::{ApiError, Group, RequestData};

/// Freshness of a cached item relative to a TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// The item is fresh.
    Actual,
    /// The item's age reached the TTL.
    Expired,
}

/// A settled cache record.
///
/// Exactly one of [`response`](Self::response) and [`error`](Self::error) is
/// set. Errors are not serialized: snapshots only carry successful items.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryCacheItem {
    name: SmolStr,
    response: Option<Group>,
    #[serde(skip)]
    error: Option<ApiError>,
    request: RequestData,
    requested_at: DateTime<Utc>,
    #[serde(with = "humantime_serde")]
    loading_dur: Duration,
    #[serde(with = "humantime_serde")]
    last_access: Duration,
}

impl QueryCacheItem {
    /// Creates an item from a settled result.
    ///
    /// `last_access` starts equal to `loading_dur`.
    pub fn new(
        name: impl Into<SmolStr>,
        request: RequestData,
        result: Result<Group, ApiError>,
        requested_at: DateTime<Utc>,
        loading_dur: Duration,
    ) -> Self {
        let (response, error) = match result {
            Ok(group) => (Some(group), None),
            Err(error) => (None, Some(error)),
        };
        QueryCacheItem {
            name: name.into(),
            response,
            error,
            request,
            requested_at,
            loading_dur,
            last_access: loading_dur,
        }
    }

    /// Returns the name of the operation that produced this item.
    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the classified response, if the fetch succeeded.
    #[inline]
    pub fn response(&self) -> Option<&Group> {
        self.response.as_ref()
    }

    /// Returns the stored error, if the fetch failed.
    #[inline]
    pub fn error(&self) -> Option<&ApiError> {
        self.error.as_ref()
    }

    /// Returns the originating request.
    #[inline]
    pub fn request(&self) -> &RequestData {
        &self.request
    }

    /// Returns when the fetch was issued.
    #[inline]
    pub fn requested_at(&self) -> DateTime<Utc> {
        self.requested_at
    }

    /// Returns how long the fetch took.
    #[inline]
    pub fn loading_dur(&self) -> Duration {
        self.loading_dur
    }

    /// Returns the age of the item at its last read.
    #[inline]
    pub fn last_access(&self) -> Duration {
        self.last_access
    }

    /// Returns the stored outcome.
    pub fn result(&self) -> Result<Group, ApiError> {
        match (&self.response, &self.error) {
            (_, Some(error)) => Err(error.clone()),
            (Some(group), None) => Ok(group.clone()),
            // Only reachable through a hand-written snapshot lacking a response.
            (None, None) => Ok(Group::new(crate::SUCCESS, serde_json::Value::Null)),
        }
    }

    /// Returns the age of the item at `now`, clamped at zero.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.requested_at)
            .to_std()
            .unwrap_or(Duration::ZERO)
    }

    /// Evaluates freshness against `ttl` at `now`.
    pub fn cache_state(&self, ttl: Duration, now: DateTime<Utc>) -> CacheState {
        if self.age(now) >= ttl {
            CacheState::Expired
        } else {
            CacheState::Actual
        }
    }

    /// Records a read at `now`.
    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_access = self.age(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::get;
    use crate::{SUCCESS, group};
    use chrono::TimeDelta;

    fn item_at(issued: DateTime<Utc>) -> QueryCacheItem {
        QueryCacheItem::new(
            "user",
            get("/u"),
            Ok(group(SUCCESS, 1)),
            issued,
            Duration::from_millis(12),
        )
    }

    #[test]
    fn touch_recomputes_last_access() {
        let issued = Utc::now();
        let mut item = item_at(issued);
        assert_eq!(item.last_access(), Duration::from_millis(12));
        item.touch(issued + TimeDelta::milliseconds(300));
        assert_eq!(item.last_access(), Duration::from_millis(300));
    }

    #[test]
    fn zero_ttl_is_always_expired() {
        let issued = Utc::now();
        assert_eq!(
            item_at(issued).cache_state(Duration::ZERO, issued),
            CacheState::Expired
        );
    }

    #[test]
    fn clock_skew_counts_as_fresh() {
        let issued = Utc::now();
        let item = item_at(issued);
        let before = issued - TimeDelta::seconds(5);
        assert_eq!(item.age(before), Duration::ZERO);
        assert_eq!(
            item.cache_state(Duration::from_secs(1), before),
            CacheState::Actual
        );
    }

    #[test]
    fn error_items_return_error() {
        let err = ApiError::failed(get("/u"), "down");
        let item = QueryCacheItem::new("user", get("/u"), Err(err), Utc::now(), Duration::ZERO);
        assert!(item.response().is_none());
        assert_eq!(item.result().unwrap_err().kind(), crate::FAILED);
    }
}
