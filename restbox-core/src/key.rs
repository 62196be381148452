//! Cache key type.
//!
//! A [`CacheKey`] identifies both a cache entry and an in-flight request.
//! It is derived from the request url, so cloning is cheap: [`SmolStr`]
//! stores short urls inline and shares long ones behind a reference count.

use std::fmt;

use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

use crate::RequestData;

/// Identity of a request for caching and deduplication.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(SmolStr);

impl CacheKey {
    /// Creates a key from a url.
    pub fn new(url: impl Into<SmolStr>) -> Self {
        CacheKey(url.into())
    }

    /// Returns the key as a string slice.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&RequestData> for CacheKey {
    fn from(request: &RequestData) -> Self {
        request.cache_key()
    }
}

impl From<&str> for CacheKey {
    fn from(url: &str) -> Self {
        CacheKey::new(url)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
