//! Request descriptors.
//!
//! [`RequestData`] describes a single call: the method, the target url, an
//! optional JSON body, an optional TTL override and free-form metadata.
//! Descriptors are immutable once built; the free functions [`get`], [`post`],
//! [`put`] and [`delete`] are the usual way to create them.
//!
//! ```
//! use std::time::Duration;
//! use restbox_core::request::{get, post};
//! use serde_json::json;
//!
//! let user = get("/users/7").with_ttl(Duration::from_secs(30));
//! assert_eq!(user.url(), "/users/7");
//!
//! let create = post("/users", json!({"name": "ann"}));
//! assert!(create.json().is_some());
//! ```

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use smol_str::SmolStr;

use crate::CacheKey;

/// HTTP-like request method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    /// `GET`
    Get,
    /// `PUT`
    Put,
    /// `POST`
    Post,
    /// `DELETE`
    Delete,
}

impl Method {
    /// Returns the upper-case method name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Put => "PUT",
            Method::Post => "POST",
            Method::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An immutable request descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestData {
    method: Method,
    url: SmolStr,
    json: Option<Value>,
    #[serde(default)]
    meta: Value,
    #[serde(default, with = "humantime_serde")]
    ttl: Option<Duration>,
}

impl RequestData {
    /// Creates a descriptor without TTL override or metadata.
    pub fn new(method: Method, url: impl Into<SmolStr>, json: Option<Value>) -> Self {
        RequestData {
            method,
            url: url.into(),
            json,
            meta: Value::Null,
            ttl: None,
        }
    }

    /// Overrides the cache TTL for this request.
    ///
    /// `Duration::ZERO` disables caching: every call goes to the fetcher.
    pub fn with_ttl(self, ttl: Duration) -> Self {
        RequestData {
            ttl: Some(ttl),
            ..self
        }
    }

    /// Attaches arbitrary metadata for the fetcher.
    pub fn with_meta(self, meta: impl Into<Value>) -> Self {
        RequestData {
            meta: meta.into(),
            ..self
        }
    }

    /// Returns the request method.
    #[inline]
    pub fn method(&self) -> Method {
        self.method
    }

    /// Returns the target url.
    #[inline]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the JSON body, if any.
    #[inline]
    pub fn json(&self) -> Option<&Value> {
        self.json.as_ref()
    }

    /// Returns the metadata (`Null` when none was attached).
    #[inline]
    pub fn meta(&self) -> &Value {
        &self.meta
    }

    /// Returns the TTL override, if any.
    #[inline]
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Returns the cache and dedup identity of this request.
    ///
    /// The key is the url alone: two operations that compute the same url
    /// share one cache entry.
    pub fn cache_key(&self) -> CacheKey {
        CacheKey::new(self.url.clone())
    }
}

/// Builds a `GET` descriptor.
pub fn get(url: impl Into<SmolStr>) -> RequestData {
    RequestData::new(Method::Get, url, None)
}

/// Builds a `POST` descriptor.
pub fn post(url: impl Into<SmolStr>, json: impl Into<Option<Value>>) -> RequestData {
    RequestData::new(Method::Post, url, json.into())
}

/// Builds a `PUT` descriptor.
pub fn put(url: impl Into<SmolStr>, json: impl Into<Option<Value>>) -> RequestData {
    RequestData::new(Method::Put, url, json.into())
}

/// Builds a `DELETE` descriptor.
pub fn delete(url: impl Into<SmolStr>, json: impl Into<Option<Value>>) -> RequestData {
    RequestData::new(Method::Delete, url, json.into())
}
