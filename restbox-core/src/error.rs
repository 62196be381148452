//! Error types for fetch and classification failures.
//!
//! [`ApiError`] is cloneable because a single settlement is shared by every
//! caller that joined the same in-flight request, and is also kept in the
//! cache entry. Underlying causes are therefore held as [`SharedError`].

use std::sync::Arc;

use serde_json::Value;
use smol_str::SmolStr;
use thiserror::Error;

use crate::group::{FAILED, INVALID_RESPONSE, UNACCEPTABLE_RESPONSE};
use crate::{Group, RequestData, ResponseData};

/// Boxed error accepted from fetchers and rule handlers.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Reference-counted error shared across waiters.
pub type SharedError = Arc<dyn std::error::Error + Send + Sync>;

/// Error returned by queries and mutations.
#[derive(Debug, Clone, Error)]
pub enum ApiError {
    /// The transport never got a response.
    #[error("{} {} failed: {source}", .request.method(), .request.url())]
    Failed {
        /// The request that failed.
        request: RequestData,
        /// Transport error.
        source: SharedError,
    },

    /// The transport got a response but its payload could not be parsed.
    #[error("{} {} returned an unacceptable response: {source}", .request.method(), .request.url())]
    UnacceptableResponse {
        /// The request that failed.
        request: RequestData,
        /// Parse error.
        source: SharedError,
    },

    /// No classification rule matched the produced variant.
    #[error("unhandled response variant `{}` (status {})", .group.tag(), .response.status)]
    Unmatched {
        /// The raw response.
        response: Box<ResponseData>,
        /// The variant that no rule handled.
        group: Group,
    },

    /// A matching rule rejected the variant's value.
    #[error("response variant `{tag}` (status {}) failed validation: {source}", .response.status)]
    Validation {
        /// The raw response.
        response: Box<ResponseData>,
        /// Tag of the rule that rejected the value.
        tag: SmolStr,
        /// Validation error.
        source: SharedError,
    },
}

impl ApiError {
    /// Wraps a connection failure.
    pub fn failed(request: RequestData, source: impl Into<BoxError>) -> Self {
        ApiError::Failed {
            request,
            source: shared(source),
        }
    }

    /// Wraps a payload parse failure.
    pub fn unacceptable(request: RequestData, source: impl Into<BoxError>) -> Self {
        ApiError::UnacceptableResponse {
            request,
            source: shared(source),
        }
    }

    /// Wraps an unmatched variant.
    pub fn unmatched(response: ResponseData, group: Group) -> Self {
        ApiError::Unmatched {
            response: Box::new(response),
            group,
        }
    }

    /// Returns the tag describing this error.
    ///
    /// For [`ApiError::Unmatched`] this is the tag of the unhandled variant.
    pub fn kind(&self) -> &str {
        match self {
            ApiError::Failed { .. } => FAILED,
            ApiError::UnacceptableResponse { .. } => UNACCEPTABLE_RESPONSE,
            ApiError::Unmatched { group, .. } => group.tag(),
            ApiError::Validation { .. } => INVALID_RESPONSE,
        }
    }

    /// Rebuilds the variant this error stands for.
    pub fn group(&self) -> Group {
        match self {
            ApiError::Failed { source, .. } | ApiError::UnacceptableResponse { source, .. } => {
                Group::new(self.kind(), Value::String(source.to_string()))
            }
            ApiError::Unmatched { group, .. } => group.clone(),
            ApiError::Validation { source, .. } => {
                Group::new(INVALID_RESPONSE, Value::String(source.to_string()))
            }
        }
    }

    /// Returns the request that produced this error.
    pub fn request(&self) -> &RequestData {
        match self {
            ApiError::Failed { request, .. } | ApiError::UnacceptableResponse { request, .. } => {
                request
            }
            ApiError::Unmatched { response, .. } | ApiError::Validation { response, .. } => {
                &response.request
            }
        }
    }

    /// Returns the raw response, if the transport produced one.
    pub fn response(&self) -> Option<&ResponseData> {
        match self {
            ApiError::Failed { .. } | ApiError::UnacceptableResponse { .. } => None,
            ApiError::Unmatched { response, .. } | ApiError::Validation { response, .. } => {
                Some(response)
            }
        }
    }
}

pub(crate) fn shared(error: impl Into<BoxError>) -> SharedError {
    let error: BoxError = error.into();
    Arc::from(error)
}
