//! Raw transport outcomes and grouping.
//!
//! A [`Fetcher`](crate::Fetcher) answers every request with a
//! [`FetchOutcome`]. Transport failures are turned into [`ApiError`] right
//! away; a real response becomes [`ResponseData`] and is handed to a
//! [`Grouper`], which decides which [`Group`] it belongs to.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{BoxError, SharedError, shared};
use crate::group::SUCCESS;
use crate::{ApiError, Group, RequestData};

/// The transport's verdict for a single request.
#[derive(Debug, Clone)]
pub enum FetchOutcome {
    /// A response with a status code and a parsed payload.
    Response {
        /// Status code.
        status: u16,
        /// Parsed payload.
        data: Value,
    },
    /// The transport never got a response.
    Failed(SharedError),
    /// The transport got a response but could not parse its payload.
    JsonParseError(SharedError),
}

impl FetchOutcome {
    /// Creates a response outcome.
    pub fn response(status: u16, data: impl Into<Value>) -> Self {
        FetchOutcome::Response {
            status,
            data: data.into(),
        }
    }

    /// Creates a connection failure outcome.
    pub fn failed(error: impl Into<BoxError>) -> Self {
        FetchOutcome::Failed(shared(error))
    }

    /// Creates a payload parse failure outcome.
    pub fn json_parse_error(error: impl Into<BoxError>) -> Self {
        FetchOutcome::JsonParseError(shared(error))
    }

    /// Pairs a response with its request, or short-circuits transport failures.
    pub fn into_response(self, request: &RequestData) -> Result<ResponseData, ApiError> {
        match self {
            FetchOutcome::Response { status, data } => {
                Ok(ResponseData::new(status, data, request.clone()))
            }
            FetchOutcome::Failed(source) => Err(ApiError::Failed {
                request: request.clone(),
                source,
            }),
            FetchOutcome::JsonParseError(source) => Err(ApiError::UnacceptableResponse {
                request: request.clone(),
                source,
            }),
        }
    }
}

/// A successful transport response paired with its request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseData {
    /// Status code.
    pub status: u16,
    /// Parsed payload.
    pub response_value: Value,
    /// The originating request.
    pub request: RequestData,
}

impl ResponseData {
    /// Creates response data.
    pub fn new(status: u16, response_value: Value, request: RequestData) -> Self {
        ResponseData {
            status,
            response_value,
            request,
        }
    }
}

/// Maps a raw response into the variant the classification rules consume.
pub trait Grouper: Send + Sync + 'static {
    /// Returns the variant for `response`.
    fn group(&self, response: &ResponseData) -> Group;
}

impl<F> Grouper for F
where
    F: Fn(&ResponseData) -> Group + Send + Sync + 'static,
{
    fn group(&self, response: &ResponseData) -> Group {
        (self)(response)
    }
}

impl<G: Grouper + ?Sized> Grouper for Arc<G> {
    fn group(&self, response: &ResponseData) -> Group {
        self.as_ref().group(response)
    }
}

/// Groups by status code: `2xx` becomes `success`, anything else is tagged
/// with the decimal status code.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusGroups;

impl Grouper for StatusGroups {
    fn group(&self, response: &ResponseData) -> Group {
        let value = response.response_value.clone();
        if (200..300).contains(&response.status) {
            Group::new(SUCCESS, value)
        } else {
            Group::new(response.status.to_string(), value)
        }
    }
}
