//! Transport seam: the [`Fetcher`] trait.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;

use crate::{FetchOutcome, RequestData};

/// Trait for the network transport.
///
/// The engine never calls a fetcher twice concurrently for the same cache key
/// from queries; mutations are not deduplicated.
///
/// Any async closure taking a [`RequestData`] is a fetcher:
///
/// ```rust
/// use restbox_core::{FetchOutcome, Fetcher, RequestData};
/// use serde_json::json;
///
/// let fetcher = |req: RequestData| async move {
///     FetchOutcome::response(200, json!({"url": req.url()}))
/// };
/// # fn assert_fetcher<F: Fetcher>(_: &F) {}
/// # assert_fetcher(&fetcher);
/// ```
#[async_trait]
pub trait Fetcher: Send + Sync + 'static {
    /// Performs the request.
    async fn fetch(&self, request: RequestData) -> FetchOutcome;
}

#[async_trait]
impl<F, Fut> Fetcher for F
where
    F: Fn(RequestData) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = FetchOutcome> + Send + 'static,
{
    async fn fetch(&self, request: RequestData) -> FetchOutcome {
        (self)(request).await
    }
}

#[async_trait]
impl<T: Fetcher + ?Sized> Fetcher for Arc<T> {
    async fn fetch(&self, request: RequestData) -> FetchOutcome {
        self.as_ref().fetch(request).await
    }
}
